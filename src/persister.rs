//! Append-only CSV output store.
//!
//! Each record is written, flushed and synced before the next identifier is processed, so a
//! crash loses at most the record in flight. Prior rows are never rewritten.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::ScraperError;
use crate::kind::KindDescriptor;
use crate::record::OutputRecord;

/// What a previous run left in the output store.
#[derive(Debug, Default)]
pub struct ExistingOutput {
    /// `None` when the store does not exist yet or is empty.
    pub header: Option<Vec<String>>,
    /// Raw identifier-column values, in file order, blanks dropped.
    pub identifiers: Vec<String>,
}

/// Reads the header and identifier column of the output store and validates it for `descriptor`.
/// Fails with [`ScraperError::Configuration`] when the kind requires a store that is missing or
/// lacks its required columns.
pub fn inspect_output(
    path: &Path,
    descriptor: &KindDescriptor,
) -> Result<ExistingOutput, ScraperError> {
    if !path.exists() {
        if descriptor.output_must_exist {
            return Err(ScraperError::Configuration(format!(
                "output store {:?} not found; it must exist with columns {:?}",
                path,
                descriptor.required_columns()
            )));
        }
        info!("Output store {:?} not found. It will be created.", path);
        return Ok(ExistingOutput::default());
    }

    repair_torn_tail(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let header: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let header_present = header.iter().any(|h| !h.is_empty());

    let missing: Vec<&str> = descriptor
        .required_columns()
        .into_iter()
        .filter(|c| !header.iter().any(|h| h == c))
        .collect();
    if !missing.is_empty() && (header_present || descriptor.output_must_exist) {
        return Err(ScraperError::Configuration(format!(
            "output store {:?} must contain columns {:?}",
            path, missing
        )));
    }
    if !header_present {
        info!("Output store {:?} is empty. A header will be written.", path);
        return Ok(ExistingOutput::default());
    }

    let id_idx = header
        .iter()
        .position(|h| h == descriptor.identifier_column)
        .ok_or_else(|| {
            ScraperError::Configuration(format!(
                "output store {:?} has no '{}' column",
                path, descriptor.identifier_column
            ))
        })?;

    let mut identifiers = Vec::new();
    for row in rdr.records() {
        match row {
            Ok(row) => {
                if let Some(value) = row.get(id_idx).filter(|v| !v.is_empty()) {
                    identifiers.push(value.to_string());
                }
            }
            Err(e) => warn!("Skipping unreadable output row: {}", e),
        }
    }

    info!(
        "Found {} existing records in {:?}.",
        identifiers.len(),
        path
    );
    Ok(ExistingOutput {
        header: Some(header),
        identifiers,
    })
}

pub struct IncrementalPersister {
    path: PathBuf,
    header: Vec<String>,
    writer: csv::Writer<File>,
    appended: usize,
}

impl IncrementalPersister {
    /// Opens the store for appending. `existing_header` comes from [`inspect_output`]; when it is
    /// `None` the kind's header is written first.
    pub fn open(
        path: &Path,
        descriptor: &KindDescriptor,
        existing_header: Option<Vec<String>>,
    ) -> Result<Self, ScraperError> {
        let needs_header = existing_header.is_none();
        let header = existing_header
            .unwrap_or_else(|| descriptor.columns.iter().map(|c| c.to_string()).collect());

        let dropped: Vec<&str> = descriptor
            .columns
            .iter()
            .copied()
            .filter(|c| !header.iter().any(|h| h == c))
            .collect();
        if !dropped.is_empty() {
            warn!(
                "Output store {:?} has no columns {:?}; those values will not be saved.",
                path, dropped
            );
        }

        if !needs_header {
            repair_torn_tail(path)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(&header)?;
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }

        Ok(IncrementalPersister {
            path: path.to_path_buf(),
            header,
            writer,
            appended: 0,
        })
    }

    /// Writes one row and makes it durable before returning.
    pub fn append(&mut self, record: &OutputRecord) -> Result<(), ScraperError> {
        self.writer.write_record(record.row_for(&self.header))?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.appended += 1;
        info!("Saved {} to {:?}", record.identifier(), self.path);
        Ok(())
    }

    pub fn appended(&self) -> usize {
        self.appended
    }
}

/// A crash mid-write can leave a partial final row. It is cut back to the last complete line so
/// its identifier is not mistaken for a persisted record. A store holding only an unterminated
/// header line gets its newline instead.
fn repair_torn_tail(path: &Path) -> Result<(), ScraperError> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if contents.is_empty() || contents.ends_with(b"\n") {
        return Ok(());
    }

    let mut file = OpenOptions::new().append(true).open(path)?;
    match contents.iter().rposition(|b| *b == b'\n') {
        Some(last_newline) => {
            warn!(
                "Output store {:?} ended mid-row; dropping the partial row.",
                path
            );
            file.set_len(last_newline as u64 + 1)?;
        }
        None => file.write_all(b"\n")?,
    }
    file.sync_data()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::kind::Kind;
    use crate::work_queue::DedupIndex;

    fn record(descriptor: &KindDescriptor, raw: &str, name: &str) -> OutputRecord {
        let mut record = OutputRecord::new(descriptor.canonicalize(raw).unwrap(), descriptor);
        record.set(descriptor.display_column, name);
        record
    }

    #[test]
    fn organization_store_is_created_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let descriptor = Kind::Organization.descriptor();

        let existing = inspect_output(&path, &descriptor).unwrap();
        assert!(existing.header.is_none());

        let mut persister = IncrementalPersister::open(&path, &descriptor, existing.header).unwrap();
        persister
            .append(&record(&descriptor, "https://x/company/acme", "Acme"))
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "CompanyLink,Company\nhttps://www.linkedin.com/company/acme/,Acme\n"
        );
    }

    #[test]
    fn person_store_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.csv");
        let result = inspect_output(&path, &Kind::Person.descriptor());
        assert!(matches!(result, Err(ScraperError::Configuration(_))));
    }

    #[test]
    fn person_store_must_have_identifier_and_name_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.csv");
        fs::write(&path, "Link,Headline\n").unwrap();

        match inspect_output(&path, &Kind::Person.descriptor()) {
            Err(ScraperError::Configuration(msg)) => assert!(msg.contains("Name")),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn empty_person_store_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.csv");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            inspect_output(&path, &Kind::Person.descriptor()),
            Err(ScraperError::Configuration(_))
        ));
    }

    #[test]
    fn appends_follow_the_existing_header_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.csv");
        fs::write(&path, "Name,Link,Extra\nOld,https://www.linkedin.com/in/old,x\n").unwrap();
        let descriptor = Kind::Person.descriptor();

        let existing = inspect_output(&path, &descriptor).unwrap();
        assert_eq!(existing.identifiers, vec!["https://www.linkedin.com/in/old"]);

        let mut persister = IncrementalPersister::open(&path, &descriptor, existing.header).unwrap();
        let rec = record(&descriptor, "https://www.linkedin.com/in/new", "New");
        persister.append(&rec).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let last = contents.lines().last().unwrap();
        assert_eq!(last, format!("New,{},", rec.identifier()));
    }

    #[test]
    fn partial_final_row_is_dropped_before_appending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "CompanyLink,Company\nhttps://www.linkedin.com/company/a/,A").unwrap();
        let descriptor = Kind::Organization.descriptor();

        let existing = inspect_output(&path, &descriptor).unwrap();
        assert!(existing.identifiers.is_empty());

        let mut persister = IncrementalPersister::open(&path, &descriptor, existing.header).unwrap();
        persister
            .append(&record(&descriptor, "https://x/company/b", "B"))
            .unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "CompanyLink,Company\nhttps://www.linkedin.com/company/b/,B\n"
        );
    }

    #[test]
    fn crash_inside_a_row_keeps_only_complete_rows_in_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.csv");
        let a = Kind::Person.canonicalize("https://x/in/a").unwrap();
        let b = Kind::Person.canonicalize("https://x/in/b").unwrap();
        fs::write(
            &path,
            format!(
                "Link,Name,Headline,Location,Company,CompanyLink\n{},A,h,l,c,x\n{},Bo",
                a, b
            ),
        )
        .unwrap();
        let descriptor = Kind::Person.descriptor();

        let existing = inspect_output(&path, &descriptor).unwrap();
        let index = DedupIndex::from_persisted(&existing.identifiers, Kind::Person);
        IncrementalPersister::open(&path, &descriptor, existing.header).unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.contains(&a));
        assert!(!index.contains(&b));
        assert!(fs::read_to_string(&path).unwrap().ends_with(",A,h,l,c,x\n"));
    }

    #[test]
    fn unterminated_header_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.csv");
        fs::write(&path, "Link,Name").unwrap();
        let descriptor = Kind::Person.descriptor();

        let existing = inspect_output(&path, &descriptor).unwrap();
        assert_eq!(
            existing.header,
            Some(vec!["Link".to_string(), "Name".to_string()])
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "Link,Name\n");
    }

    #[test]
    fn reopening_after_k_appends_sees_exactly_k_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let descriptor = Kind::Organization.descriptor();
        let all = ["a", "b", "c", "d", "e"];
        let k = 3;

        {
            let existing = inspect_output(&path, &descriptor).unwrap();
            let mut persister =
                IncrementalPersister::open(&path, &descriptor, existing.header).unwrap();
            for handle in &all[..k] {
                let raw = format!("https://x/company/{}", handle);
                persister.append(&record(&descriptor, &raw, handle)).unwrap();
            }
            assert_eq!(persister.appended(), k);
            // Dropped here without any orderly shutdown.
        }

        let reread = inspect_output(&path, &descriptor).unwrap();
        let expected: Vec<String> = all[..k]
            .iter()
            .map(|h| format!("https://www.linkedin.com/company/{}/", h))
            .collect();
        assert_eq!(reread.identifiers, expected);
    }
}
