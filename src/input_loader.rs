use std::fs::File;
use std::path::Path;

use calamine::{open_workbook, Reader, Xlsx};
use log::{error, info};
use serde::Deserialize;

use crate::error::ScraperError;

/// Accepted names for the link column, compared case-insensitively.
const LINK_HEADERS: [&str; 2] = ["link", "url"];

#[derive(Debug, Deserialize, Clone)]
pub struct InputRow {
    #[serde(rename = "Link")]
    pub link: Option<String>,
}

fn is_link_header(name: &str) -> bool {
    LINK_HEADERS.contains(&name.to_lowercase().as_str())
}

/// Reads the `Link` column of a CSV or XLSX sheet, in row order, skipping blank cells.
pub fn load_links<P: AsRef<Path>>(filename: P) -> Result<Vec<String>, ScraperError> {
    let path = filename.as_ref();
    if !path.exists() {
        return Err(ScraperError::Input(format!(
            "input file {:?} does not exist",
            path
        )));
    }

    let is_excel = path
        .extension()
        .map_or(false, |ext| ext == "xlsx" || ext == "xls");

    let links = if is_excel {
        load_excel(path)?
    } else {
        load_csv(path)?
    };
    info!("Loaded {} links from {:?}", links.len(), path);
    Ok(links)
}

fn load_csv(path: &Path) -> Result<Vec<String>, ScraperError> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let headers = rdr.headers()?.clone();
    let link_idx = headers
        .iter()
        .position(is_link_header)
        .ok_or_else(|| ScraperError::Input(format!("{:?} has no 'Link' column", path)))?;
    rdr.set_headers(
        headers
            .iter()
            .enumerate()
            .map(|(i, h)| if i == link_idx { "Link" } else { h })
            .collect(),
    );

    let mut links = Vec::new();
    for result in rdr.deserialize::<InputRow>() {
        match result {
            Ok(InputRow { link: Some(link) }) if !link.is_empty() => links.push(link),
            Ok(_) => {}
            Err(e) => error!("Error parsing CSV record: {}", e),
        }
    }
    Ok(links)
}

fn load_excel(path: &Path) -> Result<Vec<String>, ScraperError> {
    let mut excel: Xlsx<_> = open_workbook(path)?;

    let worksheets = excel.worksheets();
    let Some((_name, range)) = worksheets.first() else {
        return Err(ScraperError::Input(format!("{:?} has no worksheets", path)));
    };

    let mut rows = range.rows();
    let link_idx = rows
        .next()
        .and_then(|header| {
            header.iter().position(|cell| {
                let name = cell.to_string().to_lowercase();
                name.contains("link") || name.contains("url")
            })
        })
        .ok_or_else(|| ScraperError::Input(format!("{:?} has no 'Link' column", path)))?;

    let links = rows
        .filter_map(|row| row.get(link_idx))
        .map(|cell| cell.to_string().trim().to_string())
        .filter(|link| !link.is_empty())
        .collect();
    Ok(links)
}
