use std::collections::HashSet;

use log::info;

use crate::kind::{CanonicalIdentifier, Kind};

/// Identifiers already present in the output store.
#[derive(Debug, Default)]
pub struct DedupIndex {
    seen: HashSet<String>,
}

impl DedupIndex {
    /// Builds the index from identifier values read back from the output store. Values that
    /// canonicalize are stored in canonical form so rows written by older runs still match.
    pub fn from_persisted(values: &[String], kind: Kind) -> Self {
        let seen = values
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| match kind.canonicalize(v) {
                Some(id) => id.as_str().to_string(),
                None => v.to_string(),
            })
            .collect();
        DedupIndex { seen }
    }

    pub fn contains(&self, id: &CanonicalIdentifier) -> bool {
        self.seen.contains(id.as_str())
    }

    pub fn insert(&mut self, id: &CanonicalIdentifier) {
        self.seen.insert(id.as_str().to_string());
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// The ordered identifiers of one run plus the set of those already done.
pub struct ResumableWorkQueue {
    identifiers: Vec<CanonicalIdentifier>,
    done: DedupIndex,
}

impl ResumableWorkQueue {
    pub fn new(links: &[String], kind: Kind, done: DedupIndex) -> Self {
        let identifiers = Self::build(links, kind);
        let queue = ResumableWorkQueue { identifiers, done };
        info!(
            "Queued {} {} links, {} already processed.",
            queue.len(),
            kind,
            queue.len() - queue.pending()
        );
        queue
    }

    /// Keeps links of `kind`, canonicalizes them and drops the malformed ones. Input order is
    /// preserved and repeated links are kept; [`is_done`](Self::is_done) collapses them later.
    pub fn build(links: &[String], kind: Kind) -> Vec<CanonicalIdentifier> {
        links
            .iter()
            .filter(|link| kind.matches(link))
            .filter_map(|link| kind.canonicalize(link))
            .collect()
    }

    pub fn identifiers(&self) -> &[CanonicalIdentifier] {
        &self.identifiers
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// Identifiers not yet done, counting repeats once each.
    pub fn pending(&self) -> usize {
        let mut counted = HashSet::new();
        self.identifiers
            .iter()
            .filter(|id| !self.done.contains(id) && counted.insert(id.as_str()))
            .count()
    }

    pub fn is_done(&self, id: &CanonicalIdentifier) -> bool {
        self.done.contains(id)
    }

    pub fn mark_done(&mut self, id: &CanonicalIdentifier) {
        self.done.insert(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn only_links_of_the_kind_survive() {
        let input = links(&["https://x/company/9", "https://x/in/9", "https://x/jobs/9"]);
        let ids = ResumableWorkQueue::build(&input, Kind::Organization);
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].as_str(), "https://www.linkedin.com/company/9/");
    }

    #[test]
    fn malformed_links_are_dropped_and_order_kept() {
        let input = links(&[
            "https://www.linkedin.com/in/b",
            "https://www.linkedin.com/in/",
            "https://www.linkedin.com/in/a",
            "https://www.linkedin.com/in/b?x=1",
        ]);
        let ids = ResumableWorkQueue::build(&input, Kind::Person);
        let handles: Vec<&str> = ids
            .iter()
            .map(|id| id.as_str().split("/in/").nth(1).unwrap().split('?').next().unwrap())
            .collect();
        assert_eq!(handles, vec!["b", "a", "b"]);
    }

    #[test]
    fn persisted_raw_links_match_their_canonical_form() {
        let done = DedupIndex::from_persisted(
            &links(&["https://www.linkedin.com/company/acme/about", "", "not a link"]),
            Kind::Organization,
        );
        assert_eq!(done.len(), 2);

        let queue = ResumableWorkQueue::new(
            &links(&["https://x/company/acme", "https://x/company/other"]),
            Kind::Organization,
            done,
        );
        assert!(queue.is_done(&queue.identifiers()[0]));
        assert!(!queue.is_done(&queue.identifiers()[1]));
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn marking_done_collapses_later_repeats() {
        let mut queue = ResumableWorkQueue::new(
            &links(&["https://x/in/a", "https://x/in/a"]),
            Kind::Person,
            DedupIndex::default(),
        );
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pending(), 1);

        let first = queue.identifiers()[0].clone();
        queue.mark_done(&first);
        assert!(queue.is_done(&queue.identifiers()[1]));
        assert_eq!(queue.pending(), 0);
    }
}
