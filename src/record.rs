use crate::kind::{CanonicalIdentifier, KindDescriptor};

/// Placeholder for a field that was attempted but could not be read.
pub const EMPTY: &str = "";
pub const NO_ORGANIZATION_LINK: &str = "Unknown / No Link";
pub const UNKNOWN_FROM_SEARCH: &str = "Unknown from Search Results";

/// One output row. Every column of the kind is present; unread fields hold a sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    identifier: CanonicalIdentifier,
    identifier_column: &'static str,
    values: Vec<(&'static str, String)>,
}

impl OutputRecord {
    /// A record with every non-identifier column set to the empty sentinel.
    pub fn new(identifier: CanonicalIdentifier, descriptor: &KindDescriptor) -> Self {
        let values = descriptor
            .columns
            .iter()
            .filter(|c| **c != descriptor.identifier_column)
            .map(|c| (*c, EMPTY.to_string()))
            .collect();
        OutputRecord {
            identifier,
            identifier_column: descriptor.identifier_column,
            values,
        }
    }

    pub fn identifier(&self) -> &CanonicalIdentifier {
        &self.identifier
    }

    /// Sets a column's value. Unknown columns are appended.
    pub fn set(&mut self, column: &'static str, value: impl Into<String>) {
        let value = value.into();
        match self.values.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.values.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        if column == self.identifier_column {
            return Some(self.identifier.as_str());
        }
        self.values
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v.as_str())
    }

    /// Values laid out in `header` order; columns the record lacks are written empty.
    pub fn row_for(&self, header: &[String]) -> Vec<String> {
        header
            .iter()
            .map(|column| self.get(column).unwrap_or(EMPTY).to_string())
            .collect()
    }
}
