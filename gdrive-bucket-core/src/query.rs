//! Structured listing filters and their rendering into the Drive query grammar.

use crate::contract::FOLDER_MIME_TYPE;

/// Escape a value for use inside a single-quoted query literal.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Predicates for a listing call. Every predicate that is set must hold
/// (logical AND); an unset predicate leaves that dimension unconstrained.
/// Trashed entries are always excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub name: Option<String>,
    pub is_folder: Option<bool>,
    pub parent: Option<String>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct children of `parent`, folders and files alike.
    pub fn children_of(parent: impl Into<String>) -> Self {
        Self::new().parent(parent)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn folders_only(mut self) -> Self {
        self.is_folder = Some(true);
        self
    }

    pub fn files_only(mut self) -> Self {
        self.is_folder = Some(false);
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn to_query(&self) -> String {
        let mut clauses = vec!["trashed=false".to_string()];
        if let Some(name) = &self.name {
            clauses.push(format!("name='{}'", escape_query_value(name)));
        }
        if let Some(is_folder) = self.is_folder {
            let op = if is_folder { "=" } else { "!=" };
            clauses.push(format!("mimeType {op} '{FOLDER_MIME_TYPE}'"));
        }
        if let Some(parent) = &self.parent {
            clauses.push(format!("'{}' in parents", escape_query_value(parent)));
        }
        clauses.join(" and ")
    }
}
