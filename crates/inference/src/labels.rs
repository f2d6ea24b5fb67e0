use crate::error::ConfigError;
use std::collections::HashSet;

/// Name of the implicit class appended after the configured ones.
pub const BACKGROUND_LABEL: &str = "background";

/// Ordered class names; a class ID is an index into this list.
///
/// The background sentinel is not stored but is addressable at
/// [`LabelSet::background_index`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    pub fn new<I, S>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ConfigError::EmptyLabelSet);
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateLabel(name.clone()));
            }
        }

        Ok(Self { names })
    }

    /// Number of real classes, background excluded.
    pub fn num_classes(&self) -> usize {
        self.names.len()
    }

    pub fn background_index(&self) -> usize {
        self.names.len()
    }

    /// Name for `class_id`, including the background sentinel.
    pub fn name(&self, class_id: usize) -> Option<&str> {
        match class_id {
            id if id < self.names.len() => Some(self.names[id].as_str()),
            id if id == self.names.len() => Some(BACKGROUND_LABEL),
            _ => None,
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// All names followed by the background sentinel.
    pub fn with_background(&self) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(BACKGROUND_LABEL))
    }
}
