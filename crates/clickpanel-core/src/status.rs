use serde::Serialize;

use crate::wire::{RawList, RawStatus};

/// Selectable status of a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusOption {
    /// Status label.
    pub label: String,
    /// Hex colour, empty when the remote sends none.
    pub color: String,
}

impl StatusOption {
    /// Build an option from its parts.
    pub fn new(label: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            color: color.into(),
        }
    }

    fn from_wire(raw: RawStatus) -> Option<Self> {
        let label = raw.status.filter(|s| !s.is_empty())?;
        Some(Self {
            label,
            color: raw.color.unwrap_or_default(),
        })
    }

    /// Extract the status catalog embedded in a list payload.
    #[must_use]
    pub fn catalog_of(list: RawList) -> Vec<Self> {
        list.statuses
            .unwrap_or_default()
            .into_iter()
            .filter_map(Self::from_wire)
            .collect()
    }
}
