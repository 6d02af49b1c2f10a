use thiserror::Error;

use super::events::EntityStatus;

/// Why an event was not eligible for purging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Autosave or revision.
    Transient,
    Status(EntityStatus),
    UnwatchedTaxonomy(String),
}

impl SkipReason {
    pub fn as_label(&self) -> &'static str {
        match self {
            SkipReason::Transient => "transient",
            SkipReason::Status(_) => "status",
            SkipReason::UnwatchedTaxonomy(_) => "unwatched_taxonomy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("event skipped: {}", describe_skip(.0))]
    Skipped(SkipReason),
    #[error("canonical path unavailable: {detail}")]
    MissingPath { detail: String },
}

impl ResolutionError {
    pub fn missing_path(detail: impl Into<String>) -> Self {
        Self::MissingPath {
            detail: detail.into(),
        }
    }
}

fn describe_skip(reason: &SkipReason) -> String {
    match reason {
        SkipReason::Transient => "autosave or revision".to_string(),
        SkipReason::Status(status) => format!("status `{status}` is not published or scheduled"),
        SkipReason::UnwatchedTaxonomy(taxonomy) => {
            format!("taxonomy `{taxonomy}` is not watched")
        }
    }
}
