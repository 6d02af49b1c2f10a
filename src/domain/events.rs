//! Mutation events emitted by the host CMS, one per triggering occurrence.

use std::fmt;

/// Publication status of a saved content entity.
///
/// Accepts the host spellings (`publish`, `future`) as well as the canonical
/// names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityStatus {
    Published,
    Scheduled,
    Draft,
    Pending,
    Private,
    Trash,
    Other(String),
}

impl EntityStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "publish" | "published" => Self::Published,
            "future" | "scheduled" => Self::Scheduled,
            "draft" | "auto-draft" => Self::Draft,
            "pending" => Self::Pending,
            "private" => Self::Private,
            "trash" => Self::Trash,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Published => "published",
            Self::Scheduled => "scheduled",
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Private => "private",
            Self::Trash => "trash",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Only publicly visible (or about to be) content is cached upstream.
    pub fn is_purgeable(&self) -> bool {
        matches!(self, Self::Published | Self::Scheduled)
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermAction {
    Create,
    Edit,
    Delete,
}

impl TermAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TermAction::Create => "create",
            TermAction::Edit => "edit",
            TermAction::Delete => "delete",
        }
    }
}

/// A content entity (post, page, product) was saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySaved {
    pub entity_id: u64,
    pub entity_type: String,
    pub status: EntityStatus,
    /// Permalink or absolute path as produced by the host, if any.
    pub canonical_path: Option<String>,
    /// Autosave or revision.
    pub transient: bool,
}

/// A taxonomy term was created, edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermChanged {
    pub term_id: u64,
    pub taxonomy: String,
    pub action: TermAction,
    pub canonical_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationEvent {
    EntitySaved(EntitySaved),
    TermChanged(TermChanged),
    PurgeAll,
}

impl MutationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            MutationEvent::EntitySaved(_) => "entity_saved",
            MutationEvent::TermChanged(_) => "term_changed",
            MutationEvent::PurgeAll => "purge_all",
        }
    }

    /// Context type and id used in diagnostics, e.g. (`post`, `42`).
    pub fn context(&self) -> (&str, String) {
        match self {
            MutationEvent::EntitySaved(saved) => {
                (saved.entity_type.as_str(), saved.entity_id.to_string())
            }
            MutationEvent::TermChanged(changed) => {
                (changed.taxonomy.as_str(), changed.term_id.to_string())
            }
            MutationEvent::PurgeAll => ("all", "all".to_string()),
        }
    }
}

impl From<EntitySaved> for MutationEvent {
    fn from(saved: EntitySaved) -> Self {
        MutationEvent::EntitySaved(saved)
    }
}

impl From<TermChanged> for MutationEvent {
    fn from(changed: TermChanged) -> Self {
        MutationEvent::TermChanged(changed)
    }
}
