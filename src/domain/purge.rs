//! Purge targets and dispatch outcomes.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PurgeScope {
    /// A single canonical path under the purge namespace.
    One,
    /// The wildcard purge namespace.
    All,
}

/// What to invalidate upstream. A `One` target always carries a path, an
/// `All` target never does.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PurgeTarget {
    scope: PurgeScope,
    path: Option<String>,
}

impl PurgeTarget {
    pub fn all() -> Self {
        Self {
            scope: PurgeScope::All,
            path: None,
        }
    }

    pub fn one(path: impl Into<String>) -> Self {
        Self {
            scope: PurgeScope::One,
            path: Some(path.into()),
        }
    }

    pub fn scope(&self) -> PurgeScope {
        self.scope
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Suffix appended to the purge prefix: the path itself or `/*`.
    pub fn purge_suffix(&self) -> &str {
        match self.scope {
            PurgeScope::All => "/*",
            PurgeScope::One => self.path.as_deref().unwrap_or("/"),
        }
    }
}

/// Result of a single purge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub success: bool,
    pub http_status: Option<u16>,
    pub message: String,
}

impl PurgeOutcome {
    pub fn succeeded(status: u16) -> Self {
        Self {
            success: true,
            http_status: Some(status),
            message: "cache purged".to_string(),
        }
    }

    pub fn http_error(status: u16, body: &str) -> Self {
        Self {
            success: false,
            http_status: Some(status),
            message: format!("HTTP error: {status} - {body}"),
        }
    }

    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            http_status: None,
            message: message.into(),
        }
    }

    pub fn missing_host() -> Self {
        Self::transport_failure("could not determine host")
    }

    /// Metric label for the outcome class.
    pub fn label(&self) -> &'static str {
        match (self.success, self.http_status) {
            (true, _) => "success",
            (false, Some(_)) => "http_error",
            (false, None) => "transport_error",
        }
    }
}
