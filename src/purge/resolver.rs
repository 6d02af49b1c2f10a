//! Maps mutation events to purge targets.
//!
//! Resolution is pure: the same event always yields the same target, so a
//! failed dispatch can be retried by re-resolving.

use std::collections::BTreeSet;

use url::Url;

use crate::domain::error::{ResolutionError, SkipReason};
use crate::domain::events::{EntitySaved, MutationEvent, TermChanged};
use crate::domain::purge::PurgeTarget;

use super::config::PurgeConfig;

const PATH_BASE: &str = "http://purger.invalid";

#[derive(Debug, Clone)]
pub struct UrlResolver {
    watched_taxonomies: BTreeSet<String>,
}

impl UrlResolver {
    pub fn new(config: &PurgeConfig) -> Self {
        Self {
            watched_taxonomies: config.watched_taxonomies.clone(),
        }
    }

    pub fn resolve(&self, event: &MutationEvent) -> Result<PurgeTarget, ResolutionError> {
        match event {
            MutationEvent::PurgeAll => Ok(PurgeTarget::all()),
            MutationEvent::EntitySaved(saved) => self.resolve_entity(saved),
            MutationEvent::TermChanged(changed) => self.resolve_term(changed),
        }
    }

    fn resolve_entity(&self, saved: &EntitySaved) -> Result<PurgeTarget, ResolutionError> {
        if saved.transient {
            return Err(ResolutionError::Skipped(SkipReason::Transient));
        }
        if !saved.status.is_purgeable() {
            return Err(ResolutionError::Skipped(SkipReason::Status(
                saved.status.clone(),
            )));
        }

        let raw = saved.canonical_path.as_deref().ok_or_else(|| {
            ResolutionError::missing_path(format!(
                "no permalink for {} {}",
                saved.entity_type, saved.entity_id
            ))
        })?;
        canonical_path(raw).map(PurgeTarget::one)
    }

    fn resolve_term(&self, changed: &TermChanged) -> Result<PurgeTarget, ResolutionError> {
        if !self.watched_taxonomies.contains(&changed.taxonomy) {
            return Err(ResolutionError::Skipped(SkipReason::UnwatchedTaxonomy(
                changed.taxonomy.clone(),
            )));
        }

        let raw = changed.canonical_path.as_deref().ok_or_else(|| {
            ResolutionError::missing_path(format!(
                "no term link for {} {}",
                changed.taxonomy, changed.term_id
            ))
        })?;
        canonical_path(raw).map(PurgeTarget::one)
    }
}

/// Extract the path component of a permalink, dropping query and fragment.
///
/// Accepts absolute URLs and absolute paths. A URL without a path is an
/// error rather than `/`, so a broken permalink never widens into a
/// front-page purge.
pub fn canonical_path(raw: &str) -> Result<String, ResolutionError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ResolutionError::missing_path("permalink is empty"));
    }

    if raw.starts_with('/') && !raw.starts_with("//") {
        let base = Url::parse(PATH_BASE)
            .map_err(|err| ResolutionError::missing_path(err.to_string()))?;
        let joined = base
            .join(raw)
            .map_err(|err| ResolutionError::missing_path(format!("`{raw}`: {err}")))?;
        return Ok(joined.path().to_string());
    }

    let parsed = Url::parse(raw)
        .map_err(|err| ResolutionError::missing_path(format!("`{raw}`: {err}")))?;
    if parsed.cannot_be_a_base() || parsed.host_str().is_none() {
        return Err(ResolutionError::missing_path(format!(
            "`{raw}` is not a hierarchical url"
        )));
    }
    if !has_explicit_path(raw) {
        return Err(ResolutionError::missing_path(format!(
            "`{raw}` has no path component"
        )));
    }

    Ok(parsed.path().to_string())
}

fn has_explicit_path(raw: &str) -> bool {
    let rest = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    rest.find(['/', '?', '#'])
        .is_some_and(|idx| rest[idx..].starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{EntityStatus, TermAction};
    use crate::domain::purge::PurgeScope;

    fn resolver() -> UrlResolver {
        UrlResolver::new(&PurgeConfig::default())
    }

    fn saved(status: &str, path: Option<&str>) -> MutationEvent {
        MutationEvent::EntitySaved(EntitySaved {
            entity_id: 42,
            entity_type: "post".to_string(),
            status: EntityStatus::parse(status),
            canonical_path: path.map(str::to_string),
            transient: false,
        })
    }

    fn term(taxonomy: &str, path: Option<&str>) -> MutationEvent {
        MutationEvent::TermChanged(TermChanged {
            term_id: 7,
            taxonomy: taxonomy.to_string(),
            action: TermAction::Edit,
            canonical_path: path.map(str::to_string),
        })
    }

    #[test]
    fn purge_all_targets_wildcard() {
        let target = resolver()
            .resolve(&MutationEvent::PurgeAll)
            .expect("purge all resolves");
        assert_eq!(target.scope(), PurgeScope::All);
        assert_eq!(target.path(), None);
    }

    #[test]
    fn published_entity_resolves_to_its_path() {
        let target = resolver()
            .resolve(&saved("publish", Some("/blog/hello")))
            .expect("published post resolves");
        assert_eq!(target, PurgeTarget::one("/blog/hello"));
    }

    #[test]
    fn scheduled_entity_is_purged() {
        let target = resolver()
            .resolve(&saved("future", Some("https://example.com/launch/")))
            .expect("scheduled post resolves");
        assert_eq!(target.path(), Some("/launch/"));
    }

    #[test]
    fn unpublished_statuses_are_skipped() {
        for status in ["draft", "pending", "private", "trash", "inherit"] {
            let err = resolver()
                .resolve(&saved(status, Some("/blog/hello")))
                .expect_err("should skip");
            assert!(
                matches!(err, ResolutionError::Skipped(SkipReason::Status(_))),
                "{status}: {err:?}"
            );
        }
    }

    #[test]
    fn transient_saves_are_skipped_before_status() {
        let event = MutationEvent::EntitySaved(EntitySaved {
            entity_id: 42,
            entity_type: "post".to_string(),
            status: EntityStatus::Published,
            canonical_path: Some("/blog/hello".to_string()),
            transient: true,
        });
        assert_eq!(
            resolver().resolve(&event),
            Err(ResolutionError::Skipped(SkipReason::Transient))
        );
    }

    #[test]
    fn missing_permalink_is_an_error() {
        let err = resolver()
            .resolve(&saved("publish", None))
            .expect_err("no permalink");
        assert!(matches!(err, ResolutionError::MissingPath { .. }));
    }

    #[test]
    fn unwatched_taxonomy_is_skipped() {
        let err = resolver()
            .resolve(&term("post_tag", Some("/tag/rust/")))
            .expect_err("unwatched");
        assert_eq!(
            err,
            ResolutionError::Skipped(SkipReason::UnwatchedTaxonomy("post_tag".to_string()))
        );
    }

    #[test]
    fn watched_taxonomy_resolves_term_link() {
        let target = resolver()
            .resolve(&term(
                "product_cat",
                Some("https://shop.example.com/product-category/shoes/?orderby=price#top"),
            ))
            .expect("watched term resolves");
        assert_eq!(target.path(), Some("/product-category/shoes/"));
    }

    #[test]
    fn custom_watch_list_replaces_default() {
        let config = PurgeConfig {
            watched_taxonomies: ["category".to_string()].into(),
            ..Default::default()
        };
        let resolver = UrlResolver::new(&config);
        assert!(resolver.resolve(&term("category", Some("/c/news/"))).is_ok());
        assert!(resolver.resolve(&term("product_cat", Some("/c/x/"))).is_err());
    }

    #[test]
    fn canonical_path_strips_query_and_fragment() {
        assert_eq!(
            canonical_path("/blog/hello?preview=true#comments").as_deref(),
            Ok("/blog/hello")
        );
        assert_eq!(
            canonical_path("https://example.com/blog/hello/?p=1").as_deref(),
            Ok("/blog/hello/")
        );
    }

    #[test]
    fn canonical_path_never_falls_back_to_root() {
        for raw in [
            "https://example.com",
            "https://example.com?p=42",
            "https://example.com#top",
            "",
            "   ",
            "not a url",
            "mailto:editor@example.com",
            "//example.com/blog",
        ] {
            assert!(
                matches!(canonical_path(raw), Err(ResolutionError::MissingPath { .. })),
                "{raw:?} should not resolve"
            );
        }
    }

    #[test]
    fn explicit_front_page_is_allowed() {
        assert_eq!(canonical_path("https://example.com/").as_deref(), Ok("/"));
        assert_eq!(canonical_path("/").as_deref(), Ok("/"));
    }

    #[test]
    fn resolution_is_deterministic() {
        let event = saved("publish", Some("https://example.com/a/b/"));
        let resolver = resolver();
        assert_eq!(resolver.resolve(&event), resolver.resolve(&event));
    }
}
