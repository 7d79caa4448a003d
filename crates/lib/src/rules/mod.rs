//! Link rewrite rules: each rule recognizes one link family and rewrites it to an
//! embed-friendly domain.
//!
//! Rules are stateless and safe to call concurrently from any channel's pipeline.

mod link;
mod registry;

pub use link::LinkRule;
pub use registry::RuleRegistry;

/// Button attached to a repost that points back at the original link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAffordance {
    pub url: String,
    pub label: String,
}

/// Result of a matching rule: the rewritten text and the link back to the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    /// Rewritten message text (never empty).
    pub new_text: String,
    /// First original URL found in the message, with its link label.
    pub original: LinkAffordance,
    /// Whether the original message should be removed after reposting.
    pub delete_original: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("invalid rule pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("{0}: text was rewritten but no original url could be located")]
    OriginalUrlMissing(&'static str),
}

/// A single link family's matching and rewriting logic.
pub trait Rule: Send + Sync {
    /// Short name used in logs (e.g. "twitter").
    fn name(&self) -> &str;

    /// Rewrite `text`. `Ok(None)` means the rule declines.
    fn apply(&self, text: &str) -> Result<Option<RewriteResult>, RuleError>;
}
