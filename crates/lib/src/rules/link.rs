//! Regex-driven link rule and the built-in link families.

use super::{LinkAffordance, RewriteResult, Rule, RuleError};
use regex::Regex;

/// A rule described by data: marker, source prefixes, substitution, and locator.
#[derive(Debug, Clone)]
pub struct LinkRule {
    name: &'static str,
    label: &'static str,
    /// Present in text this rule already produced; its presence makes the rule decline.
    target_marker: &'static str,
    /// Cheap substring pre-check before running the regex.
    source_prefixes: &'static [&'static str],
    pattern: Regex,
    replacement: &'static str,
    /// Finds the first original URL in the unmodified text.
    locator: Regex,
}

impl LinkRule {
    /// X / Twitter status links -> fxtwitter.com, rebuilt from handle and status id.
    pub fn twitter() -> Result<Self, RuleError> {
        let pattern = Regex::new(r"https://(www\.)?(x|twitter)\.com/([a-zA-Z0-9_]+)/status/([0-9]+)")?;
        Ok(Self {
            name: "twitter",
            label: "Open in X",
            target_marker: "fxtwitter.com",
            source_prefixes: &[
                "https://x.com",
                "https://twitter.com",
                "https://www.x.com",
                "https://www.twitter.com",
            ],
            locator: pattern.clone(),
            pattern,
            replacement: "https://fxtwitter.com/${3}/status/${4}",
        })
    }

    /// Reddit links -> vxreddit.com. Only the host changes.
    pub fn reddit() -> Result<Self, RuleError> {
        Ok(Self {
            name: "reddit",
            label: "Open in Reddit",
            target_marker: "vxreddit.com",
            source_prefixes: &["https://reddit.com", "https://www.reddit.com"],
            pattern: Regex::new(r"https://(www\.)?reddit\.com")?,
            replacement: "https://vxreddit.com",
            locator: Regex::new(r"https://(www\.)?reddit\.com\S*")?,
        })
    }

    /// TikTok links -> tnktok.com, keeping an optional `www.` on the host.
    pub fn tiktok() -> Result<Self, RuleError> {
        Ok(Self {
            name: "tiktok",
            label: "Open in TikTok",
            target_marker: "tnktok.com",
            source_prefixes: &["https://tiktok.com", "https://www.tiktok.com"],
            pattern: Regex::new(r"https://(www\.)?tiktok\.com")?,
            replacement: "https://${1}tnktok.com",
            locator: Regex::new(r"https://(www\.)?tiktok\.com\S*")?,
        })
    }
}

impl Rule for LinkRule {
    fn name(&self) -> &str {
        self.name
    }

    fn apply(&self, text: &str) -> Result<Option<RewriteResult>, RuleError> {
        if text.contains(self.target_marker) {
            return Ok(None);
        }
        if !self.source_prefixes.iter().any(|p| text.contains(p)) {
            return Ok(None);
        }
        let new_text = self.pattern.replace_all(text, self.replacement);
        if new_text == text {
            return Ok(None);
        }
        let original = self
            .locator
            .find(text)
            .ok_or(RuleError::OriginalUrlMissing(self.name))?;
        Ok(Some(RewriteResult {
            new_text: new_text.into_owned(),
            original: LinkAffordance {
                url: original.as_str().to_string(),
                label: self.label.to_string(),
            },
            delete_original: true,
        }))
    }
}
