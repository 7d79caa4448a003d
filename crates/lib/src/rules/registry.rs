//! Ordered rule list; the first rule that produces a rewrite wins.

use super::{LinkRule, RewriteResult, Rule, RuleError};

pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Built-in link families in priority order: twitter, reddit, tiktok.
    pub fn builtin() -> Result<Self, RuleError> {
        Ok(Self::new(vec![
            Box::new(LinkRule::twitter()?),
            Box::new(LinkRule::reddit()?),
            Box::new(LinkRule::tiktok()?),
        ]))
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Try each rule in order. A rule that errors is logged and treated as declining.
    pub fn find_first_match(&self, text: &str) -> Option<RewriteResult> {
        for rule in &self.rules {
            match rule.apply(text) {
                Ok(Some(result)) if !result.new_text.is_empty() => {
                    log::debug!("rule {} matched", rule.name());
                    return Some(result);
                }
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("rule {} failed: {}", rule.name(), e);
                    continue;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::LinkAffordance;

    struct Failing;

    impl Rule for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn apply(&self, _text: &str) -> Result<Option<RewriteResult>, RuleError> {
            Err(RuleError::OriginalUrlMissing("failing"))
        }
    }

    struct Always(&'static str);

    impl Rule for Always {
        fn name(&self) -> &str {
            self.0
        }

        fn apply(&self, _text: &str) -> Result<Option<RewriteResult>, RuleError> {
            Ok(Some(RewriteResult {
                new_text: self.0.to_string(),
                original: LinkAffordance {
                    url: "https://example.com".to_string(),
                    label: "Open".to_string(),
                },
                delete_original: true,
            }))
        }
    }

    #[test]
    fn builtin_order() {
        let registry = RuleRegistry::builtin().unwrap();
        assert_eq!(registry.names(), vec!["twitter", "reddit", "tiktok"]);
    }

    #[test]
    fn no_match_for_unrelated_text() {
        let registry = RuleRegistry::builtin().unwrap();
        assert!(registry.find_first_match("nothing to see here").is_none());
        assert!(registry.find_first_match("https://youtube.com/watch?v=1").is_none());
    }

    #[test]
    fn earliest_family_wins_and_others_are_untouched() {
        let registry = RuleRegistry::builtin().unwrap();
        let r = registry
            .find_first_match("https://reddit.com/r/a https://x.com/u/status/5")
            .unwrap();
        assert_eq!(
            r.new_text,
            "https://reddit.com/r/a https://fxtwitter.com/u/status/5"
        );
        assert_eq!(r.original.label, "Open in X");
    }

    #[test]
    fn falls_through_to_later_family() {
        let registry = RuleRegistry::builtin().unwrap();
        let r = registry
            .find_first_match("https://twitter.com/home https://www.tiktok.com/@a/video/3")
            .unwrap();
        assert_eq!(r.new_text, "https://twitter.com/home https://www.tnktok.com/@a/video/3");
    }

    #[test]
    fn failing_rule_is_skipped() {
        let registry = RuleRegistry::new(vec![Box::new(Failing), Box::new(Always("second"))]);
        let r = registry.find_first_match("anything").unwrap();
        assert_eq!(r.new_text, "second");
    }

    #[test]
    fn empty_rewrite_is_treated_as_decline() {
        let registry = RuleRegistry::new(vec![Box::new(Always("")), Box::new(Always("next"))]);
        assert_eq!(registry.find_first_match("x").unwrap().new_text, "next");
    }
}
