use crate::config::ScanConfig;
use crate::error::Result;
use regex::Regex;

/// Separators allowed on either side of a literal keyword hit.
const BOUNDARY_BEFORE: &str = r"(?:^|\s|[-_/=])";
const BOUNDARY_AFTER: &str = r"(?:$|\s|[-_/=])";

struct KeywordPattern {
    keyword: String,
    needle: String,
    literal: Regex,
    encoded: Regex,
}

/// Finds configured brand keywords in arbitrary text.
///
/// Three kinds of evidence are collected:
/// - the keyword as a standalone token (bounded by whitespace or `-_/=`)
/// - the keyword with spaces percent-encoded as `%20`
/// - structural URL patterns (brand domain, tracking parameters, partner
///   id) whose captured value contains a keyword
///
/// Matching is case-insensitive; returned keywords keep their configured
/// spelling and appear once each, in configured order.
pub struct KeywordMatcher {
    patterns: Vec<KeywordPattern>,
    structural: Vec<Regex>,
}

impl KeywordMatcher {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let mut patterns = Vec::with_capacity(config.keywords.len());
        for keyword in &config.keywords {
            let needle = keyword.to_lowercase();
            if needle.trim().is_empty() {
                continue;
            }
            let encoded = needle.replace(' ', "%20");
            patterns.push(KeywordPattern {
                keyword: keyword.clone(),
                literal: bounded(&needle)?,
                encoded: bounded(&encoded)?,
                needle,
            });
        }

        let domain = regex::escape(&config.brand_domain.to_lowercase());
        let partner = regex::escape(&config.partner_id.to_lowercase());
        let structural = vec![
            Regex::new(&format!(r"(?:https?://)?(?:www\.)?{}", domain))?,
            Regex::new(r"utm_source=([^&]*)")?,
            Regex::new(r"utm_campaign=([^&]*)")?,
            Regex::new(r"sv1=([^&]*)")?,
            Regex::new(r"awc=([^&]*)")?,
            Regex::new(&format!(r"{}(?:_\d+|%5f\d+)?", partner))?,
        ];

        Ok(Self {
            patterns,
            structural,
        })
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.keyword.as_str())
    }

    /// Keywords present in `text`. Blank input yields nothing.
    pub fn matches(&self, text: &str) -> Vec<String> {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return Vec::new();
        }

        let mut hits = vec![false; self.patterns.len()];

        for (idx, pattern) in self.patterns.iter().enumerate() {
            if pattern.literal.is_match(&text) || pattern.encoded.is_match(&text) {
                hits[idx] = true;
            }
        }

        for regex in &self.structural {
            for caps in regex.captures_iter(&text) {
                // Value of the first group when the pattern has one,
                // otherwise the whole match.
                let captured = caps
                    .get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str())
                    .unwrap_or("");
                for (idx, pattern) in self.patterns.iter().enumerate() {
                    if captured.contains(&pattern.needle) {
                        hits[idx] = true;
                    }
                }
            }
        }

        self.patterns
            .iter()
            .zip(hits)
            .filter(|(_, hit)| *hit)
            .map(|(p, _)| p.keyword.clone())
            .filter({
                let mut seen = std::collections::HashSet::new();
                move |k: &String| seen.insert(k.clone())
            })
            .collect()
    }
}

fn bounded(needle: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(
        "{}{}{}",
        BOUNDARY_BEFORE,
        regex::escape(needle),
        BOUNDARY_AFTER
    ))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> KeywordMatcher {
        KeywordMatcher::new(&ScanConfig::default()).unwrap()
    }

    fn matcher_with(keywords: &[&str]) -> KeywordMatcher {
        KeywordMatcher::new(&ScanConfig::default().with_keywords(keywords.iter().copied())).unwrap()
    }

    #[test]
    fn test_standalone_token_matches() {
        let m = matcher();
        assert_eq!(m.matches("Book with GoWithGuide today"), vec!["gowithguide"]);
        assert_eq!(m.matches("gowithguide"), vec!["gowithguide"]);
        assert_eq!(m.matches("https://site.test/?ref=gowithguide"), vec!["gowithguide"]);
        assert_eq!(m.matches("/tours/gowithguide/japan"), vec!["gowithguide"]);
    }

    #[test]
    fn test_embedded_token_does_not_match() {
        let m = matcher();
        assert!(m.matches("visit gowithguideX now").is_empty());
        assert!(m.matches("xgowithguide").is_empty());
    }

    #[test]
    fn test_multi_word_keyword_and_encoded_form() {
        let m = matcher();
        assert_eq!(m.matches("Travel with Go With Guide"), vec!["go with guide"]);
        assert_eq!(
            m.matches("https://site.test/search?q=go%20with%20guide"),
            vec!["go with guide"]
        );
        assert_eq!(m.matches("the go-with-guide team"), vec!["go-with-guide"]);
    }

    #[test]
    fn test_blank_input() {
        let m = matcher();
        assert!(m.matches("").is_empty());
        assert!(m.matches("   \n\t ").is_empty());
    }

    #[test]
    fn test_brand_domain_pattern() {
        let m = matcher();
        assert_eq!(
            m.matches("https://www.gowithguide.com/tours"),
            vec!["gowithguide"]
        );
        assert_eq!(m.matches("see gowithguide.com."), vec!["gowithguide"]);
    }

    #[test]
    fn test_partner_id_in_tracking_parameter() {
        let m = matcher_with(&["87121"]);
        assert_eq!(
            m.matches("https://partner.example/book?utm_source=aff&awc=87121_123"),
            vec!["87121"]
        );
    }

    #[test]
    fn test_partner_id_encoded_underscore() {
        let m = matcher_with(&["87121"]);
        assert_eq!(m.matches("ref:87121%5F42"), vec!["87121"]);
    }

    #[test]
    fn test_tracking_parameter_value_contains_keyword() {
        let m = matcher();
        assert_eq!(
            m.matches("https://x.test/?utm_campaign=summergowithguidesale"),
            vec!["gowithguide"]
        );
        assert_eq!(
            m.matches("https://x.test/?sv1=affgowithguide"),
            vec!["gowithguide"]
        );
    }

    #[test]
    fn test_several_keywords_in_configured_order() {
        let m = matcher();
        let hits = m.matches("87121 and gowithguide and go with guide");
        assert_eq!(hits, vec!["gowithguide", "go with guide", "87121"]);
    }

    #[test]
    fn test_match_is_idempotent() {
        let m = matcher();
        let text = "GoWithGuide https://gowithguide.com/?awc=87121_9";
        assert_eq!(m.matches(text), m.matches(text));
    }

    #[test]
    fn test_preserves_configured_casing() {
        let m = matcher_with(&["GoWithGuide"]);
        assert_eq!(m.matches("gowithguide rocks"), vec!["GoWithGuide"]);
    }

    #[test]
    fn test_keywords_differing_only_in_case_are_kept_apart() {
        let m = matcher_with(&["GoWithGuide", "gowithguide"]);
        assert_eq!(
            m.matches("Book with gowithguide"),
            vec!["GoWithGuide", "gowithguide"]
        );
    }

    #[test]
    fn test_custom_brand_domain() {
        let config = ScanConfig::default()
            .with_keywords(["acme"])
            .with_brand_domain("acme.io");
        let m = KeywordMatcher::new(&config).unwrap();
        assert_eq!(m.matches("https://www.acme.io/deal"), vec!["acme"]);
        assert!(m.matches("https://acmes.com").is_empty());
    }
}
