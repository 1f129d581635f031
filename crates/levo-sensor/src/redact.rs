// Copyright 2025-Present Levo.ai, Inc. https://levo.ai/
// SPDX-License-Identifier: Apache-2.0

use regex::{NoExpand, Regex};
use tracing::warn;

/// Marker substituted for a masked field value.
pub const FILTERED: &str = "[FILTERED]";

/// Heuristic masking of sensitive field values in textual content.
///
/// For each configured field name, occurrences of
/// `field=value`, `field: value`, `"field": "value"` and similar
/// quote/separator variants are rewritten to `field=[FILTERED]`. The value is
/// taken as a maximal run of characters excluding quotes, spaces, `&`, `,`
/// and `}`, which covers query strings, form bodies, and flat JSON without
/// parsing any of them. Field-name matching is case-sensitive.
///
/// This is a best-effort text scan, not a structured parser: arbitrary or
/// binary input passes through unchanged where nothing matches, and
/// re-running the scan over already-masked text leaves it unchanged.
#[derive(Debug, Clone)]
pub struct Redactor {
    rules: Vec<(Regex, String)>,
}

impl Redactor {
    /// Compiles one masking rule per field name. Names that fail to compile
    /// (pathologically long, for instance) are skipped with a warning rather
    /// than failing construction.
    pub fn new(field_names: &[String]) -> Self {
        let mut rules = Vec::with_capacity(field_names.len());
        for field in field_names {
            let pattern = format!(
                r#"["']?{}["']?\s*[=:]\s*["']?[^"' &,}}]+["']?"#,
                regex::escape(field)
            );
            match Regex::new(&pattern) {
                Ok(regex) => rules.push((regex, format!("{field}={FILTERED}"))),
                Err(e) => warn!(field = %field, error = %e, "skipping unusable filter field"),
            }
        }
        Redactor { rules }
    }

    /// Returns a copy of `text` with every sensitive field value masked.
    pub fn redact(&self, text: &str) -> String {
        let mut filtered = text.to_string();
        for (regex, replacement) in &self.rules {
            if regex.is_match(&filtered) {
                filtered = regex
                    .replace_all(&filtered, NoExpand(replacement.as_str()))
                    .into_owned();
            }
        }
        filtered
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn default_redactor() -> Redactor {
        Redactor::new(&[
            "password".to_string(),
            "token".to_string(),
            "api_key".to_string(),
            "secret".to_string(),
        ])
    }

    #[test]
    fn masks_query_string_values() {
        let redactor = default_redactor();
        assert_eq!(
            redactor.redact("user=bob&token=abc123&page=2"),
            "user=bob&token=[FILTERED]&page=2"
        );
    }

    #[test]
    fn masks_json_values() {
        let redactor = default_redactor();
        assert_eq!(
            redactor.redact(r#"{"password": "hunter2"}"#),
            "{password=[FILTERED]}"
        );
    }

    #[test]
    fn masks_every_occurrence() {
        let redactor = default_redactor();
        assert_eq!(
            redactor.redact("token=a token=b token=c"),
            "token=[FILTERED] token=[FILTERED] token=[FILTERED]"
        );
    }

    #[test]
    fn masks_multiple_fields_in_one_pass() {
        let redactor = default_redactor();
        assert_eq!(
            redactor.redact("password=p&api_key=k"),
            "password=[FILTERED]&api_key=[FILTERED]"
        );
    }

    #[test]
    fn field_matching_is_case_sensitive() {
        let redactor = default_redactor();
        assert_eq!(redactor.redact("TOKEN=abc"), "TOKEN=abc");
    }

    #[test]
    fn leaves_unmatched_text_untouched() {
        let redactor = default_redactor();
        assert_eq!(redactor.redact("plain text, no fields"), "plain text, no fields");
        assert_eq!(redactor.redact(""), "");
    }

    #[test]
    fn tolerates_binary_like_input() {
        let redactor = default_redactor();
        let noise = "\u{0}\u{1}\u{fffd}token=\u{2}x\u{3}";
        let filtered = redactor.redact(noise);
        assert!(filtered.contains("token=[FILTERED]"));
    }

    #[test]
    fn no_rules_means_identity() {
        let redactor = Redactor::new(&[]);
        assert_eq!(redactor.redact("token=abc"), "token=abc");
    }

    proptest! {
        /// Masking is idempotent and removes the raw value across the body
        /// shapes the sensor actually sees (query, form, JSON, header-ish).
        #[test]
        fn masking_is_idempotent(
            field_idx in 0usize..4,
            value in "[a-z0-9]{8,24}",
            template_idx in 0usize..4,
        ) {
            let fields = ["password", "token", "api_key", "secret"];
            let field = fields[field_idx];
            let input = match template_idx {
                0 => format!("a=1&{field}={value}&b=2"),
                1 => format!("{{\"{field}\": \"{value}\", \"ok\": true}}"),
                2 => format!("{field}: {value}"),
                3 => format!("before {field}='{value}' after"),
                _ => unreachable!(),
            };
            let redactor = default_redactor();
            let once = redactor.redact(&input);
            let twice = redactor.redact(&once);
            prop_assert_eq!(&once, &twice);
            let needle = format!("{}=[FILTERED]", field);
            prop_assert!(once.contains(&needle));
            prop_assert!(!once.contains(&value));
        }
    }
}
