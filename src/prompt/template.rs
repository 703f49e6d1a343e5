//! Placeholder Templates
//!
//! `$name` and `${name}` placeholders, `$$` for a literal dollar sign. Two substitution
//! modes are offered:
//! - best-effort ([`Template::safe_substitute`]): a placeholder without a value stays in
//!   the output verbatim
//! - strict ([`Template::substitute`]): a placeholder without a value is a
//!   [`ChatSqlError::MissingParameter`] and nothing is rendered
//!
//! Substitution is single-pass, so values containing `$` are never re-expanded.

use crate::error::{ChatSqlError, Result};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Named values offered to a template
pub type Values = HashMap<String, String>;

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| {
        Regex::new(
            r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\})",
        )
        .expect("placeholder pattern is valid")
    })
}

fn placeholder_name<'t>(caps: &Captures<'t>) -> Option<&'t str> {
    caps.name("named")
        .or_else(|| caps.name("braced"))
        .map(|m| m.as_str())
}

/// Clause template built up by appending fragments, then rendered once
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    text: String,
}

impl Template {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Append a clause to the template
    pub fn push(&mut self, clause: &str) {
        self.text.push_str(clause);
    }

    /// Placeholder names in order of appearance (duplicates included)
    pub fn placeholders(&self) -> Vec<String> {
        placeholder_regex()
            .captures_iter(&self.text)
            .filter_map(|caps| placeholder_name(&caps).map(str::to_string))
            .collect()
    }

    /// Best-effort substitution: unmatched placeholders are left untouched
    pub fn safe_substitute(&self, values: &Values) -> String {
        placeholder_regex()
            .replace_all(&self.text, |caps: &Captures| {
                if caps.name("escaped").is_some() {
                    return "$".to_string();
                }
                match placeholder_name(caps).and_then(|name| values.get(name)) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Strict substitution: every placeholder must have a value
    pub fn substitute(&self, values: &Values) -> Result<String> {
        let mut missing: Vec<String> = self
            .placeholders()
            .into_iter()
            .filter(|name| !values.contains_key(name))
            .collect();

        if !missing.is_empty() {
            missing.dedup();
            return Err(ChatSqlError::MissingParameter(format!(
                "no value for placeholder(s): {}",
                missing.join(", ")
            )));
        }

        Ok(self.safe_substitute(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> Values {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_safe_substitute_named_and_braced() {
        let template = Template::new("$prompt using ${query_type}.");
        let out = template.safe_substitute(&values(&[("prompt", "list"), ("query_type", "SQL")]));
        assert_eq!(out, "list using SQL.");
    }

    #[test]
    fn test_safe_substitute_leaves_unknown_placeholders() {
        let template = Template::new("the field is $field and ${other}.");
        let out = template.safe_substitute(&values(&[]));
        assert_eq!(out, "the field is $field and ${other}.");
    }

    #[test]
    fn test_escaped_dollar_and_bare_dollar() {
        let template = Template::new("costs $$5 or $ 6 for $item");
        let out = template.safe_substitute(&values(&[("item", "pens")]));
        assert_eq!(out, "costs $5 or $ 6 for pens");
    }

    #[test]
    fn test_values_are_not_re_expanded() {
        let template = Template::new("$a");
        let out = template.safe_substitute(&values(&[("a", "$b"), ("b", "nope")]));
        assert_eq!(out, "$b");
    }

    #[test]
    fn test_identifier_boundary() {
        let template = Template::new("$fields. $field.");
        let out = template.safe_substitute(&values(&[("field", "one")]));
        assert_eq!(out, "$fields. one.");
    }

    #[test]
    fn test_strict_substitute_reports_missing() {
        let template = Template::new("$prompt for $table_name");
        let err = template
            .substitute(&values(&[("prompt", "x")]))
            .unwrap_err();

        match err {
            ChatSqlError::MissingParameter(msg) => assert!(msg.contains("table_name")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_strict_substitute_ok() {
        let template = Template::new("$a-$b");
        let out = template.substitute(&values(&[("a", "1"), ("b", "2")])).unwrap();
        assert_eq!(out, "1-2");
    }

    #[test]
    fn test_placeholders_in_order() {
        let mut template = Template::new("$prompt using $query_type.");
        template.push(" The table is ${table_name} $$");
        assert_eq!(
            template.placeholders(),
            vec!["prompt", "query_type", "table_name"]
        );
    }
}
