//! Trigger to response lookup.
//!
//! Matching is exact after lowercasing both sides. Triggers are lowercased
//! once when the table is built.

use serde::{Deserialize, Serialize};

/// One `[[responses]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRule {
    pub triggers: Vec<String>,
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseTable {
    rules: Vec<ResponseRule>,
}

impl ResponseTable {
    pub fn new(rules: impl IntoIterator<Item = ResponseRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| ResponseRule {
                triggers: rule.triggers.iter().map(|t| t.to_lowercase()).collect(),
                response: rule.response,
            })
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every response whose triggers contain `body`, in table order.
    pub fn matches<'a>(&'a self, body: &str) -> Vec<&'a str> {
        let needle = body.to_lowercase();
        self.rules
            .iter()
            .filter(|rule| rule.triggers.iter().any(|t| *t == needle))
            .map(|rule| rule.response.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ResponseTable {
        ResponseTable::new(vec![
            ResponseRule {
                triggers: vec!["!test".into(), "!FooBar".into()],
                response: "Test response".into(),
            },
            ResponseRule {
                triggers: vec!["!author".into()],
                response: "hloth.dev".into(),
            },
        ])
    }

    #[test]
    fn test_case_insensitive_exact_match() {
        let table = table();
        assert_eq!(table.matches("!TEST"), vec!["Test response"]);
        assert_eq!(table.matches("!foobar"), vec!["Test response"]);
        assert_eq!(table.matches("!author"), vec!["hloth.dev"]);
    }

    #[test]
    fn test_no_partial_match() {
        let table = table();
        assert!(table.matches("!test please").is_empty());
        assert!(table.matches(" !test").is_empty());
        assert!(table.matches("").is_empty());
    }

    #[test]
    fn test_every_matching_rule_replies() {
        let table = ResponseTable::new(vec![
            ResponseRule {
                triggers: vec!["hi".into()],
                response: "one".into(),
            },
            ResponseRule {
                triggers: vec!["HI".into(), "hello".into()],
                response: "two".into(),
            },
        ]);
        assert_eq!(table.matches("Hi"), vec!["one", "two"]);
    }

    #[test]
    fn test_empty_table() {
        let table = ResponseTable::default();
        assert!(table.is_empty());
        assert!(table.matches("!test").is_empty());
    }
}
