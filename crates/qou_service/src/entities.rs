//! Entity tagging against the artifact's pattern rules.

use std::collections::HashMap;

use qou_common::{EntityLabel, PatternTable};
use serde::Serialize;

use crate::normalize::normalize;

/// An entity found in a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    /// Label of the matching rule.
    pub label: EntityLabel,
    /// Matched text, normalized.
    pub value: String,
    /// First token of the match.
    pub start: usize,
    /// One past the last token of the match.
    pub end: usize,
}

struct Rule {
    label: EntityLabel,
    tokens: Vec<String>,
}

/// Tags token sequences with the longest matching pattern rule.
///
/// Rules are normalized on construction. Among rules matching at the same
/// position the longest wins; equal lengths go to the earlier rule.
pub struct PatternMatcher {
    rules: Vec<Rule>,
    /// Rule indices keyed by first token, in table order.
    by_first: HashMap<String, Vec<usize>>,
}

impl PatternMatcher {
    /// Builds a matcher over every rule of `table`.
    pub fn new(table: &PatternTable) -> Self {
        Self::build(table.rules().iter().map(|r| (&r.label, r.pattern.as_str())))
    }

    /// Builds a matcher over the rules of `table` carrying `label`.
    pub fn for_label(table: &PatternTable, label: &EntityLabel) -> Self {
        Self::build(table.patterns_for(label).map(|p| (label, p)))
    }

    fn build<'a>(rules: impl Iterator<Item = (&'a EntityLabel, &'a str)>) -> Self {
        let mut out = Vec::new();
        let mut by_first: HashMap<String, Vec<usize>> = HashMap::new();
        for (label, pattern) in rules {
            let tokens: Vec<String> = normalize(pattern)
                .split(' ')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            let Some(first) = tokens.first() else {
                continue;
            };
            by_first.entry(first.clone()).or_default().push(out.len());
            out.push(Rule {
                label: label.clone(),
                tokens,
            });
        }
        Self {
            rules: out,
            by_first,
        }
    }

    /// Number of usable rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if no rule survived normalization.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Tags `tokens` left to right without overlaps.
    pub fn tag(&self, tokens: &[&str]) -> Vec<Entity> {
        let mut entities = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let best = self
                .by_first
                .get(tokens[i])
                .into_iter()
                .flatten()
                .map(|&idx| &self.rules[idx])
                .filter(|rule| {
                    rule.tokens.len() <= tokens.len() - i
                        && rule
                            .tokens
                            .iter()
                            .zip(&tokens[i..])
                            .all(|(a, b)| a == b)
                })
                .fold(None::<&Rule>, |best, rule| match best {
                    Some(b) if b.tokens.len() >= rule.tokens.len() => Some(b),
                    _ => Some(rule),
                });

            match best {
                Some(rule) => {
                    let end = i + rule.tokens.len();
                    entities.push(Entity {
                        label: rule.label.clone(),
                        value: tokens[i..end].join(" "),
                        start: i,
                        end,
                    });
                    i = end;
                }
                None => i += 1,
            }
        }
        entities
    }

    /// Tags already-normalized text.
    pub fn tag_text(&self, normalized: &str) -> Vec<Entity> {
        let tokens: Vec<&str> = normalized.split_whitespace().collect();
        self.tag(&tokens)
    }
}
