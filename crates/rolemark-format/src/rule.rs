// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Persona-defined format rules.
//!
//! A [`FormatRule`] names two literal delimiters and a Markdown template.
//! Compiling it escapes the delimiters and builds a non-greedy, line-spanning
//! matcher; applying it replaces every complete `start … end` span, and
//! optionally renders a trailing span whose end delimiter has not arrived yet.

use std::fmt;

use regex::{Captures, Regex};
use rolemark_config::{FormatRule, CONTENT_PLACEHOLDER};

use crate::RuleError;

/// Substitute every `{{content}}` placeholder in `template`.
pub fn render_template(template: &str, content: &str) -> String {
    template.replace(CONTENT_PLACEHOLDER, content)
}

/// Result of running one rule over a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub text: String,
    /// Number of complete `start … end` spans replaced.
    pub replacements: usize,
    /// Whether a trailing unclosed span was rendered.
    pub incomplete: bool,
}

impl RuleOutcome {
    pub fn applied(&self) -> bool {
        self.replacements > 0 || self.incomplete
    }
}

/// A [`FormatRule`] ready to be applied.  Immutable and `Sync`.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    name: String,
    start_tag: String,
    end_tag: String,
    complete: Regex,
    template: String,
    /// `Some` only when the rule renders incomplete tags.
    incomplete_template: Option<String>,
}

impl CompiledRule {
    /// Compile `rule`.  The `enabled` flag is not consulted here.
    pub fn compile(rule: &FormatRule) -> Result<Self, RuleError> {
        if rule.start_tag.is_empty() {
            return Err(RuleError::EmptyStartTag);
        }
        if rule.end_tag.is_empty() {
            return Err(RuleError::EmptyEndTag);
        }
        let pattern = format!(
            "(?s){}(.*?){}",
            regex::escape(&rule.start_tag),
            regex::escape(&rule.end_tag)
        );
        Ok(Self {
            name: rule.name.clone(),
            start_tag: rule.start_tag.clone(),
            end_tag: rule.end_tag.clone(),
            complete: Regex::new(&pattern)?,
            template: rule.markdown_format.clone(),
            incomplete_template: rule
                .render_incomplete
                .then(|| rule.incomplete_template().to_string()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace every complete span, then render a trailing unclosed one if
    /// the rule asks for it.  Captured content is trimmed before substitution.
    pub fn apply(&self, text: &str) -> RuleOutcome {
        let mut replacements = 0;
        let replaced = self.complete.replace_all(text, |caps: &Captures<'_>| {
            replacements += 1;
            render_template(&self.template, caps[1].trim())
        });
        let mut text = replaced.into_owned();

        let mut incomplete = false;
        if let Some(template) = &self.incomplete_template {
            if let Some(start) = self.unclosed_start(&text) {
                let rendered = render_template(template, text[start + self.start_tag.len()..].trim());
                text.truncate(start);
                text.push_str(&rendered);
                incomplete = true;
            }
        }

        RuleOutcome { text, replacements, incomplete }
    }

    /// Byte offset of the first start delimiter with no end delimiter after it.
    fn unclosed_start(&self, text: &str) -> Option<usize> {
        text.match_indices(self.start_tag.as_str())
            .map(|(i, _)| i)
            .find(|&i| !text[i + self.start_tag.len()..].contains(self.end_tag.as_str()))
    }
}

/// Render `rule` against `sample` (or the rule's default sample text),
/// whether or not the rule is enabled.
pub fn preview_rule(rule: &FormatRule, sample: Option<&str>) -> Result<String, RuleError> {
    let compiled = CompiledRule::compile(rule)?;
    let sample = match sample {
        Some(s) => s.to_string(),
        None => rule.sample_text(),
    };
    Ok(compiled.apply(&sample).text)
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// A problem found in an enabled rule.
#[derive(Debug)]
pub enum RuleIssue {
    /// The rule cannot be compiled and will never match.
    Invalid {
        index: usize,
        name: String,
        error: RuleError,
    },
    /// The rule matches but its template discards the captured content.
    MissingPlaceholder { index: usize, name: String },
}

impl RuleIssue {
    pub fn is_error(&self) -> bool {
        matches!(self, RuleIssue::Invalid { .. })
    }
}

impl fmt::Display for RuleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleIssue::Invalid { index, name, error } => {
                write!(f, "rule #{} {:?}: {error}", index + 1, name)
            }
            RuleIssue::MissingPlaceholder { index, name } => {
                write!(
                    f,
                    "rule #{} {:?}: template has no {} placeholder",
                    index + 1,
                    name,
                    CONTENT_PLACEHOLDER
                )
            }
        }
    }
}

/// Check every enabled rule.  Disabled rules are never applied and are not
/// reported.
pub fn validate_rules(rules: &[FormatRule]) -> Vec<RuleIssue> {
    let mut issues = Vec::new();
    for (index, rule) in rules.iter().enumerate().filter(|(_, r)| r.enabled) {
        let name = rule.name.clone();
        match CompiledRule::compile(rule) {
            Err(error) => issues.push(RuleIssue::Invalid { index, name, error }),
            Ok(_) if !rule.markdown_format.contains(CONTENT_PLACEHOLDER) => {
                issues.push(RuleIssue::MissingPlaceholder { index, name })
            }
            Ok(_) => {}
        }
    }
    issues
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
