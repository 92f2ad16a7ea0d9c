// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use rolemark_config::FormatSettings;
use tracing::{debug, warn};

use crate::builtin::{apply_builtin_rules, has_attributed_tags, has_builtin_tags, snippet, strip_yield_tags};
use crate::rule::CompiledRule;

/// Formatter for one persona's [`FormatSettings`].
///
/// Rules are compiled once in [`TagFormatter::new`]; [`TagFormatter::format`]
/// only reads, so a single instance can be shared across threads and reused
/// for every streamed update of a message.
#[derive(Debug, Clone)]
pub struct TagFormatter {
    custom_formatting: bool,
    use_roleplay_markdown: bool,
    rules: Vec<CompiledRule>,
    /// Custom formatting is on and no configured rule targets `as="…"`
    /// attributes itself.
    warn_on_attributes: bool,
    debug: bool,
}

impl TagFormatter {
    /// Compile the enabled rules of `settings`.  Rules that cannot be
    /// compiled are dropped; they would never match anyway.
    pub fn new(settings: &FormatSettings, debug: bool) -> Self {
        let mut rules = Vec::new();
        if settings.uses_custom_rules() {
            for rule in settings.enabled_rules() {
                match CompiledRule::compile(rule) {
                    Ok(compiled) => rules.push(compiled),
                    Err(e) => {
                        if debug {
                            debug!(rule = %rule.name, error = %e, "skipping format rule");
                        }
                    }
                }
            }
        }
        Self {
            custom_formatting: settings.uses_custom_rules(),
            use_roleplay_markdown: settings.use_roleplay_markdown,
            rules,
            warn_on_attributes: settings.custom_formatting
                && !settings
                    .format_rules
                    .iter()
                    .any(|r| r.start_tag.contains("as=\"")),
            debug,
        }
    }

    /// Number of custom rules that will be attempted.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Rewrite every recognised tag in `text` as Markdown.
    ///
    /// 1. Custom rules run in order when custom formatting is on.
    /// 2. The built-in tag set runs when no custom rule matched, or when
    ///    roleplay markdown is requested, provided the text holds at least
    ///    one built-in tag.
    /// 3. `yield` tags are removed even when the built-in pass is skipped.
    pub fn format(&self, text: &str) -> String {
        if self.debug {
            debug!(
                custom_rules = self.rules.len(),
                roleplay = self.use_roleplay_markdown,
                input = %snippet(text),
                "formatting message"
            );
        }

        if self.settings_inconsistent(text) {
            warn!(
                "inconsistent format settings: message has tags with `as` attributes \
                 but no custom rule handles them; built-in formatting will follow custom rules"
            );
        }

        let mut out = text.to_string();
        let mut custom_applied = false;

        if self.custom_formatting {
            for rule in &self.rules {
                let outcome = rule.apply(&out);
                if self.debug {
                    debug!(
                        rule = rule.name(),
                        replacements = outcome.replacements,
                        incomplete = outcome.incomplete,
                        "custom rule"
                    );
                }
                if outcome.applied() {
                    custom_applied = true;
                    out = outcome.text;
                }
            }
            if self.debug && !custom_applied {
                debug!("no custom rule matched, falling back to built-in formatting");
            }
        }

        if !custom_applied || self.use_roleplay_markdown {
            if has_builtin_tags(&out) {
                out = apply_builtin_rules(&out, self.debug);
            }
        } else {
            out = strip_yield_tags(&out);
        }

        if self.debug {
            debug!(output = %snippet(&out), "formatting complete");
        }
        out
    }

    /// The message uses `as` attributes that the custom rules will not handle.
    fn settings_inconsistent(&self, text: &str) -> bool {
        self.warn_on_attributes && has_attributed_tags(text)
    }
}

/// Format `text` with `settings`; with no settings the text is returned
/// unchanged.
pub fn apply_formatting(text: &str, settings: Option<&FormatSettings>, debug: bool) -> String {
    match settings {
        Some(settings) => TagFormatter::new(settings, debug).format(text),
        None => text.to_string(),
    }
}

/// Like [`apply_formatting`], but a missing message yields an empty string.
pub fn format_optional(text: Option<&str>, settings: Option<&FormatSettings>, debug: bool) -> String {
    text.map(|t| apply_formatting(t, settings, debug)).unwrap_or_default()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
