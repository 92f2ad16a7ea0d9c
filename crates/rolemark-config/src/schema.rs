// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeMap;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

/// Placeholder substituted with the captured tag content in rule templates.
pub const CONTENT_PLACEHOLDER: &str = "{{content}}";

// ─── Lenient field helpers ───────────────────────────────────────────────────

/// Either a well-formed `T` or anything else.
///
/// Persona settings come from user-edited files and from a JSON persona store
/// that never enforced a schema, so a field of the wrong type must not make
/// the whole document unreadable.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Value(T),
    Other(IgnoredAny),
}

/// Deserialize `T`, falling back to `T::default()` when the value has the
/// wrong shape.  Combine with `#[serde(default)]` to also cover missing keys.
fn lenient<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(match Lenient::<T>::deserialize(de)? {
        Lenient::Value(v) => v,
        Lenient::Other(_) => T::default(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleEntry {
    Rule(FormatRule),
    Malformed(IgnoredAny),
}

/// Deserialize a rule list, dropping entries that are not rule objects.
fn lenient_rules<'de, D>(de: D) -> Result<Vec<FormatRule>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Vec<RuleEntry> = lenient(de)?;
    let total = entries.len();
    let rules: Vec<FormatRule> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            RuleEntry::Rule(rule) => Some(rule),
            RuleEntry::Malformed(_) => None,
        })
        .collect();
    if rules.len() != total {
        debug!(dropped = total - rules.len(), "ignoring malformed format rules");
    }
    Ok(rules)
}

/// `defaults` of the wrong shape fall back to roleplay markdown, the same
/// value used when the table is missing.
fn lenient_defaults<'de, D>(de: D) -> Result<FormatSettings, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Lenient::<FormatSettings>::deserialize(de)? {
        Lenient::Value(v) => v,
        Lenient::Other(_) => {
            warn!("ignoring malformed `defaults` table");
            default_settings()
        }
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PersonaEntry {
    Persona(PersonaConfig),
    Malformed(IgnoredAny),
}

/// Deserialize the persona map, dropping entries that are not tables so one
/// broken persona does not hide the others.
fn lenient_personas<'de, D>(de: D) -> Result<BTreeMap<String, PersonaConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: BTreeMap<String, PersonaEntry> = lenient(de)?;
    Ok(entries
        .into_iter()
        .filter_map(|(key, entry)| match entry {
            PersonaEntry::Persona(p) => Some((key, p)),
            PersonaEntry::Malformed(_) => {
                warn!(persona = %key, "ignoring malformed persona");
                None
            }
        })
        .collect())
}

// ─── Format rules ────────────────────────────────────────────────────────────

/// A declarative instruction for converting one tag type to Markdown.
///
/// ```toml
/// [[format_rules]]
/// name = "Thoughts"
/// enabled = true
/// start_tag = "<thought>"
/// end_tag = "</thought>"
/// markdown_format = "_{{content}}_"
/// render_incomplete = true
/// incomplete_markdown = "_{{content}}…_"
/// ```
///
/// The camelCase names used by the persona store (`startTag`,
/// `markdownFormat`, …) are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatRule {
    /// Display label only.
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    /// Disabled rules are skipped entirely.
    #[serde(default, deserialize_with = "lenient")]
    pub enabled: bool,
    /// Literal opening delimiter, e.g. `<thought>`.  Never a regex.
    #[serde(default, alias = "startTag", deserialize_with = "lenient")]
    pub start_tag: String,
    /// Literal closing delimiter, e.g. `</thought>`.
    #[serde(default, alias = "endTag", deserialize_with = "lenient")]
    pub end_tag: String,
    /// Output template containing [`CONTENT_PLACEHOLDER`].
    #[serde(default, alias = "markdownFormat", deserialize_with = "lenient")]
    pub markdown_format: String,
    /// Render an opened-but-unclosed tag (streaming) instead of leaving the
    /// raw markup visible.
    #[serde(default, alias = "renderIncomplete", deserialize_with = "lenient")]
    pub render_incomplete: bool,
    /// Template for the unclosed case; falls back to `markdown_format`.
    #[serde(
        default,
        alias = "incompleteMarkdown",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub incomplete_markdown: Option<String>,
}

impl FormatRule {
    /// Template used when the start tag is open at the end of the text.
    pub fn incomplete_template(&self) -> &str {
        match self.incomplete_markdown.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => &self.markdown_format,
        }
    }

    /// Default preview input for this rule, wrapping a fixed phrase in the
    /// rule's delimiters (or generic ones when unset).
    pub fn sample_text(&self) -> String {
        let start = if self.start_tag.is_empty() { "<tag>" } else { &self.start_tag };
        let end = if self.end_tag.is_empty() { "</tag>" } else { &self.end_tag };
        format!("{start}Example content{end}")
    }
}

// ─── Format settings ─────────────────────────────────────────────────────────

/// Per-persona formatting configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSettings {
    /// Try `format_rules` before the built-in tag set.
    #[serde(default, alias = "customFormatting", deserialize_with = "lenient")]
    pub custom_formatting: bool,
    /// Applied in order; every enabled rule is attempted.
    #[serde(default, alias = "formatRules", deserialize_with = "lenient_rules")]
    pub format_rules: Vec<FormatRule>,
    /// Also run the built-in tag set when a custom rule matched.
    #[serde(default, alias = "useRoleplayMarkdown", deserialize_with = "lenient")]
    pub use_roleplay_markdown: bool,
}

impl FormatSettings {
    /// Built-in roleplay markdown only.
    pub fn roleplay() -> Self {
        Self {
            use_roleplay_markdown: true,
            ..Self::default()
        }
    }

    /// Custom rules only.
    pub fn custom(rules: Vec<FormatRule>) -> Self {
        Self {
            custom_formatting: true,
            format_rules: rules,
            use_roleplay_markdown: false,
        }
    }

    /// True when the custom-rule pass should run at all.
    pub fn uses_custom_rules(&self) -> bool {
        self.custom_formatting && !self.format_rules.is_empty()
    }

    pub fn enabled_rules(&self) -> impl Iterator<Item = &FormatRule> {
        self.format_rules.iter().filter(|r| r.enabled)
    }
}

// ─── Personas and root config ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Display name; the map key is used when absent.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "formatSettings", deserialize_with = "lenient")]
    pub format_settings: FormatSettings,
}

fn default_settings() -> FormatSettings {
    FormatSettings::roleplay()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Settings used when no persona is selected.
    #[serde(default = "default_settings", deserialize_with = "lenient_defaults")]
    pub defaults: FormatSettings,
    /// Named personas, keyed by an identifier used on the command line.
    #[serde(default, deserialize_with = "lenient_personas")]
    pub personas: BTreeMap<String, PersonaConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            defaults: default_settings(),
            personas: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Resolve the settings for `persona`, or the defaults when `None`.
    ///
    /// Personas are looked up by key first, then by display name ignoring
    /// case.
    pub fn settings_for(&self, persona: Option<&str>) -> anyhow::Result<&FormatSettings> {
        let Some(wanted) = persona else {
            return Ok(&self.defaults);
        };
        if let Some(p) = self.personas.get(wanted) {
            return Ok(&p.format_settings);
        }
        self.personas
            .values()
            .find(|p| p.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(wanted)))
            .map(|p| &p.format_settings)
            .ok_or_else(|| {
                let known: Vec<&str> = self.personas.keys().map(String::as_str).collect();
                if known.is_empty() {
                    anyhow::anyhow!("unknown persona {wanted:?} (no personas configured)")
                } else {
                    anyhow::anyhow!("unknown persona {wanted:?}; available: {}", known.join(", "))
                }
            })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
