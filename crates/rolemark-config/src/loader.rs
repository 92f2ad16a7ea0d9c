// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::{Config, FormatSettings};

/// Ordered list of config file locations searched from lowest to highest priority.
/// Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide default
    paths.push(PathBuf::from("/etc/rolemark/config.toml"));

    // 2. XDG / home
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/rolemark/config.toml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("rolemark/config.toml"));
    }

    // 3. Workspace-local
    paths.push(PathBuf::from(".rolemark/config.toml"));
    paths.push(PathBuf::from("rolemark.toml"));

    paths
}

/// Load configuration by merging all discovered TOML files.
/// The `extra` argument may provide an explicit path (e.g. `--config` CLI flag).
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = toml::Value::Table(toml::map::Map::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            merge_toml(&mut merged, read_layer(&path)?);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        merge_toml(&mut merged, read_layer(p)?);
    }

    let config: Config = merged.try_into().context("interpreting merged config")?;
    Ok(config)
}

fn read_layer(path: &Path) -> anyhow::Result<toml::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
///
/// Arrays are replaced wholesale, so a later layer's `format_rules` list
/// supersedes the earlier one rather than appending to it.
fn merge_toml(dst: &mut toml::Value, src: toml::Value) {
    match (dst, src) {
        (toml::Value::Table(d), toml::Value::Table(s)) => {
            for (k, v) in s {
                let entry = d.entry(k).or_insert(toml::Value::Table(toml::map::Map::new()));
                merge_toml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Standalone settings files ───────────────────────────────────────────────

/// Serialization format of a standalone [`FormatSettings`] document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    Json,
    Yaml,
    Toml,
}

impl SettingsFormat {
    /// Pick a format from the file extension; anything unknown is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => SettingsFormat::Json,
            Some("yaml") | Some("yml") => SettingsFormat::Yaml,
            _ => SettingsFormat::Toml,
        }
    }
}

/// Parse a [`FormatSettings`] document.  Shape problems inside the document
/// are tolerated (see the lenient field handling on the schema); only syntax
/// errors are reported.
pub fn parse_settings(text: &str, format: SettingsFormat) -> anyhow::Result<FormatSettings> {
    let settings = match format {
        SettingsFormat::Json => serde_json::from_str(text).context("parsing JSON settings")?,
        SettingsFormat::Yaml => serde_yaml::from_str(text).context("parsing YAML settings")?,
        SettingsFormat::Toml => toml::from_str(text).context("parsing TOML settings")?,
    };
    Ok(settings)
}

/// Read a persona's format settings from a file, e.g. one exported from the
/// persona store (`formatSettings` object in camelCase JSON).
pub fn load_settings_file(path: &Path) -> anyhow::Result<FormatSettings> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings file {}", path.display()))?;
    let format = SettingsFormat::from_path(path);
    debug!(path = %path.display(), ?format, "loading format settings");
    parse_settings(&text, format).with_context(|| format!("in {}", path.display()))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn val(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val(r#"x = 1"#);
        let src = val(r#"x = 2"#);
        merge_toml(&mut dst, src);
        assert_eq!(dst["x"].as_integer(), Some(2));
    }

    #[test]
    fn merge_nested_tables() {
        let mut dst = val(r#"[defaults]
custom_formatting = true
use_roleplay_markdown = true"#);
        let src = val(r#"[defaults]
use_roleplay_markdown = false"#);
        merge_toml(&mut dst, src);
        assert_eq!(dst["defaults"]["custom_formatting"].as_bool(), Some(true));
        assert_eq!(dst["defaults"]["use_roleplay_markdown"].as_bool(), Some(false));
    }

    #[test]
    fn merge_replaces_rule_arrays() {
        let mut dst = val(r#"[[rules]]
name = "a"
[[rules]]
name = "b""#);
        let src = val(r#"[[rules]]
name = "c""#);
        merge_toml(&mut dst, src);
        let rules = dst["rules"].as_array().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0]["name"].as_str(), Some("c"));
    }

    #[test]
    fn load_fails_for_missing_explicit_path() {
        let result = load(Some(Path::new("/tmp/rolemark_nonexistent_config_xyz.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_explicit_file_adds_persona() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, r#"[personas.wizard]
name = "Wizard"
[personas.wizard.format_settings]
custom_formatting = true
[[personas.wizard.format_settings.format_rules]]
name = "Thoughts"
enabled = true
start_tag = "<thought>"
end_tag = "</thought>"
markdown_format = "_{{{{content}}}}_""#).unwrap();
        let cfg = load(Some(f.path())).unwrap();
        let s = cfg.settings_for(Some("wizard")).unwrap();
        assert!(s.custom_formatting);
        assert_eq!(s.format_rules[0].markdown_format, "_{{content}}_");
    }

    #[test]
    fn load_keeps_good_personas_next_to_a_broken_one() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, r#"[personas]
broken = 5
[personas.wizard]
name = "Wizard"
[personas.wizard.format_settings]
custom_formatting = true"#).unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert!(!cfg.personas.contains_key("broken"));
        assert!(cfg.settings_for(Some("wizard")).unwrap().custom_formatting);
    }

    #[test]
    fn settings_format_from_extension() {
        assert_eq!(SettingsFormat::from_path(Path::new("a.json")), SettingsFormat::Json);
        assert_eq!(SettingsFormat::from_path(Path::new("a.YML")), SettingsFormat::Yaml);
        assert_eq!(SettingsFormat::from_path(Path::new("a.yaml")), SettingsFormat::Yaml);
        assert_eq!(SettingsFormat::from_path(Path::new("a.toml")), SettingsFormat::Toml);
        assert_eq!(SettingsFormat::from_path(Path::new("settings")), SettingsFormat::Toml);
    }

    #[test]
    fn parse_yaml_settings() {
        let yaml = r#"
customFormatting: true
formatRules:
  - name: Whisper
    enabled: true
    startTag: "<whisper>"
    endTag: "</whisper>"
    markdownFormat: "_{{content}}_"
  - just a string
"#;
        let s = parse_settings(yaml, SettingsFormat::Yaml).unwrap();
        assert!(s.custom_formatting);
        assert_eq!(s.format_rules.len(), 1);
        assert_eq!(s.format_rules[0].start_tag, "<whisper>");
    }

    #[test]
    fn parse_reports_syntax_errors() {
        assert!(parse_settings("{not json", SettingsFormat::Json).is_err());
        assert!(parse_settings("custom_formatting = ", SettingsFormat::Toml).is_err());
    }

    #[test]
    fn load_settings_file_reads_json() {
        use std::io::Write;
        let mut f = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(f, r#"{{"useRoleplayMarkdown": true}}"#).unwrap();
        let s = load_settings_file(f.path()).unwrap();
        assert!(s.use_roleplay_markdown);
        assert!(!s.custom_formatting);
    }
}
