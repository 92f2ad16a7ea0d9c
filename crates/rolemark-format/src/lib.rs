// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tag-based chat message formatter.
//!
//! Assistant messages carry lightweight semantic markup:
//!
//! ```text
//! <speech as="Wizard" mood="calm">Welcome, traveller.</speech>
//! <action as="Wizard">waves staff</action>
//! <function>roll(1d20)</function>
//! <yield to="You"/>
//! ```
//!
//! [`TagFormatter`] rewrites that markup into Markdown.  Persona-supplied
//! [`FormatRule`]s run first; the fixed built-in tag set runs when no custom
//! rule matched or when the persona asks for roleplay markdown explicitly.
//! Formatting never fails: malformed or unknown tags are left as they are.
//!
//! ```
//! use rolemark_config::FormatSettings;
//! use rolemark_format::apply_formatting;
//!
//! let out = apply_formatting(
//!     r#"<action as="Wizard">waves staff</action>"#,
//!     Some(&FormatSettings::roleplay()),
//!     false,
//! );
//! assert_eq!(out, "*Wizard waves staff*\n\n");
//! ```

mod builtin;
mod error;
mod formatter;
mod rule;
mod stream;

pub use builtin::{apply_builtin_rules, has_builtin_tags, strip_yield_tags};
pub use error::RuleError;
pub use formatter::{apply_formatting, format_optional, TagFormatter};
pub use rule::{preview_rule, render_template, validate_rules, CompiledRule, RuleIssue, RuleOutcome};
pub use stream::MessageBuffer;

pub use rolemark_config::{FormatRule, FormatSettings};
