// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Why a [`FormatRule`](rolemark_config::FormatRule) could not be compiled.
///
/// The formatter itself never surfaces these; a rule that fails to compile is
/// simply inert.  They are reported by [`validate_rules`](crate::validate_rules)
/// and [`preview_rule`](crate::preview_rule).
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("start tag is empty")]
    EmptyStartTag,

    #[error("end tag is empty")]
    EmptyEndTag,

    #[error("invalid rule pattern: {0}")]
    Pattern(#[from] regex::Error),
}
