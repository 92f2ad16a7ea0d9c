// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use crate::TagFormatter;

/// Accumulates streamed text deltas for one message and renders the whole
/// message after every delta.
///
/// Each render starts from the raw accumulated text, so a tag that was shown
/// as incomplete on one update is rendered as complete once its end delimiter
/// arrives.
pub struct MessageBuffer<'f> {
    formatter: &'f TagFormatter,
    raw: String,
}

impl<'f> MessageBuffer<'f> {
    pub fn new(formatter: &'f TagFormatter) -> Self {
        Self { formatter, raw: String::new() }
    }

    /// Append `delta` and return the formatted message so far.
    pub fn push(&mut self, delta: &str) -> String {
        self.raw.push_str(delta);
        self.render()
    }

    pub fn render(&self) -> String {
        self.formatter.format(&self.raw)
    }

    /// Unformatted text received so far.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Final render; consumes the buffer.
    pub fn finish(self) -> String {
        self.render()
    }
}
