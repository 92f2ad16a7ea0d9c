// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The fixed roleplay tag set.
//!
//! | Tag | Output |
//! |-----|--------|
//! | `<speech as="X" …>c</speech>` | `**X:** c` |
//! | `<action as="X" …>c</action>` | `*X c*` |
//! | `<speech>c</speech>` | `**c**` |
//! | `<action>c</action>` | `*c*` |
//! | `<function>c</function>` | fenced code block |
//! | `<markdown>c</markdown>` | `c` |
//! | `<yield …/>`, `<yield …>…</yield>` | removed |
//!
//! Every rendered block ends with a blank line.  Rules run in table order,
//! each over the output of the previous one; attributed forms come before
//! the bare ones.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

/// Tags accepted as paired simple tags by [`has_builtin_tags`].
const SIMPLE_TAGS: [&str; 5] = ["speech", "action", "function", "yield", "markdown"];

/// `as="…"` or `as='…'` as a whole attribute name; captures 1 (double) or 2 (single).
const AS_ATTRIBUTE: &str = r#"\s+(?:[^>]*?\s)?as\s*=\s*(?:"([^"]+)"|'([^']+)')[^>]*>"#;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in tag pattern")
}

fn attributed(tag: &str) -> Regex {
    compile(&format!(r"(?is)<{tag}{AS_ATTRIBUTE}(.*?)</{tag}\s*>"))
}

fn bare(tag: &str) -> Regex {
    compile(&format!(r"(?is)<{tag}\s*>(.*?)</{tag}\s*>"))
}

static ATTRIBUTED_SPEECH: LazyLock<Regex> = LazyLock::new(|| attributed("speech"));
static ATTRIBUTED_ACTION: LazyLock<Regex> = LazyLock::new(|| attributed("action"));
static SIMPLE_SPEECH: LazyLock<Regex> = LazyLock::new(|| bare("speech"));
static SIMPLE_ACTION: LazyLock<Regex> = LazyLock::new(|| bare("action"));
static FUNCTION: LazyLock<Regex> = LazyLock::new(|| bare("function"));
static MARKDOWN: LazyLock<Regex> = LazyLock::new(|| bare("markdown"));
static YIELD_SELF_CLOSING: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?is)<yield(?:\s[^>]*)?/>"));
static YIELD_PAIRED: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?is)<yield(?:\s[^>]*)?>.*?</yield\s*>"));

/// Cheap existence check run before any rewriting.
static TAG_EVIDENCE: LazyLock<Regex> = LazyLock::new(|| {
    let mut alternatives = vec![format!(r"<(?:speech|action){AS_ATTRIBUTE}")];
    alternatives.extend(
        SIMPLE_TAGS
            .iter()
            .map(|tag| format!(r"<{tag}(?:\s[^>]*)?>.*?</{tag}\s*>")),
    );
    alternatives.push(r"<yield(?:\s[^>]*)?/>".to_string());
    compile(&format!("(?is){}", alternatives.join("|")))
});

struct BuiltinRule {
    name: &'static str,
    pattern: &'static LazyLock<Regex>,
    render: fn(&Captures<'_>) -> String,
}

/// Character name from an `as` attribute, whichever quote style matched.
fn character<'h>(caps: &Captures<'h>) -> &'h str {
    caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str())
}

fn content<'h>(caps: &Captures<'h>, group: usize) -> &'h str {
    caps.get(group).map_or("", |m| m.as_str().trim())
}

fn attributed_speech(c: &Captures<'_>) -> String {
    format!("**{}:** {}\n\n", character(c), content(c, 3))
}

fn attributed_action(c: &Captures<'_>) -> String {
    format!("*{} {}*\n\n", character(c), content(c, 3))
}

fn simple_speech(c: &Captures<'_>) -> String {
    format!("**{}**\n\n", content(c, 1))
}

fn simple_action(c: &Captures<'_>) -> String {
    format!("*{}*\n\n", content(c, 1))
}

fn function_block(c: &Captures<'_>) -> String {
    format!("```\n{}\n```\n\n", content(c, 1))
}

fn markdown_passthrough(c: &Captures<'_>) -> String {
    format!("{}\n\n", content(c, 1))
}

fn remove(_: &Captures<'_>) -> String {
    String::new()
}

static BUILTIN_RULES: [BuiltinRule; 8] = [
    BuiltinRule { name: "attributed speech", pattern: &ATTRIBUTED_SPEECH, render: attributed_speech },
    BuiltinRule { name: "attributed action", pattern: &ATTRIBUTED_ACTION, render: attributed_action },
    BuiltinRule { name: "simple speech", pattern: &SIMPLE_SPEECH, render: simple_speech },
    BuiltinRule { name: "simple action", pattern: &SIMPLE_ACTION, render: simple_action },
    BuiltinRule { name: "function", pattern: &FUNCTION, render: function_block },
    BuiltinRule { name: "markdown", pattern: &MARKDOWN, render: markdown_passthrough },
    BuiltinRule { name: "self-closing yield", pattern: &YIELD_SELF_CLOSING, render: remove },
    BuiltinRule { name: "paired yield", pattern: &YIELD_PAIRED, render: remove },
];

/// True when `text` contains at least one tag the built-in set can rewrite.
pub fn has_builtin_tags(text: &str) -> bool {
    TAG_EVIDENCE.is_match(text)
}

/// True when `text` opens a `speech` or `action` tag carrying `as="…"`.
pub(crate) fn has_attributed_tags(text: &str) -> bool {
    static OPENING: LazyLock<Regex> =
        LazyLock::new(|| compile(&format!(r"(?is)<(?:speech|action){AS_ATTRIBUTE}")));
    OPENING.is_match(text)
}

/// Run the whole built-in table over `text`.  Each rule is a single global
/// substitution pass; output of one rule is never re-scanned by itself.
pub fn apply_builtin_rules(text: &str, trace: bool) -> String {
    let mut out = text.to_string();
    for rule in &BUILTIN_RULES {
        let mut hits = 0usize;
        let replaced = rule.pattern.replace_all(&out, |caps: &Captures<'_>| {
            hits += 1;
            let rendered = (rule.render)(caps);
            if trace {
                debug!(rule = rule.name, matched = %snippet(&caps[0]), "built-in tag rewritten");
            }
            rendered
        });
        if hits > 0 {
            out = replaced.into_owned();
            if trace {
                debug!(rule = rule.name, hits, "built-in rule applied");
            }
        }
    }
    out
}

/// Remove every `yield` tag, self-closing or paired.
pub fn strip_yield_tags(text: &str) -> String {
    let once = YIELD_SELF_CLOSING.replace_all(text, "");
    YIELD_PAIRED.replace_all(&once, "").into_owned()
}

/// First 40 characters of `s`, for trace output.
pub(crate) fn snippet(s: &str) -> String {
    const MAX: usize = 40;
    match s.char_indices().nth(MAX) {
        Some((end, _)) => format!("{}…", &s[..end]),
        None => s.to_string(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(text: &str) -> String {
        apply_builtin_rules(text, false)
    }

    #[test]
    fn attributed_speech_with_extra_attributes() {
        assert_eq!(
            fmt(r#"<speech as="Succubus" happiness="1.0">Hello, darling!</speech>"#),
            "**Succubus:** Hello, darling!\n\n"
        );
    }

    #[test]
    fn attribute_order_does_not_matter() {
        let expected = "**X:** c\n\n";
        assert_eq!(fmt(r#"<speech as="X" foo="1">c</speech>"#), expected);
        assert_eq!(fmt(r#"<speech foo="1" as="X">c</speech>"#), expected);
        assert_eq!(
            fmt(r#"<action energy="high" as="Warrior" confidence="1.0">draws sword</action>"#),
            "*Warrior draws sword*\n\n"
        );
    }

    #[test]
    fn quote_style_does_not_matter() {
        assert_eq!(
            fmt(r#"<speech as='Dragon' mood='angry'>You dare?</speech>"#),
            "**Dragon:** You dare?\n\n"
        );
        assert_eq!(
            fmt(r#"<speech as = "Dragon">You dare?</speech>"#),
            "**Dragon:** You dare?\n\n"
        );
    }

    #[test]
    fn character_names_may_contain_the_other_quote() {
        assert_eq!(
            fmt(r#"<speech as="O'Brien">Evening.</speech>"#),
            "**O'Brien:** Evening.\n\n"
        );
    }

    #[test]
    fn attributed_action() {
        assert_eq!(fmt(r#"<action as="Wizard">waves staff</action>"#), "*Wizard waves staff*\n\n");
    }

    #[test]
    fn no_as_fragment_survives_attributed_match() {
        let out = fmt(r#"<speech mood="sly" as="Fox">Hm.</speech><action as='Fox' x="1">grins</action>"#);
        assert!(!out.contains("as="), "leftover attribute in {out:?}");
        assert!(!out.contains('<'));
    }

    #[test]
    fn attribute_ending_in_as_is_not_the_as_attribute() {
        let text = r#"<speech alias="Fox">Hm.</speech>"#;
        assert_eq!(fmt(text), text);
        assert!(!has_attributed_tags(text));
    }

    #[test]
    fn simple_tags_have_no_character() {
        assert_eq!(fmt("<speech>Hello</speech>"), "**Hello**\n\n");
        assert_eq!(fmt("<action>waves hand</action>"), "*waves hand*\n\n");
    }

    #[test]
    fn content_is_trimmed_and_may_span_lines() {
        assert_eq!(
            fmt("<speech as=\"A\">\n  first line\n  second line\n</speech>"),
            "**A:** first line\n  second line\n\n"
        );
    }

    #[test]
    fn tags_are_case_insensitive() {
        assert_eq!(fmt(r#"<SPEECH AS="A">hi</Speech>"#), "**A:** hi\n\n");
        assert_eq!(fmt("<Action>nods</ACTION>"), "*nods*\n\n");
    }

    #[test]
    fn function_content_is_verbatim_in_fence() {
        assert_eq!(fmt("<function>roll(1d20)</function>"), "```\nroll(1d20)\n```\n\n");
        let body = "fn main() {\n    println!(\"*not emphasis*\");\n}";
        assert_eq!(
            fmt(&format!("<function>\n\n{body}\n  </function>")),
            format!("```\n{body}\n```\n\n")
        );
    }

    #[test]
    fn markdown_tag_is_stripped_only() {
        assert_eq!(
            fmt("<markdown>\n# Heading\n\n- **item**\n</markdown>"),
            "# Heading\n\n- **item**\n\n"
        );
    }

    #[test]
    fn yield_is_always_removed() {
        assert_eq!(fmt(r#"<yield to="X"/>"#), "");
        assert_eq!(fmt(r#"<yield to="X" />"#), "");
        assert_eq!(fmt(r#"<yield to="X">ignored</yield>"#), "");
        assert_eq!(fmt("<yield>\nmulti\nline\n</yield>"), "");
        assert_eq!(strip_yield_tags(r#"a<yield/>b<yield to="Y">c</yield>d"#), "abd");
    }

    #[test]
    fn mixed_tags_keep_input_order() {
        let input = concat!(
            r#"<speech as="Wizard" wisdom="0.9">I sense a disturbance.</speech>"#,
            r#"<action as="Wizard">waves staff</action>"#,
            "<function>detect(location);</function>",
            r#"<yield to="You" />"#,
        );
        assert_eq!(
            fmt(input),
            "**Wizard:** I sense a disturbance.\n\n*Wizard waves staff*\n\n```\ndetect(location);\n```\n\n"
        );
    }

    #[test]
    fn unknown_and_unclosed_tags_pass_through() {
        let text = "<thought>hmm</thought> <speech>never closed";
        assert_eq!(fmt(text), text);
    }

    #[test]
    fn evidence_check() {
        assert!(has_builtin_tags(r#"<speech as="A">"#));
        assert!(has_builtin_tags("<function>x</function>"));
        assert!(has_builtin_tags(r#"x <yield to="Y"/>"#));
        assert!(has_builtin_tags("<markdown class=\"a\">\nx\n</markdown>"));
        assert!(!has_builtin_tags("plain text with <b>html</b>"));
        assert!(!has_builtin_tags("<speech>unterminated"));
        assert!(!has_builtin_tags("<speech>mismatched</action>"));
        assert!(!has_builtin_tags(""));
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        assert_eq!(snippet("short"), "short");
        let long = "é".repeat(50);
        assert_eq!(snippet(&long), format!("{}…", "é".repeat(40)));
    }
}
