// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{self, Read, Write};

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands, SettingsArgs};
use rolemark_config::{Config, FormatRule, FormatSettings};
use rolemark_format::{preview_rule, validate_rules, MessageBuffer, TagFormatter};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let trace_rules = matches!(cli.command, Commands::Format { debug: true, .. });
    init_logging(log_level(cli.verbose, trace_rules));

    match cli.command {
        Commands::Completions { shell } => {
            cli::print_completions(shell);
            Ok(())
        }
        Commands::ShowConfig => {
            let config = rolemark_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            Ok(())
        }
        Commands::Preview { start, end, markdown, render_incomplete, incomplete, sample } => {
            let rule = FormatRule {
                name: "preview".into(),
                enabled: true,
                start_tag: start,
                end_tag: end,
                markdown_format: markdown,
                render_incomplete,
                incomplete_markdown: incomplete,
            };
            let rendered = preview_rule(&rule, sample.as_deref())
                .context("rule cannot be compiled")?;
            println!("{rendered}");
            Ok(())
        }
        Commands::Check { settings } => {
            let config = rolemark_config::load(cli.config.as_deref())?;
            let settings = resolve_settings(&config, &settings)?;
            check_rules(&settings)
        }
        Commands::Format { settings, file, debug, stream } => {
            let config = rolemark_config::load(cli.config.as_deref())?;
            let settings = resolve_settings(&config, &settings)?;
            let input = read_input(file.as_deref())?;
            let formatter = TagFormatter::new(&settings, debug);
            match stream {
                Some(chunk) => replay_stream(&formatter, &input, chunk),
                None => {
                    print!("{}", formatter.format(&input));
                    io::stdout().flush().context("writing stdout")
                }
            }
        }
    }
}

/// A settings file wins over `--persona`; with neither, the config defaults apply.
fn resolve_settings(config: &Config, args: &SettingsArgs) -> anyhow::Result<FormatSettings> {
    if let Some(path) = &args.settings {
        return rolemark_config::load_settings_file(path);
    }
    Ok(config.settings_for(args.persona.as_deref())?.clone())
}

fn check_rules(settings: &FormatSettings) -> anyhow::Result<()> {
    if !settings.custom_formatting {
        println!("Custom formatting: off");
    }
    let enabled = settings.enabled_rules().count();
    println!("Rules: {} ({} enabled)", settings.format_rules.len(), enabled);
    println!(
        "Built-in roleplay markdown: {}",
        if settings.use_roleplay_markdown { "always" } else { "fallback only" }
    );

    let issues = validate_rules(&settings.format_rules);
    for issue in &issues {
        let level = if issue.is_error() { "error" } else { "warning" };
        println!("  {level}: {issue}");
    }

    let errors = issues.iter().filter(|i| i.is_error()).count();
    if errors > 0 {
        anyhow::bail!("{errors} rule(s) can never match");
    }
    println!("\nRules are valid.");
    Ok(())
}

/// Feed `input` through a [`MessageBuffer`] in `chunk`-byte deltas.
fn replay_stream(formatter: &TagFormatter, input: &str, chunk: usize) -> anyhow::Result<()> {
    let deltas = split_on_char_boundaries(input, chunk.max(1));
    let total = deltas.len();
    let mut buffer = MessageBuffer::new(formatter);
    let mut out = io::stdout().lock();
    for (i, delta) in deltas.into_iter().enumerate() {
        let rendered = buffer.push(delta);
        writeln!(out, "── update {}/{} ──", i + 1, total)?;
        writeln!(out, "{rendered}")?;
    }
    debug!(updates = total, bytes = buffer.raw().len(), "stream replay finished");
    Ok(())
}

/// Split `s` into pieces of at most `max` bytes without cutting a character;
/// a single character wider than `max` becomes its own piece.
fn split_on_char_boundaries(s: &str, max: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = s;
    while !rest.is_empty() {
        let mut end = max.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (head, tail) = rest.split_at(end);
        pieces.push(head);
        rest = tail;
    }
    pieces
}

fn read_input(file: Option<&std::path::Path>) -> anyhow::Result<String> {
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("reading message file {}", path.display()));
    }
    if is_stdin_tty() {
        anyhow::bail!("no message given: pass --file <path> or pipe text on stdin");
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf).context("reading stdin")?;
    Ok(buf)
}

/// `format --debug` needs at least `debug` so its rule traces are visible.
fn log_level(verbosity: u8, trace_rules: bool) -> &'static str {
    match verbosity {
        0 if trace_rules => "debug",
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn is_stdin_tty() -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        unsafe { libc::isatty(io::stdin().as_raw_fd()) != 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}
