// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rolemark",
    about = "Render roleplay chat markup tags as Markdown",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (overrides auto-discovery)
    #[arg(long, short = 'c', global = true, env = "ROLEMARK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Where a command takes its format settings from.
#[derive(clap::Args, Debug, Clone)]
pub struct SettingsArgs {
    /// Persona key or display name from the config file
    #[arg(long, short = 'p', env = "ROLEMARK_PERSONA")]
    pub persona: Option<String>,

    /// Standalone settings file (JSON, YAML or TOML); overrides --persona
    #[arg(long, short = 's', value_name = "PATH")]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Format a message read from a file or stdin and print the Markdown
    Format {
        #[command(flatten)]
        settings: SettingsArgs,

        /// Message file; stdin is read when omitted
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,

        /// Trace which rules matched and what they captured
        #[arg(long)]
        debug: bool,

        /// Replay the message in chunks of N bytes, printing every
        /// intermediate render as a streaming client would see it
        #[arg(long, value_name = "N")]
        stream: Option<usize>,
    },
    /// Render a single rule against a sample text
    Preview {
        /// Literal opening delimiter
        #[arg(long)]
        start: String,
        /// Literal closing delimiter
        #[arg(long)]
        end: String,
        /// Markdown template containing {{content}}
        #[arg(long)]
        markdown: String,
        /// Render an unclosed start tag too
        #[arg(long)]
        render_incomplete: bool,
        /// Template for the unclosed case (defaults to --markdown)
        #[arg(long, value_name = "TEMPLATE")]
        incomplete: Option<String>,
        /// Sample text (defaults to "<start>Example content<end>")
        #[arg(long)]
        sample: Option<String>,
    },
    /// Validate the custom rules of a persona or settings file.
    /// Exits non-zero if any enabled rule can never match.
    Check {
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Print the effective configuration and exit
    ShowConfig,
    /// Generate shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "rolemark", &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn format_flags_parse() {
        let cli = Cli::try_parse_from([
            "rolemark", "-vv", "format", "-p", "wizard", "--stream", "8", "--debug",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Format { settings, stream, debug, file } => {
                assert_eq!(settings.persona.as_deref(), Some("wizard"));
                assert_eq!(stream, Some(8));
                assert!(debug);
                assert!(file.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn preview_requires_delimiters() {
        assert!(Cli::try_parse_from(["rolemark", "preview", "--start", "<t>"]).is_err());
    }
}
