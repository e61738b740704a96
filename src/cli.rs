use std::path::PathBuf;

use clap::Parser;

use sasswatch::error::{SasswatchError, SasswatchResult};
use sasswatch::EntryMapping;

/// sasswatch - watch-mode incremental compiler for Sass stylesheets
#[derive(Parser, Debug)]
#[command(name = "sasswatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Watch input locations and recompile whenever they change
    #[arg(long)]
    pub watch: bool,

    /// Read the stylesheet from standard input
    #[arg(long)]
    pub stdin: bool,

    /// Add a load path for resolving imports; first given has highest
    /// precedence
    #[arg(short = 'I', long = "load-path", value_name = "PATH")]
    pub load_paths: Vec<PathBuf>,

    /// Emit NDJSON events instead of status lines
    #[arg(long)]
    pub json: bool,

    /// Inputs to compile: `INPUT:OUTPUT` pairs (file or directory), or a
    /// bare `INPUT` to print to standard output
    #[arg(value_name = "INPUT:OUTPUT")]
    pub targets: Vec<String>,
}

/// One parsed positional target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `INPUT:OUTPUT` pair
    Mapping { input: PathBuf, output: PathBuf },
    /// Bare `INPUT`, compiled to standard output
    ToStdout { input: PathBuf },
}

impl Cli {
    /// Validate flag combinations the watch engine cannot serve
    pub fn validate(&self) -> SasswatchResult<()> {
        if self.watch {
            if self.stdin {
                return Err(SasswatchError::usage("--watch is not allowed with --stdin."));
            }
            if self.targets.is_empty() || self.parsed_targets().iter().any(|t| {
                matches!(t, Target::ToStdout { .. })
            }) {
                return Err(SasswatchError::usage(
                    "--watch is not allowed when printing to stdout.",
                ));
            }
        }
        Ok(())
    }

    /// Positional arguments split into targets
    pub fn parsed_targets(&self) -> Vec<Target> {
        self.targets.iter().map(|raw| parse_target(raw)).collect()
    }

    /// Entry mappings for every `INPUT:OUTPUT` target
    pub fn mappings(&self) -> SasswatchResult<Vec<EntryMapping>> {
        self.parsed_targets()
            .into_iter()
            .filter_map(|target| match target {
                Target::Mapping { input, output } => Some(EntryMapping::new(input, output)),
                Target::ToStdout { .. } => None,
            })
            .collect()
    }
}

fn parse_target(raw: &str) -> Target {
    match raw.split_once(':') {
        Some((input, output)) if !input.is_empty() && !output.is_empty() => Target::Mapping {
            input: PathBuf::from(input),
            output: PathBuf::from(output),
        },
        _ => Target::ToStdout {
            input: PathBuf::from(raw),
        },
    }
}
