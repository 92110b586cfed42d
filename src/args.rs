//! Command-line argument parsing and the shared binary entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;

use crate::resolve::NoRemoteCache;
use crate::runner::{Action, RunOptions, run};

#[derive(Clone, Debug, Default)]
pub struct ParsedArgs {
    pub root: Option<PathBuf>,
    pub dirs: Vec<PathBuf>,
    pub action: Action,
    pub recursive: bool,
    pub strict: bool,
    pub verbose: bool,
    pub json: bool,
    pub build_file_names: Option<Vec<String>>,
    pub prefix: Option<String>,
    pub show_help: bool,
    pub show_version: bool,
}

pub fn parse_args(raw: &[String]) -> Result<ParsedArgs, String> {
    let mut parsed = ParsedArgs {
        recursive: true,
        ..ParsedArgs::default()
    };
    let mut iter = raw.iter().peekable();
    while let Some(arg) = iter.next() {
        let mut value_for = |name: &str| -> Result<String, String> {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} requires a value", name))
        };
        match arg.as_str() {
            "-h" | "--help" => parsed.show_help = true,
            "-V" | "--version" => parsed.show_version = true,
            "--repo-root" => parsed.root = Some(PathBuf::from(value_for("--repo-root")?)),
            "--mode" => {
                parsed.action = match value_for("--mode")?.as_str() {
                    "fix" => Action::Fix,
                    "print" => Action::Print,
                    "dry-run" => Action::DryRun,
                    other => return Err(format!("unknown mode {:?} (fix|print|dry-run)", other)),
                };
            }
            "-n" | "--dry-run" => parsed.action = Action::DryRun,
            "--no-recursive" => parsed.recursive = false,
            "--strict" => parsed.strict = true,
            "--verbose" => parsed.verbose = true,
            "--json" => parsed.json = true,
            "--build-name" => {
                parsed.build_file_names = Some(
                    value_for("--build-name")?
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                );
            }
            "--prefix" => parsed.prefix = Some(value_for("--prefix")?),
            other if other.starts_with('-') => {
                return Err(format!("unknown flag {:?} (try --help)", other));
            }
            dir => parsed.dirs.push(PathBuf::from(dir)),
        }
    }
    Ok(parsed)
}

fn format_usage() -> String {
    format!(
        "springbok {} - build-file generator for Bazel-style workspaces\n\n\
Usage: springbok [flags] [dir...]\n\n\
Flags:\n  \
--repo-root <path>   Repository root (default: current directory)\n  \
--mode <mode>        fix (default), print, or dry-run\n  \
-n, --dry-run        Alias for --mode dry-run\n  \
--no-recursive       Update only the given directories, not their subtrees\n  \
--build-name <list>  Build-file names to try, comma separated\n  \
--prefix <path>      Import-path prefix for the repository\n  \
--strict             Escalate recoverable problems to errors\n  \
--json               Print a JSON run report\n  \
--verbose            Chatty progress on stderr\n\n\
Examples:\n  \
springbok                          # update the whole tree\n  \
springbok pkg/api                  # update one subtree\n  \
springbok -n --json                # what would change, as JSON\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Shared entry point for the `springbok` and `sbok` binaries.
pub fn cli_main() -> ExitCode {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let parsed = match parse_args(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("{} {}", "[springbok]".red(), err);
            return ExitCode::from(1);
        }
    };
    if parsed.show_help {
        println!("{}", format_usage());
        return ExitCode::SUCCESS;
    }
    if parsed.show_version {
        println!("springbok {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let root = parsed
        .root
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let opts = RunOptions {
        dirs: parsed.dirs.clone(),
        recursive: parsed.recursive,
        action: parsed.action,
        strict: parsed.strict,
        verbose: parsed.verbose,
        build_file_names: parsed.build_file_names.clone(),
        prefix: parsed.prefix.clone(),
    };

    match run(&root, &opts, &NoRemoteCache) {
        Ok(report) => {
            if parsed.json {
                println!("{}", report.to_json());
            } else if !report.files_written.is_empty() && parsed.action == Action::Fix {
                eprintln!(
                    "[springbok] updated {} build file{}",
                    report.files_written.len(),
                    if report.files_written.len() == 1 { "" } else { "s" }
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{} {}", "[springbok]".red(), err);
            ExitCode::from(1)
        }
    }
}
