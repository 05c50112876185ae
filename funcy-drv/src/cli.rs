//! Command-line surface (§6): `funcy build <in> <out>` and
//! `funcy run <path>`. Invoking with no subcommand, or with a malformed
//! one, prints usage to stderr and exits 1 rather than letting clap call
//! `process::exit` on its own with its usage-error code of 2, to match the
//! rest of the toolchain's error-exit convention.

use std::io;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "funcy")]
#[command(author = "Funcy Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "The Funcy compiler and virtual machine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a source file to bytecode.
    Build {
        /// Funcy source file.
        input: PathBuf,
        /// Where to write the bytecode.
        output: PathBuf,
    },
    /// Run a source file or a compiled bytecode file.
    Run {
        /// Funcy source file or bytecode file.
        path: PathBuf,
    },
}

impl Cli {
    /// Parse `args`, returning the process exit code instead of a `Cli` if
    /// execution should stop here: a malformed invocation, `--help`,
    /// `--version`, or no subcommand at all. Never calls `process::exit`
    /// itself, so `run()` stays the single place that decides the process
    /// exit code.
    pub fn parse_or_usage(args: impl IntoIterator<Item = String>) -> Result<Self, i32> {
        let cli = match Cli::try_parse_from(args) {
            Ok(cli) => cli,
            Err(err) => {
                let exits_zero = matches!(
                    err.kind(),
                    ErrorKind::DisplayHelp
                        | ErrorKind::DisplayVersion
                        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                );
                if exits_zero {
                    print!("{err}");
                    return Err(0);
                }
                eprint!("{err}");
                return Err(1);
            }
        };

        if cli.command.is_none() {
            let mut command = Cli::command();
            let _ = command.write_help(&mut io::stderr());
            eprintln!();
            return Err(1);
        }

        Ok(cli)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        std::iter::once("funcy".to_string())
            .chain(parts.iter().map(|s| s.to_string()))
            .collect()
    }

    #[test]
    fn no_subcommand_exits_one_without_letting_clap_exit_the_process() {
        assert!(matches!(Cli::parse_or_usage(args(&[])), Err(1)));
    }

    #[test]
    fn an_unrecognized_subcommand_exits_one_rather_than_claps_usage_error_code() {
        assert!(matches!(Cli::parse_or_usage(args(&["frobnicate"])), Err(1)));
    }

    #[test]
    fn build_with_too_few_arguments_exits_one() {
        assert!(matches!(
            Cli::parse_or_usage(args(&["build", "only-one-arg"])),
            Err(1)
        ));
    }

    #[test]
    fn a_well_formed_invocation_is_parsed() {
        let cli = Cli::parse_or_usage(args(&["run", "hello.fy"])).unwrap();
        assert!(matches!(cli.command, Some(Command::Run { .. })));
    }
}
