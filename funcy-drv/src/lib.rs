//! funcy-drv - the `funcy` command-line driver: ties the lexer, parser,
//! semantic analysis, optimizer, serializer, and VM together behind
//! `build`/`run` subcommands (§6).

mod cli;
mod config;
mod error;
mod loader;
mod pipeline;
mod stdlib;

use std::path::Path;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Command};
use config::Config;
use error::DriverError;
use loader::FileSourceProvider;

/// Parse arguments, dispatch to the requested command, and return the
/// process exit code. Never panics on user-facing failure — I/O and
/// argument errors are caught, printed to stderr, and turned into `1`.
pub fn run() -> i32 {
    let cli = match Cli::parse_or_usage(std::env::args()) {
        Ok(cli) => cli,
        Err(code) => return code,
    };

    let config = Config::load().unwrap_or_default();
    init_logging(&config);

    let result = match cli.command.expect("parse_or_usage guarantees Some") {
        Command::Build { input, output } => run_build(&input, &output),
        Command::Run { path } => run_run(&path),
    };

    match result {
        Ok(exit_code) => exit_code,
        Err(err) => {
            eprintln!("error: {err:#}");
            1
        }
    }
}

fn init_logging(config: &Config) {
    let subscriber = fmt::layer()
        .with_ansi(config.color)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("info"))
        .with(subscriber)
        .try_init();
}

fn run_build(input: &Path, output: &Path) -> Result<i32> {
    let source = std::fs::read_to_string(input)
        .map_err(DriverError::from)
        .with_context(|| format!("failed to read '{}'", input.display()))?;

    let provider = FileSourceProvider::new(parent_dir(input));
    let name = loader::entry_name(input);
    let bytecode = pipeline::compile_to_bytecode(&name, &source, &provider);

    std::fs::write(output, &bytecode)
        .map_err(DriverError::from)
        .with_context(|| format!("failed to write '{}'", output.display()))?;

    Ok(0)
}

fn run_run(path: &Path) -> Result<i32> {
    let bytes = std::fs::read(path)
        .map_err(DriverError::from)
        .with_context(|| format!("failed to read '{}'", path.display()))?;

    let bytecode = if loader::looks_like_bytecode(&bytes) {
        bytes
    } else {
        let source = String::from_utf8(bytes)
            .with_context(|| format!("'{}' is not valid UTF-8 text", path.display()))?;
        let provider = FileSourceProvider::new(parent_dir(path));
        let name = loader::entry_name(path);
        pipeline::compile_to_bytecode(&name, &source, &provider)
    };

    let mut vm = funcy_vm::Vm::new();
    vm.load(&bytecode)
        .map_err(DriverError::from)
        .context("malformed bytecode")?;
    Ok(vm.run())
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."))
}
