//! sasswatch CLI - watch-mode incremental Sass compiler
//!
//! Usage: sasswatch [options] [INPUT:OUTPUT...]
//!
//! Compiles each INPUT to its OUTPUT once; with --watch, keeps running and
//! recompiles affected entries as their sources and imports change.

mod cli;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use sasswatch::error::{SasswatchError, USAGE_EXIT_CODE};
use sasswatch::{paths, watcher, Compiler, Engine, EntryTable, SassCompiler, WatchEvent};

use cli::{Cli, Target};

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => match err.downcast_ref::<SasswatchError>() {
            Some(SasswatchError::Usage { message }) => {
                // Usage errors go to stdout, exit code 64.
                println!("{message}");
                std::process::exit(USAGE_EXIT_CODE);
            }
            _ => {
                eprintln!("Error: {err:#}");
                std::process::exit(1);
            }
        },
    }
}

fn run(cli: Cli) -> Result<i32> {
    cli.validate()?;

    let load_paths: Vec<PathBuf> = cli.load_paths.iter().map(|p| paths::canonical(p)).collect();

    if cli.stdin {
        return compile_stdin(&load_paths);
    }

    // Bare INPUT targets compile straight to stdout (one-shot only; watch
    // mode rejected them during validation).
    let mut stdout_failed = false;
    for target in cli.parsed_targets() {
        if let Target::ToStdout { input } = target {
            stdout_failed |= !compile_to_stdout(&input, &load_paths);
        }
    }

    let table = EntryTable::new(cli.mappings()?);
    let mut engine = Engine::new(table, load_paths, SassCompiler::new());

    let json = cli.json;
    let on_event = move |event: WatchEvent| report(&event, json);

    engine.compile_all(&on_event);

    if !cli.watch {
        let code = if stdout_failed || engine.has_failures() {
            1
        } else {
            0
        };
        return Ok(code);
    }

    if json {
        let roots = engine
            .watch_roots()
            .iter()
            .map(|r| r.display().to_string())
            .collect();
        report(&WatchEvent::WatchStarted { roots }, true);
    } else {
        println!("Sass is watching for changes. Press Ctrl-C to stop.");
        println!();
    }

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .context("failed to install Ctrl-C handler")?;

    watcher::watch(&mut engine, running, &on_event)?;
    Ok(0)
}

fn report(event: &WatchEvent, json: bool) {
    if json {
        println!("{}", event.to_json());
        return;
    }
    match event {
        WatchEvent::Compiled { input, output } => println!("Compiled {input} to {output}."),
        WatchEvent::Deleted { output } => println!("Deleted {output}."),
        WatchEvent::CompileFailed {
            message, context, ..
        } => {
            eprintln!("Error: {message}");
            if !context.is_empty() {
                eprintln!("{context}");
            }
        }
        WatchEvent::WatchStarted { .. } | WatchEvent::Shutdown => {}
    }
}

fn compile_stdin(load_paths: &[PathBuf]) -> Result<i32> {
    let mut source = String::new();
    std::io::stdin()
        .read_to_string(&mut source)
        .context("failed to read standard input")?;
    let base = std::env::current_dir()
        .context("failed to determine working directory")?
        .join("-");
    let outcome = SassCompiler::new().compile_string(&source, &base, load_paths);
    Ok(print_one_shot(outcome.result))
}

fn compile_to_stdout(input: &Path, load_paths: &[PathBuf]) -> bool {
    let outcome = SassCompiler::new().compile(input, load_paths);
    print_one_shot(outcome.result) == 0
}

fn print_one_shot(result: std::result::Result<String, sasswatch::CompileError>) -> i32 {
    match result {
        Ok(css) => {
            print!("{css}");
            0
        }
        Err(err) => {
            eprintln!("Error: {}", err.message);
            eprintln!("{}", err.render_context());
            1
        }
    }
}
