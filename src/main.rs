// ABOUTME: CLI entry point: runs a script file or drops into an interactive REPL

mod ast;
mod builtins;
mod config;
mod env;
mod error;
mod eval;
mod host;
mod lexer;
mod parser;
mod token;
mod value;

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use clap::Parser as ClapParser;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};

use builtins::register_builtins;
use config::{VERSION, WELCOME_FOOTER, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use env::Environment;
use eval::Evaluator;
use host::StdHost;

/// Tree-walking interpreter for the Spearmint scripting language
#[derive(ClapParser, Debug)]
#[command(name = "spearmint")]
#[command(version = VERSION)]
#[command(about = "A small dynamically-typed scripting language")]
struct CliArgs {
    /// Script file to execute (if omitted, starts the REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,
}

fn main() {
    let args = CliArgs::parse();

    let evaluator = Evaluator::new(Rc::new(RefCell::new(StdHost)));

    match args.script {
        Some(path) => run_script(&path, &evaluator),
        None => run_repl(&evaluator),
    }
}

fn run_script(path: &PathBuf, evaluator: &Evaluator) {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Cannot read script file {}: {e}", path.display());
            std::process::exit(1);
        }
    };
    let source = contents.strip_suffix('\n').unwrap_or(&contents);
    let filename = path.display().to_string();

    if let Err(e) = run_source(&filename, source, evaluator) {
        eprintln!("Exception: {e}");
        std::process::exit(1);
    }
}

fn run_source(filename: &str, source: &str, evaluator: &Evaluator) -> error::Result<()> {
    let env = Environment::new();
    register_builtins(&env);
    let nodes = parser::parse(filename, source)?;
    evaluator.run(&nodes, &env)?;
    Ok(())
}

/// Implements the REPL driver contract: trim input; empty lines are
/// ignored; `-e`/`-exit` terminates; a line starting `-r ` loads the named
/// file's contents as source; anything else runs under the pseudo-filename
/// `Console`. Every run's elapsed wall time is reported in milliseconds.
fn run_repl(evaluator: &Evaluator) {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<(), rustyline::history::DefaultHistory> = match Editor::with_config(config)
    {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to initialize REPL: {e}");
            std::process::exit(1);
        }
    };

    let history_file = ".spearmint_history";
    let _ = rl.load_history(history_file);

    println!("{WELCOME_MESSAGE}");
    println!("{WELCOME_SUBTITLE}");
    println!("{WELCOME_FOOTER}");

    loop {
        match rl.readline("spearmint> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "-e" || line == "-exit" {
                    break;
                }

                let started = Instant::now();
                let result = if let Some(filename) = line.strip_prefix("-r ") {
                    match std::fs::read_to_string(filename) {
                        Ok(contents) => {
                            let source = contents.strip_suffix('\n').unwrap_or(&contents);
                            run_source(filename, source, evaluator)
                        }
                        Err(e) => {
                            eprintln!("Cannot read file {filename}: {e}");
                            continue;
                        }
                    }
                } else {
                    run_source("Console", line, evaluator)
                };

                if let Err(e) = result {
                    eprintln!("Exception: {e}");
                }
                println!("({} ms)", started.elapsed().as_millis());
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }

    let _ = rl.save_history(history_file);
}
