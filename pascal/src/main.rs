use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use pascal_interpreter::{Error, Interpreter, check, parse, tokenize, with_interpreter_stack};

/// Runs a Pascal-style program: lex, parse, check, then interpret.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the program source.
    source: PathBuf,

    /// Read input for READ statements from this file instead of stdin.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Print pipeline stages to stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn run<R: BufRead>(source: &str, input: R, verbose: bool) -> Result<(), Error> {
    let tokens = tokenize(source)?;
    if verbose {
        eprintln!("[INFO] Lexed {} tokens", tokens.len());
    }

    let mut program = parse(tokens)?;
    if verbose {
        eprintln!(
            "[INFO] Parsed program '{}' with {} declarations",
            program.name,
            program.declarations.len()
        );
    }

    check(&mut program)?;
    if verbose {
        eprintln!("[INFO] Semantic check passed");
    }

    let stdout = io::stdout();
    let output = BufWriter::new(stdout.lock());
    Interpreter::new(input, output).interpret(&program)?;
    if verbose {
        eprintln!("[INFO] Program finished");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let source = fs::read_to_string(&args.source)
        .with_context(|| format!("Reading {}", args.source.display()))?;
    let input = match &args.input {
        Some(path) => {
            Some(File::open(path).with_context(|| format!("Opening {}", path.display()))?)
        }
        None => None,
    };

    // Stdin and stdout locks are taken on the interpreter thread.
    let result = with_interpreter_stack(|| match input {
        Some(file) => run(&source, BufReader::new(file), args.verbose),
        None => run(&source, io::stdin().lock(), args.verbose),
    })
    .context("Starting interpreter thread")?;

    if let Err(err) = result {
        eprintln!("{}", err.report());
        process::exit(1);
    }
    Ok(())
}
