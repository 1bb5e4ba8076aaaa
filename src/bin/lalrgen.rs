//! The command line front end of the parser generator.
//! Reads a grammar description, runs the generation pipeline and writes the
//! frozen parser tables as JSON.
//!
//! Exit codes: 0 on success (possibly with warnings), 1 on a user-facing
//! grammar error, 2 on an internal invariant violation.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use lalrgen::{CaseFolding, Generated, GeneratorBuilder, LexerMode};

#[derive(Parser, Debug)]
#[command(name = "lalrgen", version, about = "LALR(1) parser generator")]
struct Cli {
    /// The grammar description file.
    grammar: PathBuf,

    /// Write the exported tables to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Build one scanner DFA over all terminals instead of one per state.
    #[arg(long)]
    single_lexer: bool,

    /// Fold terminal patterns case-insensitively (ASCII).
    #[arg(long)]
    case_insensitive: bool,

    /// Abort when more conflicts than this remain after precedence
    /// resolution.
    #[arg(long)]
    conflict_limit: Option<usize>,

    /// Suppress warnings.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let grammar_text = match std::fs::read_to_string(&cli.grammar) {
        Ok(text) => text,
        Err(error) => {
            eprintln!("error: cannot read {}: {}", cli.grammar.display(), error);
            return ExitCode::from(1);
        }
    };

    let mut builder = GeneratorBuilder::new();
    if cli.single_lexer {
        builder = builder.lexer_mode(LexerMode::Single);
    }
    if cli.case_insensitive {
        builder = builder.case_folding(CaseFolding::Ascii);
    }
    if let Some(limit) = cli.conflict_limit {
        builder = builder.conflict_limit(limit);
    }
    let generator = builder.build();

    let result = panic::catch_unwind(AssertUnwindSafe(|| generator.generate(&grammar_text)));
    let generated: Generated = match result {
        Ok(Ok(generated)) => generated,
        Ok(Err(error)) => {
            eprintln!("error: {}", error);
            return ExitCode::from(1);
        }
        Err(_) => {
            eprintln!("internal error: invariant violation during generation");
            return ExitCode::from(2);
        }
    };

    if !cli.quiet {
        for diagnostic in generated.diagnostics.entries() {
            eprintln!("{}", diagnostic);
        }
    }

    let json = match serde_json::to_string_pretty(&generated.tables) {
        Ok(json) => json,
        Err(error) => {
            eprintln!("internal error: {}", error);
            return ExitCode::from(2);
        }
    };
    match &cli.output {
        Some(path) => {
            if let Err(error) = std::fs::write(path, json) {
                eprintln!("error: cannot write {}: {}", path.display(), error);
                return ExitCode::from(1);
            }
        }
        None => println!("{}", json),
    }
    ExitCode::SUCCESS
}
