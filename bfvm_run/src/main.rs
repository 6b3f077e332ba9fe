use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::Context;
use bfvm::{compile_chunk, parse_source, Machine, MachineConfig, SyntaxError};
use clap::Parser;
use codesnake::{Block, CodeWidth, Label, LineIndex};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use yansi::Paint;

/// Compile and run programs for the 8-symbol tape machine.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Program to run. Without one, lines typed at the prompt are run on a shared tape.
    file: Option<PathBuf>,
    /// Print the optimized instruction listing to stderr
    #[arg(short, long)]
    listing: bool,
    /// Print the bytecode disassembly to stderr
    #[arg(short, long)]
    bytecode: bool,
    /// Only compile (and print), don't run
    #[arg(long)]
    no_run: bool,
    /// Output is written out whenever more than this many bytes are buffered
    #[arg(long, default_value_t = MachineConfig::default().flush_threshold)]
    flush_threshold: usize,
}

fn make_block<'a>(idx: &'a LineIndex, error: &SyntaxError) -> Option<Block<&'a str, String>> {
    let text = match error {
        SyntaxError::UnmatchedLoopEnd(_) => "no loop to close here",
        SyntaxError::UnclosedLoop(_) => "this loop is never closed",
    };
    Block::new(
        idx,
        [Label::new(error.span())
            .with_text(text.red().to_string())
            .with_style(|s| s.red().to_string())],
    )
}

fn report(name: &str, source: &[u8], error: &SyntaxError) {
    eprintln!("{}: {error}", "error".red().bold());

    // only valid UTF-8 can be shown with the offending bracket marked
    let Ok(src) = std::str::from_utf8(source) else {
        return;
    };
    let idx = LineIndex::new(src);
    if let Some(block) = make_block(&idx, error) {
        let block = block.map_code(|c| CodeWidth::new(c, c.len()));
        eprintln!("{}[{name}]", block.prologue());
        eprint!("{block}");
        eprintln!("{}", block.epilogue());
    }
}

/// Compiles and runs one program on `machine`. Returns `false` if the program
/// had a syntax error.
fn execute(args: &Args, machine: &mut Machine, name: &str, source: &[u8]) -> anyhow::Result<bool> {
    let chunk = match parse_source(source) {
        Ok(chunk) => chunk,
        Err(err) => {
            report(name, source, &err);
            return Ok(false);
        }
    };
    if args.listing {
        eprint!("{chunk}");
    }

    let program = compile_chunk(&chunk);
    if args.bytecode {
        eprint!("{program}");
    }

    if !args.no_run {
        machine
            .run(&program, io::stdin().lock(), io::stdout().lock())
            .with_context(|| format!("running {name}"))?;
    }
    Ok(true)
}

fn repl(args: &Args) -> anyhow::Result<()> {
    let mut readline = rustyline::DefaultEditor::new()?;
    let mut machine = Machine::with_config(MachineConfig {
        flush_threshold: args.flush_threshold,
    });

    while let Ok(input) = readline.readline(">> ") {
        _ = readline.add_history_entry(input.as_str());
        if let Err(err) = execute(args, &mut machine, "input", input.as_bytes()) {
            eprintln!("{}: {err:#}", "error".red().bold());
            // the pointer may be stuck off the tape, start over
            machine = Machine::with_config(MachineConfig {
                flush_threshold: args.flush_threshold,
            });
        }
        // programs rarely end their output with a newline
        println!();
        io::stdout().flush()?;
        debug!(pointer = machine.pointer(), "line done");
    }

    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    let Some(path) = &args.file else {
        repl(&args)?;
        return Ok(ExitCode::SUCCESS);
    };

    let source =
        std::fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    let name = path.display().to_string();
    let mut machine = Machine::with_config(MachineConfig {
        flush_threshold: args.flush_threshold,
    });

    if execute(&args, &mut machine, &name, &source)? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
