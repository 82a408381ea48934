//! The Quartz compiler frontend CLI.
//!
//! `quartzc` lexes and parses one or more core units (plus any files
//! they pull in through `@include`), accumulating an AST forest and the
//! entity table. Code generation lives behind a separate tool; the
//! `--dump-*` flags expose the frontend's output instead.

mod context;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};

use quartz_common::con::Styler;
use quartz_common::files::{FileQueue, InputFileId, InputFileKind, OutputFile};
use quartz_lexer::Lexer;
use quartz_parser::entity::ROOT_ENTITY_ID;
use quartz_parser::{dump, parse, ParseContext};

use context::{Context, Flags, VersionInfo};

#[derive(Parser)]
#[command(name = "quartzc", version, about = "The Quartz compiler frontend")]
struct Cli {
    /// Input file(s).
    #[arg(short = 'i', long = "input", num_args = 1.., required = true)]
    input: Vec<PathBuf>,

    /// Output file(s); the count must match the inputs.
    #[arg(short = 'o', long = "output", num_args = 1..)]
    output: Vec<PathBuf>,

    /// Enable verbose diagnostics.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// After parsing, serialize the AST forest to stdout.
    #[arg(long = "dump-ast")]
    dump_ast: bool,

    /// Lex only: print every token and exit without parsing.
    #[arg(long = "dump-tokens")]
    dump_tokens: bool,

    /// After parsing, serialize the entity table to stdout.
    #[arg(long = "dump-entities")]
    dump_entities: bool,

    /// Reserved for the code-generation layer.
    #[arg(long = "dump-ir")]
    dump_ir: bool,

    /// Print the runtime configuration.
    #[arg(long = "dump-context")]
    dump_context: bool,

    /// ANSI colour output.
    #[arg(long = "colours", default_value_t = true, action = ArgAction::Set)]
    colours: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let styler = Styler::new(cli.colours);

    if !cli.output.is_empty() && cli.output.len() != cli.input.len() {
        eprintln!(
            "{}Error:{} Number of output files does not match the number of inputs.",
            styler.red(),
            styler.reset()
        );
        return ExitCode::FAILURE;
    }

    let mut flags = Flags::NONE;
    if cli.verbose {
        flags.set(Flags::VERBOSE);
    }
    if cli.colours {
        flags.set(Flags::COLOURS);
    }
    if cli.dump_ir {
        flags.set(Flags::DUMP_IR);
    }
    if cli.dump_ast {
        flags.set(Flags::DUMP_AST);
    }
    if cli.dump_entities {
        flags.set(Flags::DUMP_ENTS);
    }
    if cli.dump_tokens {
        flags.set(Flags::DUMP_TOKS);
    }
    if cli.dump_context {
        flags.set(Flags::DUMP_CTX);
    }

    let mut inputs = FileQueue::new();
    for path in &cli.input {
        inputs.push_core_unit(path.clone());
    }
    let outputs = cli
        .output
        .iter()
        .enumerate()
        .map(|(i, path)| OutputFile {
            id: i as u32 + 1,
            path: path.clone(),
        })
        .collect();

    let driver_ctx = Context {
        flags,
        version: VersionInfo::current(),
        inputs,
        outputs,
    };

    if flags.has(Flags::DUMP_CTX) {
        let mut stdout = std::io::stdout();
        if driver_ctx.dump(&mut stdout).is_err() {
            return ExitCode::FAILURE;
        }
    }

    if flags.has(Flags::DUMP_TOKS) {
        return dump_tokens_only(&cli.input, styler);
    }

    run_frontend(driver_ctx, styler)
}

/// `--dump-tokens`: lex each core unit, print the stream, skip parsing.
fn dump_tokens_only(inputs: &[PathBuf], styler: Styler) -> ExitCode {
    let mut stdout = std::io::stdout();
    let mut ok = true;

    for path in inputs {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!(
                    "{}Error:{} could not open {}: {e}",
                    styler.red(),
                    styler.reset(),
                    path.display()
                );
                ok = false;
                continue;
            }
        };

        let mut lexer = match Lexer::new(bytes, path.display().to_string()) {
            Ok(lexer) => lexer,
            Err(e) => {
                eprintln!("{}Error:{} {e}", styler.red(), styler.reset());
                ok = false;
                continue;
            }
        };

        if lexer.dump(&mut stdout).is_err() {
            ok = false;
            continue;
        }
        if lexer.current().kind == quartz_common::token::TokenKind::Illegal {
            quartz_parser::errors::ErrorCollector::display_error(
                "Illegal token.",
                &lexer,
                None,
                &mut std::io::stderr(),
                false,
                styler,
            );
            ok = false;
        }
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Parse every core unit in queue order. Each file resets the lexer;
/// the entity table, AST forest and diagnostics persist across files.
fn run_frontend(driver_ctx: Context, styler: Styler) -> ExitCode {
    let verbose = driver_ctx.flags.has(Flags::VERBOSE);
    let mut errstream = std::io::stderr();

    // The context starts on a placeholder buffer; every real file is
    // installed through the same reset path.
    let lexer = Lexer::new(vec![0], "<startup>").expect("placeholder buffer is non-empty");
    let mut ctx = ParseContext::new(lexer, driver_ctx.inputs, InputFileId::INVALID);
    ctx.colours = driver_ctx.flags.has(Flags::COLOURS);

    let mut ok = true;
    while let Some((id, path)) = ctx.files.take_next_pending(InputFileKind::CoreUnit) {
        if verbose {
            eprintln!("  Parsing: {}", path.display());
        }

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!(
                    "{}Error:{} could not open {}: {e}",
                    styler.red(),
                    styler.reset(),
                    path.display()
                );
                ok = false;
                continue;
            }
        };

        if let Err(e) = ctx.lexer.reset(bytes, path.display().to_string()) {
            eprintln!(
                "{}Error:{} {}: {e}",
                styler.red(),
                styler.reset(),
                path.display()
            );
            ok = false;
            continue;
        }

        ctx.current_file = id;
        ctx.current_namespace = ROOT_ENTITY_ID;
        ctx.paren_level = 0;

        if !parse(&mut ctx, &mut errstream) {
            ok = false;
        }
    }

    if ctx.errors.error_count() > 0 || ctx.errors.warning_count() > 0 {
        let _ = writeln!(errstream);
        if let Err(e) = ctx.errors.emit(&ctx.files, &mut errstream, styler) {
            eprintln!("{}Error:{} {e}", styler.red(), styler.reset());
            ok = false;
        }
    }

    if verbose {
        eprintln!(
            "  Parsed {} file(s), {} toplevel declaration(s), {} entities.",
            ctx.files.len(),
            ctx.toplevel.len(),
            ctx.entities.len()
        );
    }

    let mut stdout = std::io::stdout();
    if driver_ctx.flags.has(Flags::DUMP_AST) {
        let _ = dump::dump_ast(&ctx.ast, &ctx.toplevel, &mut stdout, styler);
    }
    if driver_ctx.flags.has(Flags::DUMP_ENTS) {
        let _ = dump::dump_entities(&ctx.entities, &mut stdout, styler);
        let _ = dump::dump_structures(&ctx.entities, &mut stdout, styler);
    }
    if driver_ctx.flags.has(Flags::DUMP_IR) {
        eprintln!("IR dumping is handled by the code-generation layer.");
    }

    // Warnings never change the exit code.
    if ok && !ctx.errors.has_errors() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
