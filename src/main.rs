use clap::Parser as ClapParser;
use log::debug;
use minilang::config;
use minilang::error::InterpretError;
use minilang::interpreter::Interpreter;
use minilang::{lexer, parser};
use std::path::PathBuf;
use std::process::ExitCode;

/// A tree-walking interpreter for a small dynamically-typed imperative language
#[derive(ClapParser, Debug)]
#[command(name = "minilang")]
#[command(version = config::VERSION)]
#[command(about = "Runs a minilang source file")]
struct CliArgs {
    /// Script file to execute
    #[arg(value_name = "FILE", default_value = config::DEFAULT_SCRIPT_FILENAME)]
    script: PathBuf,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    let source = match std::fs::read_to_string(&args.script) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Cannot read script file {}: {}", args.script.display(), e);
            return ExitCode::from(1);
        }
    };

    match run(&source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            exit_code_for(&err)
        }
    }
}

fn run(source: &str) -> Result<(), InterpretError> {
    debug!("lexing and parsing {} byte(s) of source", source.len());
    let tokens = lexer::lex(source)?;
    let program = parser::parse(tokens)?;
    let mut interpreter = Interpreter::new();
    interpreter.interpret(&program)?;
    Ok(())
}

fn exit_code_for(err: &InterpretError) -> ExitCode {
    match err {
        InterpretError::Lex(_) => ExitCode::from(1),
        InterpretError::Parse(_) => ExitCode::from(2),
        InterpretError::Runtime(_) => ExitCode::from(3),
    }
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}
