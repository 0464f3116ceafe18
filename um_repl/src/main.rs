use std::path::PathBuf;

use clap::Parser;
use codesnake::{Block, CodeWidth, Label, LineIndex};
use rustyline::{error::ReadlineError, DefaultEditor};
use tracing_subscriber::EnvFilter;
use um::{Config, Error, ErrorKind, Interpreter, Value};
use yansi::Paint;

/// Runs a um script, or reads and evaluates expressions interactively
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Script to load before anything else
    file: Option<PathBuf>,
    /// Start the REPL even after loading a file
    #[arg(long)]
    repl: bool,
    /// Never run the garbage collector
    #[arg(long)]
    nogc: bool,
    /// Log every top-level expression and collection
    #[arg(long)]
    debug: bool,
    /// Initial capacity of the global environment
    #[arg(long, default_value_t = 1000)]
    symbol_capacity: usize,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            gc_disabled: self.nogc,
            symbol_capacity: self.symbol_capacity,
            debug: self.debug,
        }
    }
}

/// Points at the offending text when the error knows where it is
fn print_error(source: &str, err: &Error) {
    eprintln!("{}", err.red());
    let Some(span) = err.span.clone() else {
        return;
    };
    let idx = LineIndex::new(source);
    let label = Label::new(span)
        .with_text(err.kind.to_string().red().to_string())
        .with_style(|s| s.red().to_string());
    if let Some(block) = Block::new(&idx, [label]) {
        let block = block.map_code(|c| CodeWidth::new(c, c.len()));
        eprintln!("{}[input]", block.prologue());
        eprint!("{block}");
        eprintln!("{}", block.epilogue());
    }
}

fn exit_on_request(err: &Error) {
    if let ErrorKind::Exit(code) = err.kind {
        std::process::exit(code);
    }
}

/// Evaluates the expressions in `source` in order, printing results as it goes and
/// stopping at the first error
fn run_input(um: &mut Interpreter, source: &str) {
    let forms = match um.read(source) {
        Ok(forms) => forms,
        Err(err) => {
            print_error(source, &err);
            return;
        }
    };
    for form in forms {
        match um.eval_top(form) {
            Ok(Value::Void) => {}
            Ok(value) => println!("{}", um.write(value).green()),
            Err(err) => {
                exit_on_request(&err);
                print_error(source, &err);
                eprintln!("Error in expression: {}", um.write(form));
                break;
            }
        }
    }
}

fn repl(um: &mut Interpreter) -> anyhow::Result<()> {
    let mut readline = DefaultEditor::new()?;
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "um> " } else { "... " };
        let line = match readline.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(&line);

        // keep collecting lines while an expression is still open
        if let Err(err) = um.read(&buffer) {
            if err.is_incomplete() {
                continue;
            }
        }
        readline.add_history_entry(buffer.as_str())?;
        let source = std::mem::take(&mut buffer);
        run_input(um, &source);
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut um = Interpreter::new(args.config());

    if let Some(path) = &args.file {
        tracing::debug!(path = %path.display(), "running script");
        if let Err(err) = um.load_file(path) {
            exit_on_request(&err);
            eprintln!("In file {}:", path.display());
            eprintln!("{}", err.red());
            std::process::exit(1);
        }
        if !args.repl {
            return Ok(());
        }
    }

    repl(&mut um)
}
