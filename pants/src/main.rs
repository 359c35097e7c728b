use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use pants_core::{CodegenOptions, Compiler, diags};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// What `compile` writes out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Parsed syntax tree
    Ast,
    /// Lowered intermediate representation
    Ir,
    /// Continuation-passing form with boxed names marked
    Cps,
    /// C source (default)
    #[default]
    C,
}

/// Times the execution of a closure and prints the elapsed time if verbose.
fn time<T, F: FnOnce() -> T>(name: &str, verbose: bool, f: F) -> T {
    let start = Instant::now();
    let result = f();
    if verbose {
        let elapsed = start.elapsed().as_millis();
        eprintln!("{}: {}ms", name, elapsed);
    }
    result
}

#[derive(Parser)]
#[command(name = "pants")]
#[command(about = "Compiles pants programs to a single C file", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file to C, or dump an intermediate form
    Compile {
        /// Input source file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (defaults to the input name with a .c extension for C,
        /// standard output for the other forms)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Representation to write
        #[arg(long, default_value = "c")]
        emit: Emit,

        /// Allocate through the Boehm collector in the generated program
        #[arg(long)]
        gc: bool,

        /// Print verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run every compile stage without writing output
    Check {
        /// Input source file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Debug, Error)]
enum DriverError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Compilation error: {0}")]
    CompilationError(#[from] pants_core::error::CompilerError),
}

fn main() -> Result<(), DriverError> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            output,
            emit,
            gc,
            verbose,
        } => {
            compile_file(input, output, emit, CodegenOptions { use_gc: gc }, verbose)?;
        }
        Commands::Check { input, verbose } => {
            check_file(input, verbose)?;
        }
    }

    Ok(())
}

fn compile_file(
    input: PathBuf,
    output: Option<PathBuf>,
    emit: Emit,
    options: CodegenOptions,
    verbose: bool,
) -> Result<(), DriverError> {
    if verbose {
        info!("Compiling {}...", input.display());
    }

    let source = fs::read_to_string(&input)?;

    let parsed = time("parse", verbose, || Compiler::parse(&source))?;
    if emit == Emit::Ast {
        return write_output(diags::format_ast(&parsed.ast), output, verbose);
    }

    let lowered = time("lower", verbose, || parsed.lower())?;
    if emit == Emit::Ir {
        return write_output(diags::format_ir(&lowered.ir), output, verbose);
    }

    let converted = time("to_cps", verbose, || lowered.to_cps())?;
    if emit == Emit::Cps {
        return write_output(diags::format_cps(&converted.cps), output, verbose);
    }
    if verbose {
        info!("{} variables live in cells", converted.mutated.len());
    }

    let generated = time("generate", verbose, || converted.generate(&options))?;
    let output_path = output.unwrap_or_else(|| {
        let mut path = input.clone();
        path.set_extension("c");
        path
    });
    write_output(generated.c, Some(output_path), verbose)
}

/// Write `text` to `path`, or standard output when there is none.
fn write_output(text: String, path: Option<PathBuf>, verbose: bool) -> Result<(), DriverError> {
    match path {
        Some(path) => {
            fs::write(&path, &text)?;
            if verbose {
                info!("Wrote {} bytes to {}", text.len(), path.display());
            }
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn check_file(input: PathBuf, verbose: bool) -> Result<(), DriverError> {
    if verbose {
        info!("Checking {}...", input.display());
    }

    let source = fs::read_to_string(&input)?;

    // Code generation is where the slot ceiling is enforced, so run it too.
    Compiler::parse(&source)?
        .lower()?
        .to_cps()?
        .generate(&CodegenOptions::default())?;

    if verbose {
        info!("{} is valid", input.display());
    }

    Ok(())
}
