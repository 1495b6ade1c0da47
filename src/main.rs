use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;

use twinspect::diagnostic::{render_diagnostics, Diagnostic};
use twinspect::{compare_sources, report, BackendKind, CompareError, PipelineConfig};

#[derive(Parser)]
#[command(
    name = "twinspect",
    version,
    about = "Semantic clone detection for pairs of Python-subset functions"
)]
struct Cli {
    /// First source file
    file_a: PathBuf,
    /// Second source file
    file_b: PathBuf,
    /// Loop and call unrolling bound (K)
    #[arg(long, default_value_t = 10)]
    bound: usize,
    /// Ceiling on explored paths per function
    #[arg(long, default_value_t = 4096)]
    max_paths: usize,
    /// Solver timeout in seconds
    #[arg(long, default_value_t = 5)]
    timeout: u64,
    /// Equivalence backend: builtin, z3, or cvc5
    #[arg(long, default_value = "builtin")]
    solver: String,
    /// Emit the report as JSON
    #[arg(long)]
    json: bool,
    /// List every explored path
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let backend = match cli.solver.as_str() {
        "builtin" => BackendKind::Builtin,
        "z3" => BackendKind::Z3,
        "cvc5" => BackendKind::Cvc5,
        other => {
            eprintln!("error: unknown solver '{other}' (expected builtin, z3, or cvc5)");
            process::exit(2);
        }
    };

    let source_a = read(&cli.file_a);
    let source_b = read(&cli.file_b);
    let name_a = cli.file_a.display().to_string();
    let name_b = cli.file_b.display().to_string();

    let config = PipelineConfig {
        unroll_bound: cli.bound,
        max_paths: cli.max_paths,
        timeout: Duration::from_secs(cli.timeout),
        backend,
    };

    match compare_sources(&source_a, &name_a, &source_b, &name_b, &config) {
        Ok(comparison) => {
            if cli.json {
                print!("{}", report::format_json(&comparison));
            } else {
                print!("{}", report::format_report(&comparison, cli.verbose));
            }
        }
        Err(error) => {
            let (file, source) = match file_index(&error) {
                0 => (name_a.as_str(), source_a.as_str()),
                _ => (name_b.as_str(), source_b.as_str()),
            };
            match error {
                CompareError::Parse { failure, .. } => {
                    render_diagnostics(&failure.diagnostics, file, source);
                }
                CompareError::Unsupported { error, .. } => {
                    Diagnostic::error(error.to_string(), error.span)
                        .with_help(
                            "only integers, booleans, arithmetic, branches, and bounded \
                             loops can be analyzed"
                                .to_string(),
                        )
                        .render(file, source);
                }
            }
            process::exit(1);
        }
    }
}

fn file_index(error: &CompareError) -> usize {
    match error {
        CompareError::Parse { file_index, .. } => *file_index,
        CompareError::Unsupported { file_index, .. } => *file_index,
    }
}

fn read(path: &PathBuf) -> String {
    match fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("error: cannot read {}: {error}", path.display());
            process::exit(1);
        }
    }
}
