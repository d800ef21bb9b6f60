use std::collections::HashMap;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser as ClapParser, Subcommand};
use dashexpr::EngineConfig;
use dashexpr::cli::{self, CheckOptions, CheckResult, CliError};
use dashexpr::output::to_json;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(ClapParser)]
#[command(name = "dashexpr")]
#[command(about = "dashexpr - Evaluate and aggregate dashboard formulas over JSON rows")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and evaluate a formula
    Check {
        /// The formula to evaluate
        formula: String,

        /// JSON rows (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only validate syntax, don't evaluate
        #[arg(long)]
        syntax_only: bool,

        /// Evaluate once per distinct value of this field
        #[arg(short, long)]
        group_by: Option<String>,

        /// Accumulate each group in this many partitions and merge them
        #[arg(long, default_value_t = 1)]
        partitions: usize,

        /// Value for param(), params() and currentUser(), as key=value
        #[arg(long = "param", value_parser = cli::parse_param)]
        params: Vec<(String, String)>,

        /// JSON file with engine settings
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List available functions
    Functions,

    /// Show documentation for one function
    Function {
        /// Function name or operator (use 'dashexpr functions' to list them)
        name: String,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            formula,
            input,
            pretty,
            syntax_only,
            group_by,
            partitions,
            params,
            config,
        } => run_check(
            CheckOptions {
                formula,
                input,
                syntax_only,
                group_by,
                partitions,
                params: params.into_iter().collect::<HashMap<_, _>>(),
                config: EngineConfig::default(),
            },
            config,
            pretty,
        ),
        Commands::Functions => {
            print!("{}", cli::get_functions_overview());
            Ok(())
        }
        Commands::Function { name } => cli::get_function_doc(&name).map(|doc| print!("{}", doc)),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the default of warnings only.
fn init_logging() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::WARN.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run_check(mut options: CheckOptions, config: Option<PathBuf>, pretty: bool) -> Result<(), CliError> {
    if let Some(path) = config {
        let text = std::fs::read_to_string(&path)?;
        options.config = EngineConfig::from_json_str(&text)
            .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))?;
    }

    if options.input.is_none() && !options.syntax_only && !atty::is(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        options.input = Some(buffer);
    }

    match cli::execute_check(&options)? {
        CheckResult::SyntaxValid(canonical) => println!("Syntax is valid: {}", canonical),
        CheckResult::Success(output) => println!("{}", to_json(&output, pretty)?),
    }
    Ok(())
}
