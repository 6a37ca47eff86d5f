use clap::{Args, Parser as ClapParser, Subcommand};
use dictquery::{
    DEFAULT_MAX_DEPTH, QueryOptions,
    cli::{self, CliError, Engine, QueryCommand},
};
use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};

#[derive(ClapParser)]
#[command(name = "dq")]
#[command(about = "dq - Select, filter and slice JSON documents with path queries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a path against a JSON document
    Query(QueryArgs),

    /// Print the token stream of a path
    Tokens {
        /// The path to scan
        path: String,
    },

    /// Print the parsed syntax tree of a path
    Ast {
        /// The path to parse
        path: String,

        /// Maximum nesting depth
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },

    /// Print the flat segment list of a path
    Segments {
        /// The path to split
        path: String,

        /// Maximum nesting depth
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// The path to evaluate
    path: String,

    /// Read the JSON document from a file
    #[arg(short, long, conflicts_with = "input")]
    file: Option<PathBuf>,

    /// JSON input (reads from stdin if neither --file nor --input is given)
    #[arg(short, long)]
    input: Option<String>,

    /// Write the result to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print single-line JSON
    #[arg(short, long)]
    compact: bool,

    /// Print [] instead of failing when the path does not fit the document
    #[arg(short, long)]
    suppress_errors: bool,

    /// Evaluation pipeline
    #[arg(long, value_enum, default_value_t = Engine::Ast)]
    engine: Engine,

    /// Do not retry missing keys as regular expressions (segments engine)
    #[arg(long)]
    no_regex_keys: bool,

    /// Maximum nesting depth
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Only validate syntax, don't execute
    #[arg(long)]
    syntax_only: bool,

    /// Flatten nested sequences in the result
    #[arg(long)]
    flatten: bool,
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_env("DQ_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Query(args) => run_query(args),
        Commands::Tokens { path } => cli::dump_tokens(&path).map(|dump| println!("{}", dump)),
        Commands::Ast { path, max_depth } => {
            cli::dump_ast(&path, max_depth).map(|dump| println!("{}", dump))
        }
        Commands::Segments { path, max_depth } => {
            cli::dump_segments(&path, max_depth).map(|dump| println!("{}", dump))
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn read_input(file: Option<PathBuf>, input: Option<String>) -> Result<Option<String>, CliError> {
    match (file, input) {
        (Some(path), _) => Ok(Some(fs::read_to_string(path)?)),
        (None, Some(s)) => Ok(Some(s)),
        (None, None) if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(Some(buffer))
        }
        (None, None) => Ok(None),
    }
}

fn run_query(args: QueryArgs) -> Result<(), CliError> {
    let input = if args.syntax_only {
        None
    } else {
        read_input(args.file, args.input)?
    };

    let command = QueryCommand {
        path: args.path,
        input,
        engine: args.engine,
        options: QueryOptions::new()
            .with_suppress_errors(args.suppress_errors)
            .with_max_depth(args.max_depth)
            .with_regex_keys(!args.no_regex_keys),
        syntax_only: args.syntax_only,
        flatten: args.flatten,
    };

    let outcome = cli::execute_query(&command)?;
    let rendered = cli::render_output(&outcome, args.compact)?;

    match args.output {
        Some(path) => fs::write(path, rendered + "\n")?,
        None => println!("{}", rendered),
    }
    Ok(())
}
