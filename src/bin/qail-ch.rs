//! qail-ch: ClickHouse from the command line
//!
//! # Usage
//!
//! ```bash
//! # Run a query (RowBinaryWithNamesAndTypes, rendered as a table)
//! qail-ch "SELECT name, engine FROM system.tables LIMIT 5"
//!
//! # Bind parameters
//! qail-ch "SELECT {id:UInt64} AS id" --param id=42 --output json
//!
//! # Inspect a type descriptor or a statement
//! qail-ch type "Nullable(DateTime64(3, 'UTC'))"
//! qail-ch classify "WITH x AS (SELECT 1) SELECT * FROM x"
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use qail_ch::prelude::*;
use qail_clickhouse::protocol::classify;

#[derive(Parser)]
#[command(name = "qail-ch")]
#[command(author = "QAIL Contributors")]
#[command(version)]
#[command(about = "ClickHouse over HTTP, RowBinary all the way", long_about = None)]
#[command(after_help = "EXAMPLES:
    qail-ch 'SELECT version()'
    qail-ch 'SELECT {d:Date} AS d' --param d=2024-01-01
    qail-ch 'SELECT number FROM numbers(3)' --type UInt64 --output json
    qail-ch 'SELECT * FROM system.numbers LIMIT 1000000' --stream
    qail-ch ping")]
struct Cli {
    /// SQL statement to execute
    query: Option<String>,

    /// Named parameter NAME=VALUE, referenced as {NAME:Type}
    #[arg(short, long = "param")]
    params: Vec<String>,

    /// Positional parameter, referenced as {$0:Type}, {$1:Type}, ...
    #[arg(short, long)]
    bind: Vec<String>,

    /// Result column type (repeat per column) to request bare RowBinary
    #[arg(short = 't', long = "type")]
    types: Vec<String>,

    /// Server output format, e.g. JSONEachRow (printed raw)
    #[arg(short, long)]
    format: Option<String>,

    /// Print rows as JSON lines while they arrive
    #[arg(long, conflicts_with = "format")]
    stream: bool,

    /// How to print decoded rows
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Server URL, e.g. http://localhost:8123/default
    #[arg(long, env = "QAIL_CH_URL")]
    url: Option<String>,

    #[arg(long, env = "QAIL_CH_USER")]
    user: Option<String>,

    #[arg(long, env = "QAIL_CH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(short, long)]
    database: Option<String>,

    /// Server setting NAME=VALUE for this invocation
    #[arg(short, long = "setting")]
    settings: Vec<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the server answers
    Ping,
    /// Parse a type descriptor and show its canonical form
    Type {
        /// e.g. "Array(Nullable(String))"
        descriptor: String,
    },
    /// Show which command a statement is classified as
    Classify {
        sql: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match &cli.command {
        Some(Commands::Type { descriptor }) => show_type(descriptor),
        Some(Commands::Classify { sql }) => {
            show_command(sql);
            Ok(())
        }
        Some(Commands::Ping) => ping(&cli).await,
        None => match &cli.query {
            Some(query) => execute_query(query, &cli).await,
            None => {
                println!("{}", "qail-ch: ClickHouse over HTTP".cyan().bold());
                println!();
                println!("Usage: qail-ch <QUERY> [OPTIONS]");
                println!();
                println!("Try: qail-ch --help");
                Ok(())
            }
        },
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "qail_clickhouse=debug"
    } else {
        "qail_clickhouse=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn driver(cli: &Cli) -> Result<ChDriver> {
    let settings = cli
        .settings
        .iter()
        .map(|s| parse_key_value(s))
        .collect::<CliResult<Vec<_>>>()?;
    let flags = Overrides {
        url: cli.url.clone(),
        user: cli.user.clone(),
        password: cli.password.clone(),
        database: cli.database.clone(),
        settings,
    };
    let config = resolve(flags, load_files()?)?;
    if cli.verbose {
        eprintln!("{} {}", "Connecting to:".dimmed(), config.base_url());
    }
    Ok(ChDriver::new(config)?)
}

async fn ping(cli: &Cli) -> Result<()> {
    let driver = driver(cli)?;
    driver
        .ping()
        .await
        .with_context(|| format!("{} did not answer", driver.config().base_url()))?;
    println!("{} {}", "✓".green(), driver.config().base_url());
    Ok(())
}

async fn execute_query(sql: &str, cli: &Cli) -> Result<()> {
    if cli.verbose {
        eprintln!("{} {}", "Query:".dimmed(), sql.yellow());
    }
    let mut query = CliQuery::new(sql).format(cli.format.clone());
    for p in &cli.params {
        query = query.param(p.as_str());
    }
    for b in &cli.bind {
        query = query.bind(b.as_str());
    }
    for t in &cli.types {
        query = query.column_type(t.as_str());
    }

    let driver = driver(cli)?;
    if cli.stream {
        let count = query.stream(&driver, &mut std::io::stdout().lock()).await?;
        if cli.verbose {
            eprintln!("{} {}", "Rows streamed:".dimmed(), count);
        }
        return Ok(());
    }
    let result = query.run(&driver).await?;
    print_result(&result, cli.output)?;
    Ok(())
}

fn show_type(descriptor: &str) -> Result<()> {
    let ty = Type::parse(descriptor)?;
    println!("{} {}", "Canonical:".dimmed(), ty.to_string().cyan());
    let size = match ty.fixed_size() {
        Some(n) => format!("{} bytes", n),
        None => "variable".to_string(),
    };
    println!("{} {}", "Wire size:".dimmed(), size.white());
    println!("{} {}", "Nullable:".dimmed(), ty.is_nullable());
    if ty.storage() != &ty {
        println!("{} {}", "Stored as:".dimmed(), ty.storage().to_string().white());
    }
    Ok(())
}

fn show_command(sql: &str) {
    let command = classify(sql.as_bytes());
    println!("{} {}", "Command:".dimmed(), command.to_string().cyan().bold());
    println!("{} {}", "Returns rows:".dimmed(), command.returns_rows());
    println!("{} {}", "Insert:".dimmed(), command.is_insert());
}
