use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::{Flow, Session};
use docsearch::converter::ConverterJson;
use docsearch::{IndexOptions, InvertedIndex};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "docsearch")]
#[command(about = "Index a set of text files and answer word queries", long_about = None)]
struct Cli {
    /// Engine configuration file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    /// Requests file used by `process`
    #[arg(long, default_value = "requests.json")]
    requests: PathBuf,
    /// Where `process` writes its answers
    #[arg(long, default_value = "answers.json")]
    answers: PathBuf,
    /// Indexing threads (defaults to the number of CPUs)
    #[arg(long)]
    threads: Option<usize>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive prompt (default)
    Repl,
    /// Answer every request from the requests file and write the answers file
    Process,
    /// Run a single query and print the ranked documents
    Search {
        /// Query words
        #[arg(required = true)]
        query: Vec<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).init();
    let cli = Cli::parse();

    let converter = ConverterJson::load(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;
    let index = Arc::new(InvertedIndex::with_options(IndexOptions { worker_threads: cli.threads })?);
    let session = Session::new(converter.clone(), index, cli.requests, cli.answers);
    let count = session.reindex().context("initial indexing failed")?;
    tracing::info!(documents = count, name = converter.name(), version = converter.version(), "index ready");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Repl => repl(&session, &converter, &mut out),
        Commands::Process => session.process_requests(&mut out),
        Commands::Search { query } => session.perform_search(&query.join(" "), &mut out),
    }
}

fn repl<W: Write>(session: &Session, converter: &ConverterJson, out: &mut W) -> Result<()> {
    cli::header(out, "SEARCH ENGINE")?;
    writeln!(out, "Search engine: {} v{}", converter.name(), converter.version())?;
    writeln!(out, "Type 'help' for a list of commands")?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        write!(out, "\n> ")?;
        out.flush()?;
        let Some(line) = lines.next() else { break };
        if session.execute(&line?, out)? == Flow::Exit {
            break;
        }
    }
    Ok(())
}
