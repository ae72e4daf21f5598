use bosun_core::ingest::{IngestOptions, ingest_directory};
use bosun_core::types::{Analysis, AnalysisStatus, EventId};
use bosun_core::{BosunConfig, BosunError};
use bosun_db::SqliteProvider;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use owo_colors::Stream::{Stderr, Stdout};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Once;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static TRACING: Once = Once::new();

#[derive(Parser)]
#[command(name = "bosun", version, about = "Maritime event analysis service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// Ingest the knowledge directory first when the store is empty.
        #[arg(long)]
        ingest: bool,
    },
    /// Analyze one event and print the stored result.
    Analyze {
        event_id: EventId,
        /// Re-run even when an analysis already exists.
        #[arg(long)]
        force: bool,
    },
    /// Embed the knowledge directory into the knowledge store.
    Ingest {
        /// Skip when the store already holds chunks.
        #[arg(long, conflicts_with = "rebuild")]
        if_empty: bool,
        /// Clear the store first, required after changing embedding models.
        #[arg(long)]
        rebuild: bool,
    },
    /// Serve the data tools over stdin/stdout, one JSON request per line.
    Mcp,
    /// Print the OpenAPI document.
    Openapi,
}

fn init_tracing() {
    TRACING.call_once(|| {
        let filter =
            EnvFilter::try_from_env("BOSUN_LOG").unwrap_or_else(|_| EnvFilter::new("bosun=info"));
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!(
                "{} {err}",
                "error:".if_supports_color(Stderr, |text| text.red())
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), BosunError> {
    if let Command::Openapi = command {
        println!("{}", bosun_serve::openapi::generate_spec());
        return Ok(());
    }

    let config = BosunConfig::load()?;
    let provider = SqliteProvider::new(&config.database.path)?;
    let store_timeout = config.analysis.store_timeout();

    match command {
        Command::Serve { ingest } => {
            let embedder = bosun_llm::build_embedder(&config)?;
            if ingest {
                let options = IngestOptions {
                    if_empty: true,
                    rebuild: false,
                };
                ingest_directory(
                    &provider,
                    embedder.as_ref(),
                    &config.knowledge,
                    store_timeout,
                    options,
                )
                .await?;
            }
            let model = bosun_llm::build_driver(&config)?;
            let addr: SocketAddr = config.bind_addr().parse().map_err(|err| {
                BosunError::internal(format!("invalid bind address {}: {err}", config.bind_addr()))
            })?;
            let state = bosun_serve::AppState::new(config, provider, embedder, model)?;
            bosun_serve::serve(state, addr)
                .await
                .map_err(BosunError::internal)
        }
        Command::Analyze { event_id, force } => {
            let embedder = bosun_llm::build_embedder(&config)?;
            let model = bosun_llm::build_driver(&config)?;
            let tools = bosun_mcp::build_registry(&config.tools, provider.clone(), store_timeout)?;
            let analyzer = bosun_core::Analyzer::new(provider, embedder, tools, model, &config);
            let analysis = analyzer.analyze(event_id, force).await?;
            print_analysis(&analysis);
            Ok(())
        }
        Command::Ingest { if_empty, rebuild } => {
            let embedder = bosun_llm::build_embedder(&config)?;
            let report = ingest_directory(
                &provider,
                embedder.as_ref(),
                &config.knowledge,
                store_timeout,
                IngestOptions { if_empty, rebuild },
            )
            .await?;
            if report.skipped {
                println!("knowledge store already populated, nothing to do");
            } else {
                println!(
                    "{} {} chunks from {} files ({} removed)",
                    "ingested".if_supports_color(Stdout, |text| text.green()),
                    report.chunks_written,
                    report.files,
                    report.chunks_removed
                );
            }
            Ok(())
        }
        Command::Mcp => {
            let tools = bosun_mcp::DataTools::new(provider, store_timeout);
            info!("serving data tools on stdio");
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            bosun_mcp::stdio::run_stdio(&tools, stdin, tokio::io::stdout())
                .await
                .map_err(BosunError::internal)
        }
        Command::Openapi => Ok(()),
    }
}

fn print_analysis(analysis: &Analysis) {
    let status = match analysis.status {
        AnalysisStatus::Completed => "completed"
            .if_supports_color(Stdout, |text| text.green())
            .to_string(),
        AnalysisStatus::Failed => "failed"
            .if_supports_color(Stdout, |text| text.red())
            .to_string(),
        AnalysisStatus::Pending => "pending"
            .if_supports_color(Stdout, |text| text.yellow())
            .to_string(),
    };
    println!(
        "analysis #{} for event {} [{status}] via {}",
        analysis.id, analysis.event_id, analysis.model_used
    );
    match analysis.confidence {
        Some(confidence) => println!("confidence: {:.0}%", confidence * 100.0),
        None => println!("confidence: unknown"),
    }
    println!();
    println!("{}", analysis.analysis_text);
    if !analysis.suggested_actions.is_empty() {
        println!();
        println!(
            "{}",
            "suggested actions:".if_supports_color(Stdout, |text| text.bold())
        );
        for (index, action) in analysis.suggested_actions.iter().enumerate() {
            println!("  {}. {action}", index + 1);
        }
    }
}
