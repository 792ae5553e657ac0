use appgrid::config::EngineConfig;
use appgrid::query::{QueryEngine, telemetry};
use appgrid::types::EntityId;
use appgrid::{Application, logger};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "appgrid", version, about = "appgrid entity store CLI", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). If omitted, the usual search path is used.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Directory for the entity log. Takes precedence over config/env.")]
    data_dir: Option<PathBuf>,
    #[arg(long, env = "APPGRID_APP", help = "Application UUID that owns the collections")]
    app: Uuid,
    #[arg(long, default_value = "warn", help = "Console log level: error|warn|info|debug|trace")]
    log_level: String,
    #[arg(long, help = "After the command, print this invocation's engine counters to stderr")]
    metrics: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Create an entity from a JSON object")]
    Create {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(help = "Entity properties as a JSON object, e.g. '{\"verb\":\"go\"}'")]
        json: String,
    },
    #[command(about = "Fetch one entity by UUID")]
    Get {
        #[arg(help = "Entity UUID")]
        id: String,
    },
    #[command(about = "Run a query and print one page")]
    Query {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(help = "Query text, e.g. \"select * where verb = 'stop'\"")]
        ql: String,
        #[arg(long, allow_negative_numbers = true, help = "Page size")]
        limit: Option<i64>,
        #[arg(long, help = "Cursor from a previous page")]
        cursor: Option<String>,
        #[arg(long, help = "Follow cursors and print every page")]
        all: bool,
    },
}

fn init_logging(cfg: &EngineConfig, level: &str) {
    let res = match &cfg.log_config {
        Some(path) => logger::init_file(path),
        None => logger::init_console(logger::parse_level(level)),
    };
    if let Err(e) = res {
        eprintln!("warning: logging not initialized: {e}");
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = EngineConfig::load(cli.config.as_deref())?;
    if cli.data_dir.is_some() {
        cfg.data_dir = cli.data_dir;
    }
    init_logging(&cfg, &cli.log_level);
    if cfg.data_dir.is_none() {
        log::warn!("no data_dir configured; entities live only for this invocation");
    }
    let engine = Arc::new(QueryEngine::from_config(cfg)?);
    let app = Application::new(cli.app, engine);

    match cli.command {
        Commands::Create { collection, json } => {
            let body: serde_json::Value = serde_json::from_str(&json)?;
            let entity = app.create(&collection, body)?;
            println!("{}", entity.to_json());
        }
        Commands::Get { id } => {
            let entity = app.get(&EntityId::parse(&id)?)?;
            println!("{}", entity.to_json());
        }
        Commands::Query { collection, ql, limit, cursor, all } => {
            let mut page = app.query(&collection, &ql, limit, cursor.as_deref())?;
            println!("{}", page.to_json());
            while all && let Some(next) = page.cursor.take() {
                page = app.query(&collection, &ql, limit, Some(&next))?;
                println!("{}", page.to_json());
            }
        }
    }
    app.engine().store().close();
    if cli.metrics {
        eprint!("{}", telemetry::metrics_text());
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
