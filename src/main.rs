mod cli;

use mdb::{config, dispatch::Dispatcher, lineage::LineageTracker};
use mdb_db::migrations;
use mdb_db::pool::get_conn;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::io::Read;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mdb=trace,mdb_db=debug,mdb_common=debug".to_string()
        } else {
            "mdb=info,mdb_db=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Process {
            event_type,
            payload,
            json,
        } => process(cli.config.as_deref(), &event_type, &payload, json),
        Commands::Migrate => migrate(cli.config.as_deref()),
        Commands::Lineage { sha1 } => show_lineage(cli.config.as_deref(), &sha1),
        Commands::Descendants { sha1 } => show_descendants(cli.config.as_deref(), &sha1),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mdb {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open(config_path: Option<&Path>) -> Result<Dispatcher> {
    let config = config::load_config_or_default(config_path)?;
    Ok(Dispatcher::from_config(&config)?)
}

fn read_payload(source: &str) -> Result<serde_json::Value> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read payload from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read payload file: {}", source))?
    };
    serde_json::from_str(&raw).context("Payload is not valid JSON")
}

fn process(config_path: Option<&Path>, event_type: &str, payload: &str, json: bool) -> Result<()> {
    let dispatcher = open(config_path)?;
    let payload = read_payload(payload)?;
    let output = dispatcher.process_raw(event_type, payload)?;

    if json {
        let doc = serde_json::json!({
            "operation": output.operation.as_ref().map(|op| &op.uid),
            "events": output.events,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    match &output.operation {
        Some(op) => println!("Operation {} ({})", op.uid, op.op_type),
        None => println!("Nothing to do"),
    }
    for event in &output.events {
        println!("  {}", serde_json::to_string(event)?);
    }
    Ok(())
}

fn migrate(config_path: Option<&Path>) -> Result<()> {
    // Opening the pool applies pending migrations.
    let dispatcher = open(config_path)?;
    let conn = get_conn(dispatcher.pool())?;
    let version = migrations::current_version(&conn)?;
    println!("Schema at version {} (latest {})", version, migrations::latest_version());
    Ok(())
}

fn show_lineage(config_path: Option<&Path>, sha1: &str) -> Result<()> {
    let dispatcher = open(config_path)?;
    let conn = get_conn(dispatcher.pool())?;
    let lineage = LineageTracker::new(&conn, dispatcher.registry());

    let file = lineage.find_by_sha1(sha1)?;
    let ancestors = lineage.ancestors(file.id)?;
    for (depth, f) in std::iter::once(&file).chain(ancestors.iter()).enumerate() {
        let removed = if f.is_removed() { " [removed]" } else { "" };
        println!(
            "{}{} {} {}{}",
            "  ".repeat(depth),
            f.uid,
            f.sha1.as_deref().unwrap_or("-"),
            f.name,
            removed
        );
    }
    Ok(())
}

fn show_descendants(config_path: Option<&Path>, sha1: &str) -> Result<()> {
    let dispatcher = open(config_path)?;
    let conn = get_conn(dispatcher.pool())?;
    let lineage = LineageTracker::new(&conn, dispatcher.registry());

    let file = lineage.find_by_sha1(sha1)?;
    let units = lineage.descendant_units(file.id)?;
    if units.is_empty() {
        println!("No content units below {}", file.uid);
    }
    for id in units {
        let unit = mdb_db::queries::content_units::get_content_unit(&conn, id)?;
        println!("{} {}", unit.uid, unit.unit_type);
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Database: {}", config.database.path.display());
            println!("  Pool size: {}", config.database.pool_size);
            println!("  Event part labels: {}", config.registry.event_part_labels.len());
            println!("  Language aliases: {}", config.registry.language_aliases.len());
            println!("  Event sink: {:?}", config.events.sink);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("  Database: {}", config.database.path.display());
        }
    }

    Ok(())
}
