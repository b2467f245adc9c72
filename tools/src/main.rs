mod keyscript;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use imegate_core::table::{schema_path, SchemaConfig, TableEngineFactory};
use imegate_core::{DirFs, EngineManager, FileSystem, GateConfig, LogSink, Session};

#[derive(Parser)]
#[command(name = "imegate")]
#[command(about = "Drive the table engine through the serialized engine manager")]
#[command(version)]
struct Cli {
    /// Data directory handed to the engine
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Gate configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile schema tables into the data directory
    Build {
        /// Schema files (`[schema]` + `[table]` TOML)
        #[arg(required = true)]
        schemas: Vec<PathBuf>,
    },
    /// List installed schemas
    Schemas,
    /// Feed a key script to a new session and print what it commits
    Type {
        #[arg(long)]
        schema: String,
        /// Print the final context snapshot as JSON
        #[arg(long)]
        json: bool,
        /// Characters, or named keys in braces: `nihao{Page_Down}2`
        keys: String,
    },
    /// Run engine maintenance (syncs user dictionaries)
    Maintain,
}

fn setup_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<GateConfig> {
    match path {
        Some(p) => GateConfig::load_toml(p)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(GateConfig::default()),
    }
}

async fn open(fs: Arc<DirFs>, config: GateConfig) -> Result<EngineManager> {
    let manager = EngineManager::new(TableEngineFactory::new(), config);
    manager.initialize(LogSink::tracing(), fs).await?;
    Ok(manager)
}

async fn handle_build(manager: &EngineManager, schemas: &[PathBuf]) -> Result<()> {
    for path in schemas {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = SchemaConfig::parse(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        manager.rebuild_index(&config.schema.id, &text).await?;
        println!("built {} ({})", config.schema.id, config.schema.name);
    }
    Ok(())
}

async fn handle_schemas(manager: &EngineManager) -> Result<()> {
    let schemas = manager.list_schemas().await?;
    if schemas.is_empty() {
        println!("(no schemas installed)");
    }
    for s in schemas {
        println!("{}\t{}", s.schema_id, s.name);
    }
    Ok(())
}

/// Schema config text as stored by a previous `build`, so the engine can
/// rebuild a missing index.
async fn installed_config(fs: &DirFs, schema_id: &str) -> Result<String> {
    let bytes = fs
        .read(&schema_path(schema_id))
        .await?
        .with_context(|| format!("schema {} is not installed (run `imegate build`)", schema_id))?;
    Ok(String::from_utf8(bytes)?)
}

async fn type_keys(session: &Session, keys: &str, json: bool) -> Result<()> {
    let mut commits = Vec::new();
    for (key_id, mask) in keyscript::parse(keys)? {
        let handled = session.process_key(key_id, mask).await?;
        tracing::debug!(key_id, mask, handled, "key processed");
        let commit = session.get_commit().await?;
        if !commit.is_empty() {
            commits.push(commit.text);
        }
    }
    if json {
        let out = serde_json::json!({
            "commits": commits,
            "context": session.get_context().await?,
            "status": session.get_status().await?,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for text in commits {
            println!("{}", text);
        }
        let ctx = session.get_context().await?;
        if ctx.has_visible_state() {
            println!("[{}]", ctx.composition.preedit);
        }
    }
    Ok(())
}

async fn handle_type(
    manager: &EngineManager,
    fs: &DirFs,
    schema_id: &str,
    keys: &str,
    json: bool,
) -> Result<()> {
    let config_text = installed_config(fs, schema_id).await?;
    let session = manager.create_session(schema_id, &config_text).await?;
    let typed = type_keys(&session, keys, json).await;
    session.destroy().await?;
    typed
}

async fn handle_maintain(manager: &EngineManager) -> Result<()> {
    manager.perform_maintenance().await?;
    println!("maintenance done");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let fs = Arc::new(DirFs::new(&cli.root));
    let manager = open(Arc::clone(&fs), config).await?;

    let outcome = match &cli.command {
        Commands::Build { schemas } => handle_build(&manager, schemas).await,
        Commands::Schemas => handle_schemas(&manager).await,
        Commands::Type { schema, json, keys } => {
            handle_type(&manager, &fs, schema, keys, *json).await
        }
        Commands::Maintain => handle_maintain(&manager).await,
    };

    manager.destroy().await?;
    outcome
}
