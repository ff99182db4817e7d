//! Agent Config CLI
//!
//! Entry point for the `agentcfg` command-line tool.

mod projects;

use agentcfg_core::{init_logging, AgentConfigService, ServiceConfig};
use agentcfg_model::{
    BlueprintId, CreateConfigRequest, EnvUpdateRequest, ProjectId, RequestIdentity,
};
use agentcfg_store::SqliteStore;
use anyhow::Context;
use clap::{Parser, Subcommand};
use projects::SqliteProjectDirectory;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "agentcfg")]
#[command(about = "Versioned agent configuration blueprints", version)]
struct Cli {
    /// Path to service config file (TOML)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Database path, overriding `[store] path`
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Workspace the request runs in
    #[arg(long, short = 'w', global = true, default_value = "default")]
    workspace: String,

    /// User recorded on created and updated records
    #[arg(long, short = 'u', global = true, default_value = "cli")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append a blueprint or mask from a JSON request file
    Create {
        /// Request file (`-` for stdin)
        file: PathBuf,
    },

    /// Show the latest blueprint of a project
    Latest {
        project: ProjectId,

        /// Mask to overlay on the result
        #[arg(long)]
        mask: Option<BlueprintId>,
    },

    /// Show the effective values as of a blueprint
    Get {
        blueprint: BlueprintId,

        /// Mask to overlay on the result
        #[arg(long)]
        mask: Option<BlueprintId>,
    },

    /// Show the blueprint an environment is pinned to
    Env {
        project: ProjectId,
        env_name: String,

        /// Mask to overlay on the result
        #[arg(long)]
        mask: Option<BlueprintId>,
    },

    /// Show only the values a blueprint or mask introduced
    Delta { blueprint: BlueprintId },

    /// Create or re-point environments from a JSON request file
    Bind {
        /// Request file (`-` for stdin)
        file: PathBuf,
    },

    /// List blueprint history, newest first
    History {
        project: ProjectId,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 10)]
        size: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.store.path.clone_from(db);
    }

    init_logging(&config.logging)?;

    let store_config = config.store.sqlite_config();
    let store = SqliteStore::open(&store_config)
        .with_context(|| format!("failed to open database '{}'", config.store.path.display()))?;
    let directory = Arc::new(SqliteProjectDirectory::new(store_config));
    let service = AgentConfigService::from_config(store, directory, &config);
    let identity = RequestIdentity::new(cli.workspace, cli.user);

    tracing::debug!(
        "Using database '{}' as '{}' in workspace '{}'",
        config.store.path.display(),
        identity.user_name,
        identity.workspace_id
    );

    match cli.command {
        Commands::Create { file } => {
            let request: CreateConfigRequest = read_json(&file).await?;
            print_json(&service.create_or_update_config(&identity, &request).await?)
        }
        Commands::Latest { project, mask } => {
            print_json(&service.get_latest_blueprint(&identity, project, mask)?)
        }
        Commands::Get { blueprint, mask } => {
            print_json(&service.get_blueprint_by_id(&identity, blueprint, mask)?)
        }
        Commands::Env {
            project,
            env_name,
            mask,
        } => print_json(&service.get_blueprint_by_env(&identity, project, &env_name, mask)?),
        Commands::Delta { blueprint } => print_json(&service.get_delta_by_id(&identity, blueprint)?),
        Commands::Bind { file } => {
            let request: EnvUpdateRequest = read_json(&file).await?;
            print_json(&service.create_or_update_envs(&identity, &request)?)
        }
        Commands::History {
            project,
            page,
            size,
        } => print_json(&service.get_history(&identity, project, page, size)?),
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = if path == Path::new("-") {
        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut tokio::io::stdin(), &mut buf).await?;
        buf
    } else {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))?
    };
    serde_json::from_slice(&bytes).with_context(|| format!("invalid request in '{}'", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
