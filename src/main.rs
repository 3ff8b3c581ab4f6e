use clap::{Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use std::path::PathBuf;
use stocktake::{
    config::{StoreCapabilities, database, settings},
    core::{
        AppContext,
        catalog_import::{self, CatalogUpload, ImportMode},
        conflicts,
    },
    errors::{Error, Result},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stocktake", version, about = "Stock-taking core maintenance tool")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = settings::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create tables and indexes
    InitDb,
    /// Import a catalog file into a shop
    Import {
        /// Target shop id
        #[arg(long)]
        shop: i64,
        /// Catalog file (CSV)
        #[arg(long)]
        file: PathBuf,
        /// How rows are applied
        #[arg(long, value_enum, default_value_t = ModeArg::Merge)]
        mode: ModeArg,
        /// Validate and report without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the conflict comparison of a zone as JSON
    Conflicts {
        /// Zone id
        #[arg(long)]
        location: i64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Merge,
    Replace,
}

impl From<ModeArg> for ImportMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Merge => Self::Merge,
            ModeArg::Replace => Self::Replace,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal: env vars can be set externally
    dotenv().ok();

    let cli = Cli::parse();

    // 3. Load the application configuration
    let app_config = if cli.config.exists() {
        settings::load_config(&cli.config)?
    } else {
        settings::load_default_config()?
    };

    // 4. Connect and make sure the schema exists
    let database_url = database::get_database_url(app_config.database_url.as_deref());
    let db = database::create_connection(&database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    // 5. Capabilities are detected once, here
    let capabilities = StoreCapabilities::detect(&db).await?;
    let ctx = AppContext::new(db, capabilities, app_config.limits());

    match cli.command {
        Command::InitDb => {
            info!(schema_version = capabilities.schema_version, "Database ready");
        }
        Command::Import {
            shop,
            file,
            mode,
            dry_run,
        } => {
            let content = std::fs::read(&file)?;
            let report = catalog_import::import_catalog(
                &ctx,
                CatalogUpload {
                    shop_id: shop,
                    content,
                    mode: mode.into(),
                    dry_run,
                    actor: "cli".to_string(),
                },
            )
            .await?;
            print_json(&report)?;
        }
        Command::Conflicts { location } => {
            let comparison = conflicts::detect_conflicts(&ctx, location).await?;
            print_json(&comparison)?;
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| Error::Io(e.into()))?;
    println!("{json}");
    Ok(())
}
