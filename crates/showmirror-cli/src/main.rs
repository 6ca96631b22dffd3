mod ingest;
mod runs;

use clap::{Parser, Subcommand};
use showmirror_core::RunMode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "showmirror")]
#[command(about = "Mirror the TVMaze show catalog into Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Walk the whole show index and refresh every show
    Ingest,
    /// Refresh shows changed upstream since the last recorded watermark
    Update,
    /// List recent ingest runs
    Runs {
        /// Maximum number of runs to show
        #[arg(long, default_value = "10")]
        limit: i64,
        /// Also list the failed shows of each run
        #[arg(long)]
        failures: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("showmirror: pass a command, or --help for the list");
        return Ok(());
    };

    let config = showmirror_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = showmirror_db::PoolConfig::from_app_config(&config);
    let pool = showmirror_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            showmirror_db::ping(&pool).await?;
            println!("database is reachable");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            showmirror_db::run_migrations(&pool).await?;
            println!("migrations applied");
        }
        Commands::Ingest => ingest::run_ingest(&pool, &config, RunMode::Full).await?,
        Commands::Update => ingest::run_ingest(&pool, &config, RunMode::Incremental).await?,
        Commands::Runs { limit, failures } => runs::run_list_runs(&pool, limit, failures).await?,
    }

    Ok(())
}
