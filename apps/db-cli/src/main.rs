mod cli;

use clap::Parser;
use db_lifecycle::db::LifecycleSettings;
use db_lifecycle::infra::db::{LifecycleOutcome, Readiness};
use db_lifecycle::{orchestrate, DbLifecycleError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn,sea_orm=warn";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .without_time()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_env_filter(filter)
        .init();

    // clap exits 2 on bad arguments
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "db command failed");
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), DbLifecycleError> {
    let settings = LifecycleSettings::resolve(cli.database_url)?;
    let Command::Db(db) = cli.command;
    let command = db.into_lifecycle(&settings)?;

    match orchestrate(&settings, command).await? {
        LifecycleOutcome::Ensured => info!("✅ database ensured"),
        LifecycleOutcome::Ready(Readiness::Connected { attempts }) => {
            info!(attempts, "✅ database is ready")
        }
        LifecycleOutcome::Ready(Readiness::DatabaseAbsent { attempts }) => {
            info!(attempts, "✅ database server is ready; database not created yet")
        }
        LifecycleOutcome::Dropped => info!("✅ schema dropped"),
        LifecycleOutcome::Upgraded { applied } => info!(applied, "✅ database upgraded"),
        LifecycleOutcome::Revision(rev) => {
            let script = rev
                .script
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            info!(
                revision = %rev.id,
                parent = %rev.parent_id.as_deref().unwrap_or("<base>"),
                script = %script,
                "✅ revision written"
            );
        }
    }
    Ok(())
}
