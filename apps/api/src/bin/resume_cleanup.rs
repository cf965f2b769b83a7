//! Operator entry point for the broken-resume cleanup.
//!
//! Usage: `resume-cleanup [--dry-run]`. Prints the JSON summary on stdout and
//! exits non-zero if any record failed.

use anyhow::{bail, Result};
use tracing::info;

use resume_api::cleanup::{run_cleanup, CleanupOptions};
use resume_api::config::Config;
use resume_api::db::create_pool;
use resume_api::storage::{LegacyFiles, PgResumeStore};
use resume_api::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let mut dry_run = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dry-run" | "-n" => dry_run = true,
            other => bail!("unknown argument '{other}' (usage: resume-cleanup [--dry-run])"),
        }
    }

    let config = Config::from_env()?;
    init_tracing(env!("CARGO_CRATE_NAME"), &config.rust_log);

    let pool = create_pool(&config.database_url).await?;
    let store = PgResumeStore::new(pool);
    let legacy = LegacyFiles::new(config.legacy_upload_root.clone());

    info!(
        "Running resume cleanup against {} (dry run: {dry_run})",
        legacy.root().display()
    );

    let summary = run_cleanup(
        &store,
        &legacy,
        CleanupOptions {
            batch_size: config.cleanup_batch_size,
            dry_run,
        },
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !summary.failures.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
