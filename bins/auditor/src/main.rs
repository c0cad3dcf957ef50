//! Finlyt balance auditor.
//!
//! Walks every account in the database, recomputes its balance from the
//! opening balance and its transactions, and logs any drift. Exits with a
//! non-zero status when at least one account has drifted.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use finlyt_core::LedgerCoordinator;
use finlyt_db::{SeaOrmStore, connect_with};
use finlyt_shared::{AppConfig, telemetry};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    telemetry::init_tracing(&config.logging);

    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    let store = Arc::new(SeaOrmStore::new(db));
    let ledger = LedgerCoordinator::new(Arc::clone(&store), &config.ledger);

    let accounts = store.all_account_refs().await?;
    let mut drifted = 0usize;

    for (owner_id, account_id) in &accounts {
        let audit = ledger.audit_account(*owner_id, *account_id).await?;
        if !audit.is_consistent() {
            drifted += 1;
            error!(
                %owner_id,
                %account_id,
                stored = %audit.stored,
                expected = %audit.expected,
                drift = %audit.drift,
                "Account balance drifted"
            );
        }
    }

    info!(accounts = accounts.len(), drifted, "Audit finished");

    Ok(if drifted == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
