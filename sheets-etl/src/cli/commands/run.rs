//! `run`: one batch over every form kind

use anyhow::{Context, Result};

use crate::cli::RunArgs;
use crate::config::{Config, Destination};
use crate::etl::{BatchOrchestrator, FormKind, ProcessOptions};
use crate::sheets::SheetsClient;
use crate::store::{MySqlStore, StoreGateway};

/// Run the batch. Row and form failures are logged, not returned; only
/// startup failures are errors.
pub async fn handle_run_command(config: &Config, args: &RunArgs) -> Result<()> {
    let sheets = SheetsClient::from_config(&config.google)
        .context("Failed to initialize Google Sheets client")?;

    let store = if args.dry_run {
        log::info!("Dry run: nothing will be written");
        None
    } else {
        connect_store(config).await
    };

    BatchOrchestrator::new(config, &sheets, store)
        .with_options(ProcessOptions {
            dry_run: args.dry_run,
        })
        .run()
        .await;

    Ok(())
}

/// Whether any configured form kind writes through a procedure
fn needs_store(config: &Config) -> bool {
    FormKind::ALL.iter().any(|kind| {
        matches!(
            config.forms.get(*kind).target(),
            Ok(target) if matches!(target.destination, Destination::Procedure(_))
        )
    })
}

/// Open the store if a form kind needs it. Failures are logged and leave
/// procedure-backed form kinds to be skipped.
async fn connect_store(config: &Config) -> Option<Box<dyn StoreGateway>> {
    if !needs_store(config) {
        log::debug!("No form kind writes to the store; not connecting");
        return None;
    }

    let store_config = match &config.store {
        Some(store_config) => store_config,
        None => {
            log::error!("[store] is not configured; procedure-backed forms will be skipped");
            return None;
        }
    };

    if let Err(e) = store_config.validate() {
        log::error!("{:#}; procedure-backed forms will be skipped", e);
        return None;
    }

    match MySqlStore::connect(store_config).await {
        Ok(store) => Some(Box::new(store)),
        Err(e) => {
            log::error!("{:#}; procedure-backed forms will be skipped", e);
            None
        }
    }
}
