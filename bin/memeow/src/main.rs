//! # memeow Binary
//!
//! Assembles the services from the adapters selected at compile time and runs
//! one command for one account.

mod cli;

use clap::Parser;
use cli::Args;
use mm_auth_simple::SimpleIdentityProvider;
use mm_config::Settings;
use mm_core::{DocumentStore, SystemClock};
use mm_services::Services;
use mm_storage_local::LocalObjectStore;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[cfg(not(any(feature = "db-sqlite", feature = "db-memory")))]
compile_error!("enable one document store feature: db-sqlite or db-memory");

#[cfg(feature = "db-sqlite")]
async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let store = mm_db_sqlite::SqliteDocumentStore::new(
        &settings.database.url,
        settings.database.max_connections,
    )
    .await?;
    Ok(Arc::new(store))
}

#[cfg(all(feature = "db-memory", not(feature = "db-sqlite")))]
async fn open_store(_settings: &Settings) -> anyhow::Result<Arc<dyn DocumentStore>> {
    tracing::warn!("built without db-sqlite; nothing outlives this command");
    Ok(Arc::new(mm_db_memory::MemoryDocumentStore::new()))
}

fn init_tracing(settings: &Settings, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log.filter))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if settings.log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("memeow: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&settings, args.verbose);
    if settings.uses_dev_salt() {
        tracing::warn!("using the development session salt; set MEMEOW__AUTH__SESSION_SALT");
    }

    let store = match open_store(&settings).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "failed to open document store");
            eprintln!("memeow: could not open {}", settings.database.url);
            return ExitCode::FAILURE;
        }
    };
    let objects = Arc::new(LocalObjectStore::new(
        settings.media.root.clone(),
        settings.media.url_prefix.clone(),
    ));
    let identity = Arc::new(SimpleIdentityProvider::new(settings.auth.session_salt));
    let services = Services::new(store, objects, identity, Arc::new(SystemClock));

    match cli::run(&services, &args.user, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn configured_store_opens() {
        let env = HashMap::from([(
            "MEMEOW__DATABASE__URL".to_string(),
            "sqlite::memory:".to_string(),
        )]);
        let settings = Settings::from_sources(None, Some(env)).unwrap();
        let store = open_store(&settings).await.unwrap();
        assert!(store.get_record("users", "nobody").await.unwrap().is_none());
    }
}
