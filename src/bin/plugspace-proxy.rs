//! Proxy child process: serves plugin instructions over stdin/stdout.
//!
//! Settings come from the file named by the first argument (if any) and the
//! `PLUGSPACE_*` environment variables. Logs go to stderr, filtered by
//! `RUST_LOG`.

use std::process::ExitCode;
use std::sync::Arc;

use plugspace::{ManifestImporter, ProxyChild, SettingsLoader};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

async fn run() -> plugspace::Result<()> {
    let mut loader = SettingsLoader::new();
    if let Some(path) = std::env::args_os().nth(1) {
        loader = loader.file(path)?;
    }
    let settings = loader.env()?.build();

    tracing::debug!(
        roots = ?settings.effective_search_path().roots(),
        recurse = settings.recurse,
        "proxy child starting"
    );

    ProxyChild::new(Arc::new(ManifestImporter))
        .with_discovery(settings.discovery())
        .serve_stdio()
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "proxy child failed");
            ExitCode::FAILURE
        }
    }
}
