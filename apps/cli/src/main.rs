//! slicebox - command-line client for a slicebox file store.

mod cli;
mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use slicebox_client::{ClientConfig, DownloadReport, FileClient, UploadReport};
use slicebox_protocol::FileKind;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::Config;

fn main() -> anyhow::Result<()> {
    let started = Instant::now();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose))),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let client_config = config.client_config(cli.server_ip.as_deref(), cli.server_port);
    tracing::debug!(server = %client_config.base_url, "using store");

    let rt = tokio::runtime::Runtime::new()?;
    let failed = rt.block_on(run(cli.command, client_config))?;

    eprintln!("finished in {:.2?}", started.elapsed());
    if failed > 0 {
        anyhow::bail!("{failed} transfer(s) failed");
    }
    Ok(())
}

/// Log filter used when `RUST_LOG` is not set.
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn,slicebox_client=info",
        1 => "info,slicebox_client=debug,slicebox_transfer=debug",
        _ => "debug,slicebox_client=trace,slicebox_transfer=trace",
    }
}

/// Runs one command, returning how many transfers failed.
async fn run(command: Command, config: ClientConfig) -> anyhow::Result<usize> {
    let client = Arc::new(FileClient::new(config)?);

    match command {
        Command::Upload { paths } => Ok(upload(&client, paths).await),
        Command::Download { dir, names } => Ok(download(&client, names, &dir).await),
        Command::List => {
            let files = client.list().await?;
            for file in &files {
                println!("{:<8} {:>14}  {}", kind_label(file.kind), file.size, file.name);
            }
            eprintln!("{} file(s)", files.len());
            Ok(0)
        }
    }
}

async fn upload(client: &Arc<FileClient>, paths: Vec<PathBuf>) -> usize {
    let mut failed = 0;
    for (path, result) in client.upload_many(paths).await {
        match result {
            Ok(UploadReport::Whole { name, size }) => {
                println!("uploaded {} ({size} bytes) as {name}", path.display());
            }
            Ok(UploadReport::Sliced(outcome)) => {
                println!(
                    "uploaded {} ({} bytes, {} slices sent, {} retries{})",
                    path.display(),
                    outcome.metadata.total_size,
                    outcome.slices_sent,
                    outcome.retries,
                    if outcome.resumed { ", resumed" } else { "" },
                );
            }
            Err(e) => {
                eprintln!("upload of {} failed: {e}", path.display());
                failed += 1;
            }
        }
    }
    failed
}

async fn download(client: &Arc<FileClient>, names: Vec<String>, dir: &Path) -> usize {
    let mut failed = 0;
    for (name, result) in client.download_many(names, dir).await {
        match result {
            Ok(DownloadReport::Whole { path, size }) => {
                println!("downloaded {name} ({size} bytes) to {}", path.display());
            }
            Ok(DownloadReport::Sliced(outcome)) => {
                println!(
                    "downloaded {name} ({} bytes, {} slices fetched, {} retries{}) to {}",
                    outcome.metadata.total_size,
                    outcome.slices_fetched,
                    outcome.retries,
                    if outcome.resumed { ", resumed" } else { "" },
                    outcome.path.display(),
                );
            }
            Err(e) => {
                eprintln!("download of {name} failed: {e}");
                failed += 1;
            }
        }
    }
    failed
}

fn kind_label(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Normal => "normal",
        FileKind::Slice => "slice",
        FileKind::Unknown => "unknown",
    }
}
