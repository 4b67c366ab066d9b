use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use kbflow::{
    api,
    backend::{ApiClient, DEFAULT_TOP_K},
    config, logging,
    workflow::{ActionKind, KnowledgeBaseStore, LocalFile, Phase, StorageSink},
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "kbflow", about = "Knowledge base ingestion workflow")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the workflow control surface over HTTP.
    Serve,
    /// List documents on the connected remote drive.
    Files,
    /// List storage tables that can receive vectors.
    Tables,
    /// Show the remote drive connection status.
    DriveStatus {
        /// Start the authorization flow and print the URL to visit.
        #[arg(long)]
        connect: bool,
    },
    /// Upload local files (directories are walked recursively).
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Stage documents, bind a table, and vectorize in one pass.
    Ingest {
        /// Destination table.
        #[arg(long)]
        table: String,
        /// Remote drive document id to include (repeatable).
        #[arg(long = "file")]
        files: Vec<String>,
        /// Local file or directory to upload and include (repeatable).
        #[arg(long = "local")]
        locals: Vec<PathBuf>,
    },
    /// Search vectors previously written to a table.
    Search {
        /// Table to search.
        #[arg(long)]
        table: String,
        /// Free-text query.
        #[arg(long)]
        query: String,
        /// Maximum number of hits.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!(error = %format!("{err:#}"), "kbflow failed");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();
    let config = config::init_config().context("Failed to load config from environment")?;
    let client = ApiClient::from_config(config).context("Failed to build backend client")?;

    match cli.command {
        Command::Serve => serve(client, config.server_port).await,
        Command::Files => print_json(&client.list_drive_files().await?),
        Command::Tables => print_json(&client.list_tables().await?),
        Command::DriveStatus { connect: false } => print_json(&client.drive_status().await?),
        Command::DriveStatus { connect: true } => print_json(&client.connect_drive().await?),
        Command::Upload { paths } => {
            let mut uploaded = Vec::new();
            for file in collect_files(&paths)? {
                uploaded.push(client.upload_file(&file).await?);
            }
            print_json(&uploaded)
        }
        Command::Ingest {
            table,
            files,
            locals,
        } => ingest(client, table, files, locals).await,
        Command::Search {
            table,
            query,
            top_k,
        } => print_json(&client.search(&table, &query, top_k).await?),
    }
}

async fn serve(client: ApiClient, port: Option<u16>) -> Result<()> {
    let store = Arc::new(KnowledgeBaseStore::from_client(client));
    let app = api::create_router(store);
    let (listener, port) = bind_listener(port).await.context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ingest(
    client: ApiClient,
    table: String,
    file_ids: Vec<String>,
    locals: Vec<PathBuf>,
) -> Result<()> {
    let store = KnowledgeBaseStore::from_client(client);

    if !file_ids.is_empty() {
        let state = store.load_files().await;
        if let Some(error) = state.error {
            bail!("Failed to list drive files: {error}");
        }
        for id in &file_ids {
            let document = state
                .available_documents
                .iter()
                .find(|document| &document.id == id)
                .with_context(|| format!("Drive file {id} not found"))?;
            store.select_file(document.clone());
        }
    }

    for file in collect_files(&locals)? {
        let state = store.upload_file(&file).await;
        if let Some(error) = state.error.filter(|error| error.action == ActionKind::Upload) {
            bail!("{error}");
        }
    }

    let state = store.load_tables().await;
    let sink = state
        .available_sinks
        .iter()
        .find(|sink| sink.name == table)
        .cloned()
        .unwrap_or_else(|| {
            tracing::warn!(table = %table, "Table not listed by backend; using it as given");
            StorageSink::named(table.clone())
        });
    store.select_table(sink);

    let state = store.vectorize_selection().await;
    print_json(&state)?;
    if state.phase == Phase::Failed {
        bail!(
            "Vectorization failed: {}",
            state
                .error
                .map(|error| error.message)
                .unwrap_or_else(|| "unknown error".into())
        );
    }
    Ok(())
}

fn collect_files(paths: &[PathBuf]) -> Result<Vec<LocalFile>> {
    let mut files = Vec::new();
    for path in paths {
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
            if entry.file_type().is_file() {
                files.push(read_local(entry.path())?);
            }
        }
    }
    Ok(files)
}

fn read_local(path: &Path) -> Result<LocalFile> {
    LocalFile::from_path(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn bind_listener(port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4200..=4299;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4200-4299",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explicit_port_is_bound_without_scanning() {
        let ephemeral = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("ephemeral port");
        let port = ephemeral.local_addr().expect("addr").port();
        drop(ephemeral);

        let (listener, bound) = bind_listener(Some(port)).await.expect("bind");
        assert_eq!(bound, port);
        assert_eq!(listener.local_addr().expect("addr").port(), port);
    }

    #[tokio::test]
    async fn busy_explicit_port_is_an_error() {
        let (held, port) = bind_listener(None).await.expect("scan range");
        assert!((4200..=4299).contains(&port));

        let err = bind_listener(Some(port)).await.expect_err("port taken");
        assert_eq!(err.kind(), std::io::ErrorKind::AddrInUse);
        drop(held);
    }
}
