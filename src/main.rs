mod activity;
mod api;
mod blob;
mod cli;
mod client;
mod clipboard;
mod config;
mod db;
mod error;
mod events;
mod files;

use crate::cli::onboard::run_onboarding;
use crate::cli::{ActivityCommands, Cli, ClipboardCommands, Commands, ConfigCommands};
use crate::client::ApiClient;
use crate::config::Config;
use crate::db::{Database, Table};
use crate::files::upload::{UploadItem, UploadOutcome, upload_batch};
use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate, TimeZone, Utc};
use clap::Parser;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            let _ = run_onboarding()?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Service => {
            let config = load_or_default_config()?;
            run_service(config).await
        }
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Activity { command } => handle_activity_command(command).await,
        Commands::Clipboard { command } => handle_clipboard_command(command).await,
        Commands::Files => handle_files().await,
        Commands::Upload { paths } => handle_upload(paths).await,
        Commands::Download { blob_id, output } => handle_download(&blob_id, output).await,
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_or_default_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_status() -> Result<()> {
    let config = load_or_default_config()?;
    let database = Database::open(&config.db_path)?;

    println!("Daybook status");
    println!("- service_running: {}", is_port_open(config.api_port));
    println!("- base_url: {}", config.base_url());
    println!("- activities: {}", database.count_rows(Table::Activities)?);
    println!("- clipboard_rows: {}", database.count_rows(Table::Clipboard)?);
    println!("- files: {}", database.count_rows(Table::Files)?);
    println!("- blobs: {}", database.count_rows(Table::Blobs)?);
    println!(
        "- activity_filter_field: {}",
        config.activity_filter_field.as_str()
    );

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable".to_string());
        }
    }

    if config.blob_dir.is_dir() {
        println!("[OK] blob dir exists: {}", config.blob_dir.display());
    } else {
        println!("[WARN] blob dir missing: {}", config.blob_dir.display());
        issues.push("blob dir missing".to_string());
    }

    match Url::parse(&config.base_url()) {
        Ok(url) => println!("[OK] base URL valid: {url}"),
        Err(error) => {
            println!("[WARN] base URL invalid: {error}");
            issues.push("invalid base url".to_string());
        }
    }

    if is_port_open(config.api_port) {
        println!("[OK] service listening on port {}", config.api_port);
    } else {
        println!(
            "[WARN] nothing listening on port {}. Run `Daybook service`.",
            config.api_port
        );
        issues.push("service not running".to_string());
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

async fn handle_activity_command(command: ActivityCommands) -> Result<()> {
    let client = service_client()?;

    match command {
        ActivityCommands::Add { text, date } => {
            let occurred_on = parse_activity_date(date)?;
            let id = client.add_activity(&text, occurred_on).await?;
            println!("Activity added: {id}");
        }
        ActivityCommands::List { filter, field } => {
            let payload = client.list_activities(&filter, field.as_deref()).await?;
            println!(
                "{} activities (filter: {}, by {})",
                payload.count, payload.filter, payload.field
            );
            for activity in payload.activities {
                let day = Local
                    .timestamp_millis_opt(activity.date)
                    .single()
                    .map(|datetime| datetime.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| activity.date.to_string());
                println!("[{}] {day}  {}", activity.id, activity.text);
            }
        }
        ActivityCommands::Delete { id } => {
            client.delete_activity(id).await?;
            println!("Activity deleted: {id}");
        }
    }

    Ok(())
}

async fn handle_clipboard_command(command: ClipboardCommands) -> Result<()> {
    let client = service_client()?;

    match command {
        ClipboardCommands::Get => match client.clipboard().await? {
            Some(entry) => println!("{}", entry.text),
            None => println!("(clipboard is empty)"),
        },
        ClipboardCommands::Set { text, id, new } => {
            let target = match (id, new) {
                (_, true) => None,
                (Some(id), false) => Some(id),
                (None, false) => client.clipboard().await?.map(|entry| entry.id),
            };
            let entry = client.set_clipboard(target, &text).await?;
            println!("Clipboard saved: {}", entry.id);
        }
        ClipboardCommands::Clear { id } => {
            client.clear_clipboard(id).await?;
            println!("Clipboard entry cleared: {id}");
        }
    }

    Ok(())
}

async fn handle_files() -> Result<()> {
    let client = service_client()?;
    let files = client.list_files().await?;

    println!("{} files", files.len());
    for file in files {
        println!(
            "[{}] {}  {} bytes  {}  {}",
            file.file.id, file.name, file.size, file.content_type, file.file.blob_id
        );
    }

    Ok(())
}

async fn handle_upload(paths: Vec<PathBuf>) -> Result<()> {
    let config = load_or_default_config()?;
    let client = ApiClient::new(&config.base_url())?;

    let mut failures = 0_usize;
    let mut items = Vec::with_capacity(paths.len());
    for path in &paths {
        match UploadItem::from_path(path) {
            Ok(item) => items.push(item),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "skipping unreadable file");
                println!("Failed: {} ({error})", path.display());
                failures += 1;
            }
        }
    }

    for outcome in upload_batch(&client, &items, config.max_upload_bytes).await {
        match outcome {
            UploadOutcome::Uploaded {
                name,
                blob_id,
                file_id,
            } => println!("Uploaded: {name} (file {file_id}, blob {blob_id})"),
            UploadOutcome::Skipped { name, size, limit } => {
                println!("Skipped: {name} is too large ({size} bytes, limit {limit} bytes)")
            }
            UploadOutcome::Failed { name, error } => {
                println!("Failed: {name} ({error})");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} file(s) failed to upload");
    }

    Ok(())
}

async fn handle_download(blob_id: &str, output: Option<PathBuf>) -> Result<()> {
    let client = service_client()?;
    let url = client
        .download_url(blob_id)
        .await
        .with_context(|| format!("Download unavailable for blob {blob_id}"))?;
    let bytes = client.download(&url).await?;

    let target = match output {
        Some(path) => path,
        None => {
            let listed_name = client
                .list_files()
                .await?
                .into_iter()
                .find(|file| file.file.blob_id == blob_id)
                .map(|file| file.name);
            download_target(listed_name.as_deref(), blob_id)
        }
    };

    fs::write(&target, &bytes)
        .with_context(|| format!("Failed to write download: {}", target.display()))?;
    println!("Downloaded {} bytes to {}", bytes.len(), target.display());

    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let _ = Database::open(&config.db_path)?;

    let shared_config = Arc::new(config);

    info!("Daybook service started");

    tokio::select! {
        api_result = api::run_server(Arc::clone(&shared_config)) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn parse_activity_date(input: Option<String>) -> Result<i64> {
    let Some(raw) = input else {
        return Ok(Utc::now().timestamp_millis());
    };

    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format: {raw}. Example: 2026-02-18"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("Failed to build activity timestamp")?;

    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|datetime| datetime.timestamp_millis())
        .context("Failed to convert activity date to local time")
}

/// File name for a download without `--output`.
///
/// The listed name comes from whoever uploaded the blob, so only its final
/// component is used and the result always lands in the working directory.
fn download_target(listed_name: Option<&str>, blob_id: &str) -> PathBuf {
    listed_name
        .and_then(|name| Path::new(name).file_name())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(blob_id))
}

fn service_client() -> Result<ApiClient> {
    let config = load_or_default_config()?;
    ApiClient::new(&config.base_url())
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn is_port_open(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpStream::connect_timeout(&addr, Duration::from_millis(250)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::download_target;
    use std::path::PathBuf;

    const BLOB: &str = "e0af3d11";

    #[test]
    fn download_target_keeps_only_the_file_name() {
        assert_eq!(download_target(Some("../x"), BLOB), PathBuf::from("x"));
        assert_eq!(download_target(Some("../../.bashrc"), BLOB), PathBuf::from(".bashrc"));
        assert_eq!(download_target(Some("/abs/x"), BLOB), PathBuf::from("x"));
        assert_eq!(download_target(Some("a/b.txt"), BLOB), PathBuf::from("b.txt"));
        assert_eq!(download_target(Some("notes.txt"), BLOB), PathBuf::from("notes.txt"));
    }

    #[test]
    fn download_target_falls_back_to_blob_id() {
        assert_eq!(download_target(None, BLOB), PathBuf::from(BLOB));
        assert_eq!(download_target(Some(".."), BLOB), PathBuf::from(BLOB));
        assert_eq!(download_target(Some("/"), BLOB), PathBuf::from(BLOB));
        assert_eq!(download_target(Some(""), BLOB), PathBuf::from(BLOB));
    }
}
