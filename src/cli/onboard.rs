use crate::activity::filter::FilterField;
use crate::config::{Config, DEFAULT_API_PORT, DEFAULT_MAX_UPLOAD_BYTES, expand_home};
use crate::db::Database;
use anyhow::{Context, Result};
use dialoguer::{Input, Select, theme::ColorfulTheme};

const MIB: u64 = 1024 * 1024;

pub fn run_onboarding() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to Daybook onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let defaults = Config::default();

    println!("\n[1/4] Data location");
    let db_input: String = Input::with_theme(&theme)
        .with_prompt("  SQLite database file")
        .default(defaults.db_path.display().to_string())
        .interact_text()
        .context("Failed to read database path")?;
    let blob_input: String = Input::with_theme(&theme)
        .with_prompt("  Folder for uploaded files")
        .default(defaults.blob_dir.display().to_string())
        .interact_text()
        .context("Failed to read blob directory")?;
    let db_path = expand_home(&db_input);
    let blob_dir = expand_home(&blob_input);
    println!("  ✓ {}", db_path.display());
    println!("  ✓ {}", blob_dir.display());

    println!("\n[2/4] Service port");
    let api_port: u16 = Input::with_theme(&theme)
        .with_prompt("  Local port for the web service")
        .default(DEFAULT_API_PORT)
        .interact_text()
        .context("Failed to read port")?;
    println!("  ✓ http://127.0.0.1:{api_port}");

    println!("\n[3/4] Upload size limit");
    let max_mib: u64 = Input::with_theme(&theme)
        .with_prompt("  Largest accepted file (MiB)")
        .default(DEFAULT_MAX_UPLOAD_BYTES / MIB)
        .validate_with(|input: &u64| -> std::result::Result<(), &str> {
            if *input == 0 {
                Err("Use at least 1 MiB")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .context("Failed to read upload limit")?;
    println!("  ✓ {max_mib} MiB per file");

    println!("\n[4/4] Activity filters");
    let fields = ["date (when it happened)", "created_at (when it was logged)"];
    let selected = Select::with_theme(&theme)
        .with_prompt("  Filter today/week/month by")
        .default(0)
        .items(&fields)
        .interact()
        .context("Failed to select filter field")?;
    let activity_filter_field = if selected == 1 {
        FilterField::CreatedAt
    } else {
        FilterField::Date
    };
    println!("  ✓ Filtering by {}", activity_filter_field.as_str());

    let config = Config {
        db_path,
        blob_dir,
        api_port,
        max_upload_bytes: max_mib.saturating_mul(MIB),
        activity_filter_field,
        ..defaults
    };

    config.ensure_bootstrap_files()?;
    config.save()?;
    let _ = Database::open(&config.db_path)?;

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Run Daybook service to start the web service.");
    println!("──────────────────────────────────────────");

    Ok(config)
}
