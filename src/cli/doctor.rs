//! CLI `doctor` command — run database diagnostics and print a health report.

use anyhow::{Context, Result};

use conductor::config::ConductorConfig;
use conductor::db;
use conductor::db::migrations::CURRENT_SCHEMA_VERSION;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &ConductorConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `conductor template put` or any hook event to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Conductor Health Report");
    println!("=======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!(
        "Schema version:    {} (current {})",
        report.schema_version, CURRENT_SCHEMA_VERSION
    );
    println!("Identity:          {}", config.identity.name);
    println!(
        "Knowledge lookup:  {}",
        config.knowledge.url.as_deref().unwrap_or("(disabled)")
    );
    println!();
    println!("Row counts:");
    println!("  Templates:       {}", report.template_count);
    println!("  Projects:        {}", report.project_count);
    println!("  Sessions:        {} ({} open)", report.session_count, report.open_session_count);
    println!("  Deployments:     {}", report.deployment_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db {}", db_path.display());
        println!("  2. Or move the file aside; the schema is recreated on next use.");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
