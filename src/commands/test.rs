use anyhow::Result;
use colored::Colorize;
use litellm_exporter::config;
use litellm_exporter::datasource::PgDataSource;
use std::path::Path;
use tracing::info;

/// Execute the test command
///
/// Loads and validates the configuration, then (unless `skip_db`) checks that
/// the database answers a trivial query. Exits with an error if either fails.
pub async fn execute(config_path: Option<&Path>, skip_db: bool) -> Result<()> {
    println!("{}", "Testing configuration...".yellow());
    info!("Loading and validating configuration");

    let cfg = config::load_config(config_path)?;

    println!("{}", "✓ Configuration test successful".green());
    println!();

    println!("{}", "Configuration Summary:".bold());
    println!("  {}: {}:{}", "Listen".cyan(), cfg.server.host, cfg.server.port);
    println!("  {}: {}", "Log Level".cyan(), cfg.server.log_level);
    println!("  {}: {}", "Log Format".cyan(), cfg.server.log_format);
    println!();

    println!("  {}:", "Windows".cyan());
    println!("    Spend: {}", cfg.metrics.spend_window);
    println!("    Requests: {}", cfg.metrics.request_window);
    println!("    Errors: {}", cfg.metrics.error_window);
    println!(
        "  {}: {}s",
        "Update Interval".cyan(),
        cfg.metrics.update_interval_seconds
    );
    println!();

    println!(
        "  {}: {}@{}:{}/{} (pool {}..{})",
        "Database".cyan(),
        cfg.database.user,
        cfg.database.host,
        cfg.database.port,
        cfg.database.name,
        cfg.database.min_connections,
        cfg.database.max_connections
    );

    if skip_db {
        println!("    {}", "(connectivity check skipped)".dimmed());
        return Ok(());
    }

    // One attempt is enough for an interactive check
    let mut database = cfg.database.clone();
    database.retry_attempts = 1;
    let source = PgDataSource::connect(&database);

    match source.ping().await {
        Ok(()) => {
            println!("    {}", "✓ Database reachable".green());
            info!("Database connectivity check succeeded");
            Ok(())
        }
        Err(e) => {
            println!("    {} {}", "✗ Database unreachable:".red(), e);
            Err(e.into())
        }
    }
}
