//! lims-migrate CLI - one migration operation per invocation.

use clap::{Parser, Subcommand, ValueEnum};
use lims_migrate::{Config, MigrateError, Orchestrator, Side};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "lims-migrate")]
#[command(about = "Copy, enrich and clean up LIMS data between two MySQL databases")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy every configured table from the old database to the new one
    Migrate,

    /// Copy a single table from the old database to the new one
    CopyTable {
        /// Table to read in the old database
        table: String,

        /// Table to write in the new database [default: same name]
        #[arg(long)]
        to: Option<String>,
    },

    /// Fill borrower, lab and equipment columns of orders in the new database
    EnrichOrders,

    /// Point flow bindings and orders at a replacement flow id
    RemapFlowId {
        /// Flow id to write
        #[arg(long)]
        new_id: i64,

        /// Flow id to replace (repeatable)
        #[arg(long = "old-id", required = true)]
        old_ids: Vec<i64>,
    },

    /// Delete all rows from every configured table in the new database
    Reset {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// List a table's columns in ordinal order
    Columns {
        /// Table name
        table: String,

        /// Database to inspect
        #[arg(long, value_enum, default_value = "old")]
        side: SideArg,
    },

    /// Test database connections
    HealthCheck,
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Old,
    New,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Old => Side::Old,
            SideArg::New => Side::New,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    // Refuse before touching any database
    if let Commands::Reset { yes: false } = cli.command {
        return Err(MigrateError::Config(
            "reset deletes every row of the configured tables; pass --yes to confirm".into(),
        ));
    }

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    if let Commands::HealthCheck = cli.command {
        return health_check(&config, cli.output_json).await;
    }

    let orchestrator = Orchestrator::new(config).await?;

    match cli.command {
        Commands::HealthCheck => unreachable!(), // Handled above

        Commands::Migrate => {
            let result = orchestrator.migrate_tables().await?;
            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nMigration completed!");
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!("  Tables: {}", result.tables_total);
                println!("  Rows: {}", result.rows_transferred);
            }
        }

        Commands::CopyTable { table, to } => {
            let dest = to.unwrap_or_else(|| table.clone());
            let report = orchestrator.copy_one(&table, &dest).await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "Copied {} rows from {} to {}",
                    report.rows, report.source_table, report.dest_table
                );
            }
        }

        Commands::EnrichOrders => {
            let report = orchestrator.enrich_orders().await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Order enrichment completed!");
                println!("  Orders: {}", report.orders);
                println!("  Updated: {}", report.updated);
                println!("  Skipped rows: {}", report.skipped);
                println!("  Failed lookups: {}", report.lookup_failures);
            }
        }

        Commands::RemapFlowId { new_id, old_ids } => {
            let report = orchestrator.remap_flow_id(new_id, &old_ids).await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Flow id remap completed!");
                println!("  {:?} -> {}", report.old_ids, report.new_id);
                println!("  Flow bind data rows: {}", report.flow_bind_data_rows);
                println!("  Order rows: {}", report.order_rows);
            }
        }

        Commands::Reset { .. } => {
            let report = orchestrator.reset().await?;
            if !report.is_clean() {
                warn!("{} tables could not be cleared", report.failures.len());
            }
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Reset completed!");
                println!("  Tables cleared: {}", report.cleared.len());
                println!("  Rows deleted: {}", report.rows_deleted);
                for failure in &report.failures {
                    println!("  Failed: {} ({})", failure.table, failure.error);
                }
            }
        }

        Commands::Columns { table, side } => {
            let columns = orchestrator.columns(side.into(), &table).await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&columns)?);
            } else {
                for column in &columns {
                    println!("{}", column);
                }
            }
        }
    }

    orchestrator.close().await
}

async fn health_check(config: &Config, output_json: bool) -> Result<(), MigrateError> {
    let result = Orchestrator::health_check(config).await;

    if output_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Health Check Results:");
        println!(
            "  Source ({}): {} ({}ms)",
            config.database.old.address(),
            if result.source_connected { "OK" } else { "FAILED" },
            result.source_latency_ms
        );
        if let Some(ref err) = result.source_error {
            println!("    Error: {}", err);
        }
        println!(
            "  Target ({}): {} ({}ms)",
            config.database.new.address(),
            if result.target_connected { "OK" } else { "FAILED" },
            result.target_latency_ms
        );
        if let Some(ref err) = result.target_error {
            println!("    Error: {}", err);
        }
        println!(
            "\n  Overall: {}",
            if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
        );
    }

    if !result.healthy {
        return Err(MigrateError::Config("Health check failed".to_string()));
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
