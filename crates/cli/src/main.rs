//! shopledger: local record store for a small shop.
//!
//! Usage:
//!     shopledger migrate
//!     shopledger import ./Loja_2024-06-01_09-05
//!     shopledger export [--products-only | --report]
//!     shopledger report --days 30 --top 10
//!     shopledger verify

mod config;

use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use shopledger_exchange::{Exporter, ImportOutcome, ReconciliationEngine};
use shopledger_observability::LogFormat;
use shopledger_reports::{Dataset, FinancialSummary, TopProduct, summarize, top_products, windowed};
use shopledger_store::{Ledger, SchemaStore, Store};

use config::{Config, Overrides};

#[derive(Parser, Debug)]
#[command(name = "shopledger", about = "Local record store for products, customers and orders")]
struct Args {
    /// SQLite store file
    #[arg(long, global = true, env = config::DB_ENV)]
    db: Option<PathBuf>,

    /// Directory exports are written under
    #[arg(long, global = true, env = config::EXPORT_DIR_ENV)]
    export_dir: Option<PathBuf>,

    /// `allow` or `reject` writes that leave an order overpaid
    #[arg(long, global = true, env = config::OVERPAYMENT_ENV)]
    overpayment: Option<String>,

    /// Log output: `json` or `compact`
    #[arg(long, global = true, default_value = "compact")]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bring the store to the current schema
    Migrate,
    /// Compare every table with its expected shape without changing anything
    Verify,
    /// Add the content of an exported workbook directory to the store
    Import {
        /// Directory holding Produtos.csv, Clientes.csv and Pedidos.csv
        dir: PathBuf,
    },
    /// Write a workbook under the export directory
    Export {
        /// Only the products sheet
        #[arg(long, conflicts_with = "report")]
        products_only: bool,
        /// Financial summary and best sellers instead of the records
        #[arg(long)]
        report: bool,
    },
    /// Print revenue, cost, profit and best sellers
    Report {
        /// Trailing window for the second summary
        #[arg(long, default_value_t = 30)]
        days: u32,
        /// How many best sellers to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

#[derive(Serialize)]
struct ReportView {
    all_time: FinancialSummary,
    window_days: u32,
    window: FinancialSummary,
    top_products: Vec<TopProduct>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let format = LogFormat::parse(&args.log_format)
        .with_context(|| format!("invalid log format {:?}", args.log_format))?;
    shopledger_observability::init_with(format);

    let config = Config::load(Overrides {
        db_path: args.db,
        export_dir: args.export_dir,
        overpayment: args.overpayment,
    })?;

    let store = Store::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open store at {}", config.db_path.display()))?;
    let schema = SchemaStore::new(store.clone());
    let migrated = schema
        .ensure_schema()
        .await
        .context("failed to bring the store to the current schema")?;

    let result = run(args.command, &config, &store, &schema, migrated).await;
    store.close().await;
    result
}

async fn run(
    command: Command,
    config: &Config,
    store: &Store,
    schema: &SchemaStore,
    migrated: shopledger_store::SchemaReport,
) -> anyhow::Result<()> {
    match command {
        Command::Migrate => {
            print_json(&migrated)?;
        }
        Command::Verify => {
            let drift = schema.verify().await?;
            print_json(&drift)?;
            if drift.iter().any(|d| !d.is_clean()) {
                bail!("schema drift detected");
            }
        }
        Command::Import { dir } => {
            let engine = ReconciliationEngine::with_ledger(
                Ledger::new(store.clone()).with_policy(config.overpayment),
            );
            let outcome = ImportOutcome::from(engine.import_dir(&dir).await);
            println!("{}", outcome.message);
            if let Some(report) = &outcome.report {
                for error in &report.row_errors {
                    println!("  erro: {error}");
                }
                for warning in &report.warnings {
                    println!("  aviso: {warning}");
                }
            }
            if !outcome.success {
                bail!("import of {} failed", dir.display());
            }
        }
        Command::Export {
            products_only,
            report,
        } => {
            let exporter = Exporter::new(store.clone());
            let at = Local::now().naive_local();
            let path = if products_only {
                exporter.export_products(&config.export_dir, at).await?
            } else if report {
                exporter.export_report(&config.export_dir, Utc::now()).await?
            } else {
                exporter.export_all(&config.export_dir, at).await?
            };
            println!("{}", path.display());
        }
        Command::Report { days, top } => {
            let data = Dataset::load(store).await?;
            let view = ReportView {
                all_time: summarize(&data),
                window_days: days,
                window: windowed(&data, days, Utc::now()),
                top_products: top_products(&data, top),
            };
            print_json(&view)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_line_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn export_flags_are_exclusive() {
        let parsed = Args::try_parse_from(["shopledger", "export", "--products-only", "--report"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn report_defaults() {
        let args = Args::try_parse_from(["shopledger", "report"]).unwrap();
        match args.command {
            Command::Report { days, top } => {
                assert_eq!(days, 30);
                assert_eq!(top, 10);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test]
    async fn import_of_an_export_round_trips_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            db_path: dir.path().join("store.db"),
            export_dir: dir.path().join("exports"),
            overpayment: Default::default(),
        };
        let store = Store::open(&config.db_path).await.unwrap();
        let schema = SchemaStore::new(store.clone());
        let migrated = schema.ensure_schema().await.unwrap();

        run(
            Command::Export {
                products_only: false,
                report: false,
            },
            &config,
            &store,
            &schema,
            migrated.clone(),
        )
        .await
        .unwrap();
        let exported = std::fs::read_dir(&config.export_dir)
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();

        run(Command::Import { dir: exported }, &config, &store, &schema, migrated)
            .await
            .unwrap();
    }
}
