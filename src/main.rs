use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod dashboard;
mod db;
mod error;
mod import;
mod metrics;
mod models;
mod period;
mod report;
mod store;

use config::{DatabaseConfig, ServeConfig};
use import::{BulkImporter, Category, ImportResponse};
use models::FilterSet;
use store::{MetricsSource, PgStore};

#[derive(Parser)]
#[command(name = "clinic-metrics")]
#[command(about = "Revenue, conversion and NPS metrics by unit and attendant", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    database: DatabaseConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct FilterArgs {
    /// Period to include (YYYY-MM); repeat for several
    #[arg(long = "period")]
    periods: Vec<String>,
    /// Unit name to include; repeat for several
    #[arg(long = "unit")]
    units: Vec<String>,
    /// Attendant name to include; repeat for several
    #[arg(long = "attendant")]
    attendants: Vec<String>,
    #[arg(long, default_value_t = 10)]
    top: usize,
}

impl FilterArgs {
    fn filters(&self) -> FilterSet {
        FilterSet::new(
            self.periods.iter().cloned(),
            self.units.iter().cloned(),
            self.attendants.iter().cloned(),
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo units, attendants and metrics
    Seed,
    /// Import a JSON batch or a single-category CSV file
    #[command(group(
        ArgGroup::new("source")
            .args(["json", "csv"])
            .required(true)
            .multiple(false)
    ))]
    Import {
        #[arg(long)]
        json: Option<PathBuf>,
        #[arg(long, requires = "category")]
        csv: Option<PathBuf>,
        #[arg(long, value_enum)]
        category: Option<Category>,
    },
    /// Print KPI cards and rankings for a selection
    Dashboard {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Run the HTTP service
    Serve {
        #[command(flatten)]
        config: ServeConfig,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinic_metrics=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let pool = cli
        .database
        .connect()
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import {
            json,
            csv,
            category,
        } => {
            let batch = match (json, csv, category) {
                (Some(path), _, _) => import::files::load_json(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, Some(path), Some(category)) => import::files::load_csv(&path, category)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                _ => anyhow::bail!("--csv needs --category"),
            };
            info!(rows = batch.total_rows(), "importing batch");
            let response = ImportResponse::from(BulkImporter::new(&store).run(&batch).await);

            println!("{}", response.message);
            for category in Category::ALL {
                let result = response.results.get(category);
                println!("- {}: {} written", category.key(), result.success);
                for error in &result.errors {
                    println!("    {error}");
                }
            }
            if !response.success {
                anyhow::bail!("import finished with errors");
            }
        }
        Commands::Dashboard { filters } => {
            let records = store.fetch_metric_records().await?;
            let view = dashboard::build_dashboard(&records, &filters.filters(), filters.top.max(1));

            if view.current.record_count == 0 {
                println!("No records found for this selection.");
                return Ok(());
            }

            println!("Key indicators ({} records):", view.current.record_count);
            for card in &view.kpis {
                println!("- {}", report::format_kpi(card));
            }
            println!("Top attendants by revenue:");
            for group in &view.revenue_by_attendant {
                println!("- {} {:.2} across {} months", group.label, group.value, group.count);
            }
        }
        Commands::Report { filters, out } => {
            let records = store.fetch_metric_records().await?;
            let view = dashboard::build_dashboard(&records, &filters.filters(), filters.top.max(1));
            let report = report::build_report(&view);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Serve { config } => {
            config.validate()?;
            let state = api::AppState {
                store: Arc::new(store),
                token: Arc::from(config.token.as_str()),
                top_n: config.top_n,
            };
            api::serve(&config, state).await?;
        }
    }

    Ok(())
}
