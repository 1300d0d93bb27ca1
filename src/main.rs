use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use ted_insights::constants::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use ted_insights::domain::{CpvDivision, IsoCountry};
use ted_insights::{
    logging, metrics, reference, AnalyticsQuery, Config, InMemoryStore, Ingestor, QueryContext,
    QueryFilter,
};

#[derive(Parser)]
#[command(name = "ted_insights")]
#[command(about = "Ingest and query European procurement contracts")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $TED_INSIGHTS_CONFIG, then config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert a JSON array of contract records and publish the admitted ones
    Ingest {
        #[arg(long)]
        file: PathBuf,
    },
    /// Replace the CPV division and ISO country lookup collections
    LoadReference {
        #[arg(long)]
        cpv: Option<PathBuf>,
        #[arg(long)]
        iso: Option<PathBuf>,
    },
    /// Run one analytics query by id (ex3) or name (cpv_bar_1)
    Query {
        name: String,
        /// First year (inclusive)
        #[arg(long)]
        from: Option<i64>,
        /// Last year (inclusive)
        #[arg(long)]
        to: Option<i64>,
        /// Comma-separated ISO alpha-2 codes
        #[arg(long, value_delimiter = ',')]
        countries: Option<Vec<String>>,
        /// CPV division for the histogram query
        #[arg(long)]
        cpv: Option<String>,
    },
    /// List the available queries
    ListQueries,
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .clone()
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let path = config_path(&cli);
    let config = Config::load(&path).with_context(|| format!("loading {}", path.display()))?;
    let _guard = logging::init_logging(&config.logging);
    metrics::init_metrics(&config.metrics)?;

    let snapshot = config.store.snapshot_path.clone();
    let store = Arc::new(InMemoryStore::load_snapshot(&snapshot)?);

    match cli.command {
        Commands::Ingest { file } => {
            let ingestor = Ingestor::new(store.clone(), config.ingest.clone());
            let report = ingestor
                .ingest_file(&file)
                .await
                .with_context(|| format!("ingesting {}", file.display()))?;
            store.save_snapshot(&snapshot)?;

            println!("\n📥 Ingestion results:");
            println!("   Intake records: {}", report.intake);
            println!("   Admitted: {}", report.admitted);
            println!("   Rejected: {}", report.rejected);
            println!("   CPV codes zero-padded: {}", report.leading_zeros);
            println!("   Countries remapped: {}", report.remapped_countries);
            println!("   Published: {}", report.published());
            match &report.analytics_ids {
                Some(ids) => {
                    for id in ids {
                        println!("   ✅ {}", id);
                    }
                }
                None => println!("   ⚠️  Nothing admitted, nothing published"),
            }
        }
        Commands::LoadReference { cpv, iso } => {
            if cpv.is_none() && iso.is_none() {
                anyhow::bail!("pass --cpv and/or --iso");
            }
            if let Some(path) = cpv {
                let rows: Vec<CpvDivision> = reference::read_json_array(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let loaded = reference::load_cpv_divisions(store.as_ref(), &rows).await?;
                println!("📚 Loaded {} CPV divisions", loaded);
            }
            if let Some(path) = iso {
                let rows: Vec<IsoCountry> = reference::read_json_array(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let loaded = reference::load_iso_countries(store.as_ref(), &rows).await?;
                println!("🌍 Loaded {} countries", loaded);
            }
            store.save_snapshot(&snapshot)?;
        }
        Commands::Query {
            name,
            from,
            to,
            countries,
            cpv,
        } => {
            let query = AnalyticsQuery::from_name(&name)?;
            let defaults = QueryFilter::from(&config.query);
            let mut context = QueryContext {
                filter: QueryFilter {
                    min_year: from.unwrap_or(defaults.min_year),
                    max_year: to.unwrap_or(defaults.max_year),
                    countries: countries.unwrap_or(defaults.countries),
                },
                value_ceiling: config.ingest.value_ceiling,
                ..QueryContext::default()
            };
            if let Some(division) = cpv {
                context.cpv_division = division;
            }
            info!("Running {}", query);

            let result = query.execute(store.as_ref(), &context).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::ListQueries => {
            println!("\n📋 Available queries:");
            for query in AnalyticsQuery::all() {
                println!("   {:<5} {:<20} {}", query.id(), query.name(), query.description());
            }
        }
    }

    Ok(())
}
