//! renal-mri-trends - cumulative renal MRI publications per technique
//!
//! Searches PubMed once per (technique, year), removes records already
//! counted, saves counts and queries as JSON, and plots cumulative totals.
//!
//! ## Usage
//!
//! ```bash
//! renal-mri-trends search --email you@example.org
//! renal-mri-trends plot
//! renal-mri-trends run --email you@example.org --output ./output
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use renal_mri_trends::aggregate;
use renal_mri_trends::config::{DedupScope, OutputPaths, RequestPolicy, SurveyConfig};
use renal_mri_trends::entrez::EntrezClient;
use renal_mri_trends::persist;
use renal_mri_trends::plot::{self, PlotOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Cumulative renal MRI publications per technique, from PubMed
#[derive(Parser)]
#[command(name = "renal-mri-trends")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query PubMed and save counts and queries as JSON
    Search {
        #[command(flatten)]
        search: SearchArgs,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Plot cumulative counts from a previous search
    Plot {
        #[command(flatten)]
        plot: PlotArgs,

        /// Directory holding n_ids.json; the chart is written there too
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Search, then plot
    Run {
        #[command(flatten)]
        search: SearchArgs,

        #[command(flatten)]
        plot: PlotArgs,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Contact email sent to NCBI with every request (required by NCBI)
    #[arg(long, env = "NCBI_EMAIL")]
    email: String,

    /// NCBI API key (allows a shorter --delay-ms)
    #[arg(long, env = "NCBI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Pause between requests in milliseconds (default keeps under 3 req/s)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Which earlier records a result is deduplicated against
    #[arg(long, value_enum, default_value_t = DedupArg::Across)]
    dedup: DedupArg,

    /// Alternative E-utilities base URL
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Args)]
struct PlotArgs {
    /// First year on the x axis
    #[arg(long)]
    from_year: Option<i32>,

    /// Last year on the x axis
    #[arg(long)]
    to_year: Option<i32>,

    /// Chart caption
    #[arg(long)]
    caption: Option<String>,

    /// Also export the cumulative series as CSV
    #[arg(long)]
    series_csv: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DedupArg {
    /// A record counts once across all techniques
    Across,
    /// A record counts once per technique
    Within,
}

impl From<DedupArg> for DedupScope {
    fn from(arg: DedupArg) -> Self {
        match arg {
            DedupArg::Across => DedupScope::AcrossTechniques,
            DedupArg::Within => DedupScope::WithinTechnique,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Search { search, output } => run_search(&search, &output).await?,
        Commands::Plot { plot, output } => run_plot(&plot, &output)?,
        Commands::Run {
            search,
            plot,
            output,
        } => {
            run_search(&search, &output).await?;
            run_plot(&plot, &output)?;
        }
    }

    Ok(())
}

// ============================================================================
// Stages
// ============================================================================

fn build_config(args: &SearchArgs, output_dir: &Path) -> SurveyConfig {
    let mut policy = RequestPolicy {
        api_key: args.api_key.clone(),
        ..RequestPolicy::default()
    };
    if let Some(ms) = args.delay_ms {
        policy.delay = Duration::from_millis(ms);
    }

    let mut config = SurveyConfig::new(args.email.clone());
    config.dedup = args.dedup.into();
    config.policy = policy;
    config.output = OutputPaths::in_dir(output_dir);
    config
}

async fn run_search(args: &SearchArgs, output_dir: &Path) -> Result<()> {
    let config = build_config(args, output_dir);
    config.validate().context("Invalid search configuration")?;

    std::fs::create_dir_all(output_dir).context("Failed to create output directory")?;

    println!("\n--- Searching PubMed ---");
    println!(
        "{} techniques x {} years = {} queries (~{}s at the current pace)",
        config.techniques.len(),
        config.years().count(),
        config.query_count(),
        (config.policy.delay * config.query_count() as u32).as_secs()
    );

    let client = match &args.base_url {
        Some(base) => EntrezClient::with_base_url(base, &config.email, config.policy.clone())?,
        None => EntrezClient::new(&config.email, config.policy.clone())?,
    };

    let outcome = aggregate::run_survey(&client, &config)
        .await
        .context("PubMed search failed")?;

    persist::save_outcome(&config.output, &outcome).context("Failed to save search results")?;

    let mut totals = aggregate::cumulative_series(&outcome.counts);
    aggregate::order_series(&mut totals, &config.labels());
    for series in totals {
        println!("  {:<24} {}", series.technique, series.total());
    }
    println!("Saved: {:?}", config.output.counts);
    println!("Saved: {:?}", config.output.queries);

    Ok(())
}

fn run_plot(args: &PlotArgs, output_dir: &Path) -> Result<()> {
    let paths = OutputPaths::in_dir(output_dir);

    println!("\n--- Plotting ---");

    let counts = persist::read_counts(&paths.counts)
        .with_context(|| format!("Failed to read {:?}; run `search` first", paths.counts))?;

    let year_range = match (args.from_year, args.to_year) {
        (None, None) => None,
        (from, to) => {
            let years = counts.values().flat_map(|yearly| yearly.keys().copied());
            let first = from.or_else(|| years.clone().min());
            let last = to.or_else(|| years.max());
            first.zip(last)
        }
    };

    let options = PlotOptions {
        year_range,
        caption: args.caption.clone(),
        technique_order: SurveyConfig::default_labels(),
        ..PlotOptions::default()
    };

    let series = plot::render_chart(&paths.plot, &counts, &options).context("Failed to render chart")?;
    println!("Saved: {:?}", paths.plot);

    if let Some(csv_path) = &args.series_csv {
        persist::write_series_csv(csv_path, &series).context("Failed to export series CSV")?;
        println!("Saved: {:?}", csv_path);
    }

    Ok(())
}
