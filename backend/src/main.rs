//! Freight Emissions CLI - Estimate CO2e for shipment CSV files
//!
//! # Main Commands
//!
//! ```bash
//! freight-emissions serve                     # Start HTTP server (port 3000)
//! freight-emissions process shipments.csv     # Estimate and write freight-emissions-<date>.csv
//! freight-emissions estimate --origin Shanghai --destination Rotterdam --mode sea --weight 12000
//! ```
//!
//! # Utility Commands
//!
//! ```bash
//! freight-emissions parse shipments.csv       # Parse CSV to JSON rows
//! freight-emissions validate shipments.csv    # Report row validation errors
//! freight-emissions export shipments.csv      # Re-export rows without estimating
//! freight-emissions factors                   # Show the configured selector table
//! freight-emissions calibrate -o factors.json # Discover working selectors
//! ```

use clap::{Parser, Subcommand};
use freight_emissions::{
    config::DEFAULT_PORT, discover_selectors, export_to_csv, prepare, process_csv,
    server::start_server, write_export, EmissionsClient, EstimateRequest, Settings,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "freight-emissions")]
#[command(about = "Validate freight shipment CSVs and estimate their CO2e emissions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output its rows as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the rows of a CSV file
    Validate {
        /// Input CSV file
        input: PathBuf,
    },

    /// Full pipeline: CSV → validation → Climatiq → dated CSV export
    Process {
        /// Input CSV file
        input: PathBuf,

        /// Directory for the export file (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emission factor table (overrides EMISSION_FACTORS_FILE)
        #[arg(short, long)]
        factors: Option<PathBuf>,
    },

    /// Re-export the parsed rows as CSV without estimating
    Export {
        /// Input CSV file
        input: PathBuf,

        /// Directory for the export file (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Estimate a single shipment
    Estimate {
        #[arg(long)]
        origin: String,

        #[arg(long)]
        destination: String,

        /// air, sea, road or rail
        #[arg(long)]
        mode: String,

        /// Weight in kilograms
        #[arg(long)]
        weight: f64,

        /// Emission factor table (overrides EMISSION_FACTORS_FILE)
        #[arg(short, long)]
        factors: Option<PathBuf>,
    },

    /// Show the configured emission factor selectors
    Factors {
        /// Emission factor table (overrides EMISSION_FACTORS_FILE)
        #[arg(short, long)]
        factors: Option<PathBuf>,
    },

    /// Search the Climatiq catalog for working selectors
    Calibrate {
        /// Write the recommended selector table to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Emission factor table (overrides EMISSION_FACTORS_FILE)
        #[arg(short, long)]
        factors: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Validate { input } => cmd_validate(&input),

        Commands::Process { input, output, factors } => {
            cmd_process(&input, output.as_deref(), factors.as_deref()).await
        }

        Commands::Export { input, output } => cmd_export(&input, output.as_deref()),

        Commands::Estimate { origin, destination, mode, weight, factors } => {
            let request = EstimateRequest::new(origin, destination, mode, weight);
            cmd_estimate(&request, factors.as_deref()).await
        }

        Commands::Factors { factors } => cmd_factors(factors.as_deref()),

        Commands::Calibrate { output } => cmd_calibrate(output.as_deref()).await,

        Commands::Serve { port, factors } => cmd_serve(port, factors.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn load_settings(factors: Option<&Path>) -> Result<Settings, Box<dyn std::error::Error>> {
    let settings = match factors {
        Some(path) => Settings::load(Some(path))?,
        None => Settings::from_env()?,
    };
    Ok(settings)
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let prepared = prepare(&fs::read(input)?)?;
    let json = serde_json::to_string_pretty(&prepared.rows)?;
    write_output(&json, output)
}

fn cmd_validate(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let prepared = prepare(&fs::read(input)?)?;

    if prepared.errors.is_empty() {
        eprintln!("✅ All {} rows valid!", prepared.rows.len());
        return Ok(());
    }

    eprintln!(
        "⚠️  {} valid, {} invalid",
        prepared.validation.valid, prepared.validation.invalid
    );
    for error in &prepared.errors {
        println!("  Row {} [{}]: {}", error.row, error.field, error.message);
    }
    Ok(())
}

async fn cmd_process(
    input: &Path,
    output: Option<&Path>,
    factors: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings(factors)?;
    let bytes = fs::read(input)?;

    let report = process_csv(&bytes, &settings, |progress| {
        if let Some(result) = &progress.result {
            eprintln!("   [{:>3}%] {}", progress.percent, result.status);
        }
    })
    .await?;

    let summary = report.summary;
    eprintln!();
    eprintln!("📊 SUMMARY");
    eprintln!("   Rows:       {} (of {} in file)", report.rows.len(), report.csv_info.total_rows);
    eprintln!("   Succeeded:  {}", summary.succeeded);
    eprintln!("   Failed:     {}", summary.failed);
    eprintln!("   Invalid:    {}", summary.invalid);

    save_export(report.to_csv()?, output)
}

fn cmd_export(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let prepared = prepare(&fs::read(input)?)?;
    save_export(export_to_csv(&prepared.records())?, output)
}

async fn cmd_estimate(
    request: &EstimateRequest,
    factors: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = EmissionsClient::from_settings(&load_settings(factors)?)?;
    let estimate = client.estimate(request).await?;

    eprintln!(
        "✅ {} {} ({} kg by {}, {})",
        estimate.co2e_kg, estimate.co2e_unit, estimate.weight_kg, estimate.mode, estimate.activity_id
    );
    println!("{}", serde_json::to_string_pretty(&estimate)?);
    Ok(())
}

fn cmd_factors(factors: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings(factors)?;
    println!("{}", settings.selectors.to_json()?);
    Ok(())
}

async fn cmd_calibrate(output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let client = EmissionsClient::from_settings(&Settings::from_env()?)?;
    let report = discover_selectors(&client).await;

    println!("{}", serde_json::to_string_pretty(&report)?);

    let Some(path) = output else {
        return Ok(());
    };

    match report.selector_table() {
        Some(table) => {
            fs::write(path, table.to_json()?)?;
            eprintln!("💾 Selector table written to: {}", path.display());
            eprintln!("   Use it with EMISSION_FACTORS_FILE={}", path.display());
            Ok(())
        }
        None => Err("Not every mode has a working activity_id; no table written".into()),
    }
}

async fn cmd_serve(port: u16, factors: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    start_server(port, load_settings(factors)?).await
}

fn save_export(csv: Option<String>, dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(csv) = csv else {
        eprintln!("⚠️  Nothing to export");
        return Ok(());
    };

    let dir = dir.unwrap_or_else(|| Path::new("."));
    let path = write_export(dir, &csv, chrono::Local::now().date_naive())?;
    eprintln!("💾 Output written to: {}", path.display());
    Ok(())
}

fn write_output(content: &str, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
