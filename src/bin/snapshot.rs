//! Snapshot CLI - Command-line interface for microsim-snapshot
//!
//! Commands:
//! - flatten: Flatten an individuals table into place-id and weight tables
//! - validate: Report every individual that cannot be flattened
//! - lookup: Map a category-local location to its global place id
//! - locate: Map a global place id back to its category and local id
//! - layout: Print the category spans and slot layout

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use microsim_snapshot::config::SnapshotConfig;
use microsim_snapshot::encoder::SnapshotEncoder;
use microsim_snapshot::flattener::PersonFlowFlattener;
use microsim_snapshot::schema::IndividualsTable;
use microsim_snapshot::types::{GlobalPlaceId, Individual, SlotOrder};
use microsim_snapshot::{Snapshotter, CRATE_VERSION};

/// Snapshot - global place indexing and flow flattening for microsimulation
#[derive(Parser)]
#[command(name = "snapshot")]
#[command(version = CRATE_VERSION)]
#[command(about = "Flatten individuals' activity flows into fixed-width snapshot tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten an individuals table into place-id and weight tables
    Flatten {
        /// Snapshot configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Individuals table (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Override the configured slot order
        #[arg(long)]
        slot_order: Option<SlotOrderArg>,
    },

    /// Report every individual that cannot be flattened
    Validate {
        /// Snapshot configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Individuals table (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Map a category-local location to its global place id
    Lookup {
        /// Snapshot configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Activity category name
        category: String,

        /// Category-local location id
        #[arg(allow_negative_numbers = true)]
        local_id: i64,
    },

    /// Map a global place id back to its category and local id
    Locate {
        /// Snapshot configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Global place id
        global_id: GlobalPlaceId,
    },

    /// Print the category spans and slot layout
    Layout {
        /// Snapshot configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Individuals table used for observed padding widths
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// JSON array of records
    Json,
    /// Newline-delimited JSON (one record per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Snapshot payload as compact JSON
    Json,
    /// Snapshot payload as pretty-printed JSON
    JsonPretty,
    /// One row per line: person id, place ids, weights
    NdjsonRows,
}

#[derive(Clone, Copy, ValueEnum)]
enum SlotOrderArg {
    /// Category blocks in category order
    CategoryOrder,
    /// Heaviest slots first
    WeightDescending,
}

impl From<SlotOrderArg> for SlotOrder {
    fn from(arg: SlotOrderArg) -> Self {
        match arg {
            SlotOrderArg::CategoryOrder => SlotOrder::CategoryOrder,
            SlotOrderArg::WeightDescending => SlotOrder::WeightDescending,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SnapshotCliError> {
    match cli.command {
        Commands::Flatten {
            config,
            input,
            output,
            input_format,
            output_format,
            slot_order,
        } => cmd_flatten(
            &config,
            &input,
            &output,
            input_format,
            output_format,
            slot_order.map(SlotOrder::from),
        ),

        Commands::Validate {
            config,
            input,
            input_format,
            json,
        } => cmd_validate(&config, &input, input_format, json),

        Commands::Lookup {
            config,
            category,
            local_id,
        } => cmd_lookup(&config, &category, local_id),

        Commands::Locate { config, global_id } => cmd_locate(&config, global_id),

        Commands::Layout {
            config,
            input,
            input_format,
            json,
        } => cmd_layout(&config, input.as_deref(), input_format, json),
    }
}

fn cmd_flatten(
    config_path: &Path,
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    slot_order: Option<SlotOrder>,
) -> Result<(), SnapshotCliError> {
    let mut config = load_config(config_path)?;
    if let Some(slot_order) = slot_order {
        config.slot_order = slot_order;
    }

    let individuals = load_individuals(input, &input_format, &config)?;
    if individuals.is_empty() {
        return Err(SnapshotCliError::NoIndividuals);
    }

    let snapshotter = Snapshotter::from_config(&config, individuals)?;
    let encoder = SnapshotEncoder::new();

    let output_data = match output_format {
        OutputFormat::Json => serde_json::to_string(&encoder.encode(&snapshotter)?)?,
        OutputFormat::JsonPretty => encoder.encode_to_json(&snapshotter)?,
        OutputFormat::NdjsonRows => {
            let tables = snapshotter.get_people_place_data()?;
            let mut lines: Vec<String> = Vec::with_capacity(tables.rows());
            for row in tables.iter_rows() {
                lines.push(serde_json::to_string(&RowRecord {
                    person_id: row.person_id,
                    place_ids: row.place_ids,
                    weights: row.weights,
                })?);
            }
            lines.join("\n") + "\n"
        }
    };

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(
    config_path: &Path,
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), SnapshotCliError> {
    let config = load_config(config_path)?;
    let individuals = load_individuals(input, &input_format, &config)?;
    let snapshotter = Snapshotter::from_config(&config, individuals)?;

    let flattener =
        PersonFlowFlattener::new(snapshotter.indexer(), snapshotter.layout().clone())?;

    let errors: Vec<ValidationErrorDetail> = snapshotter
        .individuals()
        .iter()
        .enumerate()
        .filter_map(|(index, person)| {
            flattener
                .flatten(std::slice::from_ref(person))
                .err()
                .map(|e| ValidationErrorDetail {
                    index,
                    person_id: person.id,
                    error: e.to_string(),
                })
        })
        .collect();

    let total = snapshotter.individuals().len();
    let report = ValidationReport {
        total_individuals: total,
        valid_individuals: total - errors.len(),
        invalid_individuals: errors.len(),
        row_width: snapshotter.layout().width(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total individuals:   {}", report.total_individuals);
        println!("Valid individuals:   {}", report.valid_individuals);
        println!("Invalid individuals: {}", report.invalid_individuals);
        println!("Row width:           {}", report.row_width);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Person {} (row {}): {}",
                    err.person_id, err.index, err.error
                );
            }
        }
    }

    if report.invalid_individuals > 0 {
        Err(SnapshotCliError::ValidationFailed(report.invalid_individuals))
    } else {
        Ok(())
    }
}

fn cmd_lookup(config_path: &Path, category: &str, local_id: i64) -> Result<(), SnapshotCliError> {
    let indexer = load_config(config_path)?.build_indexer()?;
    let global_id = indexer.get_global_id(category, local_id)?;
    println!("{}", global_id);
    Ok(())
}

fn cmd_locate(config_path: &Path, global_id: GlobalPlaceId) -> Result<(), SnapshotCliError> {
    let indexer = load_config(config_path)?.build_indexer()?;
    let (category, local_id) = indexer
        .locate(global_id)
        .ok_or(SnapshotCliError::UnknownPlace(global_id))?;
    println!("{} {}", category, local_id);
    Ok(())
}

fn cmd_layout(
    config_path: &Path,
    input: Option<&Path>,
    input_format: InputFormat,
    json: bool,
) -> Result<(), SnapshotCliError> {
    let config = load_config(config_path)?;
    let individuals = match input {
        Some(path) => load_individuals(path, &input_format, &config)?,
        None => Vec::new(),
    };
    let snapshotter = Snapshotter::from_config(&config, individuals)?;

    let report = LayoutReport {
        total_places: snapshotter.indexer().total_places(),
        row_width: snapshotter.layout().width(),
        categories: snapshotter
            .indexer()
            .spans()
            .iter()
            .zip(snapshotter.layout().blocks())
            .map(|(span, block)| LayoutEntry {
                name: span.name.clone(),
                offset: span.offset,
                location_count: span.count,
                slot_start: block.start,
                padding_width: block.width,
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{:<20} {:>10} {:>10} {:>10} {:>10}", "category", "offset", "places", "slot", "width");
        for entry in &report.categories {
            println!(
                "{:<20} {:>10} {:>10} {:>10} {:>10}",
                entry.name, entry.offset, entry.location_count, entry.slot_start, entry.padding_width
            );
        }
        println!("\nTotal places: {}", report.total_places);
        println!("Row width:    {}", report.row_width);
    }

    Ok(())
}

// Helper functions

fn load_config(path: &Path) -> Result<SnapshotConfig, SnapshotCliError> {
    let content = fs::read_to_string(path)?;
    Ok(SnapshotConfig::from_json(&content)?)
}

fn load_individuals(
    input: &Path,
    input_format: &InputFormat,
    config: &SnapshotConfig,
) -> Result<Vec<Individual>, SnapshotCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(SnapshotCliError::StdinIsTerminal);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let categories = config.category_names();
    let individuals = match input_format {
        InputFormat::Json => IndividualsTable::parse_array(&input_data, &categories)?,
        InputFormat::Ndjson => IndividualsTable::parse_ndjson(&input_data, &categories)?,
    };
    Ok(individuals)
}

// Error types

#[derive(Debug)]
enum SnapshotCliError {
    Io(io::Error),
    Snapshot(microsim_snapshot::SnapshotError),
    Json(serde_json::Error),
    NoIndividuals,
    StdinIsTerminal,
    UnknownPlace(GlobalPlaceId),
    ValidationFailed(usize),
}

impl From<io::Error> for SnapshotCliError {
    fn from(e: io::Error) -> Self {
        SnapshotCliError::Io(e)
    }
}

impl From<microsim_snapshot::SnapshotError> for SnapshotCliError {
    fn from(e: microsim_snapshot::SnapshotError) -> Self {
        SnapshotCliError::Snapshot(e)
    }
}

impl From<serde_json::Error> for SnapshotCliError {
    fn from(e: serde_json::Error) -> Self {
        SnapshotCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SnapshotCliError> for CliError {
    fn from(e: SnapshotCliError) -> Self {
        match e {
            SnapshotCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SnapshotCliError::Snapshot(e) => CliError {
                code: "SNAPSHOT_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'snapshot validate' for per-individual details".to_string()),
            },
            SnapshotCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SnapshotCliError::NoIndividuals => CliError {
                code: "NO_INDIVIDUALS".to_string(),
                message: "No individuals found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            SnapshotCliError::StdinIsTerminal => CliError {
                code: "NO_INPUT".to_string(),
                message: "Input is stdin but stdin is a terminal".to_string(),
                hint: Some("Pipe the individuals table in or pass --input <file>".to_string()),
            },
            SnapshotCliError::UnknownPlace(id) => CliError {
                code: "UNKNOWN_PLACE".to_string(),
                message: format!("Global place id {} is past the last category", id),
                hint: Some("Run 'snapshot layout' to see the id spans".to_string()),
            },
            SnapshotCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} individuals failed validation", count),
                hint: Some("Fix the individuals table or widen the padding".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct RowRecord<'a> {
    person_id: u64,
    place_ids: &'a [GlobalPlaceId],
    weights: &'a [f64],
}

#[derive(serde::Serialize)]
struct ValidationReport {
    total_individuals: usize,
    valid_individuals: usize,
    invalid_individuals: usize,
    row_width: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    person_id: u64,
    error: String,
}

#[derive(serde::Serialize)]
struct LayoutReport {
    total_places: u64,
    row_width: usize,
    categories: Vec<LayoutEntry>,
}

#[derive(serde::Serialize)]
struct LayoutEntry {
    name: String,
    offset: GlobalPlaceId,
    location_count: usize,
    slot_start: usize,
    padding_width: usize,
}
