use log::{debug, info, warn};

use geo_projection::*;
use snafu::{prelude::*, Snafu};

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value as JSValue;
use text_diff::print_diff;

pub mod config_reader;
pub mod io_common;
pub mod io_directory;
pub mod io_geojson;
pub mod io_remote;
pub mod load_strategy;
pub mod source_id;

use crate::polis::config_reader::*;
use crate::polis::io_remote::{FetchError, Fetcher, HttpFetcher};
use crate::polis::load_strategy::LoadedData;

#[derive(Debug, Snafu)]
pub enum PolisError {
    #[snafu(display("Cannot specify both a polis URL ({url}) and a polis id or base URL"))]
    ConflictingSourceParams { url: String },
    #[snafu(display("Either a polis id, a polis URL or an import directory must be provided"))]
    MissingIdentifier {},
    #[snafu(display("No source to load the data from: no import directory and no polis id"))]
    NoLoadTarget {},
    #[snafu(display(
        "Invalid polis id {id:?}: it must start with 'r' (report id) or a digit (conversation id)"
    ))]
    InvalidIdentifier { id: String },
    #[snafu(display(
        "Invalid polis URL {url}: {reason}. Expected 'https://polis.example.com/{{polis_id}}' or 'https://polis.example.com/report/{{polis_id}}'"
    ))]
    InvalidUrl { url: String, reason: String },
    #[snafu(display("Conversation URL should not contain a report id: {url}"))]
    ReportIdInConversationUrl { url: String },
    #[snafu(display("Invalid region configuration: {source}"))]
    RegionTable { source: GeoErrors },
    #[snafu(display("Missing setting {name}"))]
    MissingSetting { name: String },

    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON content of {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Unexpected JSON content in {path}: expected {expected}"))]
    UnexpectedJson { path: String, expected: String },
    #[snafu(display("Error writing {path}"))]
    WritingJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the CSV content of {url}"))]
    ParsingCsv { source: csv::Error, url: String },
    #[snafu(display("{path} does not contain a conversation_id"))]
    MissingConversationId { path: String },
    #[snafu(display("Column {column:?} is missing or not an integer in row {row} of the votes"))]
    MissingColumn { column: String, row: usize },
    #[snafu(display("Invalid geometry for region {name:?}: {reason}"))]
    InvalidGeometry { name: String, reason: String },

    #[snafu(display("Error building the HTTP client"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("Transport failure: {source}"))]
    Transport { source: FetchError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type PolisResult<T> = Result<T, PolisError>;

/// What a projection run produced.
#[derive(PartialEq, Debug, Clone)]
pub struct ProjectionSummary {
    pub polis_id: String,
    pub output_path: String,
    pub placements: Vec<Placement>,
    pub downgraded: bool,
}

/// Runs the full projection: load the votes, resolve the regions, place the
/// participants and write the feature collection.
pub fn run_projection(
    config: &GeoConfig,
    reference_path: Option<String>,
) -> PolisResult<ProjectionSummary> {
    let timeout = Duration::from_secs(config.timeout_secs());
    let fetcher = HttpFetcher::new(timeout)?;
    run_projection_with(config, &fetcher, reference_path)
}

pub fn run_projection_with<F: Fetcher + ?Sized>(
    config: &GeoConfig,
    fetcher: &F,
    reference_path: Option<String>,
) -> PolisResult<ProjectionSummary> {
    info!("config: {:?}", config);

    // Validate everything that does not need the data first.
    let table = config.geographic.region_table()?;
    let other = config.geographic.other_disk();
    let geojson_path = config
        .geographic
        .geojson_path
        .clone()
        .context(MissingSettingSnafu {
            name: "geographic.geojsonPath",
        })?;
    let shapes = io_geojson::read_region_shapes(&geojson_path)?;
    for region in table.regions() {
        if !shapes.contains_key(&region.name) {
            warn!(
                "Region {:?} has no shape in {}: its participants will not be placed",
                region.name, geojson_path
            );
        }
    }

    let source = &config.source;
    let import_dir: Option<PathBuf> = source.import_dir.as_ref().map(PathBuf::from);
    let identifier = source_id::resolve(
        source.polis_url.as_deref(),
        source.polis_id.as_deref(),
        source.base_url.as_deref(),
        import_dir.is_some(),
    )?;
    let request = load_strategy::select(identifier, import_dir)?;
    info!("Loading data: {:?}", request);
    let loaded: LoadedData = request.load(fetcher)?;
    info!(
        "Loaded {} comments and {} votes for {}",
        loaded.dataset.comments.len(),
        loaded.dataset.votes.len(),
        loaded.polis_id
    );

    let votes = io_common::extract_votes(&loaded.dataset.votes)?;
    let included = included_participants(&votes, config.min_votes());
    info!(
        "{} participants meet the minimum of {} votes",
        included.len(),
        config.min_votes()
    );
    let choices: BTreeMap<ParticipantId, String> = resolve_preferences(&votes, &table, &included);

    let seed = config
        .geographic
        .seed
        .unwrap_or_else(|| seed_from_label(&loaded.polis_id));
    debug!("Placement seed: {}", seed);
    let mut rng = StdRng::seed_from_u64(seed);
    let placements = assign_placements(&choices, &shapes, &other, &mut rng);

    let output_path = config.output_path(&loaded.polis_id);
    let written = io_geojson::write_feature_collection(&output_path, &placements)?;
    info!("Participant GeoJSON saved to: {}", output_path);

    if let Some(reference) = reference_path {
        check_reference(&reference, &written)?;
    }

    Ok(ProjectionSummary {
        polis_id: loaded.polis_id,
        output_path,
        placements,
        downgraded: loaded.downgraded,
    })
}

// The reference is normalized through serde_json so that only the content matters.
fn check_reference(reference_path: &str, written: &str) -> PolisResult<()> {
    let reference: JSValue = io_geojson::read_json_file(reference_path)?;
    let generated: JSValue = serde_json::from_str(written).context(ParsingJsonSnafu {
        path: "<generated>",
    })?;
    if reference != generated {
        let pretty_reference =
            serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {
                path: reference_path,
            })?;
        let pretty_generated =
            serde_json::to_string_pretty(&generated).context(ParsingJsonSnafu {
                path: "<generated>",
            })?;
        warn!("Found differences with the reference file {}", reference_path);
        print_diff(pretty_reference.as_str(), pretty_generated.as_str(), "\n");
        whatever!(
            "Difference detected between the generated feature collection and {}",
            reference_path
        )
    }
    info!("Output matches the reference {}", reference_path);
    Ok(())
}

/// Counts the placements per region.
pub fn region_counts(placements: &[Placement]) -> HashMap<String, usize> {
    let mut res: HashMap<String, usize> = HashMap::new();
    for p in placements.iter() {
        *res.entry(p.region.clone()).or_insert(0) += 1;
    }
    res
}
