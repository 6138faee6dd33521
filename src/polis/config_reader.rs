use crate::polis::*;

use serde::{Deserialize, Serialize};
use std::fs;

pub const DEFAULT_MIN_VOTES: usize = 7;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_OUTPUT_PATH: &str = "participants.geojson";
/// Replaced in the output path by the id of the loaded conversation or report.
pub const POLIS_ID_PLACEHOLDER: &str = "{polis_id}";

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSettings {
    #[serde(rename = "polisUrl")]
    pub polis_url: Option<String>,
    #[serde(rename = "polisId")]
    pub polis_id: Option<String>,
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
    #[serde(rename = "importDir")]
    pub import_dir: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportSettings {
    #[serde(rename = "timeoutSecs")]
    pub timeout_secs: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RegionSettings {
    pub name: String,
    #[serde(rename = "sizeRank")]
    pub size_rank: u32,
    #[serde(rename = "statementIds")]
    pub statement_ids: Vec<StatementId>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OtherSettings {
    pub center: [f64; 2],
    pub radius: f64,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeographicSettings {
    #[serde(rename = "geojsonPath")]
    pub geojson_path: Option<String>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
    pub regions: Option<Vec<RegionSettings>>,
    pub other: Option<OtherSettings>,
    pub seed: Option<u64>,
}

impl GeographicSettings {
    /// The configured regions, or the San Juan islands.
    pub fn region_table(&self) -> PolisResult<RegionTable> {
        match &self.regions {
            None => Ok(RegionTable::san_juan_islands()),
            Some(regions) => {
                let regions: Vec<Region> = regions
                    .iter()
                    .map(|r| Region {
                        name: r.name.clone(),
                        size_rank: r.size_rank,
                        statement_ids: r.statement_ids.clone(),
                    })
                    .collect();
                RegionTable::new(regions).context(RegionTableSnafu {})
            }
        }
    }

    pub fn other_disk(&self) -> OtherDisk {
        match &self.other {
            Some(o) => OtherDisk {
                center: Coordinate::new(o.center[0], o.center[1]),
                radius: o.radius,
            },
            None => OtherDisk::DEFAULT,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoConfig {
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(rename = "minVotesThreshold")]
    pub min_votes_threshold: Option<usize>,
    pub transport: Option<TransportSettings>,
    #[serde(default)]
    pub geographic: GeographicSettings,
}

impl GeoConfig {
    pub fn min_votes(&self) -> usize {
        self.min_votes_threshold.unwrap_or(DEFAULT_MIN_VOTES)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.transport
            .as_ref()
            .and_then(|t| t.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    /// The output path, with the placeholder replaced by the given id.
    pub fn output_path(&self, polis_id: &str) -> String {
        self.geographic
            .output_path
            .as_deref()
            .unwrap_or(DEFAULT_OUTPUT_PATH)
            .replace(POLIS_ID_PLACEHOLDER, polis_id)
    }
}

pub fn read_config(path: &str) -> PolisResult<GeoConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })
}
