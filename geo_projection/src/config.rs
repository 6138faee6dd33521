// ********* Input data structures ***********

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

use crate::geometry::Coordinate;

pub type ParticipantId = u64;
pub type StatementId = u64;

/// The name of the placeholder region for participants who did not pick any region.
pub const OTHER_REGION: &str = "Other";

/// One vote of a participant on a statement.
///
/// The value follows the export convention: 1 is an agreement, -1 a disagreement
/// and 0 a pass.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct Vote {
    pub participant_id: ParticipantId,
    pub statement_id: StatementId,
    pub vote: i64,
}

impl Vote {
    pub const AGREE: i64 = 1;

    pub fn is_affirmative(&self) -> bool {
        self.vote == Vote::AGREE
    }
}

// ******** Output data structures *********

/// The synthetic location of a participant.
#[derive(PartialEq, Debug, Clone)]
pub struct Placement {
    pub participant_id: ParticipantId,
    pub region: String,
    pub coordinate: Coordinate,
}

/// Errors raised by a malformed region configuration or geometry.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum GeoErrors {
    /// The same statement is mapped to two different regions.
    DuplicateStatement {
        statement_id: StatementId,
        first: String,
        second: String,
    },
    DuplicateRegion(String),
    /// A configured region uses the name reserved for the placeholder region.
    ReservedRegionName,
    /// A polygon with fewer than three vertices in its exterior ring.
    EmptyGeometry,
}

impl Error for GeoErrors {}

impl Display for GeoErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoErrors::DuplicateStatement {
                statement_id,
                first,
                second,
            } => write!(
                f,
                "statement {} is mapped to both {:?} and {:?}",
                statement_id, first, second
            ),
            GeoErrors::DuplicateRegion(name) => write!(f, "region {:?} is declared twice", name),
            GeoErrors::ReservedRegionName => {
                write!(f, "the region name {:?} is reserved", OTHER_REGION)
            }
            GeoErrors::EmptyGeometry => {
                write!(f, "a polygon needs at least three vertices")
            }
        }
    }
}

// ********* Configuration **********

/// A named region that participants can be assigned to.
///
/// `size_rank` orders the regions by size: a higher rank is a larger region.
/// When a participant points at several regions, the one with the lowest rank wins.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Region {
    pub name: String,
    pub size_rank: u32,
    pub statement_ids: Vec<StatementId>,
}

/// The circular area where the participants without a region are placed.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct OtherDisk {
    pub center: Coordinate,
    pub radius: f64,
}

impl OtherDisk {
    // East of the San Juan islands.
    pub const DEFAULT: OtherDisk = OtherDisk {
        center: Coordinate {
            x: -122.5,
            y: 48.5,
        },
        radius: 0.1,
    };
}

/// The fixed set of regions and the statements that point to them.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RegionTable {
    regions: Vec<Region>,
    // statement id -> index in regions
    by_statement: HashMap<StatementId, usize>,
}

impl RegionTable {
    pub fn new(regions: Vec<Region>) -> Result<RegionTable, GeoErrors> {
        let mut by_statement: HashMap<StatementId, usize> = HashMap::new();
        for (idx, region) in regions.iter().enumerate() {
            if region.name == OTHER_REGION {
                return Err(GeoErrors::ReservedRegionName);
            }
            if regions[..idx].iter().any(|r| r.name == region.name) {
                return Err(GeoErrors::DuplicateRegion(region.name.clone()));
            }
            for sid in region.statement_ids.iter() {
                if let Some(&prev) = by_statement.get(sid) {
                    return Err(GeoErrors::DuplicateStatement {
                        statement_id: *sid,
                        first: regions[prev].name.clone(),
                        second: region.name.clone(),
                    });
                }
                by_statement.insert(*sid, idx);
            }
        }
        Ok(RegionTable {
            regions,
            by_statement,
        })
    }

    /// The San Juan islands, with statements 64 to 67 of the original survey.
    pub fn san_juan_islands() -> RegionTable {
        let islands = [
            ("Orcas Island", 3, 64),
            ("Lopez Island", 2, 65),
            ("San Juan Island", 4, 66),
            ("Shaw Island", 1, 67),
        ];
        let regions: Vec<Region> = islands
            .iter()
            .map(|(name, size_rank, sid)| Region {
                name: name.to_string(),
                size_rank: *size_rank,
                statement_ids: vec![*sid],
            })
            .collect();
        let by_statement = islands
            .iter()
            .enumerate()
            .map(|(idx, (_, _, sid))| (*sid, idx))
            .collect();
        RegionTable {
            regions,
            by_statement,
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region_for_statement(&self, statement_id: StatementId) -> Option<&Region> {
        self.by_statement
            .get(&statement_id)
            .map(|idx| &self.regions[*idx])
    }
}
