mod config;
pub mod geometry;
pub mod manual;

use log::{debug, info, warn};
use rand::Rng;

use std::collections::{BTreeMap, BTreeSet, HashMap};

pub use crate::config::*;
pub use crate::geometry::{BoundingBox, Coordinate, Geometry, Polygon};

/// The number of draws in a bounding box before giving up on a region and
/// using its centroid.
pub const MAX_REJECTION_ATTEMPTS: usize = 10_000;

/// The participants who cast at least `min_votes` votes.
///
/// The votes are expected to be deduplicated already: every vote counts,
/// whatever its value.
pub fn included_participants(votes: &[Vote], min_votes: usize) -> BTreeSet<ParticipantId> {
    let mut counts: HashMap<ParticipantId, usize> = HashMap::new();
    for v in votes.iter() {
        *counts.entry(v.participant_id).or_insert(0) += 1;
    }
    let res: BTreeSet<ParticipantId> = counts
        .into_iter()
        .filter_map(|(pid, c)| if c >= min_votes { Some(pid) } else { None })
        .collect();
    debug!(
        "included_participants: {} participants with at least {} votes",
        res.len(),
        min_votes
    );
    res
}

/// Resolves the region of every participant.
///
/// Only the agreements on the statements of the region table are considered.
/// A participant who agreed with statements of several regions is assigned the
/// smallest of these regions (lowest size rank, then name). Included participants
/// without any such agreement are assigned to [OTHER_REGION]. The other participants
/// without agreement do not appear in the output.
///
/// Arguments:
/// * `votes` the deduplicated votes
/// * `table` the regions and the statements that point to them
/// * `included` the participants that must be placed even without a region
pub fn resolve_preferences(
    votes: &[Vote],
    table: &RegionTable,
    included: &BTreeSet<ParticipantId>,
) -> BTreeMap<ParticipantId, String> {
    let mut candidates: BTreeMap<ParticipantId, Vec<&Region>> = BTreeMap::new();
    for v in votes.iter().filter(|v| v.is_affirmative()) {
        if let Some(region) = table.region_for_statement(v.statement_id) {
            candidates.entry(v.participant_id).or_default().push(region);
        }
    }
    info!(
        "resolve_preferences: {} participants agreed with at least one region statement",
        candidates.len()
    );

    let mut res: BTreeMap<ParticipantId, String> = candidates
        .into_iter()
        .filter_map(|(pid, regions)| {
            let chosen = smallest_region(&regions)?;
            if regions.len() > 1 {
                debug!(
                    "resolve_preferences: participant {} picked {:?}, chose {:?}",
                    pid,
                    regions.iter().map(|r| r.name.as_str()).collect::<Vec<&str>>(),
                    chosen.name
                );
            }
            Some((pid, chosen.name.clone()))
        })
        .collect();

    let mut num_other = 0;
    for pid in included.iter() {
        if !res.contains_key(pid) {
            res.insert(*pid, OTHER_REGION.to_string());
            num_other += 1;
        }
    }
    info!(
        "resolve_preferences: {} participants assigned to {:?}",
        num_other, OTHER_REGION
    );
    res
}

// Total order: size rank, then name.
fn smallest_region<'a>(regions: &[&'a Region]) -> Option<&'a Region> {
    regions
        .iter()
        .copied()
        .min_by(|a, b| (a.size_rank, &a.name).cmp(&(b.size_rank, &b.name)))
}

/// Draws a point uniformly inside the disk.
///
/// The radius is the square root of a uniform draw, so that the density is
/// uniform per unit of area.
pub fn sample_disk<R: Rng + ?Sized>(disk: &OtherDisk, rng: &mut R) -> Coordinate {
    let angle: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
    let r = disk.radius * rng.gen::<f64>().sqrt();
    Coordinate::new(
        disk.center.x + r * angle.cos(),
        disk.center.y + r * angle.sin(),
    )
}

/// Draws a point uniformly inside the geometry by rejection sampling in its
/// bounding box.
///
/// After [MAX_REJECTION_ATTEMPTS] draws, the centroid is returned instead.
/// Returns None only for a geometry without any vertex.
pub fn sample_geometry<R: Rng + ?Sized>(geometry: &Geometry, rng: &mut R) -> Option<Coordinate> {
    let bb = geometry.bounding_box()?;
    for _ in 0..MAX_REJECTION_ATTEMPTS {
        let p = Coordinate::new(
            uniform(rng, bb.min_x, bb.max_x),
            uniform(rng, bb.min_y, bb.max_y),
        );
        if geometry.contains(&p) {
            return Some(p);
        }
    }
    let c = geometry.centroid()?;
    warn!(
        "sample_geometry: no point after {} attempts (area {}, box {}), using the centroid {:?}",
        MAX_REJECTION_ATTEMPTS,
        geometry.area(),
        bb.area(),
        c
    );
    Some(c)
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    if high > low {
        rng.gen_range(low..high)
    } else {
        low
    }
}

/// Places a participant in a region.
///
/// The placeholder region is sampled in the disk, any other region in its
/// geometry. A real region without a geometry cannot be placed.
pub fn place<R: Rng + ?Sized>(
    region: &str,
    geometry: Option<&Geometry>,
    other: &OtherDisk,
    rng: &mut R,
) -> Option<Coordinate> {
    if region == OTHER_REGION {
        return Some(sample_disk(other, rng));
    }
    sample_geometry(geometry?, rng)
}

/// Places every participant, in participant order.
///
/// Participants whose region has no shape are skipped.
pub fn assign_placements<R: Rng + ?Sized>(
    choices: &BTreeMap<ParticipantId, String>,
    shapes: &HashMap<String, Geometry>,
    other: &OtherDisk,
    rng: &mut R,
) -> Vec<Placement> {
    let mut res: Vec<Placement> = Vec::new();
    for (pid, region) in choices.iter() {
        match place(region, shapes.get(region), other, rng) {
            Some(coordinate) => res.push(Placement {
                participant_id: *pid,
                region: region.clone(),
                coordinate,
            }),
            None => {
                warn!(
                    "assign_placements: participant {}: no shape for region {:?}, skipping",
                    pid, region
                );
            }
        }
    }

    let mut per_region: BTreeMap<&str, usize> = BTreeMap::new();
    for p in res.iter() {
        *per_region.entry(p.region.as_str()).or_insert(0) += 1;
    }
    for (region, count) in per_region.iter() {
        info!("{:>8} {}", count, region);
    }
    info!("Generated {} participant points", res.len());
    res
}

/// A stable seed derived from a label, for instance a conversation id.
pub fn seed_from_label(label: &str) -> u64 {
    let hex = sha256::digest(label);
    u64::from_str_radix(&hex[..16], 16).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn vote(pid: ParticipantId, sid: StatementId, v: i64) -> Vote {
        Vote {
            participant_id: pid,
            statement_id: sid,
            vote: v,
        }
    }

    fn triangle() -> Geometry {
        Geometry::Polygon(
            Polygon::new(
                vec![
                    Coordinate::new(0.0, 0.0),
                    Coordinate::new(4.0, 0.0),
                    Coordinate::new(0.0, 3.0),
                ],
                vec![],
            )
            .unwrap(),
        )
    }

    #[test]
    fn single_region() {
        init();
        let table = RegionTable::san_juan_islands();
        let votes = vec![vote(1, 64, 1), vote(1, 10, 1)];
        let res = resolve_preferences(&votes, &table, &BTreeSet::new());
        assert_eq!(res.get(&1).map(|s| s.as_str()), Some("Orcas Island"));
    }

    #[test]
    fn smallest_region_wins() {
        init();
        let table = RegionTable::san_juan_islands();
        // Lopez (rank 2) and San Juan (rank 4)
        let votes = vec![vote(7, 66, 1), vote(7, 65, 1)];
        let res = resolve_preferences(&votes, &table, &BTreeSet::new());
        assert_eq!(res.get(&7).map(|s| s.as_str()), Some("Lopez Island"));

        let votes = vec![vote(8, 66, 1), vote(8, 67, 1), vote(8, 64, 1)];
        let res = resolve_preferences(&votes, &table, &BTreeSet::new());
        assert_eq!(res.get(&8).map(|s| s.as_str()), Some("Shaw Island"));
    }

    #[test]
    fn equal_ranks_break_on_name() {
        let table = RegionTable::new(vec![
            Region {
                name: "B".to_string(),
                size_rank: 1,
                statement_ids: vec![1],
            },
            Region {
                name: "A".to_string(),
                size_rank: 1,
                statement_ids: vec![2],
            },
        ])
        .unwrap();
        let votes = vec![vote(1, 1, 1), vote(1, 2, 1)];
        let res = resolve_preferences(&votes, &table, &BTreeSet::new());
        assert_eq!(res.get(&1).map(|s| s.as_str()), Some("A"));
    }

    #[test]
    fn only_agreements_count() {
        let table = RegionTable::san_juan_islands();
        let votes = vec![vote(1, 64, -1), vote(1, 65, 0), vote(2, 66, -1)];
        let included: BTreeSet<ParticipantId> = [1].into_iter().collect();
        let res = resolve_preferences(&votes, &table, &included);
        assert_eq!(res.get(&1).map(|s| s.as_str()), Some(OTHER_REGION));
        assert_eq!(res.get(&2), None);
        assert_eq!(res.len(), 1);
    }

    #[test]
    fn included_without_region_goes_to_other() {
        let table = RegionTable::san_juan_islands();
        let votes = vec![vote(1, 10, 1), vote(2, 11, 1), vote(3, 67, 1)];
        let included: BTreeSet<ParticipantId> = [1].into_iter().collect();
        let res = resolve_preferences(&votes, &table, &included);
        assert_eq!(res.get(&1).map(|s| s.as_str()), Some(OTHER_REGION));
        // Not included, no region: omitted.
        assert_eq!(res.get(&2), None);
        // Not included, but with a region.
        assert_eq!(res.get(&3).map(|s| s.as_str()), Some("Shaw Island"));
    }

    #[test]
    fn inclusion_threshold() {
        let votes = vec![vote(1, 1, 1), vote(1, 2, -1), vote(1, 3, 0), vote(2, 1, 1)];
        let inc = included_participants(&votes, 3);
        assert_eq!(inc.into_iter().collect::<Vec<_>>(), vec![1]);
        let inc = included_participants(&votes, 1);
        assert_eq!(inc.len(), 2);
    }

    #[test]
    fn statement_in_two_regions() {
        let res = RegionTable::new(vec![
            Region {
                name: "A".to_string(),
                size_rank: 1,
                statement_ids: vec![1, 2],
            },
            Region {
                name: "B".to_string(),
                size_rank: 2,
                statement_ids: vec![2],
            },
        ]);
        assert_eq!(
            res,
            Err(GeoErrors::DuplicateStatement {
                statement_id: 2,
                first: "A".to_string(),
                second: "B".to_string()
            })
        );
    }

    #[test]
    fn reserved_and_duplicate_names() {
        let r = |name: &str, sid: StatementId| Region {
            name: name.to_string(),
            size_rank: 1,
            statement_ids: vec![sid],
        };
        assert_eq!(
            RegionTable::new(vec![r(OTHER_REGION, 1)]),
            Err(GeoErrors::ReservedRegionName)
        );
        assert_eq!(
            RegionTable::new(vec![r("A", 1), r("A", 2)]),
            Err(GeoErrors::DuplicateRegion("A".to_string()))
        );
    }

    #[test]
    fn samples_stay_in_polygon() {
        init();
        let g = triangle();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..10_000 {
            let p = sample_geometry(&g, &mut rng).unwrap();
            assert!(g.contains(&p), "{:?} is outside", p);
        }
    }

    #[test]
    fn samples_reach_every_part() {
        let part = |x0: f64| {
            Polygon::new(
                vec![
                    Coordinate::new(x0, 0.0),
                    Coordinate::new(x0 + 1.0, 0.0),
                    Coordinate::new(x0 + 1.0, 1.0),
                    Coordinate::new(x0, 1.0),
                ],
                vec![],
            )
            .unwrap()
        };
        let g = Geometry::MultiPolygon(vec![part(0.0), part(5.0)]);
        let mut rng = StdRng::seed_from_u64(11);
        let mut left = 0;
        let mut right = 0;
        for _ in 0..2_000 {
            let p = sample_geometry(&g, &mut rng).unwrap();
            assert!(g.contains(&p));
            if p.x < 2.0 {
                left += 1;
            } else {
                right += 1;
            }
        }
        assert!(left > 800 && right > 800, "left {} right {}", left, right);
    }

    #[test]
    fn degenerate_polygon_uses_centroid() {
        init();
        let flat = Geometry::Polygon(
            Polygon::new(
                vec![
                    Coordinate::new(0.0, 1.0),
                    Coordinate::new(2.0, 1.0),
                    Coordinate::new(4.0, 1.0),
                ],
                vec![],
            )
            .unwrap(),
        );
        let mut rng = StdRng::seed_from_u64(5);
        let p = sample_geometry(&flat, &mut rng);
        assert_eq!(p, Some(Coordinate::new(2.0, 1.0)));
    }

    #[test]
    fn disk_samples_in_disk() {
        let disk = OtherDisk::DEFAULT;
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..5_000 {
            let p = sample_disk(&disk, &mut rng);
            let d = ((p.x - disk.center.x).powi(2) + (p.y - disk.center.y).powi(2)).sqrt();
            assert!(d <= disk.radius + 1e-12);
        }
    }

    #[test]
    fn disk_density_is_uniform_in_area() {
        // With a uniform density, the mass in the ring [r0, r1] is r1^2 - r0^2.
        let disk = OtherDisk {
            center: Coordinate::new(2.0, -1.0),
            radius: 1.0,
        };
        let mut rng = StdRng::seed_from_u64(42);
        let n = 40_000;
        let mut bins = [0usize; 4];
        for _ in 0..n {
            let p = sample_disk(&disk, &mut rng);
            let d = ((p.x - disk.center.x).powi(2) + (p.y - disk.center.y).powi(2)).sqrt();
            let idx = ((d * 4.0) as usize).min(3);
            bins[idx] += 1;
        }
        let expected = [1.0 / 16.0, 3.0 / 16.0, 5.0 / 16.0, 7.0 / 16.0];
        for (idx, count) in bins.iter().enumerate() {
            let frac = *count as f64 / n as f64;
            assert!(
                (frac - expected[idx]).abs() < 0.015,
                "bin {}: {} vs {}",
                idx,
                frac,
                expected[idx]
            );
        }
    }

    #[test]
    fn real_region_without_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            place("Orcas Island", None, &OtherDisk::DEFAULT, &mut rng),
            None
        );
        assert!(place(OTHER_REGION, None, &OtherDisk::DEFAULT, &mut rng).is_some());
    }

    #[test]
    fn placements_are_reproducible() {
        let mut shapes: HashMap<String, Geometry> = HashMap::new();
        shapes.insert("Shaw Island".to_string(), triangle());
        let choices: BTreeMap<ParticipantId, String> = [
            (1, "Shaw Island".to_string()),
            (2, OTHER_REGION.to_string()),
            (3, "Lopez Island".to_string()),
            (4, "Shaw Island".to_string()),
        ]
        .into_iter()
        .collect();
        let run = || {
            let mut rng = StdRng::seed_from_u64(seed_from_label("12345"));
            assign_placements(&choices, &shapes, &OtherDisk::DEFAULT, &mut rng)
        };
        let first = run();
        let second = run();
        assert_eq!(first, second);
        // Lopez has no shape.
        let ids: Vec<ParticipantId> = first.iter().map(|p| p.participant_id).collect();
        assert_eq!(ids, vec![1, 2, 4]);
    }

    #[test]
    fn seeds_depend_on_label() {
        assert_eq!(seed_from_label("r2xyz"), seed_from_label("r2xyz"));
        assert_ne!(seed_from_label("r2xyz"), seed_from_label("12345"));
    }
}
