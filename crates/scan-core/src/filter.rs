//! Candidate Filter: bounded, distance-ordered candidate selection.
//!
//! One pass over the cells in reach applies cheap structural rejection,
//! keeps the N nearest survivors in a bounded heap (a partial order, not
//! a full sort of the set), and records side-effect observations along
//! the way: nearby living actors for the theft coordinator and the
//! mortality tracker, and door distances for the radius adjustment.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use world_model::{FormKind, RefHandle, Vec3, WorldModel, WorldRef};

use crate::config::ScanConfig;
use crate::governor::ScanGovernor;
use crate::mortality::MortalityTracker;

/// Filter input for one cycle.
#[derive(Debug, Clone, Copy)]
pub struct FilterParams {
    pub center: Vec3,
    pub radius: f32,
    pub vertical_factor: f32,
    pub respect_doors: bool,
    pub door_tolerance: f32,
    pub max_radius: f32,
    pub max_candidates: usize,
}

impl FilterParams {
    pub fn from_config(config: &ScanConfig, center: Vec3) -> Self {
        Self {
            center,
            radius: config.scan.radius,
            vertical_factor: config.scan.vertical_factor,
            respect_doors: config.doors.respect_doors,
            door_tolerance: config.doors.tolerance,
            max_radius: config.doors.max_radius,
            max_candidates: config.scan.max_candidates,
        }
    }

    /// Overrides the radius, used by the calibration sweep.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }
}

/// An ephemeral candidate, valid for one cycle.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'w> {
    /// Straight-line distance from the scan center
    pub distance: f32,
    pub reference: &'w WorldRef,
    /// Population of the cell the reference sits in
    pub cell_population: u32,
}

impl Candidate<'_> {
    pub fn handle(&self) -> RefHandle {
        self.reference.handle
    }
}

/// Everything one filter pass produced.
#[derive(Debug, Default)]
pub struct FilterOutput<'w> {
    /// At most N candidates, non-decreasing distance
    pub candidates: Vec<Candidate<'w>>,
    /// Distance of the nearest door inside the base radius
    pub nearest_door: Option<f32>,
    /// Living non-teammate actors in radius, potential detectives
    pub watchers: usize,
    /// Subset of the watchers currently hostile to the player
    pub hostiles: usize,
    /// Living teammates in radius
    pub followers: Vec<RefHandle>,
    /// Radius after door adjustment
    pub effective_radius: f32,
}

struct HeapEntry<'w> {
    distance: f32,
    horizontal: f32,
    vertical: f32,
    reference: &'w WorldRef,
    cell_population: u32,
}

impl PartialEq for HeapEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}
impl Eq for HeapEntry<'_> {}
impl PartialOrd for HeapEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance)
    }
}

/// Builds the ordered candidate list for one cycle.
pub struct CandidateFilter;

impl CandidateFilter {
    pub fn scan<'w>(
        world: &'w WorldModel,
        params: FilterParams,
        governor: &ScanGovernor,
        mortality: &mut MortalityTracker,
    ) -> FilterOutput<'w> {
        let mut heap: BinaryHeap<HeapEntry<'w>> = BinaryHeap::new();
        let mut output = FilterOutput {
            effective_radius: params.radius,
            ..FilterOutput::default()
        };
        // Tightest known locked-door limit and loosest unlocked relaxation
        let mut locked_limit: Option<f32> = None;
        let mut unlocked_relax: Option<f32> = None;

        let effective = |locked: Option<f32>, relax: Option<f32>| -> f32 {
            let mut radius = params.radius;
            if let Some(r) = relax {
                radius = radius.max(r.min(params.max_radius));
            }
            if let Some(l) = locked {
                radius = radius.min(l.max(0.0));
            }
            radius
        };

        for cell in world.cells_in_reach() {
            for reference in &cell.refs {
                if reference.is_malformed() {
                    if !governor.is_excluded(reference.handle) {
                        tracing::debug!(
                            "excluding malformed reference {} permanently",
                            reference.handle
                        );
                        governor.exclude(reference.handle);
                    }
                    continue;
                }
                if !reference.loaded || governor.is_excluded(reference.handle) {
                    continue;
                }

                let horizontal = params.center.horizontal_distance_to(reference.position);
                let vertical = params.center.vertical_distance_to(reference.position);
                let distance = params.center.distance_to(reference.position);

                match reference.kind {
                    FormKind::Static => continue,
                    FormKind::Door => {
                        if horizontal <= params.radius {
                            output.nearest_door = Some(match output.nearest_door {
                                Some(d) => d.min(distance),
                                None => distance,
                            });
                        }
                        if params.respect_doors {
                            if reference.is_locked() {
                                let limit = distance - params.door_tolerance;
                                locked_limit =
                                    Some(locked_limit.map_or(limit, |l: f32| l.min(limit)));
                            } else {
                                let relax = distance + params.door_tolerance;
                                unlocked_relax =
                                    Some(unlocked_relax.map_or(relax, |r: f32| r.max(relax)));
                            }
                        }
                        continue;
                    }
                    FormKind::Actor => {
                        let Some(actor) = world.actor(reference.handle.id) else {
                            continue;
                        };
                        if !actor.dead {
                            mortality.note_alive(reference.handle);
                            if horizontal <= params.radius {
                                if actor.teammate {
                                    output.followers.push(reference.handle);
                                } else {
                                    output.watchers += 1;
                                    if actor.hostile {
                                        output.hostiles += 1;
                                    }
                                }
                            }
                            continue;
                        }
                        if mortality.is_pending(reference.handle.id) {
                            continue;
                        }
                        // Settled corpse, falls through as a candidate
                    }
                    FormKind::LooseItem | FormKind::Container | FormKind::Producer => {}
                }

                let current = effective(locked_limit, unlocked_relax);
                if horizontal > current || vertical > current * params.vertical_factor {
                    continue;
                }

                let entry = HeapEntry {
                    distance,
                    horizontal,
                    vertical,
                    reference,
                    cell_population: cell.population,
                };
                if heap.len() < params.max_candidates {
                    heap.push(entry);
                } else if let Some(farthest) = heap.peek() {
                    if entry.distance < farthest.distance {
                        heap.pop();
                        heap.push(entry);
                    }
                }
            }
        }

        output.effective_radius = effective(locked_limit, unlocked_relax);

        let mut selected = heap.into_sorted_vec();
        // Doors seen late in the pass may have shrunk the radius after
        // selection; the prefix is re-filtered against the final value.
        if output.effective_radius < params.radius {
            let radius = output.effective_radius;
            let vertical_bound = radius * params.vertical_factor;
            selected.retain(|e| e.horizontal <= radius && e.vertical <= vertical_bound);
        }

        output.candidates = selected
            .into_iter()
            .map(|e| Candidate {
                distance: e.distance,
                reference: e.reference,
                cell_population: e.cell_population,
            })
            .collect();
        output
    }
}
