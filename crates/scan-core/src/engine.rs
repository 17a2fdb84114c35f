//! Cycle orchestration: filter, decide, theft, mortality.
//!
//! One [`ScanEngine::run_cycle`] call is a complete scan pass over a
//! world snapshot. The engine never blocks inside a cycle; the pending
//! theft verdict is polled at the top of each pass and everything else
//! runs synchronously over the snapshot.

use std::sync::Arc;
use std::time::Instant;

use world_model::{RefHandle, WorldModel};

use crate::config::ScanConfig;
use crate::decide::DecisionEngine;
use crate::filter::{CandidateFilter, FilterParams};
use crate::governor::ScanGovernor;
use crate::mortality::MortalityTracker;
use crate::ports::HostOps;
use crate::theft::{TheftCoordinator, TheftResolution};
use crate::verdict::{Action, HighlightReason};

/// A host-side occurrence the engine reacts to between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// An actor died; start its mortality wait
    ActorDied(RefHandle),
    /// The player crossed into a different cell
    CellChanged,
    /// A save was loaded or the world otherwise rebuilt
    WorldReloaded,
    /// The host finished a previously requested harvest
    HarvestCompleted(RefHandle),
    /// The perk controlling the corpse wait changed state
    PerkStateChanged { extended_wait: bool },
    /// Begin an always-glow range sweep
    CalibrationRequested,
    /// Stop the scan loop
    Shutdown,
}

/// What one cycle did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub candidates: usize,
    pub looted: usize,
    pub highlighted: usize,
    pub deferred: usize,
    pub blocked: usize,
    pub corpses_released: usize,
    pub watchers: usize,
    pub hostiles: usize,
    pub theft_resolution: Option<TheftResolution>,
    pub theft_dispatched: bool,
    pub calibrating: bool,
}

/// Owns all scan state and drives one pass per tick.
pub struct ScanEngine {
    config: ScanConfig,
    host: Arc<dyn HostOps>,
    decision: DecisionEngine,
    governor: ScanGovernor,
    mortality: MortalityTracker,
    theft: TheftCoordinator,
    cycle: u64,
    extended_wait: bool,
    released: Vec<RefHandle>,
}

impl ScanEngine {
    pub fn new(config: ScanConfig, host: Arc<dyn HostOps>, decision: DecisionEngine) -> Self {
        let capacity = config.mortality.capacity;
        Self {
            config,
            host,
            decision,
            governor: ScanGovernor::new(),
            mortality: MortalityTracker::new(capacity),
            theft: TheftCoordinator::new(),
            cycle: 0,
            extended_wait: false,
            released: Vec::new(),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn governor(&self) -> &ScanGovernor {
        &self.governor
    }

    /// Applies one host event. Returns false on [`HostEvent::Shutdown`].
    pub fn on_event(&mut self, event: HostEvent, now: Instant) -> bool {
        match event {
            HostEvent::ActorDied(handle) => {
                self.mortality.record(handle, now);
            }
            HostEvent::CellChanged => {
                tracing::debug!("cell change, dropping transient state");
                self.governor.on_cell_change();
                self.mortality.on_cell_change();
            }
            HostEvent::WorldReloaded => {
                tracing::info!("world reload, resetting session state");
                self.governor.on_world_reload();
                self.mortality.on_world_reload();
                self.theft.on_world_reload();
            }
            HostEvent::HarvestCompleted(handle) => {
                self.governor.unlock_harvest(handle);
            }
            HostEvent::PerkStateChanged { extended_wait } => {
                self.extended_wait = extended_wait;
            }
            HostEvent::CalibrationRequested => {
                self.governor.start_calibration(&self.config.calibration);
            }
            HostEvent::Shutdown => return false,
        }
        true
    }

    /// Runs one full scan pass over a world snapshot.
    pub fn run_cycle(&mut self, world: &WorldModel, now: Instant) -> CycleReport {
        self.cycle += 1;
        let mut report = CycleReport {
            cycle: self.cycle,
            ..CycleReport::default()
        };

        report.theft_resolution = self.theft.poll(self.host.as_ref(), &self.governor);

        self.released.clear();
        let delay = self.config.mortality.delay(self.extended_wait);
        self.mortality.release_due(now, delay, &mut self.released);
        report.corpses_released = self.released.len();

        if self.governor.is_calibrating() {
            if let Some(radius) = self.governor.calibration_step(&self.config.calibration) {
                self.run_calibration_sweep(world, radius, now, &mut report);
                return report;
            }
        }

        let params = FilterParams::from_config(&self.config, world.player_position);
        let output = CandidateFilter::scan(world, params, &self.governor, &mut self.mortality);
        report.candidates = output.candidates.len();
        report.watchers = output.watchers;
        report.hostiles = output.hostiles;

        for candidate in &output.candidates {
            let handle = candidate.handle();
            if self.governor.is_excluded(handle) || self.governor.is_looted(handle) {
                continue;
            }
            let evaluation = self.decision.evaluate(
                candidate,
                &self.config,
                &self.governor,
                &mut self.theft,
                now,
            );
            match evaluation.verdict.action() {
                Action::LootSilent | Action::LootNotify => report.looted += 1,
                Action::GlowOnly => report.highlighted += 1,
                Action::Defer => report.deferred += 1,
                Action::Block => report.blocked += 1,
            }
        }

        if self.theft.pending_count() > 0 && !self.theft.is_in_flight() {
            report.theft_dispatched = self.theft.dispatch(self.host.as_ref(), output.watchers);
        }

        tracing::debug!(
            "cycle {}: {} candidates, {} looted, {} highlighted, {} deferred, {} blocked",
            report.cycle,
            report.candidates,
            report.looted,
            report.highlighted,
            report.deferred,
            report.blocked
        );
        report
    }

    /// One calibration pass: everything in range glows, nothing is taken.
    fn run_calibration_sweep(
        &mut self,
        world: &WorldModel,
        radius: f32,
        now: Instant,
        report: &mut CycleReport,
    ) {
        report.calibrating = true;
        let params =
            FilterParams::from_config(&self.config, world.player_position).with_radius(radius);
        let output = CandidateFilter::scan(world, params, &self.governor, &mut self.mortality);
        report.candidates = output.candidates.len();
        for candidate in &output.candidates {
            if self.governor.request_glow(
                self.host.as_ref(),
                candidate.handle(),
                self.config.glow.duration(),
                HighlightReason::Generic,
                now,
            ) {
                report.highlighted += 1;
            }
        }
        tracing::info!(
            "calibration sweep at radius {}: {} references highlighted",
            radius,
            report.highlighted
        );
    }
}
