//! Scan Governor: cross-cycle mutable governance state.
//!
//! The governor is the authoritative keeper of everything that must
//! survive between cycles: harvest locks, looted memory, locked-container
//! memory, highlight debounce, permanent exclusions, and calibration
//! mode. It owns no world references, only identities in side tables;
//! after a reload or identity recycling those identities are only ever
//! compared, never dereferenced.
//!
//! All tables sit behind one mutex held only for short table operations,
//! never across an asynchronous request.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use world_model::{Generation, RefHandle, RefId};

use crate::config::CalibrationSection;
use crate::ports::HostOps;
use crate::verdict::HighlightReason;

#[derive(Debug, Default)]
struct Tables {
    /// Harvests dispatched but not yet observed complete
    harvest_locks: HashSet<RefId>,
    /// Looted stable identities, valid until reload
    looted_stable: HashSet<RefId>,
    /// Looted transient identities with the generation seen at loot time
    looted_transient: HashMap<RefId, Generation>,
    /// Containers ever observed locked this session
    locked_containers: HashSet<RefId>,
    /// Unexpired highlight requests
    glow_expiry: HashMap<RefId, Instant>,
    /// Structurally broken or notice-spent references, never retried
    excluded: HashSet<RefId>,
    calibration: Option<CalibrationState>,
}

#[derive(Debug, Clone, Copy)]
struct CalibrationState {
    radius: f32,
}

/// Authoritative keeper of per-cycle and cross-cycle scan state.
#[derive(Debug, Default)]
pub struct ScanGovernor {
    tables: Mutex<Tables>,
}

impl ScanGovernor {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        // A poisoned lock means a cycle already panicked; the loop is
        // terminating, so propagating the panic here is fine.
        self.tables.lock().expect("governor tables poisoned")
    }

    // --- Harvest lock ---

    /// Claims the harvest lock for a reference. Returns true only for the
    /// first concurrent claim.
    pub fn try_lock_harvest(&self, handle: RefHandle) -> bool {
        self.tables().harvest_locks.insert(handle.id)
    }

    pub fn unlock_harvest(&self, handle: RefHandle) {
        self.tables().harvest_locks.remove(&handle.id);
    }

    pub fn holds_harvest_lock(&self, handle: RefHandle) -> bool {
        self.tables().harvest_locks.contains(&handle.id)
    }

    // --- Looted memory ---

    /// Remembers a reference as looted. Stable identities go to the
    /// session set; transient ones are keyed with the generation seen now.
    pub fn mark_looted(&self, handle: RefHandle) {
        let mut t = self.tables();
        if handle.is_stable() {
            t.looted_stable.insert(handle.id);
        } else {
            t.looted_transient.insert(handle.id, handle.generation);
        }
    }

    /// Whether a reference was already looted. A transient id stays
    /// flagged even when its generation has changed: once flagged it is
    /// never re-examined rather than risk addressing a recycled identity.
    pub fn is_looted(&self, handle: RefHandle) -> bool {
        let t = self.tables();
        if handle.is_stable() {
            return t.looted_stable.contains(&handle.id);
        }
        match t.looted_transient.get(&handle.id) {
            Some(generation) => {
                if *generation != handle.generation {
                    tracing::debug!(
                        "transient {} recycled since loot, keeping it flagged",
                        handle
                    );
                }
                true
            }
            None => false,
        }
    }

    // --- Locked-container memory ---

    /// Once observed locked, a container counts as "was locked" until
    /// reload. Unlocking later does not clear it; post-unlock auto-looting
    /// stays opt-in.
    pub fn remember_locked(&self, handle: RefHandle) {
        self.tables().locked_containers.insert(handle.id);
    }

    pub fn was_locked(&self, handle: RefHandle) -> bool {
        self.tables().locked_containers.contains(&handle.id)
    }

    // --- Permanent exclusion ---

    pub fn exclude(&self, handle: RefHandle) {
        self.tables().excluded.insert(handle.id);
    }

    pub fn is_excluded(&self, handle: RefHandle) -> bool {
        self.tables().excluded.contains(&handle.id)
    }

    // --- Highlight debounce ---

    /// Forwards a highlight request unless an unexpired one exists for
    /// this reference. Returns whether the request went out.
    pub fn request_glow(
        &self,
        host: &dyn HostOps,
        handle: RefHandle,
        duration: Duration,
        reason: HighlightReason,
        now: Instant,
    ) -> bool {
        {
            let mut t = self.tables();
            match t.glow_expiry.get(&handle.id) {
                Some(expiry) if *expiry > now => return false,
                _ => {
                    t.glow_expiry.insert(handle.id, now + duration);
                }
            }
        }
        // Forward outside the lock
        host.request_highlight(handle, duration, reason);
        true
    }

    // --- Calibration mode ---

    pub fn start_calibration(&self, section: &CalibrationSection) {
        self.tables().calibration = Some(CalibrationState {
            radius: section.start_radius,
        });
        tracing::info!("calibration sweep started at radius {}", section.start_radius);
    }

    pub fn is_calibrating(&self) -> bool {
        self.tables().calibration.is_some()
    }

    /// Returns the radius for this cycle's sweep and advances it, or None
    /// once the sweep has terminated at the configured max.
    pub fn calibration_step(&self, section: &CalibrationSection) -> Option<f32> {
        let mut t = self.tables();
        let state = t.calibration.as_mut()?;
        let radius = state.radius;
        if radius > section.max_radius {
            t.calibration = None;
            tracing::info!("calibration sweep finished");
            return None;
        }
        state.radius = radius + section.step;
        Some(radius)
    }

    // --- Resets ---

    /// Cell change: transient identities and highlight debounce are no
    /// longer meaningful.
    pub fn on_cell_change(&self) {
        let mut t = self.tables();
        t.looted_transient.clear();
        t.glow_expiry.clear();
    }

    /// World reload invalidates every remembered identity.
    pub fn on_world_reload(&self) {
        let mut t = self.tables();
        t.harvest_locks.clear();
        t.looted_stable.clear();
        t.looted_transient.clear();
        t.locked_containers.clear();
        t.glow_expiry.clear();
        t.excluded.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stubs::RecordingHost;

    #[test]
    fn test_harvest_lock_first_claim_wins() {
        let governor = ScanGovernor::new();
        let handle = RefHandle::stable(1);
        assert!(governor.try_lock_harvest(handle));
        assert!(!governor.try_lock_harvest(handle));
        governor.unlock_harvest(handle);
        assert!(governor.try_lock_harvest(handle));
    }

    #[test]
    fn test_stable_looted_memory_sticks_for_session() {
        let governor = ScanGovernor::new();
        let handle = RefHandle::stable(2);
        assert!(!governor.is_looted(handle));
        governor.mark_looted(handle);
        assert!(governor.is_looted(handle));

        // Cell change does not clear stable memory
        governor.on_cell_change();
        assert!(governor.is_looted(handle));

        // Reload does
        governor.on_world_reload();
        assert!(!governor.is_looted(handle));
    }

    #[test]
    fn test_transient_looted_memory_survives_recycling() {
        let governor = ScanGovernor::new();
        let original = RefHandle::transient(0xff000001, 1);
        governor.mark_looted(original);

        // Same id, new generation: still flagged, never re-examined
        let recycled = RefHandle::transient(0xff000001, 2);
        assert!(governor.is_looted(recycled));

        // Cell change clears the transient map
        governor.on_cell_change();
        assert!(!governor.is_looted(original));
    }

    #[test]
    fn test_locked_memory_ignores_unlock() {
        let governor = ScanGovernor::new();
        let chest = RefHandle::stable(3);
        governor.remember_locked(chest);
        assert!(governor.was_locked(chest));
        governor.on_cell_change();
        assert!(governor.was_locked(chest));
        governor.on_world_reload();
        assert!(!governor.was_locked(chest));
    }

    #[test]
    fn test_glow_debounce() {
        let governor = ScanGovernor::new();
        let host = RecordingHost::new();
        let handle = RefHandle::stable(4);
        let now = Instant::now();
        let duration = Duration::from_secs(3);

        assert!(governor.request_glow(&host, handle, duration, HighlightReason::Quest, now));
        // Second request inside the window is a no-op
        assert!(!governor.request_glow(
            &host,
            handle,
            duration,
            HighlightReason::Quest,
            now + Duration::from_secs(1)
        ));
        // After expiry it goes out again
        assert!(governor.request_glow(
            &host,
            handle,
            duration,
            HighlightReason::Quest,
            now + Duration::from_secs(4)
        ));
        assert_eq!(host.highlight_count(), 2);
    }

    #[test]
    fn test_calibration_terminates_at_max() {
        let governor = ScanGovernor::new();
        let section = CalibrationSection {
            start_radius: 100.0,
            step: 100.0,
            max_radius: 300.0,
        };
        governor.start_calibration(&section);
        let mut radii = Vec::new();
        while let Some(r) = governor.calibration_step(&section) {
            radii.push(r);
        }
        assert_eq!(radii, vec![100.0, 200.0, 300.0]);
        assert!(!governor.is_calibrating());
    }
}
