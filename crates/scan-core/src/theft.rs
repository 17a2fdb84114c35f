//! Theft Coordinator: two-phase commit for detectable-crime loots.
//!
//! Candidates whose looting would be a detectable crime are batched and
//! settled against one asynchronous detection verdict per cycle, not one
//! per candidate. At most one batch is ever in flight; proposals made
//! while a batch is out are dropped, not merged, and get re-proposed
//! naturally on a later cycle.

use tokio::sync::oneshot;
use world_model::{InventoryEntry, ObjectCategory, RefHandle};

use crate::governor::ScanGovernor;
use crate::ports::HostOps;

/// What committing a claim means.
#[derive(Debug, Clone)]
pub enum ClaimKind {
    /// Take a loose item or harvest
    Item { category: ObjectCategory, count: u32 },
    /// Transfer the listed contents out of a container or corpse
    Container { items: Vec<InventoryEntry> },
}

/// One deferred theft-like loot. The proposer holds the harvest lock for
/// the handle until the batch resolves.
#[derive(Debug, Clone)]
pub struct TheftClaim {
    pub handle: RefHandle,
    pub kind: ClaimKind,
}

#[derive(Debug)]
struct InFlightBatch {
    claims: Vec<TheftClaim>,
    receiver: oneshot::Receiver<bool>,
    /// A reload happened after dispatch; the reply may describe a world
    /// that no longer exists
    stale: bool,
}

/// How a polled batch resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TheftResolution {
    /// Undetected; this many claims were finalized silently
    Committed(usize),
    /// Detected; this many claims were dropped for the session
    Discarded(usize),
    /// The host dropped the reply channel; claims unlocked for retry
    Abandoned(usize),
}

/// Batches detectable-crime loots behind one detection check per cycle.
#[derive(Debug, Default)]
pub struct TheftCoordinator {
    pending: Vec<TheftClaim>,
    in_flight: Option<InFlightBatch>,
}

impl TheftCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Queues a claim for this cycle's batch. Returns false when a batch
    /// is already in flight; the claim is dropped, not merged.
    pub fn propose(&mut self, claim: TheftClaim) -> bool {
        if self.in_flight.is_some() {
            tracing::debug!("theft batch in flight, dropping proposal for {}", claim.handle);
            return false;
        }
        self.pending.push(claim);
        true
    }

    /// Issues the single detection request for this cycle's batch, if any.
    pub fn dispatch(&mut self, host: &dyn HostOps, watchers: usize) -> bool {
        if self.in_flight.is_some() || self.pending.is_empty() {
            return false;
        }
        let claims = std::mem::take(&mut self.pending);
        tracing::debug!(
            "dispatching theft batch of {} claims against {} watchers",
            claims.len(),
            watchers
        );
        let receiver = host.request_detection_check(watchers);
        self.in_flight = Some(InFlightBatch {
            claims,
            receiver,
            stale: false,
        });
        true
    }

    /// Checks for an externally-delivered detection reply without
    /// blocking. Commits or discards the whole batch on reply.
    pub fn poll(&mut self, host: &dyn HostOps, governor: &ScanGovernor) -> Option<TheftResolution> {
        let batch = self.in_flight.as_mut()?;
        let detected = match batch.receiver.try_recv() {
            Ok(detected) => detected,
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => {
                let batch = self.in_flight.take().expect("batch present");
                tracing::warn!("detection reply channel closed, abandoning theft batch");
                for claim in &batch.claims {
                    governor.unlock_harvest(claim.handle);
                }
                return Some(TheftResolution::Abandoned(batch.claims.len()));
            }
        };

        let batch = self.in_flight.take().expect("batch present");
        if batch.stale {
            tracing::warn!(
                "theft verdict arrived after a world reload; resolving against possibly stale identities"
            );
        }
        let count = batch.claims.len();

        if detected {
            tracing::debug!("theft batch detected, discarding {} claims", count);
            for claim in &batch.claims {
                governor.exclude(claim.handle);
                governor.unlock_harvest(claim.handle);
            }
            return Some(TheftResolution::Discarded(count));
        }

        for claim in &batch.claims {
            let result = match &claim.kind {
                ClaimKind::Item { category, count } => {
                    host.request_harvest(claim.handle, *category, *count, true)
                }
                ClaimKind::Container { items } => {
                    host.request_container_transfer(claim.handle, items)
                }
            };
            if let Err(e) = result {
                tracing::warn!("theft commit failed for {}: {}", claim.handle, e);
            }
            governor.mark_looted(claim.handle);
            governor.unlock_harvest(claim.handle);
        }
        Some(TheftResolution::Committed(count))
    }

    /// A reload does not cancel an in-flight batch; the reply is resolved
    /// when it arrives, flagged as stale.
    pub fn on_world_reload(&mut self) {
        self.pending.clear();
        if let Some(batch) = self.in_flight.as_mut() {
            batch.stale = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stubs::RecordingHost;

    fn claim(id: u32) -> TheftClaim {
        TheftClaim {
            handle: RefHandle::stable(id),
            kind: ClaimKind::Item {
                category: ObjectCategory::Jewelry,
                count: 1,
            },
        }
    }

    #[test]
    fn test_at_most_one_batch_in_flight() {
        let mut theft = TheftCoordinator::new();
        let host = RecordingHost::new();

        assert!(theft.propose(claim(1)));
        assert!(theft.propose(claim(2)));
        assert!(theft.dispatch(&host, 3));
        assert!(theft.is_in_flight());

        // Proposals while in flight are invisible until resolution
        assert!(!theft.propose(claim(3)));
        assert_eq!(theft.pending_count(), 0);
        assert!(!theft.dispatch(&host, 3), "no second dispatch");
        assert_eq!(host.detection_count(), 1);
    }

    #[test]
    fn test_undetected_commits_whole_batch_silently() {
        let mut theft = TheftCoordinator::new();
        let host = RecordingHost::new();
        let governor = ScanGovernor::new();

        for id in [1, 2] {
            governor.try_lock_harvest(RefHandle::stable(id));
            theft.propose(claim(id));
        }
        theft.dispatch(&host, 1);

        // No reply yet
        assert_eq!(theft.poll(&host, &governor), None);

        host.resolve_detection(false);
        assert_eq!(theft.poll(&host, &governor), Some(TheftResolution::Committed(2)));
        assert!(!theft.is_in_flight());
        assert!(governor.is_looted(RefHandle::stable(1)));
        assert!(governor.is_looted(RefHandle::stable(2)));
        assert!(!governor.holds_harvest_lock(RefHandle::stable(1)));
        // Both harvests were silent
        assert_eq!(host.silent_harvest_count(), 2);
    }

    #[test]
    fn test_detected_discards_with_no_retry() {
        let mut theft = TheftCoordinator::new();
        let host = RecordingHost::new();
        let governor = ScanGovernor::new();

        governor.try_lock_harvest(RefHandle::stable(1));
        theft.propose(claim(1));
        theft.dispatch(&host, 2);
        host.resolve_detection(true);

        assert_eq!(theft.poll(&host, &governor), Some(TheftResolution::Discarded(1)));
        assert!(!governor.is_looted(RefHandle::stable(1)));
        assert!(governor.is_excluded(RefHandle::stable(1)), "never retried");
        assert_eq!(host.silent_harvest_count(), 0);
    }

    #[test]
    fn test_closed_channel_abandons_batch() {
        let mut theft = TheftCoordinator::new();
        let host = RecordingHost::new();
        let governor = ScanGovernor::new();

        governor.try_lock_harvest(RefHandle::stable(1));
        theft.propose(claim(1));
        theft.dispatch(&host, 0);
        host.drop_detection_sender();

        assert_eq!(theft.poll(&host, &governor), Some(TheftResolution::Abandoned(1)));
        // Unlocked, not excluded: eligible again on a later cycle
        assert!(!governor.holds_harvest_lock(RefHandle::stable(1)));
        assert!(!governor.is_excluded(RefHandle::stable(1)));
    }

    #[test]
    fn test_reload_marks_batch_stale_but_does_not_cancel() {
        let mut theft = TheftCoordinator::new();
        let host = RecordingHost::new();
        let governor = ScanGovernor::new();

        theft.propose(claim(1));
        theft.dispatch(&host, 0);
        theft.on_world_reload();
        assert!(theft.is_in_flight());

        host.resolve_detection(false);
        assert_eq!(theft.poll(&host, &governor), Some(TheftResolution::Committed(1)));
    }
}
