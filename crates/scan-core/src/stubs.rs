//! In-memory port implementations for tests and the demo binary.
//!
//! The engine only ever talks to the host through the traits in
//! [`crate::ports`]; these table-driven stand-ins make the full pipeline
//! runnable without a host simulation.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use world_model::{InventoryEntry, ObjectCategory, RefHandle, TemplateId, WorldRef};

use crate::ports::{
    CategoryPolicy, Classification, CollectionMembership, CollectionScope, Collections,
    Classifier, HostError, HostOps, Legality, LegalityOracle, PolicyLookup,
};
use crate::verdict::HighlightReason;

/// Classifier backed by a template table.
#[derive(Debug, Default)]
pub struct TableClassifier {
    templates: HashMap<u32, Classification>,
}

impl TableClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, template: u32, classification: Classification) -> Self {
        self.templates.insert(template, classification);
        self
    }
}

impl Classifier for TableClassifier {
    fn classify(&self, template: TemplateId) -> Option<Classification> {
        self.templates.get(&template.0).copied()
    }
}

/// Policy lookup with per-category overrides over one default.
#[derive(Debug, Default)]
pub struct TablePolicies {
    default: CategoryPolicy,
    overrides: HashMap<ObjectCategory, CategoryPolicy>,
    carried: HashMap<ObjectCategory, u32>,
}

impl TablePolicies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, policy: CategoryPolicy) -> Self {
        self.default = policy;
        self
    }

    pub fn with_policy(mut self, category: ObjectCategory, policy: CategoryPolicy) -> Self {
        self.overrides.insert(category, policy);
        self
    }

    pub fn with_carried(mut self, category: ObjectCategory, count: u32) -> Self {
        self.carried.insert(category, count);
        self
    }
}

impl PolicyLookup for TablePolicies {
    fn policy(&self, category: ObjectCategory) -> CategoryPolicy {
        self.overrides.get(&category).copied().unwrap_or(self.default)
    }

    fn carried(&self, category: ObjectCategory) -> u32 {
        self.carried.get(&category).copied().unwrap_or(0)
    }
}

/// Collection membership backed by a template table.
#[derive(Debug, Default)]
pub struct TableCollections {
    members: HashMap<u32, CollectionMembership>,
}

impl TableCollections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, template: u32, membership: CollectionMembership) -> Self {
        self.members.insert(template, membership);
        self
    }
}

impl Collections for TableCollections {
    fn membership(
        &self,
        template: TemplateId,
        _scope: CollectionScope,
    ) -> Option<CollectionMembership> {
        self.members.get(&template.0).copied()
    }
}

/// Legality from the reference's owner tag: anything owned by someone
/// other than the player is a crime to take.
#[derive(Debug)]
pub struct OwnerTagLegality {
    player: String,
}

impl OwnerTagLegality {
    pub fn new(player: impl Into<String>) -> Self {
        Self {
            player: player.into(),
        }
    }
}

impl Default for OwnerTagLegality {
    fn default() -> Self {
        Self::new("player")
    }
}

impl LegalityOracle for OwnerTagLegality {
    fn appraise(&self, reference: &WorldRef) -> Legality {
        match reference.extra.owner.as_deref() {
            Some(owner) if owner == self.player => Legality {
                crime_to_take: false,
                player_owned: true,
            },
            Some(_) => Legality {
                crime_to_take: true,
                player_owned: false,
            },
            None => Legality::default(),
        }
    }
}

/// One recorded host operation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Highlight {
        handle: RefHandle,
        reason: HighlightReason,
    },
    Harvest {
        handle: RefHandle,
        category: ObjectCategory,
        count: u32,
        silent: bool,
    },
    Transfer {
        handle: RefHandle,
        items: Vec<InventoryEntry>,
    },
    ProductResolution(RefHandle),
    DetectionCheck {
        watchers: usize,
    },
    Notify(String),
}

/// Host that records every operation and lets tests script the
/// detection reply.
#[derive(Debug, Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    detection_sender: Mutex<Option<oneshot::Sender<bool>>>,
    /// Pre-programmed replies sent the moment a check is requested
    auto_detection: Mutex<VecDeque<bool>>,
    fail_transfers: AtomicBool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every transfer request from now on fails, exercising the
    /// copy-fallback accounting.
    pub fn fail_transfers(&self) {
        self.fail_transfers.store(true, Ordering::SeqCst);
    }

    /// Queues a detection reply delivered as soon as the next check is
    /// requested.
    pub fn queue_detection_reply(&self, detected: bool) {
        self.auto_detection.lock().unwrap().push_back(detected);
    }

    /// Delivers the reply for the outstanding detection check.
    pub fn resolve_detection(&self, detected: bool) {
        if let Some(sender) = self.detection_sender.lock().unwrap().take() {
            let _ = sender.send(detected);
        }
    }

    /// Drops the outstanding reply channel without answering.
    pub fn drop_detection_sender(&self) {
        self.detection_sender.lock().unwrap().take();
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn count(&self, predicate: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    pub fn highlight_count(&self) -> usize {
        self.count(|c| matches!(c, HostCall::Highlight { .. }))
    }

    pub fn harvest_count(&self) -> usize {
        self.count(|c| matches!(c, HostCall::Harvest { .. }))
    }

    pub fn silent_harvest_count(&self) -> usize {
        self.count(|c| matches!(c, HostCall::Harvest { silent: true, .. }))
    }

    pub fn transfer_count(&self) -> usize {
        self.count(|c| matches!(c, HostCall::Transfer { .. }))
    }

    pub fn detection_count(&self) -> usize {
        self.count(|c| matches!(c, HostCall::DetectionCheck { .. }))
    }

    pub fn notices(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                HostCall::Notify(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn highlight_reasons(&self) -> Vec<HighlightReason> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                HostCall::Highlight { reason, .. } => Some(*reason),
                _ => None,
            })
            .collect()
    }
}

impl HostOps for RecordingHost {
    fn request_highlight(&self, handle: RefHandle, _duration: Duration, reason: HighlightReason) {
        self.record(HostCall::Highlight { handle, reason });
    }

    fn request_harvest(
        &self,
        handle: RefHandle,
        category: ObjectCategory,
        count: u32,
        silent: bool,
    ) -> Result<(), HostError> {
        self.record(HostCall::Harvest {
            handle,
            category,
            count,
            silent,
        });
        Ok(())
    }

    fn request_container_transfer(
        &self,
        handle: RefHandle,
        items: &[InventoryEntry],
    ) -> Result<(), HostError> {
        self.record(HostCall::Transfer {
            handle,
            items: items.to_vec(),
        });
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(HostError::Rejected {
                operation: "container_transfer",
                handle,
            });
        }
        Ok(())
    }

    fn request_detection_check(&self, watchers: usize) -> oneshot::Receiver<bool> {
        self.record(HostCall::DetectionCheck { watchers });
        let (sender, receiver) = oneshot::channel();
        if let Some(reply) = self.auto_detection.lock().unwrap().pop_front() {
            let _ = sender.send(reply);
        } else {
            *self.detection_sender.lock().unwrap() = Some(sender);
        }
        receiver
    }

    fn request_product_resolution(&self, handle: RefHandle) {
        self.record(HostCall::ProductResolution(handle));
    }

    fn notify(&self, text: &str) {
        self.record(HostCall::Notify(text.to_string()));
    }
}
