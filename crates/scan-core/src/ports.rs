//! Ports to the host simulation.
//!
//! Consumed lookups are synchronous and side-effect-free from the
//! engine's perspective; exposed operations are fire-and-forget or
//! single-callback. The detection check is the one asynchronous
//! collaborator: it hands back a oneshot receiver the theft coordinator
//! polls without blocking.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use world_model::{InventoryEntry, ObjectCategory, RefHandle, TargetClass, TemplateId, WorldRef};

use crate::verdict::HighlightReason;

/// Base classification of a template, from the host's keyword taxonomy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub class: TargetClass,
    pub category: ObjectCategory,
    /// Base value in the host's currency
    pub value: u32,
    /// Carry weight
    pub weight: f32,
    pub enchanted: bool,
    /// The template itself is a quest target wherever it appears
    pub quest_item: bool,
}

impl Classification {
    /// Value-to-weight ratio used against the category threshold.
    /// Weightless items are treated as always worth carrying.
    pub fn value_per_weight(&self) -> f32 {
        if self.weight <= f32::EPSILON {
            f32::MAX
        } else {
            self.value as f32 / self.weight
        }
    }
}

/// Identity -> target class and category.
pub trait Classifier: Send + Sync {
    fn classify(&self, template: TemplateId) -> Option<Classification>;
}

/// How a category of objects is handled when nothing else intervenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LootingMode {
    /// Never touch this category
    Disabled,
    /// Highlight but never take
    Glow,
    /// Take silently
    LootSilent,
    /// Take and surface a notice
    LootNotify,
}

/// Per-category policy from the host's settings layer.
#[derive(Debug, Clone, Copy)]
pub struct CategoryPolicy {
    pub mode: LootingMode,
    /// Minimum value-to-weight ratio to count as worth taking; a ratio at
    /// or above this also flags the object as "valuable"
    pub value_weight_threshold: f32,
    /// Stop taking once this many are carried
    pub excess_limit: Option<u32>,
    /// Surface one notice when this category is blocked
    pub notice_on_block: bool,
}

impl Default for CategoryPolicy {
    fn default() -> Self {
        Self {
            mode: LootingMode::LootSilent,
            value_weight_threshold: 0.0,
            excess_limit: None,
            notice_on_block: false,
        }
    }
}

/// Category -> looting mode, thresholds, and carry limits.
pub trait PolicyLookup: Send + Sync {
    fn policy(&self, category: ObjectCategory) -> CategoryPolicy;

    /// How many of this category the player currently carries.
    fn carried(&self, category: ObjectCategory) -> u32;
}

/// Scope a collection is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionScope {
    /// Only collections active in the current location
    Local,
    /// All defined collections
    Global,
}

/// What a collection wants done with a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionAction {
    /// Highlight members, leave them in place
    Highlight,
    /// Take members, always silently
    Collect,
}

/// Membership result for a template in some collection.
#[derive(Debug, Clone, Copy)]
pub struct CollectionMembership {
    pub action: CollectionAction,
    /// Collection policy authorizes taking owned members
    pub permit_owned: bool,
}

/// (identity, scope) -> membership and policy action.
pub trait Collections: Send + Sync {
    fn membership(&self, template: TemplateId, scope: CollectionScope)
        -> Option<CollectionMembership>;
}

/// Ownership and crime appraisal for a placed reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct Legality {
    /// Taking this reference here would be a detectable crime
    pub crime_to_take: bool,
    pub player_owned: bool,
}

/// Reference -> legality.
pub trait LegalityOracle: Send + Sync {
    fn appraise(&self, reference: &WorldRef) -> Legality;
}

/// A host operation was rejected or the host is gone.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("host rejected {operation} for {handle}")]
    Rejected {
        operation: &'static str,
        handle: RefHandle,
    },
    #[error("host unavailable")]
    Unavailable,
}

/// Operations the engine requests from the host.
pub trait HostOps: Send + Sync {
    /// Transient visual cue on a reference. Fire-and-forget.
    fn request_highlight(&self, handle: RefHandle, duration: Duration, reason: HighlightReason);

    /// Take a loose item or harvest a producer.
    fn request_harvest(
        &self,
        handle: RefHandle,
        category: ObjectCategory,
        count: u32,
        silent: bool,
    ) -> Result<(), HostError>;

    /// Move the listed items out of a container or corpse.
    fn request_container_transfer(
        &self,
        handle: RefHandle,
        items: &[InventoryEntry],
    ) -> Result<(), HostError>;

    /// One detection check for a theft batch. The reply arrives on the
    /// host's own turn, arbitrarily many cycles later.
    fn request_detection_check(&self, watchers: usize) -> oneshot::Receiver<bool>;

    /// Ask the host to resolve a producer's harvestable product.
    fn request_product_resolution(&self, handle: RefHandle);

    /// One-shot user-facing notice.
    fn notify(&self, text: &str);
}
