//! Verdicts, actions, and highlight precedence.
//!
//! Every candidate evaluation collapses to exactly one [`Verdict`], a
//! named reason that maps onto one of five [`Action`]s. Highlight reasons
//! form a total order; merging keeps the strongest reason and never
//! downgrades.

use serde::{Deserialize, Serialize};

/// The action a verdict collapses to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Take the object with no user-facing output
    LootSilent,
    /// Take the object and surface a notice
    LootNotify,
    /// Only request a highlight; never take
    GlowOnly,
    /// Skip this cycle, re-evaluate on a later one
    Defer,
    /// Never evaluate this object again this session
    Block,
}

/// Why a reference is highlighted. Variant order is precedence order:
/// earlier variants win when reasons merge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum HighlightReason {
    LockedContainer,
    BossContainer,
    Quest,
    Collectible,
    Valuable,
    Enchanted,
    PlayerOwned,
    Generic,
}

impl HighlightReason {
    /// Merges a newly observed reason into an accumulator, keeping the
    /// higher-precedence one. `None` always loses.
    pub fn merge(current: Option<Self>, observed: Self) -> Option<Self> {
        match current {
            Some(existing) if existing <= observed => Some(existing),
            _ => Some(observed),
        }
    }
}

/// The closed set of named evaluation outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    // Loot outcomes
    /// Taken with no notice
    HarvestSilent,
    /// Taken with a user-facing notice
    HarvestWithNotice,
    /// Collection policy forced a silent take
    CollectibleForced,

    // Glow-only outcomes
    /// Quest target; highlighted, never auto-taken
    QuestTarget,
    /// Locked container; highlighted and remembered
    LockedContainer,
    /// Container was locked earlier this session
    PreviouslyLocked,
    /// Boss container with auto-loot disabled
    BossContainer,
    /// Category policy says highlight only
    GlowPolicy,

    // Deferrals, retried on a later cycle
    /// Producer's harvestable product not yet resolved
    ProducerPending,
    /// Handed to the theft coordinator, awaiting the detection verdict
    TheftPending,
    /// A theft batch is already in flight
    TheftBatchBusy,
    /// Another evaluation holds the harvest lock
    HarvestLockHeld,
    /// Suppressed by population density at this location
    DensityRestricted,
    /// Per-category carry limit reached
    ExcessInventory,

    // Permanent blocks
    /// Taking it here would be a crime with no authorizing override
    CrimeToTake,
    /// Category policy disables this type entirely
    TypeExcluded,
    /// Value-to-weight ratio below the category threshold
    ValueBelowThreshold,
    /// Already looted this session
    AlreadyLooted,
    /// No identity or template; structural, never retried
    Malformed,
    /// Classifier knows nothing about the template
    Unclassified,
    /// Item vetoed by its container's legality or density result
    ContainerVetoed,
}

impl Verdict {
    /// The action this verdict collapses to.
    pub fn action(self) -> Action {
        match self {
            Verdict::HarvestSilent | Verdict::CollectibleForced => Action::LootSilent,
            Verdict::HarvestWithNotice => Action::LootNotify,
            Verdict::QuestTarget
            | Verdict::LockedContainer
            | Verdict::PreviouslyLocked
            | Verdict::BossContainer
            | Verdict::GlowPolicy => Action::GlowOnly,
            Verdict::ProducerPending
            | Verdict::TheftPending
            | Verdict::TheftBatchBusy
            | Verdict::HarvestLockHeld
            | Verdict::DensityRestricted
            | Verdict::ExcessInventory => Action::Defer,
            Verdict::CrimeToTake
            | Verdict::TypeExcluded
            | Verdict::ValueBelowThreshold
            | Verdict::AlreadyLooted
            | Verdict::Malformed
            | Verdict::Unclassified
            | Verdict::ContainerVetoed => Action::Block,
        }
    }

    pub fn is_loot(self) -> bool {
        matches!(self.action(), Action::LootSilent | Action::LootNotify)
    }
}
