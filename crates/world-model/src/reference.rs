//! Placed world references and their transient extra data.
//!
//! A [`WorldRef`] is a placed instance of a [`TemplateId`], distinct from
//! the template it instantiates. The host owns these; the engine only
//! reads them and keeps its own annotations in side tables.

use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;
use crate::handle::RefHandle;

/// Shared definition a world reference instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub u32);

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tmpl_{:08x}", self.0)
    }
}

/// Structural kind of a placed reference, used for cheap rejection
/// before any policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    /// A takeable item lying in the world
    LooseItem,
    /// A chest, sack, cupboard or similar
    Container,
    /// A living or dead character
    Actor,
    /// A load door or interior door
    Door,
    /// Harvestable scenery with a secondary product (flora, critters)
    Producer,
    /// Scenery with no interaction
    Static,
}

/// Policy sub-chain selected for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetClass {
    LooseItem,
    Container,
    Corpse,
}

/// Base classification of an object's template.
///
/// Assigned by the host's keyword taxonomy; the engine consumes it
/// through the classifier port and keys per-category policy off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectCategory {
    Weapon,
    Armor,
    Jewelry,
    Book,
    Ingredient,
    Potion,
    SoulGem,
    Ammo,
    Lockpick,
    OreVein,
    Currency,
    Flora,
    Critter,
    Clutter,
    Container,
    Corpse,
}

impl ObjectCategory {
    /// Categories exempt from population-density suppression.
    pub fn is_density_exempt(self) -> bool {
        matches!(
            self,
            ObjectCategory::Ammo
                | ObjectCategory::Lockpick
                | ObjectCategory::OreVein
                | ObjectCategory::Currency
        )
    }

    /// Harvestable resources, which also bypass density suppression.
    pub fn is_harvestable_resource(self) -> bool {
        matches!(
            self,
            ObjectCategory::Flora | ObjectCategory::Critter | ObjectCategory::OreVein
        )
    }
}

/// Lock state of a door or container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockLevel {
    Unlocked,
    Novice,
    Apprentice,
    Adept,
    Expert,
    Master,
    RequiresKey,
}

impl LockLevel {
    pub fn is_locked(self) -> bool {
        !matches!(self, LockLevel::Unlocked)
    }
}

/// One stack of items inside a container or corpse inventory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub template: TemplateId,
    pub count: u32,
}

impl InventoryEntry {
    pub fn new(template: TemplateId, count: u32) -> Self {
        Self { template, count }
    }
}

/// Transient per-reference data attached by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtraData {
    /// Lock state, if the reference can be locked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<LockLevel>,
    /// Stack count for loose items
    #[serde(default)]
    pub count: u32,
    /// Owning faction or character, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Flagged as a quest target
    #[serde(default)]
    pub quest_target: bool,
    /// Flagged as a boss container
    #[serde(default)]
    pub boss: bool,
    /// Secondary product of a producer, once the host resolved it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<TemplateId>,
    /// Inventory of a container or corpse
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inventory: Vec<InventoryEntry>,
}

/// A placed instance of a template in the simulated world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldRef {
    pub handle: RefHandle,
    /// Missing on malformed references; such refs are never candidates
    pub template: Option<TemplateId>,
    pub kind: FormKind,
    pub position: Vec3,
    /// Whether the host has the object fully loaded this frame
    pub loaded: bool,
    pub extra: ExtraData,
}

impl WorldRef {
    pub fn new(handle: RefHandle, template: TemplateId, kind: FormKind, position: Vec3) -> Self {
        Self {
            handle,
            template: Some(template),
            kind,
            position,
            loaded: true,
            extra: ExtraData::default(),
        }
    }

    /// A reference with no identity or no template cannot be evaluated.
    pub fn is_malformed(&self) -> bool {
        self.handle.id.is_null() || self.template.is_none()
    }

    pub fn is_locked(&self) -> bool {
        self.extra.lock.map(LockLevel::is_locked).unwrap_or(false)
    }

    pub fn with_lock(mut self, lock: LockLevel) -> Self {
        self.extra.lock = Some(lock);
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.extra.count = count;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.extra.owner = Some(owner.into());
        self
    }

    pub fn with_quest_flag(mut self) -> Self {
        self.extra.quest_target = true;
        self
    }

    pub fn with_boss_flag(mut self) -> Self {
        self.extra.boss = true;
        self
    }

    pub fn with_inventory(mut self, inventory: Vec<InventoryEntry>) -> Self {
        self.extra.inventory = inventory;
        self
    }

    pub fn unloaded(mut self) -> Self {
        self.loaded = false;
        self
    }
}
