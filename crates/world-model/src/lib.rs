//! Shared world-object model for the auto-scavenger engine.
//!
//! This crate contains pure data structures describing the host
//! simulation's world as the scan engine observes it. It holds no
//! engine logic and is a dependency for all other crates in the
//! workspace.

pub mod cell;
pub mod geometry;
pub mod handle;
pub mod reference;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

// Re-export handle types
pub use handle::{Generation, IdentityKind, RefHandle, RefId};

// Re-export geometry types
pub use geometry::Vec3;

// Re-export reference types
pub use reference::{
    ExtraData, FormKind, InventoryEntry, LockLevel, ObjectCategory, TargetClass, TemplateId,
    WorldRef,
};

// Re-export cell types
pub use cell::{Actor, Cell, CellId, WorldModel, WorldSpaceId};
