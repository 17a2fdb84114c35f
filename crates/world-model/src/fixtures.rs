//! Ready-made world builders for testing.
//!
//! This module provides helpers for other crates to assemble small
//! observable worlds without repeating placement boilerplate. Enable the
//! `test-fixtures` feature to access them.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // world-model = { path = "../world-model", features = ["test-fixtures"] }
//!
//! use world_model::fixtures;
//!
//! let mut world = fixtures::single_room();
//! fixtures::place(&mut world, fixtures::loose_item(10, 100, 50.0));
//! ```

use crate::cell::{Actor, Cell, CellId, WorldModel};
use crate::geometry::Vec3;
use crate::handle::RefHandle;
use crate::reference::{FormKind, InventoryEntry, LockLevel, TemplateId, WorldRef};

/// Cell id used by [`single_room`].
pub const ROOM: CellId = CellId(1);

/// An interior single-cell world with the player at the origin.
pub fn single_room() -> WorldModel {
    let mut world = WorldModel::new();
    world.insert_cell(Cell::interior(ROOM));
    world.player_cell = Some(ROOM);
    world.player_position = Vec3::ZERO;
    world
}

/// Places a reference into the player's cell.
pub fn place(world: &mut WorldModel, r: WorldRef) {
    let cell = world
        .player_cell
        .expect("fixture world has a player cell");
    world
        .cell_mut(cell)
        .expect("fixture cell exists")
        .refs
        .push(r);
}

/// A loose item `dist` units in front of the player.
pub fn loose_item(id: u32, template: u32, dist: f32) -> WorldRef {
    WorldRef::new(
        RefHandle::stable(id),
        TemplateId(template),
        FormKind::LooseItem,
        Vec3::new(dist, 0.0, 0.0),
    )
    .with_count(1)
}

/// An unlocked container with the given inventory.
pub fn container(id: u32, template: u32, dist: f32, inventory: Vec<(u32, u32)>) -> WorldRef {
    WorldRef::new(
        RefHandle::stable(id),
        TemplateId(template),
        FormKind::Container,
        Vec3::new(dist, 0.0, 0.0),
    )
    .with_lock(LockLevel::Unlocked)
    .with_inventory(
        inventory
            .into_iter()
            .map(|(t, n)| InventoryEntry::new(TemplateId(t), n))
            .collect(),
    )
}

/// A door at the given distance.
pub fn door(id: u32, template: u32, dist: f32, lock: LockLevel) -> WorldRef {
    WorldRef::new(
        RefHandle::stable(id),
        TemplateId(template),
        FormKind::Door,
        Vec3::new(dist, 0.0, 0.0),
    )
    .with_lock(lock)
}

/// A dead actor plus its lootable corpse reference.
///
/// Registers the actor as dead in the world's actor table and returns the
/// corpse reference for placement.
pub fn corpse(world: &mut WorldModel, id: u32, template: u32, dist: f32) -> WorldRef {
    let handle = RefHandle::stable(id);
    let position = Vec3::new(dist, 0.0, 0.0);
    world.insert_actor(Actor::new(handle, position).dead());
    WorldRef::new(handle, TemplateId(template), FormKind::Actor, position)
}

/// A living actor registered in the world's actor table.
pub fn living_actor(world: &mut WorldModel, id: u32, dist: f32, teammate: bool) {
    let handle = RefHandle::stable(id);
    let mut actor = Actor::new(handle, Vec3::new(dist, 0.0, 0.0));
    if teammate {
        actor = actor.teammate_of_player();
    }
    world.insert_actor(actor);
    place(
        world,
        WorldRef::new(
            handle,
            TemplateId(0xA000 + id),
            FormKind::Actor,
            Vec3::new(dist, 0.0, 0.0),
        ),
    );
}
