//! World cells and the observable world model.
//!
//! The host keeps placed references grouped in cells. Interior cells
//! stand alone; exterior cells belong to a world space and sit on a grid,
//! so a scan touching an exterior cell also touches its direct
//! neighbours.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::geometry::Vec3;
use crate::handle::{RefHandle, RefId};
use crate::reference::WorldRef;

/// Identifier of a world cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId(pub u32);

/// Identifier of an exterior world space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldSpaceId(pub u32);

/// A cell of placed references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    /// None for interior cells
    pub world_space: Option<WorldSpaceId>,
    /// Grid coordinates within the world space
    pub grid: (i32, i32),
    /// Resident population used for density suppression
    pub population: u32,
    pub refs: Vec<WorldRef>,
}

impl Cell {
    pub fn interior(id: CellId) -> Self {
        Self {
            id,
            world_space: None,
            grid: (0, 0),
            population: 0,
            refs: Vec::new(),
        }
    }

    pub fn exterior(id: CellId, world_space: WorldSpaceId, grid: (i32, i32)) -> Self {
        Self {
            id,
            world_space: Some(world_space),
            grid,
            population: 0,
            refs: Vec::new(),
        }
    }

    pub fn with_population(mut self, population: u32) -> Self {
        self.population = population;
        self
    }

    pub fn with_refs(mut self, refs: Vec<WorldRef>) -> Self {
        self.refs = refs;
        self
    }

    pub fn is_exterior(&self) -> bool {
        self.world_space.is_some()
    }

    /// True when `other` lies in the same world space at most one grid
    /// step away (including itself).
    pub fn is_adjacent_to(&self, other: &Cell) -> bool {
        match (self.world_space, other.world_space) {
            (Some(a), Some(b)) if a == b => {
                (self.grid.0 - other.grid.0).abs() <= 1 && (self.grid.1 - other.grid.1).abs() <= 1
            }
            _ => false,
        }
    }
}

/// A character in the world, living or dead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub handle: RefHandle,
    pub position: Vec3,
    pub dead: bool,
    /// Hostile toward the player
    #[serde(default)]
    pub hostile: bool,
    /// Travelling with the player
    #[serde(default)]
    pub teammate: bool,
}

impl Actor {
    pub fn new(handle: RefHandle, position: Vec3) -> Self {
        Self {
            handle,
            position,
            dead: false,
            hostile: false,
            teammate: false,
        }
    }

    pub fn teammate_of_player(mut self) -> Self {
        self.teammate = true;
        self
    }

    pub fn hostile_to_player(mut self) -> Self {
        self.hostile = true;
        self
    }

    pub fn dead(mut self) -> Self {
        self.dead = true;
        self
    }
}

/// The host world as the engine observes it.
///
/// The host mutates this concurrently from its own frame loop; the
/// engine takes a short read lock per cycle and never holds references
/// across cycles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldModel {
    pub cells: HashMap<u32, Cell>,
    pub player_cell: Option<CellId>,
    pub player_position: Vec3,
    /// Actor state keyed by reference id
    pub actors: HashMap<u32, Actor>,
}

impl WorldModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_cell(&mut self, cell: Cell) {
        self.cells.insert(cell.id.0, cell);
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(&id.0)
    }

    pub fn cell_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.cells.get_mut(&id.0)
    }

    pub fn insert_actor(&mut self, actor: Actor) {
        self.actors.insert(actor.handle.id.0, actor);
    }

    pub fn actor(&self, id: RefId) -> Option<&Actor> {
        self.actors.get(&id.0)
    }

    pub fn actor_mut(&mut self, id: RefId) -> Option<&mut Actor> {
        self.actors.get_mut(&id.0)
    }

    /// The player's cell plus, outdoors, directly adjacent cells of the
    /// same world space.
    pub fn cells_in_reach(&self) -> Vec<&Cell> {
        let Some(center_id) = self.player_cell else {
            return Vec::new();
        };
        let Some(center) = self.cell(center_id) else {
            return Vec::new();
        };

        let mut reach = vec![center];
        if center.is_exterior() {
            reach.extend(
                self.cells
                    .values()
                    .filter(|c| c.id != center.id && center.is_adjacent_to(c)),
            );
        }
        reach
    }

    /// Looks up a reference by id across all cells in reach.
    pub fn find_ref(&self, id: RefId) -> Option<&WorldRef> {
        self.cells
            .values()
            .flat_map(|c| c.refs.iter())
            .find(|r| r.handle.id == id)
    }
}
