//! World query service: terrain, bounds, adjacency, and cell occupancy.
//!
//! The coordination core treats the map as an opaque collaborator. This is
//! the minimal grid that answers the queries the core needs; pathfinding and
//! terrain generation are out of scope.

use std::collections::HashMap;

use garrison_logic::cell::{CellPos, TerrainType};
use hecs::Entity;

#[derive(Debug, Default)]
pub struct GameMap {
    width: i32,
    height: i32,
    terrain: Vec<TerrainType>,
    occupancy: HashMap<CellPos, Vec<Entity>>,
}

impl GameMap {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            terrain: vec![TerrainType::Clear; (width * height) as usize],
            occupancy: HashMap::new(),
        }
    }

    pub fn in_bounds(&self, cell: CellPos) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    pub fn clamp(&self, cell: CellPos) -> CellPos {
        CellPos::new(
            cell.x.clamp(0, self.width - 1),
            cell.y.clamp(0, self.height - 1),
        )
    }

    pub fn terrain_at(&self, cell: CellPos) -> TerrainType {
        let c = self.clamp(cell);
        self.terrain[(c.y * self.width + c.x) as usize]
    }

    pub fn set_terrain(&mut self, cell: CellPos, terrain: TerrainType) {
        if self.in_bounds(cell) {
            self.terrain[(cell.y * self.width + cell.x) as usize] = terrain;
        }
    }

    /// In-bounds neighbours of `cell`, excluding `cell` itself.
    pub fn adjacent_cells(&self, cell: CellPos) -> Vec<CellPos> {
        cell.neighbors()
            .into_iter()
            .filter(|c| self.in_bounds(*c))
            .collect()
    }

    pub fn occupants(&self, cell: CellPos) -> &[Entity] {
        self.occupancy.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_free(&self, cell: CellPos) -> bool {
        self.occupants(cell).is_empty()
    }

    /// Can a ground unit stand here right now?
    pub fn can_enter(&self, cell: CellPos) -> bool {
        self.in_bounds(cell) && self.terrain_at(cell).passable() && self.is_free(cell)
    }

    pub fn add_occupant(&mut self, cell: CellPos, entity: Entity) {
        self.occupancy.entry(cell).or_default().push(entity);
    }

    pub fn remove_occupant(&mut self, cell: CellPos, entity: Entity) {
        if let Some(list) = self.occupancy.get_mut(&cell) {
            list.retain(|e| *e != entity);
            if list.is_empty() {
                self.occupancy.remove(&cell);
            }
        }
    }

    pub fn move_occupant(&mut self, from: CellPos, to: CellPos, entity: Entity) {
        self.remove_occupant(from, entity);
        self.add_occupant(to, entity);
    }
}
