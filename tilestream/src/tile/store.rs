//! Tile arena and loaded-tile traversal.

use tracing::debug;

use super::{LoadedTileList, Tile, TileId, TileLoadState};
use crate::externals::PrepareRendererResources;
use crate::geometry::Rectangle;

/// Owns every tile of a tileset and tracks which ones are loaded.
#[derive(Debug, Default)]
pub struct TileStore {
    tiles: Vec<Tile>,
    loaded: LoadedTileList,
}

impl TileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unloaded tile.
    pub fn insert_tile(&mut self, geometric_error: f64, rectangle: Rectangle) -> TileId {
        let id = TileId::new(self.tiles.len());
        self.tiles.push(Tile::new(id, geometric_error, rectangle));
        id
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.index())
    }

    pub fn tile_mut(&mut self, id: TileId) -> Option<&mut Tile> {
        self.tiles.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn loaded_tiles(&self) -> &LoadedTileList {
        &self.loaded
    }

    /// Change a tile's load state, keeping the loaded list in step.
    ///
    /// A tile leaving `Unloaded` is appended to the loaded list. Returning a
    /// loaded tile to `Unloaded` must go through [`unload_tile`](Self::unload_tile)
    /// so its overlay mappings are detached; this returns false instead.
    /// Also returns false for unknown ids.
    pub fn set_state(&mut self, id: TileId, state: TileLoadState) -> bool {
        let Some(tile) = self.tiles.get(id.index()) else {
            return false;
        };
        if state == TileLoadState::Unloaded && tile.state != TileLoadState::Unloaded {
            return false;
        }
        self.transition(id, state);
        true
    }

    fn transition(&mut self, id: TileId, state: TileLoadState) {
        let Some(tile) = self.tiles.get_mut(id.index()) else {
            return;
        };

        let was_loaded = tile.state != TileLoadState::Unloaded;
        tile.state = state;

        match (was_loaded, state != TileLoadState::Unloaded) {
            (false, true) => self.loaded.push_back(id),
            (true, false) => {
                self.loaded.remove(id);
            }
            _ => {}
        }
    }

    /// Mark a loaded tile as recently used.
    pub fn touch(&mut self, id: TileId) {
        if self.loaded.contains(id) {
            self.loaded.push_back(id);
        }
    }

    /// Detach every overlay from a tile and return it to `Unloaded`.
    pub fn unload_tile(&mut self, id: TileId, prepare: &dyn PrepareRendererResources) -> bool {
        let Some(tile) = self.tiles.get_mut(id.index()) else {
            return false;
        };
        tile.detach_all_mappings(prepare);
        self.transition(id, TileLoadState::Unloaded);
        true
    }

    /// Unload least recently used tiles until at most `budget` remain loaded.
    /// Returns the number of tiles unloaded.
    pub fn unload_tiles_beyond(
        &mut self,
        budget: usize,
        prepare: &dyn PrepareRendererResources,
    ) -> usize {
        let mut unloaded = 0;
        for_each_loaded_tile(self, |store, id| {
            if store.loaded.len() > budget && store.unload_tile(id, prepare) {
                unloaded += 1;
            }
        });
        if unloaded > 0 {
            debug!(unloaded, budget, "Unloaded least recently used tiles");
        }
        unloaded
    }
}

/// Visit every loaded tile from head to tail.
///
/// The successor is read before `callback` runs, so the callback may unlink
/// (or unload) the tile it is given.
pub fn for_each_loaded_tile<F>(store: &mut TileStore, mut callback: F)
where
    F: FnMut(&mut TileStore, TileId),
{
    let mut current = store.loaded.head();
    while let Some(id) = current {
        let next = store.loaded.next(id);
        callback(store, id);
        current = next;
    }
}
