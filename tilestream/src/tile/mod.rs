//! Geometry tiles, their storage, and the loaded-tile list.
//!
//! Tiles live in a [`TileStore`] arena and are addressed by [`TileId`]. Every
//! tile whose state is not [`TileLoadState::Unloaded`] is linked into the
//! store's [`LoadedTileList`]; overlays walk that list with
//! [`for_each_loaded_tile`] when they attach or detach.

mod loaded_list;
pub mod mapping;
mod store;

use crate::externals::PrepareRendererResources;
use crate::geometry::Rectangle;
use crate::overlay::OverlayId;

pub use loaded_list::LoadedTileList;
pub use mapping::{AttachmentState, RasterMappedTo3DTile};
pub use store::{for_each_loaded_tile, TileStore};

/// Index of a tile in its [`TileStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(usize);

impl TileId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Content load progress of a geometry tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileLoadState {
    Unloaded,
    ContentLoading,
    ContentLoaded,
    Done,
    FailedTemporarily,
    Failed,
}

/// A geometry tile and the overlay tiles draped over it.
#[derive(Debug)]
pub struct Tile {
    id: TileId,
    state: TileLoadState,
    geometric_error: f64,
    rectangle: Rectangle,
    mapped_raster_tiles: Vec<RasterMappedTo3DTile>,
}

impl Tile {
    pub(crate) fn new(id: TileId, geometric_error: f64, rectangle: Rectangle) -> Self {
        Self {
            id,
            state: TileLoadState::Unloaded,
            geometric_error,
            rectangle,
            mapped_raster_tiles: Vec::new(),
        }
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn state(&self) -> TileLoadState {
        self.state
    }

    pub fn geometric_error(&self) -> f64 {
        self.geometric_error
    }

    pub fn rectangle(&self) -> Rectangle {
        self.rectangle
    }

    pub fn mapped_raster_tiles(&self) -> &[RasterMappedTo3DTile] {
        &self.mapped_raster_tiles
    }

    pub fn mapped_raster_tiles_mut(&mut self) -> &mut Vec<RasterMappedTo3DTile> {
        &mut self.mapped_raster_tiles
    }

    /// Detach and drop every mapping owned by `overlay`. Returns how many
    /// mappings were removed.
    pub fn remove_mappings_owned_by(
        &mut self,
        overlay: OverlayId,
        prepare: &dyn PrepareRendererResources,
    ) -> usize {
        let mappings = std::mem::take(&mut self.mapped_raster_tiles);
        let (mut removed, kept): (Vec<_>, Vec<_>) =
            mappings.into_iter().partition(|m| m.is_owned_by(overlay));

        for mapping in &mut removed {
            mapping.detach_from_tile(prepare, self);
        }
        self.mapped_raster_tiles = kept;
        removed.len()
    }

    /// Promote finished overlay loads and attach them to this tile.
    pub fn update_mappings(&mut self, prepare: &dyn PrepareRendererResources) {
        let mut mappings = std::mem::take(&mut self.mapped_raster_tiles);
        for mapping in &mut mappings {
            mapping.update(prepare, self);
        }
        self.mapped_raster_tiles = mappings;
    }

    fn detach_all_mappings(&mut self, prepare: &dyn PrepareRendererResources) {
        let mut mappings = std::mem::take(&mut self.mapped_raster_tiles);
        for mapping in &mut mappings {
            mapping.detach_from_tile(prepare, self);
        }
    }
}
