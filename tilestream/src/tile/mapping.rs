//! Mapping of overlay tiles onto a geometry tile.

use std::sync::Arc;

use super::Tile;
use crate::externals::{PrepareRendererResources, RendererResource};
use crate::overlay::{OverlayId, RasterOverlayTile};

/// Whether the renderer currently holds the mapping's image on the tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    Unattached,
    Attached,
}

/// One overlay's contribution to one geometry tile.
///
/// A mapping starts with a *loading* overlay tile. Once that tile has an
/// image, [`update`](Self::update) promotes it to *ready* and attaches it.
#[derive(Debug)]
pub struct RasterMappedTo3DTile {
    loading_tile: Option<Arc<RasterOverlayTile>>,
    ready_tile: Option<Arc<RasterOverlayTile>>,
    provider_index: Option<usize>,
    texture_coordinate_id: u32,
    state: AttachmentState,
    renderer_resource: Option<RendererResource>,
}

impl RasterMappedTo3DTile {
    /// `provider_index` is the overlay's position in its collection, or
    /// `None` when it has not been resolved yet.
    pub fn new(loading_tile: Arc<RasterOverlayTile>, provider_index: Option<usize>) -> Self {
        Self {
            loading_tile: Some(loading_tile),
            ready_tile: None,
            provider_index,
            texture_coordinate_id: 0,
            state: AttachmentState::Unattached,
            renderer_resource: None,
        }
    }

    pub fn with_texture_coordinate_id(mut self, texture_coordinate_id: u32) -> Self {
        self.texture_coordinate_id = texture_coordinate_id;
        self
    }

    pub fn loading_tile(&self) -> Option<&Arc<RasterOverlayTile>> {
        self.loading_tile.as_ref()
    }

    pub fn ready_tile(&self) -> Option<&Arc<RasterOverlayTile>> {
        self.ready_tile.as_ref()
    }

    pub fn provider_index(&self) -> Option<usize> {
        self.provider_index
    }

    pub fn texture_coordinate_id(&self) -> u32 {
        self.texture_coordinate_id
    }

    pub fn state(&self) -> AttachmentState {
        self.state
    }

    /// True if the loading or ready tile comes from `overlay`.
    pub fn is_owned_by(&self, overlay: OverlayId) -> bool {
        let owned = |tile: &Option<Arc<RasterOverlayTile>>| {
            tile.as_ref().is_some_and(|t| t.owner() == overlay)
        };
        owned(&self.loading_tile) || owned(&self.ready_tile)
    }

    /// Promote a finished loading tile and attach it to `tile`.
    pub fn update(&mut self, prepare: &dyn PrepareRendererResources, tile: &Tile) -> AttachmentState {
        let loaded = self
            .loading_tile
            .as_ref()
            .is_some_and(|loading| loading.state().has_image());
        if !loaded {
            return self.state;
        }

        self.detach_from_tile(prepare, tile);

        if let Some(ready) = self.loading_tile.take() {
            let resource = prepare.prepare_raster_in_main_thread(&ready);
            prepare.attach_raster_in_main_thread(tile, self.texture_coordinate_id, &ready, resource);
            ready.mark_done();
            self.renderer_resource = resource;
            self.ready_tile = Some(ready);
            self.state = AttachmentState::Attached;
        }
        self.state
    }

    /// Release the renderer's hold on this mapping's image.
    ///
    /// Does nothing when already unattached.
    pub fn detach_from_tile(&mut self, prepare: &dyn PrepareRendererResources, tile: &Tile) {
        if self.state == AttachmentState::Unattached {
            return;
        }

        if let Some(ready) = &self.ready_tile {
            prepare.detach_raster_in_main_thread(
                tile,
                self.texture_coordinate_id,
                ready,
                self.renderer_resource.take(),
            );
        }
        self.state = AttachmentState::Unattached;
    }
}
