//! Overlay image tiles.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::error::OverlayError;
use super::provider::RasterOverlayTileProvider;
use super::raster_overlay::OverlayId;
use crate::async_system::{catch_panics, AsyncSystem};
use crate::externals::Credit;
use crate::geometry::Rectangle;

/// Load progress of one overlay tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterOverlayTileState {
    /// Served by a placeholder provider; never loads.
    Placeholder,
    Unloaded,
    Loading,
    Loaded,
    Done,
    Failed,
}

impl RasterOverlayTileState {
    /// Whether an image is available for attaching.
    pub fn has_image(self) -> bool {
        matches!(self, RasterOverlayTileState::Loaded | RasterOverlayTileState::Done)
    }
}

/// Decoded image produced by a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedRasterOverlayImage {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub pixel_data: Vec<u8>,
    pub credits: Vec<Credit>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

struct TileData {
    state: RasterOverlayTileState,
    image: Option<LoadedRasterOverlayImage>,
}

/// One overlay image tile, shared between geometry tiles that drape it.
pub struct RasterOverlayTile {
    provider: Arc<dyn RasterOverlayTileProvider>,
    rectangle: Rectangle,
    target_screen_pixels: [f64; 2],
    data: Mutex<TileData>,
}

impl RasterOverlayTile {
    pub fn new(
        provider: Arc<dyn RasterOverlayTileProvider>,
        rectangle: Rectangle,
        target_screen_pixels: [f64; 2],
    ) -> Self {
        let state = if provider.is_placeholder() {
            RasterOverlayTileState::Placeholder
        } else {
            RasterOverlayTileState::Unloaded
        };
        Self {
            provider,
            rectangle,
            target_screen_pixels,
            data: Mutex::new(TileData { state, image: None }),
        }
    }

    pub fn tile_provider(&self) -> &Arc<dyn RasterOverlayTileProvider> {
        &self.provider
    }

    /// Overlay that owns this tile's provider.
    pub fn owner(&self) -> OverlayId {
        self.provider.owner()
    }

    pub fn rectangle(&self) -> Rectangle {
        self.rectangle
    }

    pub fn target_screen_pixels(&self) -> [f64; 2] {
        self.target_screen_pixels
    }

    pub fn state(&self) -> RasterOverlayTileState {
        self.data.lock().state
    }

    /// Copy of the loaded image, if any.
    pub fn image(&self) -> Option<LoadedRasterOverlayImage> {
        self.data.lock().image.clone()
    }

    /// Start loading this tile's image.
    ///
    /// The provider runs on a worker and the outcome is recorded on the
    /// coordinating thread. Tiles that are not `Unloaded` are left alone.
    pub fn load_in_worker(self: &Arc<Self>, async_system: &AsyncSystem) {
        {
            let mut data = self.data.lock();
            if data.state != RasterOverlayTileState::Unloaded {
                return;
            }
            data.state = RasterOverlayTileState::Loading;
        }

        let future = catch_panics(self.provider.load_tile_image(self));
        let tile = Arc::clone(self);
        async_system.then_in_main_thread(future, move |result| tile.finish_load(result));
    }

    fn finish_load(&self, result: Result<LoadedRasterOverlayImage, OverlayError>) {
        let mut data = self.data.lock();
        match result {
            Ok(image) => {
                for message in &image.warnings {
                    debug!(owner = %self.owner(), "Overlay image warning: {}", message);
                }
                data.state = if image.errors.is_empty() {
                    RasterOverlayTileState::Loaded
                } else {
                    warn!(owner = %self.owner(), errors = ?image.errors, "Overlay image loaded with errors");
                    RasterOverlayTileState::Failed
                };
                data.image = Some(image);
            }
            Err(e) => {
                warn!(owner = %self.owner(), error = %e, "Overlay image load failed");
                data.state = RasterOverlayTileState::Failed;
            }
        }
    }

    /// Mark a loaded tile as handed to the renderer.
    pub(crate) fn mark_done(&self) {
        let mut data = self.data.lock();
        if data.state == RasterOverlayTileState::Loaded {
            data.state = RasterOverlayTileState::Done;
        }
    }
}

impl fmt::Debug for RasterOverlayTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterOverlayTile")
            .field("owner", &self.owner())
            .field("rectangle", &self.rectangle)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
