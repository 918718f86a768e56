//! Tile providers and the per-overlay provider slot.

use std::fmt;
use std::sync::Arc;

use futures::future::FutureExt;

use super::error::OverlayError;
use super::raster_overlay::{OverlayId, RasterOverlay};
use super::tile::{LoadedRasterOverlayImage, RasterOverlayTile};
use crate::async_system::BoxFuture;
use crate::externals::TilesetExternals;
use crate::geometry::Rectangle;

/// Produces images for the tiles of one overlay.
pub trait RasterOverlayTileProvider: Send + Sync {
    /// The overlay this provider belongs to.
    fn owner(&self) -> OverlayId;

    /// Whether this is the stand-in used while the real provider is created.
    fn is_placeholder(&self) -> bool {
        false
    }

    /// Load the image for one overlay tile.
    ///
    /// The returned future must not borrow `tile`; copy out what it needs.
    fn load_tile_image(
        &self,
        tile: &RasterOverlayTile,
    ) -> BoxFuture<'static, Result<LoadedRasterOverlayImage, OverlayError>>;
}

impl dyn RasterOverlayTileProvider {
    /// Create an overlay tile covering `rectangle` served by this provider.
    pub fn get_tile(
        self: &Arc<Self>,
        rectangle: Rectangle,
        target_screen_pixels: [f64; 2],
    ) -> Arc<RasterOverlayTile> {
        Arc::new(RasterOverlayTile::new(
            Arc::clone(self),
            rectangle,
            target_screen_pixels,
        ))
    }
}

/// Creates the real provider for an overlay.
pub trait TileProviderFactory: Send + Sync {
    fn create_tile_provider(
        &self,
        owner: &Arc<RasterOverlay>,
        externals: &TilesetExternals,
    ) -> BoxFuture<'static, Result<Arc<dyn RasterOverlayTileProvider>, OverlayError>>;
}

impl<F> TileProviderFactory for F
where
    F: Fn(
            &Arc<RasterOverlay>,
            &TilesetExternals,
        ) -> BoxFuture<'static, Result<Arc<dyn RasterOverlayTileProvider>, OverlayError>>
        + Send
        + Sync,
{
    fn create_tile_provider(
        &self,
        owner: &Arc<RasterOverlay>,
        externals: &TilesetExternals,
    ) -> BoxFuture<'static, Result<Arc<dyn RasterOverlayTileProvider>, OverlayError>> {
        self(owner, externals)
    }
}

/// Provider that resolves every load with an empty image.
#[derive(Debug)]
pub struct PlaceholderTileProvider {
    owner: OverlayId,
}

impl PlaceholderTileProvider {
    pub fn new(owner: OverlayId) -> Self {
        Self { owner }
    }
}

impl RasterOverlayTileProvider for PlaceholderTileProvider {
    fn owner(&self) -> OverlayId {
        self.owner
    }

    fn is_placeholder(&self) -> bool {
        true
    }

    fn load_tile_image(
        &self,
        _tile: &RasterOverlayTile,
    ) -> BoxFuture<'static, Result<LoadedRasterOverlayImage, OverlayError>> {
        futures::future::ready(Ok(LoadedRasterOverlayImage::default())).boxed()
    }
}

/// The provider currently serving an overlay's position in a collection.
#[derive(Clone)]
pub enum TileProviderSlot {
    /// Provider creation is in flight or failed.
    Placeholder(Arc<dyn RasterOverlayTileProvider>),
    Ready(Arc<dyn RasterOverlayTileProvider>),
}

impl TileProviderSlot {
    pub fn provider(&self) -> &Arc<dyn RasterOverlayTileProvider> {
        match self {
            TileProviderSlot::Placeholder(provider) | TileProviderSlot::Ready(provider) => provider,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, TileProviderSlot::Ready(_))
    }
}

impl fmt::Debug for TileProviderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_ready() { "Ready" } else { "Placeholder" };
        f.debug_tuple(state).field(&self.provider().owner()).finish()
    }
}
