//! Raster overlays draped over geometry tiles.
//!
//! - [`RasterOverlay`]: an imagery source, shared as `Arc<RasterOverlay>`
//! - [`RasterOverlayTileProvider`]: produces images for an overlay's tiles
//! - [`RasterOverlayCollection`]: the overlays attached to one tileset

mod collection;
mod error;
mod provider;
mod raster_overlay;
mod tile;

pub use collection::{OverlayList, RasterOverlayCollection};
pub use error::{OverlayError, RasterOverlayLoadFailureDetails, RasterOverlayLoadType};
pub use provider::{
    PlaceholderTileProvider, RasterOverlayTileProvider, TileProviderFactory, TileProviderSlot,
};
pub use raster_overlay::{LoadErrorCallback, OverlayId, RasterOverlay, RasterOverlayOptions};
pub use tile::{LoadedRasterOverlayImage, RasterOverlayTile, RasterOverlayTileState};
