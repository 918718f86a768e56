//! Collaborators supplied by the embedding application.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::async_system::AsyncSystem;
use crate::http::AssetAccessor;
use crate::log::{Logger, TracingLogger};
use crate::overlay::RasterOverlayTile;
use crate::tile::Tile;

/// Opaque handle to a renderer-side resource.
pub type RendererResource = u64;

/// Renderer hooks for attaching overlay images to tile geometry.
///
/// All methods are called on the coordinating thread.
pub trait PrepareRendererResources: Send + Sync {
    /// Create renderer resources for a loaded overlay tile.
    fn prepare_raster_in_main_thread(&self, _raster_tile: &RasterOverlayTile) -> Option<RendererResource> {
        None
    }

    fn attach_raster_in_main_thread(
        &self,
        tile: &Tile,
        texture_coordinate_id: u32,
        raster_tile: &RasterOverlayTile,
        resource: Option<RendererResource>,
    );

    fn detach_raster_in_main_thread(
        &self,
        tile: &Tile,
        texture_coordinate_id: u32,
        raster_tile: &RasterOverlayTile,
        resource: Option<RendererResource>,
    );
}

/// Handle to a registered attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Credit(usize);

/// Registry of attribution strings shown for loaded imagery.
#[derive(Debug, Default)]
pub struct CreditSystem {
    credits: RwLock<Vec<String>>,
}

impl CreditSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `html`, returning the existing credit if it is already known.
    pub fn create_credit(&self, html: impl Into<String>) -> Credit {
        let html = html.into();
        if let Some(index) = self.credits.read().iter().position(|c| *c == html) {
            return Credit(index);
        }

        let mut credits = self.credits.write();
        // Another thread may have registered it between the locks.
        if let Some(index) = credits.iter().position(|c| *c == html) {
            return Credit(index);
        }
        credits.push(html);
        Credit(credits.len() - 1)
    }

    pub fn credit_html(&self, credit: Credit) -> Option<String> {
        self.credits.read().get(credit.0).cloned()
    }

    pub fn len(&self) -> usize {
        self.credits.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything a tileset and its overlays need from the outside world.
#[derive(Clone)]
pub struct TilesetExternals {
    pub async_system: AsyncSystem,
    pub asset_accessor: Arc<dyn AssetAccessor>,
    pub credit_system: Arc<CreditSystem>,
    pub prepare_renderer_resources: Arc<dyn PrepareRendererResources>,
    pub logger: Arc<dyn Logger>,
}

impl TilesetExternals {
    /// Externals with a fresh credit registry, logging through `tracing`.
    pub fn new(
        async_system: AsyncSystem,
        asset_accessor: Arc<dyn AssetAccessor>,
        prepare_renderer_resources: Arc<dyn PrepareRendererResources>,
    ) -> Self {
        Self {
            async_system,
            asset_accessor,
            credit_system: Arc::new(CreditSystem::new()),
            prepare_renderer_resources,
            logger: Arc::new(TracingLogger::new("tileset")),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }
}

impl fmt::Debug for TilesetExternals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TilesetExternals")
            .field("async_system", &self.async_system)
            .field("credit_system", &self.credit_system)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credits_are_deduplicated() {
        let system = CreditSystem::new();
        let a = system.create_credit("© Imagery A");
        let b = system.create_credit("© Imagery B");
        let again = system.create_credit("© Imagery A");

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(system.len(), 2);
        assert_eq!(system.credit_html(b).unwrap(), "© Imagery B");
    }

    #[tokio::test]
    async fn test_new_uses_fresh_credit_system() {
        use crate::async_system::BoxFuture;
        use crate::http::{AssetError, AssetRequest, HttpHeaders};
        use crate::log::NoOpLogger;

        struct Offline;

        impl AssetAccessor for Offline {
            fn get(
                &self,
                url: &str,
                _headers: &HttpHeaders,
            ) -> BoxFuture<'static, Result<Arc<dyn AssetRequest>, AssetError>> {
                let url = url.to_string();
                Box::pin(async move {
                    Err(AssetError::RequestFailed {
                        url,
                        message: "offline".to_string(),
                    })
                })
            }
        }

        struct Headless;

        impl PrepareRendererResources for Headless {
            fn attach_raster_in_main_thread(&self, _: &Tile, _: u32, _: &RasterOverlayTile, _: Option<RendererResource>) {}

            fn detach_raster_in_main_thread(&self, _: &Tile, _: u32, _: &RasterOverlayTile, _: Option<RendererResource>) {}
        }

        let async_system = AsyncSystem::new(tokio::runtime::Handle::current());
        let externals = TilesetExternals::new(async_system, Arc::new(Offline), Arc::new(Headless));
        assert!(externals.credit_system.is_empty());

        let shared = externals.clone().with_logger(Arc::new(NoOpLogger));
        shared.credit_system.create_credit("© Imagery");
        assert_eq!(externals.credit_system.len(), 1);
    }

    #[test]
    fn test_unknown_credit() {
        let system = CreditSystem::new();
        assert!(system.is_empty());
        assert!(system.credit_html(Credit(3)).is_none());
    }
}
