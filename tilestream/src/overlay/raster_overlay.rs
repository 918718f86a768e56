//! Raster overlays and their shared lifetime.
//!
//! An overlay is always held as `Arc<RasterOverlay>`. The collection, each
//! in-flight provider continuation, and any caller all hold their own
//! reference, so a continuation that completes after the overlay was removed
//! still sees a live object.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use super::error::{OverlayError, RasterOverlayLoadFailureDetails};
use super::provider::{PlaceholderTileProvider, RasterOverlayTileProvider, TileProviderFactory};
use crate::async_system::{AsyncSystem, BoxFuture};
use crate::externals::TilesetExternals;
use crate::log::Logger;
use crate::log_error;

static NEXT_OVERLAY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique overlay identity, shared by every provider the overlay owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(u64);

impl OverlayId {
    fn next() -> Self {
        Self(NEXT_OVERLAY_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn for_tests(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overlay#{}", self.0)
    }
}

/// Callback invoked on the coordinating thread when an overlay fails to load.
pub type LoadErrorCallback = Arc<dyn Fn(RasterOverlayLoadFailureDetails) + Send + Sync>;

/// Per-overlay tuning.
#[derive(Clone)]
pub struct RasterOverlayOptions {
    /// Overlay tiles loading at once, per provider.
    pub maximum_simultaneous_tile_loads: u32,

    /// Screen-space error used to pick overlay tile levels.
    pub maximum_screen_space_error: f64,

    /// Largest texture edge, in pixels, requested for one overlay tile.
    pub maximum_texture_size: u32,

    pub load_error_callback: Option<LoadErrorCallback>,
}

impl Default for RasterOverlayOptions {
    fn default() -> Self {
        Self {
            maximum_simultaneous_tile_loads: 20,
            maximum_screen_space_error: 2.0,
            maximum_texture_size: 2048,
            load_error_callback: None,
        }
    }
}

impl RasterOverlayOptions {
    pub fn with_load_error_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(RasterOverlayLoadFailureDetails) + Send + Sync + 'static,
    {
        self.load_error_callback = Some(Arc::new(callback));
        self
    }

    pub fn with_maximum_texture_size(mut self, maximum_texture_size: u32) -> Self {
        self.maximum_texture_size = maximum_texture_size;
        self
    }
}

impl fmt::Debug for RasterOverlayOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterOverlayOptions")
            .field("maximum_simultaneous_tile_loads", &self.maximum_simultaneous_tile_loads)
            .field("maximum_screen_space_error", &self.maximum_screen_space_error)
            .field("maximum_texture_size", &self.maximum_texture_size)
            .field("load_error_callback", &self.load_error_callback.is_some())
            .finish()
    }
}

/// A source of imagery draped over tiles.
pub struct RasterOverlay {
    id: OverlayId,
    name: String,
    options: RasterOverlayOptions,
    factory: Box<dyn TileProviderFactory>,
    placeholder: OnceLock<Arc<dyn RasterOverlayTileProvider>>,
}

impl RasterOverlay {
    pub fn new<F>(name: impl Into<String>, options: RasterOverlayOptions, factory: F) -> Arc<Self>
    where
        F: TileProviderFactory + 'static,
    {
        Arc::new(Self {
            id: OverlayId::next(),
            name: name.into(),
            options,
            factory: Box::new(factory),
            placeholder: OnceLock::new(),
        })
    }

    pub fn id(&self) -> OverlayId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &RasterOverlayOptions {
        &self.options
    }

    /// Stand-in provider used until the real one is ready.
    ///
    /// Created on first use; later calls return the same provider.
    pub fn placeholder(&self) -> Arc<dyn RasterOverlayTileProvider> {
        let placeholder = self
            .placeholder
            .get_or_init(|| Arc::new(PlaceholderTileProvider::new(self.id)));
        Arc::clone(placeholder)
    }

    /// Begin creating this overlay's real tile provider.
    pub fn create_tile_provider(
        self: &Arc<Self>,
        externals: &TilesetExternals,
    ) -> BoxFuture<'static, Result<Arc<dyn RasterOverlayTileProvider>, OverlayError>> {
        self.factory.create_tile_provider(self, externals)
    }

    /// Log a load failure and hand it to the load error callback, if any.
    ///
    /// The callback runs on the coordinating thread during the next dispatch.
    pub fn report_error(
        &self,
        async_system: &AsyncSystem,
        logger: &Arc<dyn Logger>,
        details: RasterOverlayLoadFailureDetails,
    ) {
        log_error!(logger, "{}", details.message);

        if let Some(callback) = &self.options.load_error_callback {
            let callback = Arc::clone(callback);
            async_system.run_in_main_thread(move || callback(details));
        }
    }
}

impl fmt::Debug for RasterOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterOverlay")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NoOpLogger;
    use crate::overlay::error::RasterOverlayLoadType;
    use parking_lot::Mutex;
    use tokio::runtime::Handle;

    fn failing_factory(
        _owner: &Arc<RasterOverlay>,
        _externals: &TilesetExternals,
    ) -> BoxFuture<'static, Result<Arc<dyn RasterOverlayTileProvider>, OverlayError>> {
        Box::pin(async { Err(OverlayError::ImageLoad("unused".to_string())) })
    }

    #[test]
    fn test_overlay_ids_are_unique() {
        let a = RasterOverlay::new("a", RasterOverlayOptions::default(), failing_factory);
        let b = RasterOverlay::new("b", RasterOverlayOptions::default(), failing_factory);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.name(), "a");
    }

    #[test]
    fn test_placeholder_is_created_once() {
        let overlay = RasterOverlay::new("a", RasterOverlayOptions::default(), failing_factory);

        let first = overlay.placeholder();
        let second = overlay.placeholder();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_placeholder());
        assert_eq!(first.owner(), overlay.id());
    }

    #[test]
    fn test_default_options() {
        let options = RasterOverlayOptions::default();
        assert_eq!(options.maximum_simultaneous_tile_loads, 20);
        assert_eq!(options.maximum_texture_size, 2048);
        assert!((options.maximum_screen_space_error - 2.0).abs() < f64::EPSILON);
        assert!(options.load_error_callback.is_none());
    }

    #[tokio::test]
    async fn test_report_error_runs_callback_on_coordinator() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let options = RasterOverlayOptions::default().with_load_error_callback(move |details| {
            sink.lock().push(details);
        });
        let overlay = RasterOverlay::new("imagery", options, failing_factory);
        let async_system = AsyncSystem::new(Handle::current());
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);

        let error = OverlayError::ImageLoad("no data".to_string());
        overlay.report_error(
            &async_system,
            &logger,
            RasterOverlayLoadFailureDetails::tile_provider(overlay.name(), &error),
        );
        assert!(received.lock().is_empty());

        assert_eq!(async_system.dispatch_main_thread_tasks(), 1);
        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].overlay_name, "imagery");
        assert_eq!(received[0].load_type, RasterOverlayLoadType::TileProvider);
    }
}
