//! The set of overlays draped over a tileset.
//!
//! Overlays and their provider slots live in an [`OverlayList`] shared
//! through `Arc`. Provider creation completes asynchronously; its
//! continuation holds its own references to the overlay and the list, so it
//! stays valid even if the overlay was removed or the collection dropped in
//! the meantime. The continuation finds the overlay again by identity and
//! does nothing if it is gone.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::error::RasterOverlayLoadFailureDetails;
use super::provider::TileProviderSlot;
use super::raster_overlay::RasterOverlay;
use crate::async_system::catch_panics;
use crate::externals::TilesetExternals;
use crate::geometry::Rectangle;
use crate::tile::{for_each_loaded_tile, RasterMappedTo3DTile, Tile, TileLoadState, TileStore};

/// Overlays and their provider slots, index-aligned.
#[derive(Debug, Default)]
pub struct OverlayList {
    overlays: Vec<Arc<RasterOverlay>>,
    tile_providers: Vec<TileProviderSlot>,
}

impl OverlayList {
    fn position(&self, overlay: &RasterOverlay) -> Option<usize> {
        self.overlays
            .iter()
            .position(|candidate| std::ptr::eq(Arc::as_ptr(candidate), overlay))
    }

    fn push(&mut self, overlay: Arc<RasterOverlay>) {
        self.tile_providers
            .push(TileProviderSlot::Placeholder(overlay.placeholder()));
        self.overlays.push(overlay);
    }

    fn remove(&mut self, index: usize) {
        self.overlays.remove(index);
        self.tile_providers.remove(index);
    }
}

/// Overlays attached to one tileset.
///
/// Must be driven from the coordinating thread.
pub struct RasterOverlayCollection {
    loaded_tiles: Arc<Mutex<TileStore>>,
    externals: TilesetExternals,
    overlays: Option<Arc<RwLock<OverlayList>>>,
}

impl RasterOverlayCollection {
    pub fn new(loaded_tiles: Arc<Mutex<TileStore>>, externals: TilesetExternals) -> Self {
        Self {
            loaded_tiles,
            externals,
            overlays: None,
        }
    }

    /// Add an overlay and start creating its tile provider.
    ///
    /// The overlay is usable immediately through its placeholder provider.
    /// Every loaded tile gets a placeholder mapping for it. Adding an
    /// overlay that is already in the collection does nothing.
    pub fn add(&mut self, overlay: Arc<RasterOverlay>) {
        let list = Arc::clone(
            self.overlays
                .get_or_insert_with(|| Arc::new(RwLock::new(OverlayList::default()))),
        );
        {
            let mut overlays = list.write();
            if overlays.position(&overlay).is_some() {
                debug!(overlay = %overlay.name(), "Overlay already in collection");
                return;
            }
            overlays.push(Arc::clone(&overlay));
        }

        let future = catch_panics(overlay.create_tile_provider(&self.externals));
        let async_system = self.externals.async_system.clone();
        let logger = Arc::clone(&self.externals.logger);
        let pending = Arc::clone(&overlay);

        self.externals
            .async_system
            .then_in_main_thread(future, move |result| match result {
                Ok(provider) => {
                    let mut list = list.write();
                    match list.position(&pending) {
                        Some(index) => {
                            debug!(overlay = %pending.name(), index, "Tile provider ready");
                            list.tile_providers[index] = TileProviderSlot::Ready(provider);
                        }
                        None => {
                            debug!(overlay = %pending.name(), "Tile provider ready after overlay was removed");
                        }
                    }
                }
                Err(e) => {
                    let mut details = RasterOverlayLoadFailureDetails::tile_provider(pending.name(), &e);
                    details.message = format!("Error while creating tile provider: {}", details.message);
                    pending.report_error(&async_system, &logger, details);
                }
            });

        let placeholder = overlay.placeholder();
        let mut store = self.loaded_tiles.lock();
        for_each_loaded_tile(&mut store, |store, id| {
            let Some(tile) = store.tile_mut(id) else {
                return;
            };
            // Rectangle and pixel size are irrelevant for a placeholder.
            if tile.state() != TileLoadState::Unloaded {
                tile.mapped_raster_tiles_mut().push(RasterMappedTo3DTile::new(
                    placeholder.get_tile(Rectangle::default(), [0.0, 0.0]),
                    None,
                ));
            }
        });
    }

    /// Remove an overlay, detaching it from every loaded tile.
    ///
    /// Unknown overlays are ignored. A provider still being created for the
    /// overlay is discarded when it completes.
    pub fn remove(&mut self, overlay: &RasterOverlay) {
        let Some(list) = &self.overlays else {
            return;
        };

        let owner = overlay.id();
        let prepare = Arc::clone(&self.externals.prepare_renderer_resources);
        let mut detached = 0;
        {
            let mut store = self.loaded_tiles.lock();
            for_each_loaded_tile(&mut store, |store, id| {
                if let Some(tile) = store.tile_mut(id) {
                    detached += tile.remove_mappings_owned_by(owner, prepare.as_ref());
                }
            });
        }

        let mut list = list.write();
        if let Some(index) = list.position(overlay) {
            list.remove(index);
            debug!(overlay = %overlay.name(), detached, "Overlay removed");
        }
    }

    /// Map every overlay onto a newly loaded tile.
    pub fn map_overlays_to_tile(&self, tile: &mut Tile) {
        let Some(list) = &self.overlays else {
            return;
        };

        let rectangle = tile.rectangle();
        let list = list.read();
        for (index, (overlay, slot)) in list.overlays.iter().zip(&list.tile_providers).enumerate() {
            let size = f64::from(overlay.options().maximum_texture_size);
            let raster_tile = slot.provider().get_tile(rectangle, [size, size]);
            tile.mapped_raster_tiles_mut()
                .push(RasterMappedTo3DTile::new(raster_tile, Some(index)));
        }
    }

    /// Whether the overlay's real provider has replaced its placeholder.
    /// `None` if the overlay is not in the collection.
    pub fn is_provider_ready(&self, overlay: &RasterOverlay) -> Option<bool> {
        let list = self.overlays.as_ref()?.read();
        let index = list.position(overlay)?;
        Some(list.tile_providers[index].is_ready())
    }

    /// The overlays, in insertion order.
    pub fn overlays(&self) -> Vec<Arc<RasterOverlay>> {
        match &self.overlays {
            Some(list) => list.read().overlays.clone(),
            None => Vec::new(),
        }
    }

    /// Provider slots, index-aligned with [`overlays`](Self::overlays).
    pub fn tile_providers(&self) -> Vec<TileProviderSlot> {
        match &self.overlays {
            Some(list) => list.read().tile_providers.clone(),
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.overlays.as_ref().map_or(0, |list| list.read().overlays.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> std::vec::IntoIter<Arc<RasterOverlay>> {
        self.overlays().into_iter()
    }
}

impl Drop for RasterOverlayCollection {
    fn drop(&mut self) {
        for overlay in self.overlays().iter().rev() {
            self.remove(overlay);
        }
    }
}

impl<'a> IntoIterator for &'a RasterOverlayCollection {
    type Item = Arc<RasterOverlay>;
    type IntoIter = std::vec::IntoIter<Arc<RasterOverlay>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::async_system::{AsyncSystem, BoxFuture};
    use futures::future::FutureExt;
    use crate::externals::{CreditSystem, PrepareRendererResources, RendererResource};
    use crate::http::{AssetAccessor, AssetError, AssetRequest, HttpHeaders};
    use crate::log::NoOpLogger;
    use crate::overlay::{
        LoadedRasterOverlayImage, OverlayError, OverlayId, RasterOverlayOptions,
        RasterOverlayTile, RasterOverlayTileProvider,
    };
    use crate::tile::TileId;
    use tokio::runtime::Handle;

    struct NoAccessor;

    impl AssetAccessor for NoAccessor {
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

    struct NoRenderer;

    impl PrepareRendererResources for NoRenderer {
        fn attach_raster_in_main_thread(&self, _: &Tile, _: u32, _: &RasterOverlayTile, _: Option<RendererResource>) {}

        fn detach_raster_in_main_thread(&self, _: &Tile, _: u32, _: &RasterOverlayTile, _: Option<RendererResource>) {}
    }

    struct ImmediateProvider(OverlayId);

    impl RasterOverlayTileProvider for ImmediateProvider {
        fn owner(&self) -> OverlayId {
            self.0
        }

        fn load_tile_image(
            &self,
            _tile: &RasterOverlayTile,
        ) -> BoxFuture<'static, Result<LoadedRasterOverlayImage, OverlayError>> {
            Box::pin(async { Ok(LoadedRasterOverlayImage::default()) })
        }
    }

    fn immediate_factory(
        owner: &Arc<RasterOverlay>,
        _externals: &TilesetExternals,
    ) -> BoxFuture<'static, Result<Arc<dyn RasterOverlayTileProvider>, OverlayError>> {
        let id = owner.id();
        Box::pin(async move { Ok(Arc::new(ImmediateProvider(id)) as Arc<dyn RasterOverlayTileProvider>) })
    }

    fn failing_factory(
        owner: &Arc<RasterOverlay>,
        _externals: &TilesetExternals,
    ) -> BoxFuture<'static, Result<Arc<dyn RasterOverlayTileProvider>, OverlayError>> {
        let name = owner.name().to_string();
        Box::pin(async move {
            Err(OverlayError::ProviderCreation {
                overlay: name,
                message: "metadata missing".to_string(),
            })
        })
    }

    fn panicking_factory(
        _owner: &Arc<RasterOverlay>,
        _externals: &TilesetExternals,
    ) -> BoxFuture<'static, Result<Arc<dyn RasterOverlayTileProvider>, OverlayError>> {
        futures::future::lazy(|_| -> Result<Arc<dyn RasterOverlayTileProvider>, OverlayError> {
            panic!("tileset metadata unreadable")
        })
        .boxed()
    }

    fn externals() -> TilesetExternals {
        TilesetExternals {
            async_system: AsyncSystem::new(Handle::current()),
            asset_accessor: Arc::new(NoAccessor),
            credit_system: Arc::new(CreditSystem::new()),
            prepare_renderer_resources: Arc::new(NoRenderer),
            logger: Arc::new(NoOpLogger),
        }
    }

    fn loaded_store(states: &[TileLoadState]) -> (Arc<Mutex<TileStore>>, Vec<TileId>) {
        let mut store = TileStore::new();
        let ids = states
            .iter()
            .map(|state| {
                let id = store.insert_tile(1.0, Rectangle::new(0.0, 0.0, 1.0, 1.0));
                store.set_state(id, *state);
                id
            })
            .collect();
        (Arc::new(Mutex::new(store)), ids)
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let (store, _) = loaded_store(&[]);
        let collection = RasterOverlayCollection::new(store, externals());

        assert!(collection.is_empty());
        assert!(collection.overlays().is_empty());
        assert!(collection.tile_providers().is_empty());
        assert_eq!(collection.iter().count(), 0);
    }

    #[tokio::test]
    async fn test_add_starts_with_placeholder_then_becomes_ready() {
        let (store, _) = loaded_store(&[]);
        let externals = externals();
        let async_system = externals.async_system.clone();
        let mut collection = RasterOverlayCollection::new(store, externals);
        let overlay = RasterOverlay::new("imagery", RasterOverlayOptions::default(), immediate_factory);

        collection.add(Arc::clone(&overlay));

        assert_eq!(collection.len(), 1);
        assert_eq!(collection.is_provider_ready(&overlay), Some(false));
        assert!(collection.tile_providers()[0].provider().is_placeholder());

        assert!(async_system.dispatch_next_main_thread_task().await);

        assert_eq!(collection.is_provider_ready(&overlay), Some(true));
        assert_eq!(collection.tile_providers()[0].provider().owner(), overlay.id());
        assert!(!collection.tile_providers()[0].provider().is_placeholder());
    }

    #[tokio::test]
    async fn test_failed_provider_keeps_placeholder() {
        let (store, _) = loaded_store(&[]);
        let externals = externals();
        let async_system = externals.async_system.clone();
        let mut collection = RasterOverlayCollection::new(store, externals);
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        let options = RasterOverlayOptions::default()
            .with_load_error_callback(move |details| sink.lock().push(details.message));
        let overlay = RasterOverlay::new("broken", options, failing_factory);

        collection.add(Arc::clone(&overlay));
        assert!(async_system.dispatch_next_main_thread_task().await);
        // The error callback is queued by the continuation.
        assert_eq!(async_system.dispatch_main_thread_tasks(), 1);

        assert_eq!(collection.is_provider_ready(&overlay), Some(false));
        let failures = failures.lock();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("metadata missing"));
    }

    #[tokio::test]
    async fn test_panicking_factory_reports_error() {
        let (store, _) = loaded_store(&[]);
        let externals = externals();
        let async_system = externals.async_system.clone();
        let mut collection = RasterOverlayCollection::new(store, externals);
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        let options = RasterOverlayOptions::default().with_load_error_callback(move |details| sink.lock().push(details));
        let overlay = RasterOverlay::new("panicky", options, panicking_factory);

        collection.add(Arc::clone(&overlay));
        assert!(async_system.dispatch_next_main_thread_task().await);
        assert_eq!(async_system.dispatch_main_thread_tasks(), 1);

        assert_eq!(collection.is_provider_ready(&overlay), Some(false));
        let failures = failures.lock();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].overlay_name, "panicky");
        assert!(failures[0].message.contains("tileset metadata unreadable"));
    }

    #[tokio::test]
    async fn test_add_maps_placeholder_onto_loaded_tiles_only() {
        let (store, ids) = loaded_store(&[
            TileLoadState::Done,
            TileLoadState::Unloaded,
            TileLoadState::ContentLoading,
        ]);
        let mut collection = RasterOverlayCollection::new(Arc::clone(&store), externals());
        let overlay = RasterOverlay::new("imagery", RasterOverlayOptions::default(), immediate_factory);

        collection.add(Arc::clone(&overlay));

        let store = store.lock();
        for (id, expected) in ids.iter().zip([1, 0, 1]) {
            let mappings = store.tile(*id).unwrap().mapped_raster_tiles();
            assert_eq!(mappings.len(), expected);
            for mapping in mappings {
                assert!(mapping.is_owned_by(overlay.id()));
                assert_eq!(mapping.provider_index(), None);
                assert!(mapping.loading_tile().unwrap().tile_provider().is_placeholder());
            }
        }
    }

    #[tokio::test]
    async fn test_remove_erases_overlay_and_mappings() {
        let (store, ids) = loaded_store(&[TileLoadState::Done, TileLoadState::Done]);
        let mut collection = RasterOverlayCollection::new(Arc::clone(&store), externals());
        let kept = RasterOverlay::new("kept", RasterOverlayOptions::default(), immediate_factory);
        let removed = RasterOverlay::new("removed", RasterOverlayOptions::default(), immediate_factory);

        collection.add(Arc::clone(&kept));
        collection.add(Arc::clone(&removed));
        collection.remove(&removed);

        let overlays = collection.overlays();
        assert_eq!(overlays.len(), 1);
        assert!(Arc::ptr_eq(&overlays[0], &kept));
        assert_eq!(collection.tile_providers().len(), 1);
        assert_eq!(collection.tile_providers()[0].provider().owner(), kept.id());

        let store = store.lock();
        for id in ids {
            let mappings = store.tile(id).unwrap().mapped_raster_tiles();
            assert_eq!(mappings.len(), 1);
            assert!(mappings[0].is_owned_by(kept.id()));
        }
    }

    #[tokio::test]
    async fn test_adding_same_overlay_twice_keeps_one_slot() {
        let (store, ids) = loaded_store(&[TileLoadState::Done]);
        let externals = externals();
        let async_system = externals.async_system.clone();
        let mut collection = RasterOverlayCollection::new(Arc::clone(&store), externals);
        let overlay = RasterOverlay::new("imagery", RasterOverlayOptions::default(), immediate_factory);

        collection.add(Arc::clone(&overlay));
        collection.add(Arc::clone(&overlay));

        assert_eq!(collection.len(), 1);
        assert_eq!(collection.tile_providers().len(), 1);
        assert_eq!(store.lock().tile(ids[0]).unwrap().mapped_raster_tiles().len(), 1);

        assert!(async_system.dispatch_next_main_thread_task().await);
        assert_eq!(collection.is_provider_ready(&overlay), Some(true));
        assert_eq!(async_system.dispatch_main_thread_tasks(), 0);

        collection.remove(&overlay);
        assert!(collection.is_empty());
        assert!(store.lock().tile(ids[0]).unwrap().mapped_raster_tiles().is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_overlay_is_noop() {
        let (store, _) = loaded_store(&[TileLoadState::Done]);
        let mut collection = RasterOverlayCollection::new(store, externals());
        let stranger = RasterOverlay::new("stranger", RasterOverlayOptions::default(), immediate_factory);

        collection.remove(&stranger);
        assert!(collection.is_empty());

        let member = RasterOverlay::new("member", RasterOverlayOptions::default(), immediate_factory);
        collection.add(Arc::clone(&member));
        collection.remove(&stranger);
        collection.remove(&member);
        collection.remove(&member);

        assert!(collection.is_empty());
    }

    #[tokio::test]
    async fn test_map_overlays_to_tile_resolves_indices() {
        let (store, _) = loaded_store(&[]);
        let externals = externals();
        let async_system = externals.async_system.clone();
        let mut collection = RasterOverlayCollection::new(Arc::clone(&store), externals);
        let first = RasterOverlay::new("first", RasterOverlayOptions::default(), immediate_factory);
        let second = RasterOverlay::new(
            "second",
            RasterOverlayOptions::default().with_maximum_texture_size(512),
            immediate_factory,
        );
        collection.add(Arc::clone(&first));
        collection.add(Arc::clone(&second));
        assert!(async_system.dispatch_next_main_thread_task().await);
        assert!(async_system.dispatch_next_main_thread_task().await);

        let mut store = store.lock();
        let id = store.insert_tile(1.0, Rectangle::new(0.0, 0.0, 2.0, 2.0));
        store.set_state(id, TileLoadState::ContentLoaded);
        let tile = store.tile_mut(id).unwrap();
        collection.map_overlays_to_tile(tile);

        let mappings = tile.mapped_raster_tiles();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].provider_index(), Some(0));
        assert_eq!(mappings[1].provider_index(), Some(1));
        assert!(mappings[1].is_owned_by(second.id()));
        let raster = mappings[1].loading_tile().unwrap();
        assert_eq!(raster.target_screen_pixels(), [512.0, 512.0]);
        assert_eq!(raster.rectangle(), Rectangle::new(0.0, 0.0, 2.0, 2.0));
        assert!(!raster.tile_provider().is_placeholder());
    }

    #[tokio::test]
    async fn test_drop_detaches_all_overlays() {
        let (store, ids) = loaded_store(&[TileLoadState::Done]);
        let overlay = RasterOverlay::new("imagery", RasterOverlayOptions::default(), immediate_factory);
        {
            let mut collection = RasterOverlayCollection::new(Arc::clone(&store), externals());
            collection.add(Arc::clone(&overlay));
            assert_eq!(store.lock().tile(ids[0]).unwrap().mapped_raster_tiles().len(), 1);
        }

        assert!(store.lock().tile(ids[0]).unwrap().mapped_raster_tiles().is_empty());
    }
}
