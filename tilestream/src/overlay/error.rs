//! Overlay error types.

use thiserror::Error;

use crate::http::AssetError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OverlayError {
    /// The overlay's factory could not produce a tile provider.
    #[error("Failed to create tile provider for '{overlay}': {message}")]
    ProviderCreation { overlay: String, message: String },

    /// A provider could not produce an image for one overlay tile.
    #[error("Failed to load overlay image: {0}")]
    ImageLoad(String),

    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// What an overlay was loading when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterOverlayLoadType {
    TileProvider,
    Unknown,
}

/// Details passed to an overlay's load error callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterOverlayLoadFailureDetails {
    pub overlay_name: String,
    pub load_type: RasterOverlayLoadType,
    /// URL of the failed request, when the failure came from a fetch.
    pub request_url: Option<String>,
    pub status_code: Option<u16>,
    pub message: String,
}

impl RasterOverlayLoadFailureDetails {
    /// Failure details for a provider that could not be created.
    pub fn tile_provider(overlay_name: impl Into<String>, error: &OverlayError) -> Self {
        let request_url = match error {
            OverlayError::Asset(AssetError::RequestFailed { url, .. }) => Some(url.clone()),
            _ => None,
        };
        Self {
            overlay_name: overlay_name.into(),
            load_type: RasterOverlayLoadType::TileProvider,
            request_url,
            status_code: None,
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_details_carry_request_url() {
        let error = OverlayError::Asset(AssetError::RequestFailed {
            url: "https://imagery.example.com/layer.json".to_string(),
            message: "timed out".to_string(),
        });

        let details = RasterOverlayLoadFailureDetails::tile_provider("imagery", &error);

        assert_eq!(details.load_type, RasterOverlayLoadType::TileProvider);
        assert_eq!(details.request_url.as_deref(), Some("https://imagery.example.com/layer.json"));
        assert!(details.message.contains("timed out"));
    }

    #[test]
    fn test_provider_creation_message() {
        let error = OverlayError::ProviderCreation {
            overlay: "terrain".to_string(),
            message: "bad metadata".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to create tile provider for 'terrain': bad metadata"
        );
    }
}
