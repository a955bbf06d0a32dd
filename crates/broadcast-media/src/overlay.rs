//! Overlay image resolution.

use std::path::Path;

use bytes::Bytes;
use tracing::{debug, instrument};
use url::Url;

use crate::error::ImageError;

/// A decoded image in tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// RGBA8 pixel data, row major.
    pub data: Bytes,
}

impl DecodedImage {
    /// Create an image from RGBA8 data.
    pub fn new(width: u32, height: u32, data: Bytes) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Expected RGBA8 buffer size for the given dimensions.
    pub fn rgba_buffer_size(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    /// Validate that the data matches the dimensions.
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::rgba_buffer_size(self.width, self.height)
    }
}

impl From<image::RgbaImage> for DecodedImage {
    fn from(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height, Bytes::from(image.into_raw()))
    }
}

/// Decodes overlay images from files and URLs.
///
/// Implementations may block; the session core calls them off its
/// control thread.
pub trait ImageLoader: Send + Sync {
    /// Decode an image stored at a local path.
    fn decode_file(&self, path: &Path) -> Result<DecodedImage, ImageError>;

    /// Fetch and decode an image from a `file`, `http` or `https` URL.
    fn fetch(&self, url: &Url) -> Result<DecodedImage, ImageError>;
}

/// Schemes [`resolve_image`] hands to [`ImageLoader::fetch`].
pub const FETCHABLE_SCHEMES: [&str; 3] = ["http", "https", "file"];

/// Resolve an overlay URI: try it as a local path first, then as a
/// fetchable URL.
#[instrument(name = "resolve_image", skip(loader))]
pub fn resolve_image(loader: &dyn ImageLoader, uri: &str) -> Result<DecodedImage, ImageError> {
    match loader.decode_file(Path::new(uri)) {
        Ok(image) => return Ok(image),
        Err(e) => debug!("Not a decodable local file: {}", e),
    }

    let url = Url::parse(uri).map_err(|_| ImageError::UnsupportedUri(uri.to_string()))?;
    if !FETCHABLE_SCHEMES.contains(&url.scheme()) {
        return Err(ImageError::UnsupportedUri(uri.to_string()));
    }

    loader.fetch(&url)
}

/// Image loader backed by the `image` crate, fetching remote images
/// with a blocking HTTP client.
#[derive(Debug, Default)]
pub struct DefaultImageLoader {
    client: reqwest::blocking::Client,
}

impl DefaultImageLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageLoader for DefaultImageLoader {
    fn decode_file(&self, path: &Path) -> Result<DecodedImage, ImageError> {
        let image = image::open(path)?;
        Ok(image.to_rgba8().into())
    }

    fn fetch(&self, url: &Url) -> Result<DecodedImage, ImageError> {
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|_| ImageError::UnsupportedUri(url.to_string()))?;
            return self.decode_file(&path);
        }

        let body = self
            .client
            .get(url.as_str())
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .map_err(|e| ImageError::Fetch(e.to_string()))?;

        let image = image::load_from_memory(&body)?;
        Ok(image.to_rgba8().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &tempfile::TempDir, name: &str, width: u32, height: u32) -> String {
        let path = dir.path().join(name);
        image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 128]))
            .save(&path)
            .unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_resolve_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, "logo.png", 8, 4);

        let image = resolve_image(&DefaultImageLoader::new(), &path).unwrap();
        assert_eq!((image.width, image.height), (8, 4));
        assert!(image.is_valid());
    }

    #[test]
    fn test_resolve_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, "badge.png", 3, 5);
        let url = Url::from_file_path(&path).unwrap();

        let image = resolve_image(&DefaultImageLoader::new(), url.as_str()).unwrap();
        assert_eq!((image.width, image.height), (3, 5));
    }

    #[test]
    fn test_unrecognized_scheme_is_rejected() {
        let result = resolve_image(&DefaultImageLoader::new(), "ftp://example.com/logo.png");
        assert!(matches!(result, Err(ImageError::UnsupportedUri(_))));
    }

    #[test]
    fn test_missing_relative_path_is_rejected() {
        let result = resolve_image(&DefaultImageLoader::new(), "missing/logo.png");
        assert!(matches!(result, Err(ImageError::UnsupportedUri(_))));
    }
}
