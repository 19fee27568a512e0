//! Local image paths and the primary-thumbnail download.
//!
//! Layout: `<root>/<objectID>/<objectID>_<position>.<ext>`, position 1 for
//! the primary image and 2.. for additional images. Only the primary image
//! is ever fetched.

use crate::acquisition::http_client::HttpClient;
use crate::config::ScrapeConfig;
use crate::error::FetchResult;
use crate::model::{ObjectId, Record};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An image URL and where it lives (or would live) on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTarget {
    pub url: String,
    pub path: PathBuf,
}

/// Local paths for one record's images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImagePlan {
    pub primary: Option<ImageTarget>,
    pub additional: Vec<ImageTarget>,
}

/// Derive the file extension of an image URL.
///
/// The last path segment's extension is lowercased and kept when it is in
/// `allowed`; anything else gives `default`.
pub fn image_extension(image_url: &str, allowed: &[String], default: &str) -> String {
    let path = url::Url::parse(image_url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| image_url.split(['?', '#']).next().unwrap_or("").to_string());

    let ext = path
        .rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.to_lowercase());

    match ext {
        Some(ext) if allowed.iter().any(|a| *a == ext) => ext,
        _ => default.to_string(),
    }
}

/// Computes image paths and downloads primary thumbnails.
#[derive(Clone)]
pub struct AssetResolver {
    root: PathBuf,
    http: HttpClient,
    allowed: Vec<String>,
    default_ext: String,
    timeout_ms: u64,
}

impl AssetResolver {
    pub fn new(root: impl Into<PathBuf>, http: HttpClient, config: &ScrapeConfig) -> Self {
        Self {
            root: root.into(),
            http,
            allowed: config.image_extensions.clone(),
            default_ext: config.default_image_extension.clone(),
            timeout_ms: config.timeouts.image_ms,
        }
    }

    /// Local path for image `position` of `object_id`.
    pub fn image_path(&self, object_id: ObjectId, position: usize, image_url: &str) -> PathBuf {
        let ext = image_extension(image_url, &self.allowed, &self.default_ext);
        self.root
            .join(object_id.to_string())
            .join(format!("{object_id}_{position}.{ext}"))
    }

    /// Paths for the record's primary and additional images.
    pub fn plan(&self, record: &Record) -> ImagePlan {
        let target = |position: usize, url: &str| ImageTarget {
            url: url.to_string(),
            path: self.image_path(record.object_id, position, url),
        };

        ImagePlan {
            primary: (!record.primary_image.is_empty()).then(|| target(1, &record.primary_image)),
            additional: record
                .additional_images
                .iter()
                .enumerate()
                .map(|(i, url)| target(i + 2, url))
                .collect(),
        }
    }

    /// Make sure the primary image exists on disk, downloading it if needed.
    ///
    /// Returns the local path. An existing file is never re-fetched. The
    /// download lands in a `.part` sibling and is renamed into place once
    /// fully written, so an interrupted run leaves no truncated image.
    pub async fn ensure_primary(&self, plan: &ImagePlan) -> FetchResult<Option<PathBuf>> {
        let Some(target) = &plan.primary else {
            return Ok(None);
        };
        if tokio::fs::try_exists(&target.path).await.unwrap_or(false) {
            debug!("image already present: {}", target.path.display());
            return Ok(Some(target.path.clone()));
        }

        let bytes = self.http.get_bytes(&target.url, self.timeout_ms).await?;
        if let Some(parent) = target.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(&target.path);
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, &target.path).await?;
        debug!("downloaded {} ({} bytes)", target.url, bytes.len());
        Ok(Some(target.path.clone()))
    }
}

/// `<path>.part`, the in-progress name of a download.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}
