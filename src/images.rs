use crate::errors::VetError;
use crate::settings::Images;
use crate::storage::random_id;
use std::path::{Path, PathBuf};

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Stores uploaded pet pictures on local disk. The directory is served
/// statically under `url_prefix`.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    url_prefix: String,
}

impl ImageStore {
    pub fn new(cfg: &Images) -> Self {
        Self {
            dir: cfg.dir.clone(),
            url_prefix: cfg.url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Write `bytes` under a fresh name and return its URL path,
    /// e.g. `/images/pets/3q2-x.jpg`.
    pub async fn save_pet_image(
        &self,
        file_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, VetError> {
        let ext = extension_of(file_name)?;
        let name = format!("{}.{}", random_id(), ext);

        let pets_dir = self.dir.join("pets");
        tokio::fs::create_dir_all(&pets_dir).await?;
        tokio::fs::write(pets_dir.join(&name), bytes).await?;

        tracing::info!(file = %name, size = bytes.len(), "Stored pet image");
        Ok(format!("{}/pets/{}", self.url_prefix, name))
    }

    /// Delete a picture previously returned by `save_pet_image`. URLs that
    /// do not point into this store are left alone.
    pub async fn remove_pet_image(&self, image_url: &str) {
        let Some(name) = image_url
            .strip_prefix(self.url_prefix.as_str())
            .and_then(|rest| rest.strip_prefix("/pets/"))
        else {
            return;
        };
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
            return;
        }

        match tokio::fs::remove_file(self.dir.join("pets").join(name)).await {
            Ok(()) => tracing::info!(file = %name, "Removed pet image"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(file = %name, error = %e, "Failed to remove pet image"),
        }
    }
}

fn extension_of(file_name: Option<&str>) -> Result<String, VetError> {
    let ext = file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "jpg".to_string());

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(VetError::Validation(format!(
            "Images must be one of: {}.",
            ALLOWED_EXTENSIONS.join(", ")
        )))
    }
}

/// Absolute URL for a stored image path.
pub fn full_image_url(base_url: &str, image_url: Option<&str>) -> Option<String> {
    let path = image_url.filter(|p| !p.is_empty())?;
    if path.starts_with("http://") || path.starts_with("https://") {
        return Some(path.to_string());
    }
    Some(format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    ))
}
