//! Profile pictures on the local file system, served under `/static/profile_pics/`.

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::db::models::DEFAULT_IMAGE;
use crate::error::{AppError, AppResult};

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

/// Pictures are shrunk to fit this box, keeping their aspect ratio.
pub const THUMBNAIL_SIZE: u32 = 125;

#[derive(Debug, Clone)]
pub struct ProfilePictures {
    root: PathBuf,
}

impl ProfilePictures {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Create the directory and a neutral placeholder image if none was provided.
    pub fn ensure_default(&self) -> AppResult<()> {
        std::fs::create_dir_all(&self.root)?;
        let default = self.path_of(DEFAULT_IMAGE);
        if !default.exists() {
            let placeholder = image::RgbImage::from_pixel(
                THUMBNAIL_SIZE,
                THUMBNAIL_SIZE,
                image::Rgb([0xd6, 0xd3, 0xd1]),
            );
            placeholder.save(&default)?;
            tracing::info!("Created placeholder profile picture at {}", default.display());
        }
        Ok(())
    }

    /// Thumbnail and store an upload under a random name that keeps the original extension.
    /// Returns the stored file name.
    pub async fn save(&self, original_name: &str, data: Vec<u8>) -> AppResult<String> {
        let extension = allowed_extension(original_name)
            .ok_or_else(|| AppError::BadRequest("unsupported picture type".into()))?;
        let name = format!("{}.{}", random_stem(), extension);
        let path = self.path_of(&name);
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || -> AppResult<()> {
            std::fs::create_dir_all(&root)?;
            let thumb = image::load_from_memory(&data)?.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE);
            // JPEG has no alpha channel.
            let thumb = if matches!(extension.as_str(), "jpg" | "jpeg") {
                image::DynamicImage::ImageRgb8(thumb.to_rgb8())
            } else {
                thumb
            };
            thumb.save(&path)?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::Internal(format!("picture task failed: {}", e)))??;

        tracing::info!(file = %name, "profile picture saved");
        Ok(name)
    }

    /// Remove a stored picture. The shared placeholder is never removed.
    pub async fn delete(&self, name: &str) -> AppResult<()> {
        if name == DEFAULT_IMAGE || name.is_empty() || name.contains(['/', '\\']) {
            return Ok(());
        }
        let path = self.path_of(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("{} removed from profile pics", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// The lowercased extension of `file_name`, if it is an accepted image type.
pub fn allowed_extension(file_name: &str) -> Option<String> {
    let extension = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// 8 random bytes, hex encoded.
fn random_stem() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    hex::encode(bytes)
}
