//! Image storage under the app data directory.
//!
//! Files are addressed by a path relative to the storage root, `"<bucket>/<uuid>.<ext>"`,
//! which is what the database stores in its `*_path` columns.

#[cfg(feature = "desktop")]
pub mod commands;

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ts_rs::TS;

use crate::constants::{ALLOWED_IMAGE_EXTENSIONS, MAX_IMAGE_WIDTH, MAX_UPLOAD_BYTES, UPLOAD_CHUNK_SIZE};
use crate::db::new_id;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "storage.ts")]
pub enum Bucket {
    Games,
    Banners,
    Tournaments,
    Avatars,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Games => "games",
            Bucket::Banners => "banners",
            Bucket::Tournaments => "tournaments",
            Bucket::Avatars => "avatars",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "storage.ts")]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub percent: f64,
}

impl UploadProgress {
    fn new(bytes_transferred: u64, total_bytes: u64) -> Self {
        let percent = if total_bytes == 0 {
            100.0
        } else {
            (bytes_transferred as f64 / total_bytes as f64 * 100.0).min(100.0)
        };
        Self {
            bytes_transferred,
            total_bytes,
            percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "storage.ts")]
pub struct StoredFile {
    /// Relative to the storage root.
    pub path: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    /// Hex SHA-256 of the stored bytes.
    pub checksum: String,
}

#[derive(Debug, Clone)]
pub struct StorageService {
    root: PathBuf,
}

fn extension_of(file_name: &str) -> AppResult<String> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(AppError::invalid(
            "file",
            format!("Only {} images can be uploaded", ALLOWED_IMAGE_EXTENSIONS.join(", ")),
        ))
    }
}

fn too_large() -> AppError {
    AppError::invalid(
        "file",
        format!("Images must be smaller than {} MB", MAX_UPLOAD_BYTES / (1024 * 1024)),
    )
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn sha256_file(path: &Path) -> AppResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; UPLOAD_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex(&hasher.finalize()))
}

impl StorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a stored path, refusing anything that escapes the root.
    pub fn resolve(&self, relative: &str) -> AppResult<PathBuf> {
        let path = Path::new(relative);
        let safe = !relative.is_empty()
            && path
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(AppError::Storage(format!("'{}' is outside the storage root", relative)));
        }
        Ok(self.root.join(path))
    }

    /// Copy an image from `source` into `bucket` in fixed-size chunks, reporting progress
    /// after each one. The copy is decoded to make sure it really is an image and scaled
    /// down when it is wider than the display limit.
    pub fn upload_image(
        &self,
        bucket: Bucket,
        file_name: &str,
        mut source: impl Read,
        total_bytes: u64,
        mut on_progress: impl FnMut(UploadProgress),
    ) -> AppResult<StoredFile> {
        let ext = extension_of(file_name)?;
        if total_bytes > MAX_UPLOAD_BYTES {
            return Err(too_large());
        }

        let dir = self.root.join(bucket.as_str());
        fs::create_dir_all(&dir)?;
        let id = new_id();
        let partial = dir.join(format!(".{}.part", id));
        let target = dir.join(format!("{}.{}", id, ext));

        let copied = Self::copy_chunks(&mut source, &partial, total_bytes, &mut on_progress)
            .and_then(|checksum| Self::finish_image(&partial, &target, &ext, checksum));
        if let Err(e) = fs::remove_file(&partial) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("[storage] Could not remove {:?}: {}", partial, e);
            }
        }
        let (width, height, checksum) = copied?;

        let stored = StoredFile {
            path: format!("{}/{}.{}", bucket.as_str(), id, ext),
            size: fs::metadata(&target)?.len(),
            width,
            height,
            checksum,
        };
        log::info!("[storage] Stored {} ({} bytes)", stored.path, stored.size);
        Ok(stored)
    }

    /// Upload a file that is already on disk, e.g. one picked in a file dialog.
    pub fn upload_from_path(
        &self,
        bucket: Bucket,
        source: &Path,
        on_progress: impl FnMut(UploadProgress),
    ) -> AppResult<StoredFile> {
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::invalid("file", "The file has no name"))?;
        let total = fs::metadata(source)?.len();
        let file = File::open(source)?;
        self.upload_image(bucket, file_name, file, total, on_progress)
    }

    fn copy_chunks(
        source: &mut impl Read,
        partial: &Path,
        total_bytes: u64,
        on_progress: &mut impl FnMut(UploadProgress),
    ) -> AppResult<String> {
        let mut out = BufWriter::new(File::create(partial)?);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; UPLOAD_CHUNK_SIZE];
        let mut transferred: u64 = 0;

        loop {
            let read = source.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            transferred += read as u64;
            // The declared size can be wrong; the limit applies to what actually arrives.
            if transferred > MAX_UPLOAD_BYTES {
                return Err(too_large());
            }
            out.write_all(&buffer[..read])?;
            hasher.update(&buffer[..read]);
            on_progress(UploadProgress::new(transferred, total_bytes.max(transferred)));
        }
        out.flush()?;

        if transferred == 0 {
            return Err(AppError::invalid("file", "The file is empty"));
        }
        Ok(hex(&hasher.finalize()))
    }

    /// Decode the uploaded bytes and move them into place, resized when too wide.
    fn finish_image(partial: &Path, target: &Path, ext: &str, checksum: String) -> AppResult<(u32, u32, String)> {
        let img = image::ImageReader::open(partial)?
            .with_guessed_format()?
            .decode()?;

        if img.width() <= MAX_IMAGE_WIDTH {
            fs::rename(partial, target)?;
            return Ok((img.width(), img.height(), checksum));
        }

        let resized = img.resize(MAX_IMAGE_WIDTH, u32::MAX, FilterType::Triangle);
        let resized = match ext {
            // JPEG has no alpha channel.
            "jpg" | "jpeg" => image::DynamicImage::ImageRgb8(resized.to_rgb8()),
            _ => resized,
        };
        resized.save(target)?;
        log::debug!(
            "[storage] Resized {}x{} image to {}x{}",
            img.width(),
            img.height(),
            resized.width(),
            resized.height()
        );
        Ok((resized.width(), resized.height(), sha256_file(target)?))
    }

    /// Remove a stored file. Missing files are not an error.
    pub fn delete(&self, relative: &str) -> AppResult<()> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                log::info!("[storage] Deleted {}", relative);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("[storage] {} already gone", relative);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a file an update replaced, logging instead of failing; the record change
    /// has already been committed.
    pub fn discard(&self, replaced: Option<&str>) {
        if let Some(path) = replaced {
            if let Err(e) = self.delete(path) {
                log::warn!("[storage] Could not delete replaced file {}: {}", path, e);
            }
        }
    }
}
