//! Terminal implementations of the host collaborators

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use gallery_core::{Confirm, ImageFile, NoticeKind, Notification, NotificationSink, ThumbnailError, ThumbnailGenerator};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::{BufRead, Cursor, Write};
use std::path::Path;

/// Prints notices to stderr
#[derive(Debug, Default)]
pub(crate) struct TerminalSink;

impl NotificationSink for TerminalSink {
    fn render(&self, notice: Option<&Notification>) {
        if let Some(notice) = notice {
            eprintln!("{}", format_notice(notice));
        }
    }
}

fn format_notice(notice: &Notification) -> String {
    let tag = match notice.kind {
        NoticeKind::Info => "..",
        NoticeKind::Success => "ok",
        NoticeKind::Error => "!!",
    };
    match notice.progress {
        Some(pct) => format!("[{tag}] {} {pct:>3}%", notice.message),
        None => format!("[{tag}] {}", notice.message),
    }
}

/// Asks on stderr, reads y/N from stdin
#[derive(Debug, Default)]
pub(crate) struct StdinConfirm;

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            eprint!("{prompt} [y/N] ");
            std::io::stderr().flush().ok();
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_yes(&line),
            Ok(Err(error)) => {
                tracing::warn!(%error, "could not read confirmation");
                false
            }
            Err(error) => {
                tracing::warn!(%error, "confirmation task failed");
                false
            }
        }
    }
}

fn is_yes(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Confirms everything (`--yes`)
#[derive(Debug, Default)]
pub(crate) struct AutoConfirm;

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        tracing::debug!(prompt, "confirmed by --yes");
        true
    }
}

/// Longest thumbnail edge in pixels
pub(crate) const DEFAULT_THUMBNAIL_SIDE: u32 = 256;
/// JPEG quality of thumbnails
pub(crate) const DEFAULT_THUMBNAIL_QUALITY: u8 = 75;

/// Downscales images into small JPEG data URIs
#[derive(Debug, Clone, Copy)]
pub(crate) struct JpegThumbnails {
    max_side: u32,
    quality: u8,
}

impl Default for JpegThumbnails {
    fn default() -> Self {
        Self::new(DEFAULT_THUMBNAIL_SIDE, DEFAULT_THUMBNAIL_QUALITY)
    }
}

impl JpegThumbnails {
    pub(crate) fn new(max_side: u32, quality: u8) -> Self {
        Self {
            max_side: max_side.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    fn encode(self, bytes: &[u8]) -> Result<Vec<u8>, image::ImageError> {
        let img = image::load_from_memory(bytes)?;
        let img = if img.width() > self.max_side || img.height() > self.max_side {
            img.resize(self.max_side, self.max_side, FilterType::Lanczos3)
        } else {
            img
        };
        // JPEG carries no alpha channel
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

        let mut out = Cursor::new(Vec::new());
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, self.quality))?;
        Ok(out.into_inner())
    }
}

#[async_trait]
impl ThumbnailGenerator for JpegThumbnails {
    async fn derive(&self, file: &ImageFile) -> Result<String, ThumbnailError> {
        let this = *self;
        let bytes = file.bytes.clone();
        let encoded = tokio::task::spawn_blocking(move || this.encode(&bytes))
            .await
            .map_err(|e| ThumbnailError(format!("thumbnail task failed: {e}")))?
            .map_err(|e| ThumbnailError(format!("{}: {e}", file.name)))?;
        tracing::debug!(file = %file.name, bytes = encoded.len(), "thumbnail derived");
        Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(encoded)))
    }
}

/// MIME type from a file extension
pub(crate) fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Read an image file from disk
pub(crate) fn load_image(path: &Path) -> Result<ImageFile> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?;
    Ok(ImageFile::new(name, content_type_for(path), bytes))
}
