//! Media path classification.
//!
//! Sources are either still images (a single frame, index always 0) or
//! videos (frames addressed by index). Classification is by extension only;
//! nothing here touches the filesystem.

use std::path::Path;

/// Still-image extensions, lower-case, without the dot.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff"];

/// Video extensions, lower-case, without the dot.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mpg", "mpeg", "m4v", "mkv", "wmv", "flv", "webm", "gif",
];

fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Dot-prefixed basenames (e.g. `._DJI_0002.jpeg`) are corrupt or
/// incomplete sidecar copies and are never treated as media.
pub fn is_hidden_path(path: &str) -> bool {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

pub fn is_image_path(path: &str) -> bool {
    !is_hidden_path(path)
        && extension_of(path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_video_path(path: &str) -> bool {
    !is_hidden_path(path)
        && extension_of(path).is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_media_path(path: &str) -> bool {
    is_image_path(path) || is_video_path(path)
}
