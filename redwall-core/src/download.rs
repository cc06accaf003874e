use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::Result;
use crate::http::Fetch;

const MAX_TITLE_CHARS: usize = 50;

/// Post title reduced to a file stem: alphanumerics, spaces, `-` and `_`.
pub fn sanitize_title(title: &str) -> String {
    let sanitized: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .collect::<String>()
        .trim()
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();

    let sanitized = sanitized.trim_end().to_string();
    if sanitized.is_empty() {
        "wallpaper".to_string()
    } else {
        sanitized
    }
}

fn extension_for(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    if path.to_ascii_lowercase().ends_with(".png") {
        "png"
    } else {
        "jpg"
    }
}

/// Saves the full-size image at `url` into `dest_dir`, named after `title`.
/// An existing file with the same name is replaced.
pub fn download_image(fetch: &dyn Fetch, url: &str, title: &str, dest_dir: &Path) -> Result<PathBuf> {
    let bytes = fetch.get_bytes(url)?;
    fs::create_dir_all(dest_dir)?;

    let filepath = dest_dir.join(format!("{}.{}", sanitize_title(title), extension_for(url)));
    fs::write(&filepath, bytes)?;
    info!("Downloaded {url} to {}", filepath.display());
    Ok(filepath)
}
