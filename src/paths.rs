//! Locations of cached raw HTML
//!
//! Pure path formatting; nothing here touches the filesystem.

use std::path::{Path, PathBuf};

/// Default directory for cached article HTML
pub const DEFAULT_HTML_DIR: &str = "data/html_docs";

/// Path of the cached HTML for `url` under the default directory
pub fn html_path(url: &str) -> PathBuf {
    html_path_in(Path::new(DEFAULT_HTML_DIR), url)
}

/// Path of the cached HTML for `url` under `base`.
///
/// The file name is the last `/`-separated segment of the URL, so
/// `https://site/enfermedades/asma` maps to `<base>/asma`.
pub fn html_path_in(base: &Path, url: &str) -> PathBuf {
    let name = url.rsplit('/').next().unwrap_or(url);
    base.join(name)
}
