//! Downloading and unpacking zip archives

use anyhow::{Context, Result};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use url::Url;
use zip::ZipArchive;

const USER_AGENT: &str = concat!("merry/", env!("CARGO_PKG_VERSION"));

/// HTTP client, optionally routed through a proxy
pub fn client(proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(proxy).with_context(|| format!("Invalid proxy: {}", proxy))?;
        builder = builder.proxy(proxy);
    }
    builder.build().context("Failed to build HTTP client")
}

/// Fetch `url` into memory
pub async fn download(client: &reqwest::Client, url: &Url) -> Result<Vec<u8>> {
    tracing::debug!(%url, "downloading");
    let response = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Failed to fetch {}: HTTP {}", url, response.status());
    }

    Ok(response.bytes().await?.to_vec())
}

/// Last non-empty path segment of a URL, used as a default file name
pub fn file_name(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

/// Drop the first `strip` components of an archive path
fn strip_components(path: &Path, strip: usize) -> PathBuf {
    path.components().skip(strip).collect()
}

/// Extract a zip into `dest`, dropping `strip` leading path components.
/// Returns the number of files written.
pub fn extract_zip(zip_bytes: &[u8], dest: &Path, strip: usize) -> Result<usize> {
    let mut archive =
        ZipArchive::new(Cursor::new(zip_bytes)).context("Failed to read zip archive")?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;

        // entries escaping the destination are ignored
        let Some(name) = file.enclosed_name() else {
            tracing::debug!(entry = %file.name(), "skipping unsafe zip entry");
            continue;
        };
        let relative = strip_components(&name, strip);
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(relative);

        if file.is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        std::fs::write(&target, &contents)
            .with_context(|| format!("Failed to write {}", target.display()))?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode));
        }

        written += 1;
    }

    Ok(written)
}
