//! Resource cache / downloader
//!
//! Grammar libraries and highlight query text are fetched from URLs or read
//! from local paths. Downloads are cached on disk under the data root,
//! content-addressed by a hash of the source URL. Cache files are never
//! mutated in place and never evicted; concurrent duplicate downloads of
//! the same resource are acceptable (last writer wins, identical content).

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::data_paths::ensure_subdir;
use crate::protocol::ArtifactSource;

/// Compute the on-disk cache filename for a URL.
///
/// With hashing enabled: `[<tag>-]<hex sha256(url)>.<ext>`. With hashing
/// disabled, the URL's basename is used as-is.
pub fn cache_filename(url: &str, extension: &str, use_hash: bool, tag: Option<&str>) -> String {
    let stem = if use_hash {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        match tag {
            Some(tag) => format!("{}-{}", tag, hex),
            None => hex,
        }
    } else {
        url.rsplit('/')
            .next()
            .unwrap_or(url)
            .split('?')
            .next()
            .unwrap_or(url)
            .to_string()
    };

    if use_hash && !extension.is_empty() {
        format!("{}.{}", stem, extension)
    } else {
        stem
    }
}

fn fetch_url(url: &str) -> Result<Vec<u8>, String> {
    let response = reqwest::blocking::get(url)
        .map_err(|e| format!("Failed to fetch {}: {}", url, e))?
        .error_for_status()
        .map_err(|e| format!("Failed to fetch {}: {}", url, e))?;
    let bytes = response
        .bytes()
        .map_err(|e| format!("Failed to read response body from {}: {}", url, e))?;
    Ok(bytes.to_vec())
}

fn read_cached(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => {
            tracing::warn!("Ignoring empty cache file {}", path.display());
            None
        }
        Err(_) => None,
    }
}

/// Fetch a resource, going through the on-disk cache for URLs.
///
/// URLs check the cache first and return its contents when present and
/// non-empty; otherwise the resource is fetched and persisted best-effort
/// (a cache write failure is logged but does not fail the operation).
/// Local paths are read directly and never cached.
pub fn download_or_load(
    source: &ArtifactSource,
    cache_dir: &Path,
    subdir: &str,
    extension: &str,
    use_hash: bool,
    tag: Option<&str>,
) -> Result<Vec<u8>, String> {
    match source {
        ArtifactSource::Path(path) => fs::read(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e)),
        ArtifactSource::Url(url) => {
            let dir = ensure_subdir(cache_dir, subdir)?;
            let cache_path = dir.join(cache_filename(url, extension, use_hash, tag));

            if let Some(bytes) = read_cached(&cache_path) {
                tracing::debug!("Cache hit for {} at {}", url, cache_path.display());
                return Ok(bytes);
            }

            tracing::info!("Downloading {}", url);
            let bytes = fetch_url(url)?;
            if let Err(e) = fs::write(&cache_path, &bytes) {
                tracing::warn!("Failed to cache {} at {}: {}", url, cache_path.display(), e);
            }
            Ok(bytes)
        }
    }
}

/// Like [`download_or_load`] but returns a local file path, as needed for
/// loading a grammar shared library.
///
/// For URLs the cached file's path is returned (downloading first when
/// absent — here a cache write failure is fatal, since the library must
/// exist on disk to be loaded). Local paths are returned as-is.
pub fn ensure_cached(
    source: &ArtifactSource,
    cache_dir: &Path,
    subdir: &str,
    extension: &str,
    use_hash: bool,
    tag: Option<&str>,
) -> Result<PathBuf, String> {
    match source {
        ArtifactSource::Path(path) => {
            if path.exists() {
                Ok(path.clone())
            } else {
                Err(format!("No such file: {}", path.display()))
            }
        }
        ArtifactSource::Url(url) => {
            let dir = ensure_subdir(cache_dir, subdir)?;
            let cache_path = dir.join(cache_filename(url, extension, use_hash, tag));

            if read_cached(&cache_path).is_some() {
                tracing::debug!("Cache hit for {} at {}", url, cache_path.display());
                return Ok(cache_path);
            }

            tracing::info!("Downloading {}", url);
            let bytes = fetch_url(url)?;
            fs::write(&cache_path, &bytes)
                .map_err(|e| format!("Failed to write {}: {}", cache_path.display(), e))?;
            Ok(cache_path)
        }
    }
}

/// Resolve a list of query sources in parallel and concatenate their text.
///
/// Sources that resolve empty are skipped with a warning; a source that
/// fails outright fails the whole resolution.
pub fn fetch_highlight_queries(
    sources: &[ArtifactSource],
    cache_dir: &Path,
    filetype: &str,
) -> Result<String, String> {
    let results: Vec<Result<Vec<u8>, String>> = std::thread::scope(|scope| {
        let handles: Vec<_> = sources
            .iter()
            .map(|source| {
                scope.spawn(move || {
                    download_or_load(source, cache_dir, "queries", "scm", true, Some(filetype))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut combined = String::new();
    for (source, result) in sources.iter().zip(results) {
        let bytes = result?;
        let text = String::from_utf8(bytes)
            .map_err(|e| format!("Query source {:?} is not valid UTF-8: {}", source, e))?;
        if text.trim().is_empty() {
            tracing::warn!("Skipping empty query source {:?} for {}", source, filetype);
            continue;
        }
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(&text);
    }
    Ok(combined)
}
