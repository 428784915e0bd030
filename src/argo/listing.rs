use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

use crate::errors::ArgoError;

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("static href pattern")
});

/// Extracts link targets from an Argo artifact directory listing
///
/// Returns hrefs in document order with parent links removed.
pub fn parse_directory_listing(html: &str) -> Vec<String> {
    HREF.captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| unescape(m.as_str()))
        .filter(|href| !href.is_empty() && href != ".." && href != "../")
        .collect()
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// A listing entry resolved against the directory it was listed in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub url: String,
    pub relative_path: String,
}

/// Resolves `href` against the directory at `dir_url`, as a browser would against `dir_url/`
///
/// `dir_path` is the archive path of the directory. Entries that resolve to
/// the directory itself or to anything outside it are dropped, which keeps
/// the crawl inside the artifact.
pub fn resolve_entry(dir_url: &str, dir_path: &str, href: &str) -> Result<Option<ListingEntry>, ArgoError> {
    let mut base = Url::parse(dir_url).map_err(|e| invalid(dir_url, e))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let mut target = base.join(href).map_err(|e| invalid(dir_url, e))?;
    target.set_fragment(None);

    if target.origin() != base.origin() {
        return Ok(None);
    }
    let Some(suffix) = target.path().strip_prefix(base.path()) else {
        return Ok(None);
    };
    if suffix.is_empty() {
        return Ok(None);
    }

    Ok(Some(ListingEntry {
        relative_path: join_path(dir_path, suffix),
        url: target.to_string(),
    }))
}

fn invalid(url: &str, error: impl std::fmt::Display) -> ArgoError {
    ArgoError::InvalidUrl(url.to_string(), error.to_string())
}

/// Appends a listing entry to a relative archive path
pub fn join_path(path: &str, href: &str) -> String {
    if path.is_empty() {
        href.to_string()
    } else {
        format!("{}/{}", path.trim_end_matches('/'), href)
    }
}
