//! Path codec for workbook file names.
//!
//! Stored filenames carry structure: an optional workflow prefix at the
//! front and an optional workbook-type tag at the end of the stem. The codec
//! derives those fields from a file URL, and composes names in the other
//! direction when a workflow writes a new file.
//!
//! Both scans are first-match-wins against the caller's ordered lists. There
//! is no longest-match preference and no backtracking; reordering a list
//! silently changes classification, which is why the lists are always taken
//! from configuration in a fixed order.

use std::path::{Path, PathBuf};

use url::Url;

use crate::config::filetype_of;
use crate::error::{BudmanError, Result};

/// Structured fields derived from one stored file's location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Full file name with extension.
    pub full_filename: String,
    /// Canonical base name: the stem with prefix and type tag stripped.
    /// May be empty; an empty remainder is accepted, not an error.
    pub base_name: String,
    /// Matched workflow prefix, if any.
    pub prefix: Option<String>,
    /// Matched workbook-type tag, if any.
    pub type_tag: Option<String>,
    /// Extension including the leading dot, lowercased.
    pub filetype: String,
    /// Resolved local path.
    pub abs_path: PathBuf,
    /// Whether the file currently exists. Existence never blocks field
    /// derivation; a missing file is a distinct condition from an
    /// unparsable name.
    pub exists: bool,
}

/// Derive the structured name fields from a file URL.
///
/// The stem is scanned against `prefixes` first: the first literal leading
/// match is stripped and recorded. The remainder is then scanned against
/// `type_tags`: the first literal trailing match is stripped and recorded.
/// Empty lists are legal and strip nothing.
pub fn parse_name(url: &str, prefixes: &[String], type_tags: &[String]) -> Result<ParsedName> {
    let abs_path = url_to_path(url)?;
    let full_filename = abs_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = abs_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let filetype = filetype_of(&abs_path);

    let mut base_name = stem;
    let mut prefix = None;
    for p in prefixes {
        if !p.is_empty() && base_name.starts_with(p.as_str()) {
            base_name = base_name[p.len()..].to_string();
            prefix = Some(p.clone());
            break;
        }
    }

    let mut type_tag = None;
    for tag in type_tags {
        if !tag.is_empty() && base_name.ends_with(tag.as_str()) {
            base_name = base_name[..base_name.len() - tag.len()].to_string();
            type_tag = Some(tag.clone());
            break;
        }
    }

    let exists = abs_path.exists();
    Ok(ParsedName {
        full_filename,
        base_name,
        prefix,
        type_tag,
        filetype,
        abs_path,
        exists,
    })
}

/// Compose a stored filename from its structured parts. Inverse of
/// [`parse_name`] for naming newly created files.
pub fn compose_name(
    prefix: Option<&str>,
    base_name: &str,
    type_tag: Option<&str>,
    filetype: &str,
) -> String {
    format!(
        "{}{}{}{}",
        prefix.unwrap_or_default(),
        base_name,
        type_tag.unwrap_or_default(),
        filetype
    )
}

/// Resolve a `file` scheme URL to a local path.
///
/// A URL with no scheme is malformed; a non-`file` scheme is unsupported.
/// Both are hard errors raised before any field derivation.
pub fn url_to_path(url: &str) -> Result<PathBuf> {
    let parsed = Url::parse(url).map_err(|_| BudmanError::MalformedUrl {
        url: url.to_string(),
    })?;
    if parsed.scheme() != "file" {
        return Err(BudmanError::UnsupportedScheme {
            scheme: parsed.scheme().to_string(),
            url: url.to_string(),
        });
    }
    parsed.to_file_path().map_err(|_| BudmanError::MalformedUrl {
        url: url.to_string(),
    })
}

/// Encode a local path as a `file` scheme URL string.
pub fn path_to_url(path: &Path) -> Result<String> {
    Url::from_file_path(path)
        .map(|u| u.to_string())
        .map_err(|_| BudmanError::MalformedUrl {
            url: path.display().to_string(),
        })
}
