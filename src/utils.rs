// src/utils.rs
use anyhow::Result;
use std::path::Path;

use crate::types::analysis::{DOCX_MEDIA_TYPE, PDF_MEDIA_TYPE};

pub const ALLOWED_RESUME_EXTENSIONS: &[&str] = &["pdf", "docx"];

/// Lowercased extension of a file name, without the dot
pub fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Reject a résumé whose extension is not one of `allowed`
pub fn ensure_allowed_extension(file_name: &str, allowed: &[&str]) -> Result<()> {
    match file_extension(file_name) {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
        Some(ext) => anyhow::bail!(
            "{} is a .{} file; upload one of: {}",
            file_name,
            ext,
            allowed.join(", ")
        ),
        None => anyhow::bail!(
            "{} has no extension; upload one of: {}",
            file_name,
            allowed.join(", ")
        ),
    }
}

/// Media type for a résumé file name, if it is one the service accepts
pub fn media_type_for(file_name: &str) -> Option<&'static str> {
    match file_extension(file_name).as_deref() {
        Some("pdf") => Some(PDF_MEDIA_TYPE),
        Some("docx") => Some(DOCX_MEDIA_TYPE),
        _ => None,
    }
}

/// Join a base URL and an endpoint path without doubling the slash
pub fn join_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Port of a URL, using the scheme default when none is written
pub fn url_port(url: &str) -> Option<u16> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.port_or_known_default())
}
