//! Utility functions and helpers

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static NON_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());

/// Generate a hash of the given content
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Generate a hash-based filename
pub fn hash_filename(base: &str, content: &[u8], ext: &str) -> String {
    let hash = hash_content(content);
    format!("{}.{}.{}", base, hash, ext)
}

/// Subresource-integrity string (`sha256-<base64>`) for the given content
pub fn integrity(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    format!("sha256-{}", STANDARD.encode(digest))
}

/// Join a public URL prefix and a file name with exactly one slash
pub fn join_url(prefix: &str, file: &str) -> String {
    if prefix.is_empty() {
        return file.to_string();
    }
    format!("{}/{}", prefix.trim_end_matches('/'), file.trim_start_matches('/'))
}

/// Clean a path by removing . and .. components
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }

    if path.starts_with('/') {
        format!("/{}", parts.join("/"))
    } else {
        parts.join("/")
    }
}

/// Turn a module identifier into something usable inside a chunk name
pub fn chunk_name_fragment(id: &str) -> String {
    NON_IDENT.replace_all(id, "_").trim_matches('_').to_string()
}

/// Reserve `base` in `taken`, appending `~2`, `~3`, ... on collision
pub fn unique_name(taken: &mut HashSet<String>, base: &str) -> String {
    if taken.insert(base.to_string()) {
        return base.to_string();
    }

    let mut n = 2;
    loop {
        let candidate = format!("{}~{}", base, n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs >= 60.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = secs - (mins as f64 * 60.0);
        format!("{}m {:.2}s", mins, remaining_secs)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.0}ms", secs * 1000.0)
    }
}
