//! Destination asset naming.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::session::SessionProvider;

/// Suffix appended to a source stem to name its reclassified output.
pub const RECLASS_SUFFIX: &str = "_reclass";

/// Bump a trailing `_N` counter, or start one.
///
/// `"lc"` → `"lc_1"`, `"lc_1"` → `"lc_2"`, `"lc_v2_9"` → `"lc_v2_10"`.
pub fn next_string(name: &str) -> String {
    if let Some((stem, counter)) = name.rsplit_once('_') {
        if !counter.is_empty() && counter.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = counter.parse::<u64>() {
                return format!("{stem}_{}", n + 1);
            }
        }
    }
    format!("{name}_1")
}

/// Last path segment of an asset id.
pub fn asset_stem(asset_id: &str) -> &str {
    let trimmed = asset_id.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Folder part of an asset id (empty for a bare name).
pub fn asset_folder(asset_id: &str) -> &str {
    asset_id
        .trim_end_matches('/')
        .rsplit_once('/')
        .map(|(folder, _)| folder)
        .unwrap_or("")
}

/// `name` made unique against `taken` with [`next_string`].
pub fn unique_name(name: &str, taken: &BTreeSet<String>) -> String {
    let mut candidate = name.to_string();
    while taken.contains(&candidate) {
        candidate = next_string(&candidate);
    }
    candidate
}

/// `<folder>/<stem>_reclass`, renamed until no asset in `folder` has that id.
pub fn unique_asset_id(session: &dyn SessionProvider, folder: &str, stem: &str) -> Result<String> {
    let folder = folder.trim_end_matches('/');
    let taken: BTreeSet<String> = session.list_assets(folder)?.into_iter().collect();
    let base = if folder.is_empty() {
        format!("{stem}{RECLASS_SUFFIX}")
    } else {
        format!("{folder}/{stem}{RECLASS_SUFFIX}")
    };
    Ok(unique_name(&base, &taken))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySession;

    #[test]
    fn test_next_string() {
        assert_eq!(next_string("lc"), "lc_1");
        assert_eq!(next_string("lc_1"), "lc_2");
        assert_eq!(next_string("lc_reclass"), "lc_reclass_1");
        assert_eq!(next_string("lc_v2_9"), "lc_v2_10");
        assert_eq!(next_string("lc_"), "lc__1");
    }

    #[test]
    fn test_asset_parts() {
        assert_eq!(asset_stem("users/me/landcover"), "landcover");
        assert_eq!(asset_stem("landcover"), "landcover");
        assert_eq!(asset_folder("users/me/landcover"), "users/me");
        assert_eq!(asset_folder("landcover"), "");
    }

    #[test]
    fn test_unique_asset_id() {
        let session = InMemorySession::new();
        session.add_image("users/me/lc", vec![("b1", vec![1])], None);
        assert_eq!(
            unique_asset_id(&session, "users/me", "lc").unwrap(),
            "users/me/lc_reclass"
        );

        session.add_image("users/me/lc_reclass", vec![("b1", vec![1])], None);
        session.add_image("users/me/lc_reclass_1", vec![("b1", vec![1])], None);
        assert_eq!(
            unique_asset_id(&session, "users/me/", "lc").unwrap(),
            "users/me/lc_reclass_2"
        );
    }
}
