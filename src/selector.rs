//! Asset selection
//!
//! Pure matching logic: given a release's asset list and the repository's
//! compiled glob patterns, produce the ordered subset to fetch. The watcher
//! is the only caller.

use crate::config::AssetPattern;
use crate::github::ReleaseAsset;
use std::collections::HashSet;

/// Select the assets to fetch for one release
///
/// With `fetch_everything` set, returns all assets in their original order
/// and ignores the patterns. Otherwise the result is in pattern-major order:
/// patterns are walked in configured order, and for each pattern every
/// matching asset is appended in its original order.
///
/// An asset matching several patterns appears once per matching pattern
/// unless `dedupe` is set, in which case repeat appearances are dropped and
/// first-occurrence order is kept. The repeat-appearance behavior feeds
/// through to the task environment's asset-name list, so deduplication is a
/// configuration choice rather than a default.
pub fn select_assets<'a>(
    assets: &'a [ReleaseAsset],
    patterns: &[AssetPattern],
    fetch_everything: bool,
    dedupe: bool,
) -> Vec<&'a ReleaseAsset> {
    if fetch_everything {
        return assets.iter().collect();
    }

    let mut selected = Vec::new();
    let mut seen = HashSet::new();
    for pattern in patterns {
        for asset in assets {
            if pattern.matches(&asset.name) && (!dedupe || seen.insert(asset.id)) {
                selected.push(asset);
            }
        }
    }
    selected
}
