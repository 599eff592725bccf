//! Occlusion pruning of resident tiles.

use crate::core::constants::MAX_TRACKED_ZOOM;
use crate::tiles::address::TileKey;

/// What the pruning pass needs to know about one resident slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PruneCandidate {
    pub key: TileKey,
    /// The slot has no pixel data (pending, failed or placeholder)
    pub transparent: bool,
}

#[derive(Default, Clone)]
struct Bucket {
    keys: Vec<TileKey>,
    transparent: bool,
}

/// Picks the slots that contribute nothing visible.
///
/// Slots for which `on_screen` is false always go. The rest are grouped by
/// zoom; walking away from `current_zoom` in either direction, every level
/// beyond the first fully opaque one is covered and goes too. Levels without
/// slots neither stop nor start a sweep, and `current_zoom` itself is never
/// pruned here.
///
/// Skipping empty levels is intentional: an empty level never counts as
/// opaque coverage.
pub fn select_prunable<F>(candidates: &[PruneCandidate], current_zoom: u8, on_screen: F) -> Vec<TileKey>
where
    F: Fn(&TileKey) -> bool,
{
    let tracked = MAX_TRACKED_ZOOM as usize;
    let mut pruned = Vec::new();
    let mut buckets: Vec<Option<Bucket>> = vec![None; tracked];

    for candidate in candidates {
        if !on_screen(&candidate.key) {
            pruned.push(candidate.key);
            continue;
        }
        let zoom = candidate.key.zoom() as usize;
        if zoom < tracked {
            let bucket = buckets[zoom].get_or_insert_with(Bucket::default);
            bucket.transparent |= candidate.transparent;
            bucket.keys.push(candidate.key);
        }
    }

    let current = (current_zoom as usize).min(tracked - 1);

    // coarser levels hidden under opaque finer coverage
    let mut remove = false;
    for zoom in (0..=current).rev() {
        if let Some(bucket) = &buckets[zoom] {
            if remove {
                pruned.extend_from_slice(&bucket.keys);
            } else if !bucket.transparent {
                remove = true;
            }
        }
    }

    // finer levels made redundant by an opaque coarser level
    remove = false;
    for zoom in current..tracked {
        if let Some(bucket) = &buckets[zoom] {
            if remove {
                pruned.extend_from_slice(&bucket.keys);
            } else if !bucket.transparent {
                remove = true;
            }
        }
    }

    pruned
}
