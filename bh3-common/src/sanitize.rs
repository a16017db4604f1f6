//! Rewrites that make a track tree loadable by the game.
//!
//! The engine crashes on a track with no keys and rejects a root track with
//! fewer than two. Tracks are matched to bones by pre-order position, so a
//! track may only be deleted when nothing follows it among its siblings.

use tracing::debug;

use crate::formats::bha::{BhaFile, BoneKey, BoneTrack};
use crate::tree::TreeNode;

/// Length of one frame at the game's 30 fps
pub const FRAME_TIME: f32 = 1.0 / 30.0;

/// Drop key-less tracks that can be dropped, give a placeholder key to the rest.
///
/// A key-less child is kept (with one rest-pose key of one frame) when it
/// still has children of its own, or when it is not the last child of its
/// parent. Children are settled before their parent decides, so whole
/// key-less branches at the end of a sibling list collapse.
pub fn prune(file: &mut BhaFile) {
    file.root_track
        .visit_parents_post_order_rev_mut(&mut |track: &mut BoneTrack| {
            for i in (0..track.children.len()).rev() {
                let is_last = i + 1 == track.children.len();
                let child = &mut track.children[i];
                if !child.keys.is_empty() {
                    continue;
                }

                if !child.children.is_empty() || !is_last {
                    child.keys.push(BoneKey::rest(FRAME_TIME));
                } else {
                    debug!("Pruning empty track at child index {}", i);
                    track.children.remove(i);
                }
            }
        });

    if file.root_track.keys.is_empty() {
        file.root_track.keys.push(BoneKey::rest(FRAME_TIME));
    }
}

/// Bring every track to the same total duration.
///
/// Trailing key-less leaf tracks are deleted first (no placeholders). The
/// duration is the longest key-time sum found anywhere, raised to one frame
/// only when a key-less track needs placeholder keys. Afterwards every track has at least one key, the root at least two,
/// and every track's key times sum to the duration.
pub fn patch(file: &mut BhaFile) {
    file.root_track
        .visit_parents_post_order_rev_mut(&mut |track: &mut BoneTrack| {
            while track
                .children
                .last()
                .is_some_and(|c| c.keys.is_empty() && c.children.is_empty())
            {
                track.children.pop();
            }
        });

    // Placeholder pairs need room for a one-frame second key
    let longest = file.duration();
    let needs_placeholders = file.root_track.pre_order().any(|t| t.keys.is_empty());
    let duration = if needs_placeholders {
        longest.max(FRAME_TIME)
    } else {
        longest
    };
    debug!(
        "Patching tracks to a duration of {:.4}s (longest track {:.4}s)",
        duration, longest
    );

    patch_track(&mut file.root_track, duration);
}

fn patch_track(track: &mut BoneTrack, duration: f32) {
    match track.keys.last().copied() {
        None => {
            track.keys.push(BoneKey::rest(duration - FRAME_TIME));
            track.keys.push(BoneKey::rest(FRAME_TIME));
        }
        Some(last) => {
            let sum = track.duration();
            if sum < duration || track.keys.len() == 1 {
                track.keys.push(BoneKey {
                    time: duration - sum,
                    ..last
                });
            }
        }
    }

    for child in &mut track.children {
        patch_track(child, duration);
    }
}
