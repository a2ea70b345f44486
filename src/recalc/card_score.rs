use std::collections::HashMap;

use crate::core::{
    MorphKey,
    Morpheme,
};

/// Highest due value the host scheduler accepts; used as the "park this
/// card at the very end" sentinel.
pub const MAX_SCORE: i64 = 2_047_483_647;

/// Due assigned to new cards whose morphs match no priority entry.
/// Sorts after every real rank but well below `MAX_SCORE`.
pub const UNLISTED_SCORE: i64 = 9_999_999;

/// Minimum rank among the card's morphs, matched by exact lemma-level
/// key. No reading-less fallback here: a priority entry for one reading
/// must not promote a homograph with a different reading.
pub fn compute_due_from_priorities(
    card_morphs: &[Morpheme],
    priorities: &HashMap<MorphKey, usize>,
) -> i64 {
    let mut best: Option<usize> = None;

    for morph in card_morphs {
        if let Some(&rank) = priorities.get(&morph.lemma_key()) {
            best = Some(best.map_or(rank, |current| current.min(rank)));
        }
    }

    match best {
        Some(rank) => (rank as i64).min(MAX_SCORE),
        None => UNLISTED_SCORE,
    }
}
