use crate::{
    collection::{
        CardState,
        NoteState,
        QUEUE_NEW,
        QUEUE_SUSPENDED,
    },
    core::{
        config::{
            KnownCardAction,
            TagConfig,
        },
    },
    recalc::card_score::MAX_SCORE,
};

/// Cards whose morphs are all known sink into this due range instead of
/// being suspended, when the "move to end" action is configured. The
/// card id spreads them out so they keep a stable relative order.
pub const QUEUE_END_BASE_DUE: i64 = 2_000_000_000;
pub const QUEUE_END_DUE_SPREAD: i64 = 10_000;
pub const QUEUE_END_DUE_LIMIT: i64 = 2_047_000_000;

fn set_exclusive_state(tags: &TagConfig, note: &mut NoteState, state: Option<&str>) {
    // ready / not-ready / known-automatically are mutually exclusive.
    // The one being set keeps its original position if already present.
    for tag in [&tags.ready, &tags.not_ready, &tags.known_automatically] {
        if Some(tag.as_str()) != state {
            note.remove_tag(tag);
        }
    }
    if let Some(tag) = state {
        note.add_tag(tag);
    }
}

fn set_fresh(tags: &TagConfig, note: &mut NoteState, fresh: bool) {
    if fresh {
        note.add_tag(&tags.fresh);
    } else {
        note.remove_tag(&tags.fresh);
    }
}

/// Park a fully-known new card at the end of the new-card queue.
pub fn move_new_card_to_end(card: &mut CardState) {
    let due = QUEUE_END_BASE_DUE + card.card_id % QUEUE_END_DUE_SPREAD;
    card.due = due.min(QUEUE_END_DUE_LIMIT);
}

/// Tag/queue transition for a card that has never been answered.
///
/// A note already carrying the suspended-automatically tag is treated
/// as forced-suspended: the duplicate pass put it there, and only that
/// pass may lift it again.
pub fn update_tags_and_queue_of_new_card(
    tags: &TagConfig,
    note: &mut NoteState,
    card: &mut CardState,
    unknown_count: usize,
    has_learning_morphs: bool,
    known_card_action: KnownCardAction,
) {
    let forced_suspended = note.has_tag(&tags.suspended_automatically);

    match unknown_count {
        0 => {
            if note.has_tag(&tags.known_manually) {
                set_exclusive_state(tags, note, None);
            } else {
                set_exclusive_state(tags, note, Some(&tags.known_automatically));
            }
            match known_card_action {
                KnownCardAction::Suspend => {
                    note.add_tag(&tags.suspended_automatically);
                    card.queue = QUEUE_SUSPENDED;
                }
                KnownCardAction::MoveToEnd => move_new_card_to_end(card),
            }
        }
        1 if !forced_suspended => {
            set_exclusive_state(tags, note, Some(&tags.ready));
        }
        1 => {
            set_exclusive_state(tags, note, Some(&tags.not_ready));
            note.add_tag(&tags.suspended_automatically);
            card.queue = QUEUE_SUSPENDED;
            card.due = MAX_SCORE;
        }
        _ => {
            set_exclusive_state(tags, note, Some(&tags.not_ready));
        }
    }

    set_fresh(tags, note, has_learning_morphs && unknown_count > 0);
}

/// Cards that have been answered only shed the pre-study tags; the
/// exclusive states are never assigned post-answer.
pub fn update_tags_of_review_card(
    tags: &TagConfig,
    note: &mut NoteState,
    has_learning_morphs: bool,
) {
    note.remove_tag(&tags.ready);
    note.remove_tag(&tags.not_ready);
    note.remove_tag(&tags.suspended_automatically);
    set_fresh(tags, note, has_learning_morphs);
}

/// Lift the forced suspension the duplicate pass applied, restoring the
/// scored due value.
pub fn clear_forced_suspension(
    tags: &TagConfig,
    note: &mut NoteState,
    card: &mut CardState,
    scored_due: i64,
) {
    note.remove_tag(&tags.suspended_automatically);
    set_exclusive_state(tags, note, Some(&tags.ready));
    card.queue = QUEUE_NEW;
    card.due = scored_due;
}

/// Suppress a duplicate new card in favor of its group's winner.
pub fn force_suspend_duplicate(tags: &TagConfig, note: &mut NoteState, card: &mut CardState) {
    set_exclusive_state(tags, note, Some(&tags.not_ready));
    note.add_tag(&tags.suspended_automatically);
    card.queue = QUEUE_SUSPENDED;
    card.due = MAX_SCORE;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CardType;

    fn note_with_tags(tag_list: &[&str]) -> NoteState {
        NoteState {
            note_id: 1,
            note_type_id: 1000,
            tags: tag_list.iter().map(|t| t.to_string()).collect(),
            fields: vec![String::new()],
        }
    }

    fn new_card(card_id: i64, due: i64) -> CardState {
        CardState {
            card_id,
            note_id: 1,
            deck_id: 1,
            card_type: CardType::New,
            interval: 0,
            due,
            queue: QUEUE_NEW,
        }
    }

    #[test]
    fn all_known_card_gets_known_tag_and_suspends() {
        let tags = TagConfig::default();
        let mut note = note_with_tags(&["ms-ready"]);
        let mut card = new_card(5, 42);

        update_tags_and_queue_of_new_card(
            &tags,
            &mut note,
            &mut card,
            0,
            false,
            KnownCardAction::Suspend,
        );

        assert!(!note.has_tag("ms-ready"));
        assert!(note.has_tag("ms-known-automatically"));
        assert!(note.has_tag("ms-suspended-automatically"));
        assert_eq!(card.queue, QUEUE_SUSPENDED);
    }

    #[test]
    fn manually_known_card_never_gets_automatic_known_tag() {
        let tags = TagConfig::default();
        let mut note = note_with_tags(&["ms-known-manually"]);
        let mut card = new_card(5, 42);

        update_tags_and_queue_of_new_card(
            &tags,
            &mut note,
            &mut card,
            0,
            false,
            KnownCardAction::MoveToEnd,
        );

        assert!(!note.has_tag("ms-known-automatically"));
        assert!(note.has_tag("ms-known-manually"));
        assert_eq!(card.due, QUEUE_END_BASE_DUE + 5);
        assert_eq!(card.queue, QUEUE_NEW);
    }

    #[test]
    fn single_unknown_card_becomes_ready() {
        let tags = TagConfig::default();
        let mut note = note_with_tags(&["ms-not-ready"]);
        let mut card = new_card(5, 42);

        update_tags_and_queue_of_new_card(
            &tags,
            &mut note,
            &mut card,
            1,
            true,
            KnownCardAction::Suspend,
        );

        assert!(note.has_tag("ms-ready"));
        assert!(!note.has_tag("ms-not-ready"));
        assert!(note.has_tag("ms-fresh"));
        assert_eq!(card.due, 42);
    }

    #[test]
    fn forced_suspended_single_unknown_stays_parked() {
        let tags = TagConfig::default();
        let mut note = note_with_tags(&["ms-suspended-automatically"]);
        let mut card = new_card(5, 42);

        update_tags_and_queue_of_new_card(
            &tags,
            &mut note,
            &mut card,
            1,
            false,
            KnownCardAction::Suspend,
        );

        assert!(note.has_tag("ms-not-ready"));
        assert!(note.has_tag("ms-suspended-automatically"));
        assert_eq!(card.queue, QUEUE_SUSPENDED);
        assert_eq!(card.due, MAX_SCORE);
    }

    #[test]
    fn existing_tag_keeps_its_position() {
        let tags = TagConfig::default();
        let mut note = note_with_tags(&["ms-ready", "vocab", "anime"]);
        let mut card = new_card(5, 42);

        update_tags_and_queue_of_new_card(
            &tags,
            &mut note,
            &mut card,
            1,
            false,
            KnownCardAction::Suspend,
        );

        assert_eq!(note.tags, vec!["ms-ready", "vocab", "anime"]);
    }

    #[test]
    fn review_card_sheds_pre_study_tags() {
        let tags = TagConfig::default();
        let mut note =
            note_with_tags(&["ms-ready", "ms-suspended-automatically", "ms-known-automatically"]);

        update_tags_of_review_card(&tags, &mut note, true);

        assert!(!note.has_tag("ms-ready"));
        assert!(!note.has_tag("ms-suspended-automatically"));
        // Exclusive states are not reassigned post-answer; an existing
        // known-automatically tag is left alone.
        assert!(note.has_tag("ms-known-automatically"));
        assert!(note.has_tag("ms-fresh"));
    }

    #[test]
    fn clear_forced_suspension_restores_scored_due() {
        let tags = TagConfig::default();
        let mut note = note_with_tags(&["ms-not-ready", "ms-suspended-automatically"]);
        let mut card = new_card(5, MAX_SCORE);
        card.queue = QUEUE_SUSPENDED;

        clear_forced_suspension(&tags, &mut note, &mut card, 17);

        assert!(note.has_tag("ms-ready"));
        assert!(!note.has_tag("ms-suspended-automatically"));
        assert_eq!(card.queue, QUEUE_NEW);
        assert_eq!(card.due, 17);
    }

    #[test]
    fn move_to_end_is_capped() {
        let mut card = new_card(QUEUE_END_DUE_SPREAD * 5 + 9_999, 0);
        move_new_card_to_end(&mut card);
        assert_eq!(card.due, QUEUE_END_BASE_DUE + 9_999);
        assert!(card.due <= QUEUE_END_DUE_LIMIT);
    }
}
