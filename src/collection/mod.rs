pub mod memory;

pub use memory::MemCollection;

use crate::core::{
    CardId,
    CardType,
    DeckId,
    NoteId,
    NoteTypeId,
    SieveError,
};

pub const QUEUE_SUSPENDED: i64 = -1;
pub const QUEUE_NEW: i64 = 0;

/// Scheduler state of one card as the host sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardState {
    pub card_id: CardId,
    pub note_id: NoteId,
    pub deck_id: DeckId,
    pub card_type: CardType,
    /// Review interval in days; 0 for cards never answered.
    pub interval: i64,
    pub due: i64,
    pub queue: i64,
}

/// One note: its tags and its field values in note-type field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteState {
    pub note_id: NoteId,
    pub note_type_id: NoteTypeId,
    pub tags: Vec<String>,
    pub fields: Vec<String>,
}

impl NoteState {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Append the tag only if absent; existing tags keep their position.
    pub fn add_tag(&mut self, tag: &str) {
        if !self.has_tag(tag) {
            self.tags.push(tag.to_string());
        }
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }
}

/// Space-padded tag string (" tag1 tag2 ") used by the cache's
/// substring tag queries.
pub fn join_tags(tags: &[String]) -> String {
    format!(" {} ", tags.join(" "))
}

/// The host flashcard collection the recalc job reads from and writes
/// back to. All reads happen up front and all writes are deferred to a
/// single `apply` call once the job has fully succeeded.
pub trait HostCollection {
    fn note_type_id(&self, name: &str) -> Option<NoteTypeId>;

    /// Field names of a note type, in stored order.
    fn field_names(&self, note_type_id: NoteTypeId) -> Option<Vec<String>>;

    fn deck_id(&self, deck_name: &str) -> Option<DeckId>;

    fn card_ids_of_note_type(&self, note_type_id: NoteTypeId) -> Vec<CardId>;

    fn card_state(&self, card_id: CardId) -> Option<CardState>;

    fn note_state(&self, note_id: NoteId) -> Option<NoteState>;

    /// Cards answered since the host's last day rollover.
    fn cards_answered_today(&self) -> Vec<CardId>;

    /// Flush modified cards and notes back to the host in one batch.
    fn apply(&mut self, cards: &[CardState], notes: &[NoteState]) -> Result<(), SieveError>;
}
