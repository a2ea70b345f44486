use std::collections::{
    BTreeMap,
    HashMap,
};

use super::{
    CardState,
    HostCollection,
    NoteState,
};
use crate::core::{
    CardId,
    DeckId,
    NoteId,
    NoteTypeId,
    SieveError,
};

/// In-memory host collection. Backs the test suite and doubles as a
/// reference for what a real host binding has to provide.
#[derive(Debug, Default)]
pub struct MemCollection {
    note_types: HashMap<String, NoteTypeId>,
    fields: HashMap<NoteTypeId, Vec<String>>,
    decks: HashMap<String, DeckId>,
    cards: BTreeMap<CardId, CardState>,
    notes: BTreeMap<NoteId, NoteState>,
    answered_today: Vec<CardId>,
    /// How many card/note records the last `apply` actually flushed.
    pub last_applied: (usize, usize),
    pub apply_calls: usize,
}

impl MemCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_note_type(&mut self, name: &str, id: NoteTypeId, fields: &[&str]) {
        self.note_types.insert(name.to_string(), id);
        self.fields
            .insert(id, fields.iter().map(|f| f.to_string()).collect());
    }

    pub fn add_deck(&mut self, name: &str, id: DeckId) {
        self.decks.insert(name.to_string(), id);
    }

    pub fn add_note(&mut self, note: NoteState) {
        self.notes.insert(note.note_id, note);
    }

    pub fn add_card(&mut self, card: CardState) {
        self.cards.insert(card.card_id, card);
    }

    pub fn set_answered_today(&mut self, card_ids: &[CardId]) {
        self.answered_today = card_ids.to_vec();
    }
}

impl HostCollection for MemCollection {
    fn note_type_id(&self, name: &str) -> Option<NoteTypeId> {
        self.note_types.get(name).copied()
    }

    fn field_names(&self, note_type_id: NoteTypeId) -> Option<Vec<String>> {
        self.fields.get(&note_type_id).cloned()
    }

    fn deck_id(&self, deck_name: &str) -> Option<DeckId> {
        self.decks.get(deck_name).copied()
    }

    fn card_ids_of_note_type(&self, note_type_id: NoteTypeId) -> Vec<CardId> {
        self.cards
            .values()
            .filter(|card| {
                self.notes
                    .get(&card.note_id)
                    .map(|note| note.note_type_id == note_type_id)
                    .unwrap_or(false)
            })
            .map(|card| card.card_id)
            .collect()
    }

    fn card_state(&self, card_id: CardId) -> Option<CardState> {
        self.cards.get(&card_id).cloned()
    }

    fn note_state(&self, note_id: NoteId) -> Option<NoteState> {
        self.notes.get(&note_id).cloned()
    }

    fn cards_answered_today(&self) -> Vec<CardId> {
        self.answered_today.clone()
    }

    fn apply(&mut self, cards: &[CardState], notes: &[NoteState]) -> Result<(), SieveError> {
        for card in cards {
            self.cards.insert(card.card_id, card.clone());
        }
        for note in notes {
            self.notes.insert(note.note_id, note.clone());
        }
        self.last_applied = (cards.len(), notes.len());
        self.apply_calls += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CardType;

    fn note(note_id: NoteId, note_type_id: NoteTypeId, tags: &[&str]) -> NoteState {
        NoteState {
            note_id,
            note_type_id,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            fields: vec![String::new()],
        }
    }

    #[test]
    fn cards_resolve_through_their_notes() {
        let mut col = MemCollection::new();
        col.add_note_type("Vocab", 1000, &["Expression"]);
        col.add_note(note(11, 1000, &[]));
        col.add_note(note(12, 2000, &[]));
        col.add_card(CardState {
            card_id: 1,
            note_id: 11,
            deck_id: 1,
            card_type: CardType::New,
            interval: 0,
            due: 50,
            queue: 0,
        });
        col.add_card(CardState {
            card_id: 2,
            note_id: 12,
            deck_id: 1,
            card_type: CardType::New,
            interval: 0,
            due: 51,
            queue: 0,
        });

        assert_eq!(col.card_ids_of_note_type(1000), vec![1]);
        assert_eq!(col.note_type_id("Vocab"), Some(1000));
        assert_eq!(col.note_type_id("Missing"), None);
    }

    #[test]
    fn apply_overwrites_and_counts() {
        let mut col = MemCollection::new();
        col.add_note(note(11, 1000, &["old"]));

        let mut changed = col.note_state(11).unwrap();
        changed.add_tag("new");
        col.apply(&[], &[changed]).unwrap();

        assert_eq!(col.last_applied, (0, 1));
        assert!(col.note_state(11).unwrap().has_tag("new"));
        assert!(col.note_state(11).unwrap().has_tag("old"));
    }
}
