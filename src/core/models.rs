use std::hash::{
    Hash,
    Hasher,
};

use crate::reading::normalize_reading;

pub type CardId = i64;
pub type NoteId = i64;
pub type NoteTypeId = i64;
pub type DeckId = i64;

/// The universal join key: (lemma, sub-key, normalized reading).
///
/// `sub_key` is the inflected surface form, or the lemma itself for
/// lemma-level lookups. The reading is always already normalized
/// (katakana folded to hiragana, empty meaning "unspecified").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MorphKey {
    pub lemma: String,
    pub sub_key: String,
    pub reading: String,
}

impl MorphKey {
    pub fn new(lemma: &str, sub_key: &str, reading: &str) -> Self {
        Self {
            lemma: lemma.to_string(),
            sub_key: sub_key.to_string(),
            reading: normalize_reading(Some(reading)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Morpheme {
    pub lemma: String,
    pub inflection: String,
    pub reading: Option<String>,
    pub part_of_speech: String,
    pub sub_part_of_speech: String,
    pub highest_lemma_learning_interval: Option<i64>,
    pub highest_inflection_learning_interval: Option<i64>,
}

impl Morpheme {
    pub fn new(lemma: &str, inflection: &str) -> Self {
        Self {
            lemma: lemma.to_string(),
            inflection: inflection.to_string(),
            reading: None,
            part_of_speech: String::new(),
            sub_part_of_speech: String::new(),
            highest_lemma_learning_interval: None,
            highest_inflection_learning_interval: None,
        }
    }

    pub fn with_reading(mut self, reading: &str) -> Self {
        self.reading = Some(reading.to_string());
        self
    }

    pub fn normalized_reading(&self) -> String {
        normalize_reading(self.reading.as_deref())
    }

    /// Lemma-level key: (lemma, lemma, reading).
    pub fn lemma_key(&self) -> MorphKey {
        MorphKey::new(&self.lemma, &self.lemma, &self.normalized_reading())
    }

    /// Inflection-level key: (lemma, inflection, reading).
    pub fn inflection_key(&self) -> MorphKey {
        MorphKey::new(&self.lemma, &self.inflection, &self.normalized_reading())
    }
}

// Identity for dedup is (lemma, inflection, normalized reading); two
// morphs with readings that only differ in kana width are the same.
impl PartialEq for Morpheme {
    fn eq(&self, other: &Self) -> bool {
        self.lemma == other.lemma
            && self.inflection == other.inflection
            && self.normalized_reading() == other.normalized_reading()
    }
}

impl Eq for Morpheme {}

impl Hash for Morpheme {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lemma.hash(state);
        self.inflection.hash(state);
        self.normalized_reading().hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LearningStatus {
    Unknown,
    Learning,
    Known,
}

impl LearningStatus {
    pub fn from_interval(interval: i64, interval_for_known_morphs: i64) -> Self {
        if interval >= interval_for_known_morphs {
            LearningStatus::Known
        } else if interval > 0 {
            LearningStatus::Learning
        } else {
            LearningStatus::Unknown
        }
    }
}

/// Scheduler card states, matching the host's integer encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardType {
    New,
    Learning,
    Review,
    Relearning,
}

impl CardType {
    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => CardType::Learning,
            2 => CardType::Review,
            3 => CardType::Relearning,
            _ => CardType::New,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            CardType::New => 0,
            CardType::Learning => 1,
            CardType::Review => 2,
            CardType::Relearning => 3,
        }
    }
}

/// One row of the cache's Cards table.
#[derive(Debug, Clone)]
pub struct CardRecord {
    pub card_id: CardId,
    pub note_id: NoteId,
    pub note_type_id: NoteTypeId,
    pub card_type: CardType,
    /// Space-padded tag string (" tag1 tag2 ") for substring queries.
    pub tags: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn morpheme_equality_normalizes_reading() {
        let a = Morpheme::new("食べる", "食べる").with_reading("たべる");
        let b = Morpheme::new("食べる", "食べる").with_reading("タベル");
        assert_eq!(a, b);

        let c = Morpheme::new("食べる", "食べた").with_reading("たべる");
        assert_ne!(a, c);
    }

    #[test]
    fn lemma_key_uses_lemma_for_sub_key() {
        let morph = Morpheme::new("行く", "行った").with_reading("イッタ");
        assert_eq!(morph.lemma_key(), MorphKey::new("行く", "行く", "いった"));
        assert_eq!(morph.inflection_key(), MorphKey::new("行く", "行った", "いった"));
    }

    #[test]
    fn learning_status_thresholds() {
        assert_eq!(LearningStatus::from_interval(0, 21), LearningStatus::Unknown);
        assert_eq!(LearningStatus::from_interval(1, 21), LearningStatus::Learning);
        assert_eq!(LearningStatus::from_interval(20, 21), LearningStatus::Learning);
        assert_eq!(LearningStatus::from_interval(21, 21), LearningStatus::Known);
    }
}
