use std::path::PathBuf;

use serde::{
    Deserialize,
    Serialize,
};

/// Where a note filter takes its morph priorities from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrioritySource {
    /// Rank morphs by how often they occur across the cached collection.
    CollectionFrequency,
    /// A CSV priority file, named relative to `priority_files_dir`.
    File(String),
}

/// What to do with a new card whose morphs are all known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnownCardAction {
    Suspend,
    MoveToEnd,
}

/// Which reading source wins when a card has both a furigana field and
/// an explicit reading field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadingPriority {
    FuriganaFirst,
    ReadingFirst,
}

/// One note filter: a note type + field bound to a morphemizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub note_type: String,
    /// The field holding the expression text to extract morphs from.
    pub field: String,
    /// Optional furigana-annotated field.
    pub furigana_field: Option<String>,
    /// Optional explicit reading field (whitespace-tokenized).
    pub reading_field: Option<String>,
    /// Morphemizer description, resolved against the registry.
    pub morphemizer: String,
    pub priority_sources: Vec<PrioritySource>,
    pub reading_priority: ReadingPriority,
    /// Only cards whose note carries all of these tags are considered.
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub read: bool,
    pub modify: bool,
    /// Write `lemma[reading]` of the card's first morph into this note field.
    pub extra_reading_field: Option<String>,
}

impl FilterConfig {
    pub fn new(note_type: &str, field: &str, morphemizer: &str) -> Self {
        Self {
            note_type: note_type.to_string(),
            field: field.to_string(),
            furigana_field: None,
            reading_field: None,
            morphemizer: morphemizer.to_string(),
            priority_sources: vec![PrioritySource::CollectionFrequency],
            reading_priority: ReadingPriority::FuriganaFirst,
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            read: true,
            modify: true,
            extra_reading_field: None,
        }
    }
}

/// Note tags managed (or respected) by the recalc job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagConfig {
    pub ready: String,
    pub not_ready: String,
    pub known_automatically: String,
    pub known_manually: String,
    pub fresh: String,
    pub suspended_automatically: String,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            ready: "ms-ready".to_string(),
            not_ready: "ms-not-ready".to_string(),
            known_automatically: "ms-known-automatically".to_string(),
            known_manually: "ms-known-manually".to_string(),
            fresh: "ms-fresh".to_string(),
            suspended_automatically: "ms-suspended-automatically".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecalcConfig {
    pub filters: Vec<FilterConfig>,
    pub tags: TagConfig,
    /// A morph with an interval at or above this is considered known.
    pub interval_for_known_morphs: i64,
    /// Propagate lemma intervals onto inflection intervals too.
    pub evaluate_morph_lemma: bool,
    pub known_card_action: KnownCardAction,
    /// Lower-case expressions and readings before tokenizing.
    pub preprocess_lowercase: bool,
    pub priority_files_dir: PathBuf,
    /// When set, every CSV under this directory is imported as known morphs.
    pub known_morphs_dir: Option<PathBuf>,
    /// Optional plain-text names file joined into the seen-morph set.
    pub names_file: Option<PathBuf>,
    /// Suppress redundant new cards that teach an already-covered morph.
    pub dedupe_new_cards: bool,
    /// Deck whose cards win duplicate groups regardless of due order.
    pub dedupe_priority_deck: Option<String>,
    /// How many duplicate groups to process per run, lowest due first.
    pub dedupe_group_limit: usize,
}

impl Default for RecalcConfig {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            tags: TagConfig::default(),
            interval_for_known_morphs: 21,
            evaluate_morph_lemma: true,
            known_card_action: KnownCardAction::Suspend,
            preprocess_lowercase: true,
            priority_files_dir: PathBuf::new(),
            known_morphs_dir: None,
            names_file: None,
            dedupe_new_cards: true,
            dedupe_priority_deck: None,
            dedupe_group_limit: 100,
        }
    }
}

impl RecalcConfig {
    pub fn read_enabled_filters(&self) -> Vec<&FilterConfig> {
        self.filters.iter().filter(|f| f.read).collect()
    }

    pub fn modify_enabled_filters(&self) -> Vec<&FilterConfig> {
        self.filters.iter().filter(|f| f.modify).collect()
    }
}
