use std::{
    collections::HashMap,
    sync::Arc,
};

use crate::core::{
    Morpheme,
    SieveError,
};

pub const WHITESPACE_MORPHEMIZER: &str = "Language w/ Spaces";
pub const FULL_FIELD_MORPHEMIZER: &str = "Full Field";

/// Turns expression text into morphs. Implementations receive whole
/// batches so tokenizers with per-call startup cost can amortize it.
pub trait Morphemizer: Send + Sync {
    /// Stable description used to reference the morphemizer in filters.
    fn description(&self) -> &str;

    /// One morph list per input expression, same order and length as
    /// the input batch.
    fn get_morphemes(&self, expressions: &[String]) -> Vec<Vec<Morpheme>>;
}

/// Lookup table from morphemizer description to implementation. Hosts
/// can register their own tokenizers next to the built-in ones.
pub struct MorphemizerRegistry {
    morphemizers: HashMap<String, Arc<dyn Morphemizer>>,
}

impl Default for MorphemizerRegistry {
    fn default() -> Self {
        let mut registry = Self {
            morphemizers: HashMap::new(),
        };
        registry.register(Arc::new(WhitespaceMorphemizer));
        registry.register(Arc::new(FullFieldMorphemizer));
        registry
    }
}

impl MorphemizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, morphemizer: Arc<dyn Morphemizer>) {
        self.morphemizers
            .insert(morphemizer.description().to_string(), morphemizer);
    }

    pub fn get(&self, description: &str) -> Result<Arc<dyn Morphemizer>, SieveError> {
        self.morphemizers
            .get(description)
            .cloned()
            .ok_or_else(|| SieveError::MorphemizerNotFound(description.to_string()))
    }

    pub fn descriptions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.morphemizers.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Splits on whitespace and strips punctuation-only tokens. Each token
/// is its own lemma; inflection analysis is out of scope here.
pub struct WhitespaceMorphemizer;

impl Morphemizer for WhitespaceMorphemizer {
    fn description(&self) -> &str {
        WHITESPACE_MORPHEMIZER
    }

    fn get_morphemes(&self, expressions: &[String]) -> Vec<Vec<Morpheme>> {
        expressions
            .iter()
            .map(|expression| {
                expression
                    .split_whitespace()
                    .filter(|token| token.chars().any(char::is_alphanumeric))
                    .map(|token| Morpheme::new(token, token))
                    .collect()
            })
            .collect()
    }
}

/// Treats the whole field as a single morph. Useful for curated vocab
/// decks where every card already holds exactly one word.
pub struct FullFieldMorphemizer;

impl Morphemizer for FullFieldMorphemizer {
    fn description(&self) -> &str {
        FULL_FIELD_MORPHEMIZER
    }

    fn get_morphemes(&self, expressions: &[String]) -> Vec<Vec<Morpheme>> {
        expressions
            .iter()
            .map(|expression| {
                let trimmed = expression.trim();
                if trimmed.is_empty() {
                    Vec::new()
                } else {
                    vec![Morpheme::new(trimmed, trimmed)]
                }
            })
            .collect()
    }
}
