pub mod caching;
pub mod card_score;
pub mod metrics;

#[cfg(test)]
mod recalc_tests;

pub use caching::{
    cache_all,
    update_seen_morphs,
};
pub use card_score::{
    compute_due_from_priorities,
    MAX_SCORE,
    UNLISTED_SCORE,
};
pub use metrics::CardMorphsMetrics;

use std::collections::{
    BTreeMap,
    HashMap,
    HashSet,
};

use crate::{
    cache::SieveDb,
    collection::{
        CardState,
        HostCollection,
        NoteState,
    },
    core::{
        CancelToken,
        CardId,
        CardType,
        MorphKey,
        Morpheme,
        NoteId,
        RecalcConfig,
        SieveError,
    },
    morphemizers::MorphemizerRegistry,
    priority::{
        find_missing_priority_entries,
        get_morph_priorities,
    },
    tags,
};

const CANCEL_POLL_INTERVAL: usize = 100;

/// What one recalculation run changed.
#[derive(Debug, Default)]
pub struct RecalcSummary {
    pub cards_modified: usize,
    pub notes_modified: usize,
    pub duplicate_groups_processed: usize,
    /// Priority entries that matched nothing in the collection, by rank.
    pub priority_gaps: Vec<(MorphKey, usize)>,
}

/// One full recalculation: rebuild the cache from current card text,
/// merge priorities, score and tag every matched card, suppress
/// duplicate new cards, then flush all mutations in one batch.
///
/// Non-reentrant by design; run at most one job per cache at a time,
/// off the host's primary thread.
pub struct RecalcJob<'a> {
    config: &'a RecalcConfig,
    registry: &'a MorphemizerRegistry,
    cancel: CancelToken,
    progress: Box<dyn Fn(String) + 'a>,
}

impl<'a> RecalcJob<'a> {
    pub fn new(config: &'a RecalcConfig, registry: &'a MorphemizerRegistry) -> Self {
        Self {
            config,
            registry,
            cancel: CancelToken::new(),
            progress: Box::new(|message| println!("{}", message)),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: impl Fn(String) + 'a) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn run(
        &self,
        db: &mut SieveDb,
        col: &mut dyn HostCollection,
    ) -> Result<RecalcSummary, SieveError> {
        self.validate(col)?;

        (self.progress)("Recalculating: extracting morphs".to_string());
        caching::cache_all(db, col, self.config, self.registry, &self.cancel, &self.progress)?;

        let card_morph_map = db.get_card_morph_map_cache()?;
        let collection_keys = collection_morph_keys(&card_morph_map);

        // Working copies of every touched card/note; originals kept so
        // only records that actually changed get flushed.
        let mut cards: HashMap<CardId, CardState> = HashMap::new();
        let mut notes: HashMap<NoteId, NoteState> = HashMap::new();
        let mut original_cards: HashMap<CardId, CardState> = HashMap::new();
        let mut original_notes: HashMap<NoteId, NoteState> = HashMap::new();

        let mut scores: HashMap<CardId, i64> = HashMap::new();
        let mut single_unknowns: HashMap<MorphKey, Vec<CardId>> = HashMap::new();
        let mut gaps: BTreeMap<MorphKey, usize> = BTreeMap::new();

        for filter in self.config.modify_enabled_filters() {
            self.cancel.check()?;

            let note_type_id = col
                .note_type_id(&filter.note_type)
                .ok_or_else(|| SieveError::NoteTypeNotFound(filter.note_type.clone()))?;
            let extra_reading_index = match &filter.extra_reading_field {
                Some(field) => {
                    let field_names = col
                        .field_names(note_type_id)
                        .ok_or_else(|| SieveError::NoteTypeNotFound(filter.note_type.clone()))?;
                    Some(field_names.iter().position(|name| name == field).ok_or_else(
                        || SieveError::FieldNotFound {
                            note_type: filter.note_type.clone(),
                            field: field.clone(),
                        },
                    )?)
                }
                None => None,
            };

            let priorities = get_morph_priorities(
                db,
                &filter.priority_sources,
                &self.config.priority_files_dir,
            )?;

            for (key, rank) in find_missing_priority_entries(&priorities, &collection_keys) {
                let entry = gaps.entry(key).or_insert(rank);
                if rank < *entry {
                    *entry = rank;
                }
            }

            let cached_cards =
                db.get_cards_data(note_type_id, &filter.include_tags, &filter.exclude_tags)?;
            (self.progress)(format!(
                "Scoring cards: {} ({} cards)",
                filter.note_type,
                cached_cards.len()
            ));

            for (index, cached) in cached_cards.iter().enumerate() {
                self.cancel.check_every(index, CANCEL_POLL_INTERVAL)?;

                let card_id = cached.card_id;
                if !cards.contains_key(&card_id) {
                    let Some(card) = col.card_state(card_id) else {
                        continue;
                    };
                    let Some(note) = col.note_state(card.note_id) else {
                        continue;
                    };
                    original_cards.insert(card_id, card.clone());
                    original_notes.entry(note.note_id).or_insert_with(|| note.clone());
                    notes.entry(note.note_id).or_insert(note);
                    cards.insert(card_id, card);
                }

                let card = cards.get_mut(&card_id).expect("card was just inserted");
                let note = notes.get_mut(&card.note_id).expect("note was just inserted");

                let empty: Vec<Morpheme> = Vec::new();
                let morphs = card_morph_map.get(&card_id).unwrap_or(&empty);
                let metrics = CardMorphsMetrics::from_morphs(
                    morphs,
                    self.config.evaluate_morph_lemma,
                    self.config.interval_for_known_morphs,
                );

                if card.card_type == CardType::New {
                    let score = compute_due_from_priorities(morphs, &priorities);
                    card.due = score;
                    scores.insert(card_id, score);

                    tags::update_tags_and_queue_of_new_card(
                        &self.config.tags,
                        note,
                        card,
                        metrics.unknown_count(),
                        metrics.has_learning_morphs,
                        self.config.known_card_action,
                    );

                    if let Some(key) = metrics.single_unknown() {
                        single_unknowns.entry(key.clone()).or_default().push(card_id);
                    }
                } else {
                    tags::update_tags_of_review_card(
                        &self.config.tags,
                        note,
                        metrics.has_learning_morphs,
                    );
                }

                if let Some(field_index) = extra_reading_index {
                    if let Some(field) = note.fields.get_mut(field_index) {
                        // No morphs clears the field rather than leaving
                        // a stale reading behind.
                        *field = extra_reading_text(morphs).unwrap_or_default();
                    }
                }
            }
        }

        let duplicate_groups_processed = if self.config.dedupe_new_cards {
            self.suppress_duplicates(col, &mut cards, &mut notes, &scores, single_unknowns)?
        } else {
            0
        };

        self.cancel.check()?;

        // Flush only what actually changed, in stable order.
        let mut changed_cards: Vec<CardState> = cards
            .into_values()
            .filter(|card| original_cards.get(&card.card_id) != Some(card))
            .collect();
        changed_cards.sort_by_key(|card| card.card_id);

        let mut changed_notes: Vec<NoteState> = notes
            .into_values()
            .filter(|note| original_notes.get(&note.note_id) != Some(note))
            .collect();
        changed_notes.sort_by_key(|note| note.note_id);

        (self.progress)(format!(
            "Recalc done: {} cards, {} notes modified",
            changed_cards.len(),
            changed_notes.len()
        ));
        col.apply(&changed_cards, &changed_notes)?;

        let mut priority_gaps: Vec<(MorphKey, usize)> = gaps.into_iter().collect();
        priority_gaps.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        Ok(RecalcSummary {
            cards_modified: changed_cards.len(),
            notes_modified: changed_notes.len(),
            duplicate_groups_processed,
            priority_gaps,
        })
    }

    /// Configuration errors surface before any work happens.
    fn validate(&self, col: &dyn HostCollection) -> Result<(), SieveError> {
        if self.config.filters.is_empty() {
            return Err(SieveError::DefaultSettings);
        }

        for filter in &self.config.filters {
            if filter.note_type.is_empty()
                || filter.field.is_empty()
                || filter.morphemizer.is_empty()
                || filter.priority_sources.is_empty()
            {
                return Err(SieveError::DefaultSettings);
            }

            let note_type_id = col
                .note_type_id(&filter.note_type)
                .ok_or_else(|| SieveError::NoteTypeNotFound(filter.note_type.clone()))?;
            let field_names = col
                .field_names(note_type_id)
                .ok_or_else(|| SieveError::NoteTypeNotFound(filter.note_type.clone()))?;

            let mut required_fields = vec![filter.field.as_str()];
            required_fields.extend(filter.furigana_field.as_deref());
            required_fields.extend(filter.reading_field.as_deref());
            required_fields.extend(filter.extra_reading_field.as_deref());
            for field in required_fields {
                if !field_names.iter().any(|name| name == field) {
                    return Err(SieveError::FieldNotFound {
                        note_type: filter.note_type.clone(),
                        field: field.to_string(),
                    });
                }
            }

            self.registry.get(&filter.morphemizer)?;
        }

        Ok(())
    }

    /// Keep one new card per freshly-introduced morph key, suspend the
    /// rest. Idempotent: rerunning over unchanged state mutates nothing.
    fn suppress_duplicates(
        &self,
        col: &dyn HostCollection,
        cards: &mut HashMap<CardId, CardState>,
        notes: &mut HashMap<NoteId, NoteState>,
        scores: &HashMap<CardId, i64>,
        single_unknowns: HashMap<MorphKey, Vec<CardId>>,
    ) -> Result<usize, SieveError> {
        let priority_deck_id = self
            .config
            .dedupe_priority_deck
            .as_deref()
            .and_then(|name| col.deck_id(name));

        // Groups ordered by the best due they contain, so the cap spends
        // its budget on the cards the user will meet soonest.
        let mut groups: Vec<(i64, MorphKey, Vec<CardId>)> = single_unknowns
            .into_iter()
            .filter_map(|(key, card_ids)| {
                let min_due = card_ids
                    .iter()
                    .filter_map(|id| cards.get(id))
                    .map(|card| card.due)
                    .min()?;
                Some((min_due, key, card_ids))
            })
            .collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        groups.truncate(self.config.dedupe_group_limit);

        let mut processed = 0;
        for (_, _, card_ids) in groups {
            self.cancel.check()?;

            let winner = card_ids
                .iter()
                .filter_map(|id| cards.get(id))
                .min_by_key(|card| {
                    let deck_rank = match priority_deck_id {
                        Some(deck_id) if card.deck_id == deck_id => 0,
                        Some(_) => 1,
                        None => 0,
                    };
                    (deck_rank, card.due, card.card_id)
                })
                .map(|card| card.card_id);
            let Some(winner_id) = winner else {
                continue;
            };

            if card_ids.len() > 1 {
                processed += 1;
            }

            for &card_id in &card_ids {
                let Some(card) = cards.get_mut(&card_id) else {
                    continue;
                };
                let Some(note) = notes.get_mut(&card.note_id) else {
                    continue;
                };

                if card_id == winner_id {
                    if note.has_tag(&self.config.tags.suspended_automatically) {
                        let scored_due = scores.get(&card_id).copied().unwrap_or(card.due);
                        tags::clear_forced_suspension(&self.config.tags, note, card, scored_due);
                    }
                } else {
                    tags::force_suspend_duplicate(&self.config.tags, note, card);
                }
            }
        }

        Ok(processed)
    }
}

/// `lemma[reading]` of the card's first cached morph, for display fields.
fn extra_reading_text(morphs: &[Morpheme]) -> Option<String> {
    let morph = morphs.first()?;
    let reading = morph.normalized_reading();
    if reading.is_empty() {
        Some(morph.lemma.clone())
    } else {
        Some(format!("{}[{}]", morph.lemma, reading))
    }
}

fn collection_morph_keys(card_morph_map: &HashMap<CardId, Vec<Morpheme>>) -> HashSet<MorphKey> {
    let mut keys = HashSet::new();
    for morphs in card_morph_map.values() {
        for morph in morphs {
            keys.insert(morph.lemma_key());
            keys.insert(morph.inflection_key());
        }
    }
    keys
}
