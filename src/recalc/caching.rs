use std::collections::HashMap;

use crate::{
    cache::{
        CardMorphRow,
        MorphRow,
        SieveDb,
    },
    collection::{
        join_tags,
        CardState,
        HostCollection,
        NoteState,
    },
    core::{
        names::load_names_file,
        text::preprocess_text,
        CancelToken,
        CardRecord,
        CardType,
        FilterConfig,
        MorphKey,
        Morpheme,
        NoteTypeId,
        ReadingPriority,
        RecalcConfig,
        SieveError,
    },
    morphemizers::MorphemizerRegistry,
    priority::{
        known_morphs_files,
        load_known_morphs_file,
    },
    reading::{
        normalize_reading,
        parse_furigana_field,
    },
};

const CANCEL_POLL_INTERVAL: usize = 100;

/// Everything read from the host for one card before tokenization.
struct CardInput {
    card: CardState,
    note: NoteState,
    expression: String,
    furigana: Option<String>,
    reading: Option<String>,
}

/// Overlay one reading source onto a card's morphs.
///
/// Equal counts zip one-to-one; a single token broadcasts to every
/// morph; a single morph absorbs all tokens joined; anything else is
/// left alone rather than guessed at.
fn assign_readings(morphs: &mut [Morpheme], tokens: &[String]) {
    if tokens.is_empty() || morphs.is_empty() {
        return;
    }

    if tokens.len() == morphs.len() {
        for (morph, token) in morphs.iter_mut().zip(tokens) {
            assign_reading(morph, token);
        }
    } else if tokens.len() == 1 {
        for morph in morphs.iter_mut() {
            assign_reading(morph, &tokens[0]);
        }
    } else if morphs.len() == 1 {
        assign_reading(&mut morphs[0], &tokens.concat());
    }
}

/// Readings are stored normalized. A longer reading never overrides a
/// shorter one it merely extends; that would trade a precise per-morph
/// match for a coarser merged token.
fn assign_reading(morph: &mut Morpheme, reading: &str) {
    let normalized = normalize_reading(Some(reading));
    if normalized.is_empty() {
        return;
    }
    if let Some(existing) = morph.reading.as_deref() {
        if !existing.is_empty()
            && normalized.starts_with(existing)
            && normalized.len() > existing.len()
        {
            return;
        }
    }
    morph.reading = Some(normalized);
}

/// Seed interval: the known threshold for tagged-known notes, 1 for
/// cards mid-learning (distinct from "never studied"), otherwise the
/// card's raw scheduling interval.
fn seed_interval(config: &RecalcConfig, card: &CardState, note: &NoteState) -> i64 {
    if note.has_tag(&config.tags.known_automatically) || note.has_tag(&config.tags.known_manually) {
        config.interval_for_known_morphs
    } else if card.card_type == CardType::Learning {
        1
    } else {
        card.interval
    }
}

fn field_index(
    field_names: &[String],
    note_type: &str,
    field: &str,
) -> Result<usize, SieveError> {
    field_names
        .iter()
        .position(|name| name == field)
        .ok_or_else(|| SieveError::FieldNotFound {
            note_type: note_type.to_string(),
            field: field.to_string(),
        })
}

fn collect_card_inputs(
    col: &dyn HostCollection,
    filter: &FilterConfig,
    note_type_id: NoteTypeId,
) -> Result<Vec<CardInput>, SieveError> {
    let field_names = col
        .field_names(note_type_id)
        .ok_or_else(|| SieveError::NoteTypeNotFound(filter.note_type.clone()))?;

    let expression_index = field_index(&field_names, &filter.note_type, &filter.field)?;
    let furigana_index = filter
        .furigana_field
        .as_deref()
        .map(|field| field_index(&field_names, &filter.note_type, field))
        .transpose()?;
    let reading_index = filter
        .reading_field
        .as_deref()
        .map(|field| field_index(&field_names, &filter.note_type, field))
        .transpose()?;

    let mut inputs = Vec::new();
    for card_id in col.card_ids_of_note_type(note_type_id) {
        let card = match col.card_state(card_id) {
            Some(card) => card,
            None => continue,
        };
        let note = match col.note_state(card.note_id) {
            Some(note) => note,
            None => continue,
        };

        if !filter.include_tags.iter().all(|tag| note.has_tag(tag)) {
            continue;
        }
        if filter.exclude_tags.iter().any(|tag| note.has_tag(tag)) {
            continue;
        }

        let expression = note.fields.get(expression_index).cloned().unwrap_or_default();
        let furigana = furigana_index.and_then(|index| note.fields.get(index).cloned());
        let reading = reading_index.and_then(|index| note.fields.get(index).cloned());

        inputs.push(CardInput {
            card,
            note,
            expression,
            furigana,
            reading,
        });
    }

    Ok(inputs)
}

fn apply_reading_sources(
    config: &RecalcConfig,
    filter: &FilterConfig,
    input: &CardInput,
    expression: &str,
    morphs: &mut [Morpheme],
) {
    // The furigana field is parsed raw: preprocessing would strip the
    // bracket annotations before the parser ever sees them. The parser's
    // output is already normalized hiragana.
    let furigana_tokens: Vec<String> = input
        .furigana
        .as_deref()
        .map(parse_furigana_field)
        .unwrap_or_default();
    let reading_tokens: Vec<String> = input
        .reading
        .as_deref()
        .map(|field| {
            preprocess_text(config, field)
                .split_whitespace()
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    // The sources are a precedence, not a merge: the non-preferred one
    // is consulted only when the preferred one produced nothing.
    let (preferred, fallback) = match filter.reading_priority {
        ReadingPriority::FuriganaFirst => (&furigana_tokens, &reading_tokens),
        ReadingPriority::ReadingFirst => (&reading_tokens, &furigana_tokens),
    };
    let tokens = if !preferred.is_empty() { preferred } else { fallback };
    assign_readings(morphs, tokens);

    // A single-morph card with no reading source at all reads as itself.
    if morphs.len() == 1
        && tokens.is_empty()
        && morphs[0].reading.is_none()
        && !expression.is_empty()
    {
        assign_reading(&mut morphs[0], expression);
    }
}

/// Rebuild the whole cache from the host collection: extract morphs
/// from every read-enabled source, propagate lemma intervals, merge
/// known-morph imports, and bulk-insert the result.
pub fn cache_all(
    db: &mut SieveDb,
    col: &dyn HostCollection,
    config: &RecalcConfig,
    registry: &MorphemizerRegistry,
    cancel: &CancelToken,
    progress: &dyn Fn(String),
) -> Result<(), SieveError> {
    let mut cards: Vec<CardRecord> = Vec::new();
    let mut inflection_intervals: HashMap<MorphKey, i64> = HashMap::new();
    let mut card_morph_map: Vec<CardMorphRow> = Vec::new();

    for filter in config.read_enabled_filters() {
        cancel.check()?;

        let note_type_id = col
            .note_type_id(&filter.note_type)
            .ok_or_else(|| SieveError::NoteTypeNotFound(filter.note_type.clone()))?;
        let morphemizer = registry.get(&filter.morphemizer)?;

        let inputs = collect_card_inputs(col, filter, note_type_id)?;
        progress(format!(
            "Extracting morphs: {} ({} cards)",
            filter.note_type,
            inputs.len()
        ));

        let expressions: Vec<String> = inputs
            .iter()
            .map(|input| preprocess_text(config, &input.expression))
            .collect();
        let morph_batch = morphemizer.get_morphemes(&expressions);

        for (index, (input, mut morphs)) in inputs.iter().zip(morph_batch).enumerate() {
            cancel.check_every(index, CANCEL_POLL_INTERVAL)?;

            apply_reading_sources(config, filter, input, &expressions[index], &mut morphs);

            let interval = seed_interval(config, &input.card, &input.note);

            cards.push(CardRecord {
                card_id: input.card.card_id,
                note_id: input.note.note_id,
                note_type_id,
                card_type: input.card.card_type,
                tags: join_tags(&input.note.tags),
            });

            for morph in &morphs {
                let reading = morph.normalized_reading();
                let key = MorphKey::new(&morph.lemma, &morph.inflection, &reading);

                let entry = inflection_intervals.entry(key).or_insert(interval);
                if interval > *entry {
                    *entry = interval;
                }

                card_morph_map.push(CardMorphRow {
                    card_id: input.card.card_id,
                    lemma: morph.lemma.clone(),
                    inflection: morph.inflection.clone(),
                    reading,
                });
            }
        }
    }

    // Known-morph imports land directly in the interval table at the
    // known threshold; the upsert keeps the max on collision.
    if let Some(dir) = &config.known_morphs_dir {
        for path in known_morphs_files(dir)? {
            progress(format!("Importing known morphs: {}", path.display()));
            for key in load_known_morphs_file(&path)? {
                let entry = inflection_intervals
                    .entry(key)
                    .or_insert(config.interval_for_known_morphs);
                if config.interval_for_known_morphs > *entry {
                    *entry = config.interval_for_known_morphs;
                }
            }
        }
    }

    cancel.check()?;

    // Lemma intervals: max inflection interval per (lemma, reading),
    // plus a reading-less fallback per lemma for priority lookups.
    let mut lemma_intervals: HashMap<(String, String), i64> = HashMap::new();
    for (key, &interval) in &inflection_intervals {
        for lemma_key in [
            (key.lemma.clone(), key.reading.clone()),
            (key.lemma.clone(), String::new()),
        ] {
            let entry = lemma_intervals.entry(lemma_key).or_insert(interval);
            if interval > *entry {
                *entry = interval;
            }
        }
    }

    let morph_rows: Vec<MorphRow> = inflection_intervals
        .into_iter()
        .map(|(key, inflection_interval)| {
            let lemma_interval = lemma_intervals
                .get(&(key.lemma.clone(), key.reading.clone()))
                .or_else(|| lemma_intervals.get(&(key.lemma.clone(), String::new())))
                .copied()
                .unwrap_or(inflection_interval);

            // When cards are judged at the lemma level, knowing any form
            // counts as knowing every form.
            let inflection_interval = if config.evaluate_morph_lemma {
                lemma_interval
            } else {
                inflection_interval
            };

            MorphRow {
                lemma: key.lemma,
                inflection: key.sub_key,
                reading: key.reading,
                highest_lemma_learning_interval: lemma_interval,
                highest_inflection_learning_interval: inflection_interval,
            }
        })
        .collect();

    progress(format!(
        "Writing cache: {} cards, {} morphs",
        cards.len(),
        morph_rows.len()
    ));
    db.rebuild(&cards, &morph_rows, &card_morph_map)?;

    update_seen_morphs(db, col, config)?;

    Ok(())
}

/// Refill the seen-morph set from today's answered cards plus the
/// names file. Also callable on its own after a day rollover.
pub fn update_seen_morphs(
    db: &mut SieveDb,
    col: &dyn HostCollection,
    config: &RecalcConfig,
) -> Result<(), SieveError> {
    let names = match &config.names_file {
        Some(path) => load_names_file(path)?,
        None => Vec::new(),
    };
    db.rebuild_seen_morphs(&col.cards_answered_today(), &names)
}
