use std::{
    fs,
    path::PathBuf,
};

use crate::{
    cache::SieveDb,
    collection::{
        CardState,
        HostCollection,
        MemCollection,
        NoteState,
        QUEUE_NEW,
        QUEUE_SUSPENDED,
    },
    core::{
        CancelToken,
        CardType,
        FilterConfig,
        PrioritySource,
        ReadingPriority,
        RecalcConfig,
        SieveError,
    },
    morphemizers::{
        MorphemizerRegistry,
        WHITESPACE_MORPHEMIZER,
    },
    recalc::{
        card_score::{
            MAX_SCORE,
            UNLISTED_SCORE,
        },
        RecalcJob,
    },
};

const NOTE_TYPE_ID: i64 = 1000;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("morphsieve-recalc-{}-{}", std::process::id(), name));
    fs::create_dir_all(&dir).expect("temp dir");
    dir
}

fn write_priority_file(dir: &PathBuf, name: &str, content: &str) {
    fs::write(dir.join(name), content).expect("priority file");
}

fn base_config(priority_files_dir: PathBuf) -> RecalcConfig {
    let mut filter = FilterConfig::new("Vocab", "Expression", WHITESPACE_MORPHEMIZER);
    filter.priority_sources = vec![PrioritySource::File("prio.csv".to_string())];

    RecalcConfig {
        filters: vec![filter],
        priority_files_dir,
        ..RecalcConfig::default()
    }
}

fn base_collection() -> MemCollection {
    let mut col = MemCollection::new();
    col.add_note_type(
        "Vocab",
        NOTE_TYPE_ID,
        &["Expression", "Extra", "Furigana", "Reading"],
    );
    col.add_deck("Default", 1);
    col
}

fn add_vocab_card(
    col: &mut MemCollection,
    card_id: i64,
    expression: &str,
    due: i64,
    card_type: CardType,
    interval: i64,
    deck_id: i64,
) {
    let note_id = card_id + 1000;
    col.add_note(NoteState {
        note_id,
        note_type_id: NOTE_TYPE_ID,
        tags: Vec::new(),
        fields: vec![expression.to_string(), String::new()],
    });
    col.add_card(CardState {
        card_id,
        note_id,
        deck_id,
        card_type,
        interval,
        due,
        queue: QUEUE_NEW,
    });
}

fn add_reading_card(
    col: &mut MemCollection,
    card_id: i64,
    expression: &str,
    furigana: &str,
    reading: &str,
    due: i64,
) {
    let note_id = card_id + 1000;
    col.add_note(NoteState {
        note_id,
        note_type_id: NOTE_TYPE_ID,
        tags: Vec::new(),
        fields: vec![
            expression.to_string(),
            String::new(),
            furigana.to_string(),
            reading.to_string(),
        ],
    });
    col.add_card(CardState {
        card_id,
        note_id,
        deck_id: 1,
        card_type: CardType::New,
        interval: 0,
        due,
        queue: QUEUE_NEW,
    });
}

fn note_of(col: &MemCollection, card_id: i64) -> NoteState {
    col.note_state(card_id + 1000).expect("note exists")
}

fn card_of(col: &MemCollection, card_id: i64) -> CardState {
    col.card_state(card_id).expect("card exists")
}

#[test]
fn new_cards_are_ordered_by_merged_priorities() {
    let dir = temp_dir("ordering");
    write_priority_file(
        &dir,
        "prio.csv",
        "Morph-Lemma,Morph-Reading\nbeta,beta\nalpha,alpha\n",
    );
    let config = base_config(dir);
    let registry = MorphemizerRegistry::new();

    let mut col = base_collection();
    add_vocab_card(&mut col, 1, "alpha", 100, CardType::New, 0, 1);
    add_vocab_card(&mut col, 2, "beta", 101, CardType::New, 0, 1);
    add_vocab_card(&mut col, 3, "alpha gamma", 102, CardType::New, 0, 1);

    let mut db = SieveDb::open_in_memory().unwrap();
    let summary = RecalcJob::new(&config, &registry)
        .run(&mut db, &mut col)
        .unwrap();

    assert_eq!(card_of(&col, 1).due, 1);
    assert_eq!(card_of(&col, 2).due, 0);
    // Two unknowns: scored by its best morph but held back as not-ready.
    assert_eq!(card_of(&col, 3).due, 1);

    assert!(note_of(&col, 1).has_tag("ms-ready"));
    assert!(note_of(&col, 2).has_tag("ms-ready"));
    assert!(note_of(&col, 3).has_tag("ms-not-ready"));
    assert!(!note_of(&col, 3).has_tag("ms-ready"));

    assert_eq!(summary.cards_modified, 3);
    assert_eq!(summary.notes_modified, 3);
}

#[test]
fn unlisted_morphs_get_the_sentinel_due() {
    let dir = temp_dir("unlisted");
    write_priority_file(&dir, "prio.csv", "Morph-Lemma\nbeta\n");
    let config = base_config(dir);
    let registry = MorphemizerRegistry::new();

    let mut col = base_collection();
    add_vocab_card(&mut col, 1, "omega", 100, CardType::New, 0, 1);

    let mut db = SieveDb::open_in_memory().unwrap();
    RecalcJob::new(&config, &registry).run(&mut db, &mut col).unwrap();

    assert_eq!(card_of(&col, 1).due, UNLISTED_SCORE);
}

#[test]
fn duplicate_new_cards_are_suspended_and_the_pass_is_idempotent() {
    let dir = temp_dir("dedupe");
    write_priority_file(&dir, "prio.csv", "Morph-Lemma,Morph-Reading\nalpha,alpha\n");
    let config = base_config(dir);
    let registry = MorphemizerRegistry::new();

    let mut col = base_collection();
    add_vocab_card(&mut col, 1, "alpha", 100, CardType::New, 0, 1);
    add_vocab_card(&mut col, 2, "alpha", 50, CardType::New, 0, 1);

    let mut db = SieveDb::open_in_memory().unwrap();
    let summary = RecalcJob::new(&config, &registry)
        .run(&mut db, &mut col)
        .unwrap();
    assert_eq!(summary.duplicate_groups_processed, 1);

    // Both score identically, so the lower card id wins the group.
    let winner_note = note_of(&col, 1);
    assert!(winner_note.has_tag("ms-ready"));
    assert!(!winner_note.has_tag("ms-suspended-automatically"));
    assert_eq!(card_of(&col, 1).due, 0);
    assert_eq!(card_of(&col, 1).queue, QUEUE_NEW);

    let loser_note = note_of(&col, 2);
    assert!(loser_note.has_tag("ms-not-ready"));
    assert!(loser_note.has_tag("ms-suspended-automatically"));
    assert_eq!(card_of(&col, 2).queue, QUEUE_SUSPENDED);
    assert_eq!(card_of(&col, 2).due, MAX_SCORE);

    // Second run over unchanged state must flush nothing.
    let summary = RecalcJob::new(&config, &registry)
        .run(&mut db, &mut col)
        .unwrap();
    assert_eq!(summary.cards_modified, 0);
    assert_eq!(summary.notes_modified, 0);
    assert_eq!(col.last_applied, (0, 0));
}

#[test]
fn priority_deck_member_wins_its_duplicate_group() {
    let dir = temp_dir("prio-deck");
    write_priority_file(&dir, "prio.csv", "Morph-Lemma,Morph-Reading\nalpha,alpha\n");
    let mut config = base_config(dir);
    config.dedupe_priority_deck = Some("Mining".to_string());
    let registry = MorphemizerRegistry::new();

    let mut col = base_collection();
    col.add_deck("Mining", 7);
    add_vocab_card(&mut col, 1, "alpha", 100, CardType::New, 0, 1);
    add_vocab_card(&mut col, 2, "alpha", 50, CardType::New, 0, 7);

    let mut db = SieveDb::open_in_memory().unwrap();
    RecalcJob::new(&config, &registry).run(&mut db, &mut col).unwrap();

    assert!(note_of(&col, 2).has_tag("ms-ready"));
    assert!(note_of(&col, 1).has_tag("ms-suspended-automatically"));
    assert_eq!(card_of(&col, 1).queue, QUEUE_SUSPENDED);
}

#[test]
fn fully_known_new_card_is_tagged_and_suspended() {
    let dir = temp_dir("known");
    write_priority_file(&dir, "prio.csv", "Morph-Lemma\nalpha\n");
    let config = base_config(dir);
    let registry = MorphemizerRegistry::new();

    let mut col = base_collection();
    // A mature review card makes "alpha" known at the lemma level.
    add_vocab_card(&mut col, 1, "alpha", 5, CardType::Review, 30, 1);
    add_vocab_card(&mut col, 2, "alpha", 100, CardType::New, 0, 1);

    let mut db = SieveDb::open_in_memory().unwrap();
    RecalcJob::new(&config, &registry).run(&mut db, &mut col).unwrap();

    let note = note_of(&col, 2);
    assert!(note.has_tag("ms-known-automatically"));
    assert!(note.has_tag("ms-suspended-automatically"));
    assert!(!note.has_tag("ms-ready"));
    assert_eq!(card_of(&col, 2).queue, QUEUE_SUSPENDED);

    // The review card itself gains no pre-study tags.
    let review_note = note_of(&col, 1);
    assert!(!review_note.has_tag("ms-ready"));
    assert!(!review_note.has_tag("ms-not-ready"));
}

#[test]
fn learning_morphs_mark_new_cards_fresh() {
    let dir = temp_dir("fresh");
    write_priority_file(&dir, "prio.csv", "Morph-Lemma\nalpha\nbeta\n");
    let config = base_config(dir);
    let registry = MorphemizerRegistry::new();

    let mut col = base_collection();
    // "alpha" is mid-learning (interval 5, below the known threshold).
    add_vocab_card(&mut col, 1, "alpha", 5, CardType::Review, 5, 1);
    add_vocab_card(&mut col, 2, "alpha beta", 100, CardType::New, 0, 1);

    let mut db = SieveDb::open_in_memory().unwrap();
    RecalcJob::new(&config, &registry).run(&mut db, &mut col).unwrap();

    let note = note_of(&col, 2);
    assert!(note.has_tag("ms-fresh"));
    assert!(note.has_tag("ms-ready"));
}

#[test]
fn malformed_priority_file_aborts_before_any_write() {
    let dir = temp_dir("malformed");
    write_priority_file(&dir, "prio.csv", "Word,Rank\nalpha,1\n");
    let config = base_config(dir.clone());
    let registry = MorphemizerRegistry::new();

    let mut col = base_collection();
    add_vocab_card(&mut col, 1, "alpha", 100, CardType::New, 0, 1);

    let mut db = SieveDb::open_in_memory().unwrap();
    let result = RecalcJob::new(&config, &registry).run(&mut db, &mut col);

    match result {
        Err(SieveError::PriorityFileMalformed { path, .. }) => {
            assert_eq!(path, dir.join("prio.csv"));
        }
        other => panic!("expected malformed priority file, got {:?}", other.map(|_| ())),
    }
    assert_eq!(col.apply_calls, 0);
    assert_eq!(card_of(&col, 1).due, 100);
}

#[test]
fn unknown_note_type_is_a_configuration_error() {
    let dir = temp_dir("badnotetype");
    let mut config = base_config(dir);
    config.filters[0].note_type = "Missing".to_string();
    let registry = MorphemizerRegistry::new();

    let mut col = base_collection();
    let mut db = SieveDb::open_in_memory().unwrap();

    let result = RecalcJob::new(&config, &registry).run(&mut db, &mut col);
    assert!(matches!(result, Err(SieveError::NoteTypeNotFound(name)) if name == "Missing"));
}

#[test]
fn empty_filters_are_default_settings() {
    let dir = temp_dir("defaults");
    let mut config = base_config(dir);
    config.filters.clear();
    let registry = MorphemizerRegistry::new();

    let mut col = base_collection();
    let mut db = SieveDb::open_in_memory().unwrap();

    let result = RecalcJob::new(&config, &registry).run(&mut db, &mut col);
    assert!(matches!(result, Err(SieveError::DefaultSettings)));
}

#[test]
fn cancellation_aborts_without_external_writes() {
    let dir = temp_dir("cancel");
    write_priority_file(&dir, "prio.csv", "Morph-Lemma\nalpha\n");
    let config = base_config(dir);
    let registry = MorphemizerRegistry::new();

    let mut col = base_collection();
    add_vocab_card(&mut col, 1, "alpha", 100, CardType::New, 0, 1);

    let cancel = CancelToken::new();
    cancel.cancel();

    let mut db = SieveDb::open_in_memory().unwrap();
    let result = RecalcJob::new(&config, &registry)
        .with_cancel(cancel)
        .run(&mut db, &mut col);

    assert!(matches!(result, Err(SieveError::Cancelled)));
    assert_eq!(col.apply_calls, 0);
}

#[test]
fn extra_reading_field_is_filled_from_the_first_morph() {
    let dir = temp_dir("extra");
    write_priority_file(&dir, "prio.csv", "Morph-Lemma\nalpha\n");
    let mut config = base_config(dir);
    config.filters[0].extra_reading_field = Some("Extra".to_string());
    let registry = MorphemizerRegistry::new();

    let mut col = base_collection();
    add_vocab_card(&mut col, 1, "alpha", 100, CardType::New, 0, 1);

    let mut db = SieveDb::open_in_memory().unwrap();
    RecalcJob::new(&config, &registry).run(&mut db, &mut col).unwrap();

    // Single morph, no reading field: the expression reads as itself.
    assert_eq!(note_of(&col, 1).fields[1], "alpha[alpha]");
}

#[test]
fn furigana_field_supplies_the_scoring_reading() {
    let dir = temp_dir("furigana");
    write_priority_file(
        &dir,
        "prio.csv",
        "Morph-Lemma,Morph-Reading\n行く,いく\n食べる,たべる\n",
    );
    let mut config = base_config(dir);
    config.filters[0].furigana_field = Some("Furigana".to_string());
    let registry = MorphemizerRegistry::new();

    let mut col = base_collection();
    add_reading_card(&mut col, 1, "食べる", "食[た]べる", "", 100);

    let mut db = SieveDb::open_in_memory().unwrap();
    RecalcJob::new(&config, &registry).run(&mut db, &mut col).unwrap();

    // The bracket annotation parses to たべる and hits the
    // reading-specific priority entry.
    assert_eq!(card_of(&col, 1).due, 1);
    assert!(note_of(&col, 1).has_tag("ms-ready"));
}

#[test]
fn reading_priority_picks_one_source_for_scoring() {
    let priority_rows = "Morph-Lemma,Morph-Reading\n食べる,たべる\n食べる,めしあがる\n";
    let registry = MorphemizerRegistry::new();

    let dir = temp_dir("furigana-first");
    write_priority_file(&dir, "prio.csv", priority_rows);
    let mut config = base_config(dir);
    config.filters[0].furigana_field = Some("Furigana".to_string());
    config.filters[0].reading_field = Some("Reading".to_string());

    let mut col = base_collection();
    add_reading_card(&mut col, 1, "食べる", "食[た]べる", "めしあがる", 100);

    let mut db = SieveDb::open_in_memory().unwrap();
    RecalcJob::new(&config, &registry).run(&mut db, &mut col).unwrap();
    assert_eq!(card_of(&col, 1).due, 0);

    // Same card under the opposite precedence scores by the reading field.
    let dir = temp_dir("reading-first");
    write_priority_file(&dir, "prio.csv", priority_rows);
    let mut config = base_config(dir);
    config.filters[0].furigana_field = Some("Furigana".to_string());
    config.filters[0].reading_field = Some("Reading".to_string());
    config.filters[0].reading_priority = ReadingPriority::ReadingFirst;

    let mut col = base_collection();
    add_reading_card(&mut col, 1, "食べる", "食[た]べる", "めしあがる", 100);

    let mut db = SieveDb::open_in_memory().unwrap();
    RecalcJob::new(&config, &registry).run(&mut db, &mut col).unwrap();
    assert_eq!(card_of(&col, 1).due, 1);
}

#[test]
fn bare_single_morph_card_reads_as_its_expression() {
    let dir = temp_dir("self-reading");
    write_priority_file(&dir, "prio.csv", "Morph-Lemma,Morph-Reading\nたべる,たべる\n");
    let config = base_config(dir);
    let registry = MorphemizerRegistry::new();

    let mut col = base_collection();
    add_vocab_card(&mut col, 1, "たべる", 100, CardType::New, 0, 1);

    let mut db = SieveDb::open_in_memory().unwrap();
    RecalcJob::new(&config, &registry).run(&mut db, &mut col).unwrap();

    assert_eq!(card_of(&col, 1).due, 0);
    assert!(note_of(&col, 1).has_tag("ms-ready"));
}

#[test]
fn priority_gaps_report_unmatched_entries() {
    let dir = temp_dir("gaps");
    write_priority_file(&dir, "prio.csv", "Morph-Lemma\nalpha\nzeta\n");
    let config = base_config(dir);
    let registry = MorphemizerRegistry::new();

    let mut col = base_collection();
    add_vocab_card(&mut col, 1, "alpha", 100, CardType::New, 0, 1);

    let mut db = SieveDb::open_in_memory().unwrap();
    let summary = RecalcJob::new(&config, &registry)
        .run(&mut db, &mut col)
        .unwrap();

    assert_eq!(summary.priority_gaps.len(), 1);
    assert_eq!(summary.priority_gaps[0].0.lemma, "zeta");
    assert_eq!(summary.priority_gaps[0].1, 1);
}
