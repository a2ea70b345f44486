use std::{
    collections::HashMap,
    path::Path,
};

use rusqlite::{
    params,
    Connection,
};

use crate::core::{
    CardId,
    CardRecord,
    CardType,
    LearningStatus,
    MorphKey,
    Morpheme,
    NoteTypeId,
    SieveError,
};

/// One row of the Morphs table, staged in memory before a bulk insert.
#[derive(Debug, Clone)]
pub struct MorphRow {
    pub lemma: String,
    pub inflection: String,
    /// Always normalized before it gets here.
    pub reading: String,
    pub highest_lemma_learning_interval: i64,
    pub highest_inflection_learning_interval: i64,
}

/// One row of the Card_Morph_Map table.
#[derive(Debug, Clone)]
pub struct CardMorphRow {
    pub card_id: CardId,
    pub lemma: String,
    pub inflection: String,
    pub reading: String,
}

// A card can have many morphs and morphs can appear on many cards, so the
// cache is a many-to-many structure: Cards -> Card_Morph_Map <- Morphs.
// The whole thing is disposable; on any schema mismatch it is dropped and
// rebuilt, never migrated.
pub struct SieveDb {
    con: Connection,
}

impl SieveDb {
    pub fn open(db_path: &Path) -> Result<Self, SieveError> {
        let con = Connection::open(db_path)?;
        Ok(Self { con })
    }

    pub fn open_in_memory() -> Result<Self, SieveError> {
        let con = Connection::open_in_memory()?;
        Ok(Self { con })
    }

    pub fn create_all_tables(&self) -> Result<(), SieveError> {
        self.con.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS Cards
            (
                card_id INTEGER PRIMARY KEY ASC,
                note_id INTEGER,
                note_type_id INTEGER,
                card_type INTEGER,
                tags TEXT
            );
            CREATE TABLE IF NOT EXISTS Morphs
            (
                lemma TEXT,
                inflection TEXT,
                reading TEXT,
                highest_lemma_learning_interval INTEGER,
                highest_inflection_learning_interval INTEGER,
                PRIMARY KEY (lemma, inflection, reading)
            );
            CREATE TABLE IF NOT EXISTS Card_Morph_Map
            (
                card_id INTEGER,
                morph_lemma TEXT,
                morph_inflection TEXT,
                morph_reading TEXT,
                PRIMARY KEY (card_id, morph_lemma, morph_inflection, morph_reading)
            );
            CREATE TABLE IF NOT EXISTS Seen_Morphs
            (
                lemma TEXT,
                inflection TEXT,
                reading TEXT,
                PRIMARY KEY (lemma, inflection, reading)
            );
            ",
        )?;
        Ok(())
    }

    pub fn drop_all_tables(&self) -> Result<(), SieveError> {
        self.con.execute_batch(
            "
            DROP TABLE IF EXISTS Cards;
            DROP TABLE IF EXISTS Morphs;
            DROP TABLE IF EXISTS Card_Morph_Map;
            DROP TABLE IF EXISTS Seen_Morphs;
            ",
        )?;
        Ok(())
    }

    /// Drop and recreate everything, then bulk-insert the fresh
    /// extraction results in a single transaction.
    pub fn rebuild(
        &mut self,
        cards: &[CardRecord],
        morphs: &[MorphRow],
        card_morph_map: &[CardMorphRow],
    ) -> Result<(), SieveError> {
        let tx = self.con.transaction()?;

        tx.execute_batch(
            "
            DROP TABLE IF EXISTS Cards;
            DROP TABLE IF EXISTS Morphs;
            DROP TABLE IF EXISTS Card_Morph_Map;
            DROP TABLE IF EXISTS Seen_Morphs;
            CREATE TABLE Cards
            (
                card_id INTEGER PRIMARY KEY ASC,
                note_id INTEGER,
                note_type_id INTEGER,
                card_type INTEGER,
                tags TEXT
            );
            CREATE TABLE Morphs
            (
                lemma TEXT,
                inflection TEXT,
                reading TEXT,
                highest_lemma_learning_interval INTEGER,
                highest_inflection_learning_interval INTEGER,
                PRIMARY KEY (lemma, inflection, reading)
            );
            CREATE TABLE Card_Morph_Map
            (
                card_id INTEGER,
                morph_lemma TEXT,
                morph_inflection TEXT,
                morph_reading TEXT,
                PRIMARY KEY (card_id, morph_lemma, morph_inflection, morph_reading)
            );
            CREATE TABLE Seen_Morphs
            (
                lemma TEXT,
                inflection TEXT,
                reading TEXT,
                PRIMARY KEY (lemma, inflection, reading)
            );
            ",
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO Cards VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for card in cards {
                stmt.execute(params![
                    card.card_id,
                    card.note_id,
                    card.note_type_id,
                    card.card_type.as_i64(),
                    card.tags,
                ])?;
            }
        }

        {
            // On conflict only the inflection interval needs updating; the
            // lemma intervals were already propagated before insertion.
            let mut stmt = tx.prepare(
                "
                INSERT INTO Morphs VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(lemma, inflection, reading) DO UPDATE SET
                    highest_inflection_learning_interval = excluded.highest_inflection_learning_interval
                WHERE highest_inflection_learning_interval < excluded.highest_inflection_learning_interval
                ",
            )?;
            for morph in morphs {
                stmt.execute(params![
                    morph.lemma,
                    morph.inflection,
                    morph.reading,
                    morph.highest_lemma_learning_interval,
                    morph.highest_inflection_learning_interval,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO Card_Morph_Map VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in card_morph_map {
                stmt.execute(params![row.card_id, row.lemma, row.inflection, row.reading])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Card-id -> morphs, sorted by (lemma, inflection, reading). The
    /// ordering is what makes downstream duplicate detection deterministic.
    pub fn get_card_morph_map_cache(&self) -> Result<HashMap<CardId, Vec<Morpheme>>, SieveError> {
        let mut stmt = self.prepare(
            "
            SELECT Card_Morph_Map.card_id, Morphs.lemma, Morphs.inflection, Morphs.reading,
                   Morphs.highest_lemma_learning_interval, Morphs.highest_inflection_learning_interval
            FROM Card_Morph_Map
            INNER JOIN Morphs ON
                Card_Morph_Map.morph_lemma = Morphs.lemma
                AND Card_Morph_Map.morph_inflection = Morphs.inflection
                AND Card_Morph_Map.morph_reading = Morphs.reading
            ORDER BY Morphs.lemma, Morphs.inflection, Morphs.reading
            ",
        )?;

        let mut cache: HashMap<CardId, Vec<Morpheme>> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            let card_id: CardId = row.get(0)?;
            let lemma: String = row.get(1)?;
            let inflection: String = row.get(2)?;
            let reading: String = row.get(3)?;
            let lemma_interval: Option<i64> = row.get(4)?;
            let inflection_interval: Option<i64> = row.get(5)?;
            Ok((card_id, lemma, inflection, reading, lemma_interval, inflection_interval))
        })?;

        for row in rows {
            let (card_id, lemma, inflection, reading, lemma_interval, inflection_interval) = row?;
            let mut morph = Morpheme::new(&lemma, &inflection);
            if !reading.is_empty() {
                morph.reading = Some(reading);
            }
            morph.highest_lemma_learning_interval = lemma_interval;
            morph.highest_inflection_learning_interval = inflection_interval;
            cache.entry(card_id).or_default().push(morph);
        }

        Ok(cache)
    }

    /// Rank lemma-level morph keys by how often they occur across the
    /// whole map, most frequent first. Equal frequencies are ordered
    /// lexicographically by key so reruns are deterministic.
    pub fn get_morph_priorities_from_collection(
        &self,
    ) -> Result<HashMap<MorphKey, usize>, SieveError> {
        let mut stmt = self.prepare(
            "SELECT morph_lemma, morph_reading FROM Card_Morph_Map",
        )?;

        let mut counts: HashMap<MorphKey, usize> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            let lemma: String = row.get(0)?;
            let reading: String = row.get(1)?;
            Ok((lemma, reading))
        })?;
        for row in rows {
            let (lemma, reading) = row?;
            *counts.entry(MorphKey::new(&lemma, &lemma, &reading)).or_insert(0) += 1;
        }

        let mut ranked: Vec<(MorphKey, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(ranked.into_iter().enumerate().map(|(rank, (key, _))| (key, rank)).collect())
    }

    /// Cached card rows for one note type, filtered by tag containment on
    /// the space-padded tag string.
    pub fn get_cards_data(
        &self,
        note_type_id: NoteTypeId,
        include_tags: &[String],
        exclude_tags: &[String],
    ) -> Result<Vec<CardRecord>, SieveError> {
        let mut query = String::from(
            "SELECT card_id, note_id, note_type_id, card_type, tags
             FROM Cards
             WHERE note_type_id = ?1",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(note_type_id)];

        for tag in include_tags {
            query.push_str(&format!(" AND tags LIKE ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(format!("% {} %", tag)));
        }
        for tag in exclude_tags {
            query.push_str(&format!(" AND tags NOT LIKE ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(format!("% {} %", tag)));
        }
        query.push_str(" ORDER BY card_id");

        let mut stmt = self.prepare(&query)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok(CardRecord {
                card_id: row.get(0)?,
                note_id: row.get(1)?,
                note_type_id: row.get(2)?,
                card_type: CardType::from_i64(row.get(3)?),
                tags: row.get(4)?,
            })
        })?;

        let mut cards = Vec::new();
        for row in rows {
            cards.push(row?);
        }
        Ok(cards)
    }

    /// Learning status per inflection-level key.
    pub fn get_morph_inflections_learning_statuses(
        &self,
        interval_for_known_morphs: i64,
    ) -> Result<HashMap<MorphKey, LearningStatus>, SieveError> {
        let mut stmt = self.prepare(
            "
            SELECT lemma, inflection, reading, highest_inflection_learning_interval
            FROM Morphs
            ORDER BY lemma, inflection, reading
            ",
        )?;

        let mut statuses = HashMap::new();
        let rows = stmt.query_map([], |row| {
            let lemma: String = row.get(0)?;
            let inflection: String = row.get(1)?;
            let reading: String = row.get(2)?;
            let interval: i64 = row.get::<_, Option<i64>>(3)?.unwrap_or(0);
            Ok((lemma, inflection, reading, interval))
        })?;
        for row in rows {
            let (lemma, inflection, reading, interval) = row?;
            statuses.insert(
                MorphKey::new(&lemma, &inflection, &reading),
                LearningStatus::from_interval(interval, interval_for_known_morphs),
            );
        }
        Ok(statuses)
    }

    /// Learning status per lemma-level key, taking the highest lemma
    /// interval seen for each (lemma, reading).
    pub fn get_morph_lemmas_learning_statuses(
        &self,
        interval_for_known_morphs: i64,
    ) -> Result<HashMap<MorphKey, LearningStatus>, SieveError> {
        let mut stmt = self.prepare(
            "
            SELECT lemma, reading, MAX(highest_lemma_learning_interval)
            FROM Morphs
            GROUP BY lemma, reading
            ",
        )?;

        let mut statuses = HashMap::new();
        let rows = stmt.query_map([], |row| {
            let lemma: String = row.get(0)?;
            let reading: String = row.get(1)?;
            let interval: i64 = row.get::<_, Option<i64>>(2)?.unwrap_or(0);
            Ok((lemma, reading, interval))
        })?;
        for row in rows {
            let (lemma, reading, interval) = row?;
            statuses.insert(
                MorphKey::new(&lemma, &lemma, &reading),
                LearningStatus::from_interval(interval, interval_for_known_morphs),
            );
        }
        Ok(statuses)
    }

    /// Drop and refill Seen_Morphs from the morphs of the given cards
    /// plus the externally flagged name morphs. Incremental removal on
    /// undo is intractable, so the whole set is rebuilt every time.
    pub fn rebuild_seen_morphs(
        &mut self,
        answered_today: &[CardId],
        names: &[MorphKey],
    ) -> Result<(), SieveError> {
        let tx = self.con.transaction()?;

        tx.execute_batch(
            "
            DROP TABLE IF EXISTS Seen_Morphs;
            CREATE TABLE Seen_Morphs
            (
                lemma TEXT,
                inflection TEXT,
                reading TEXT,
                PRIMARY KEY (lemma, inflection, reading)
            );
            ",
        )?;

        if !answered_today.is_empty() {
            // SQLite has no variable-length parameter lists; card ids are
            // integers so splicing them in directly is safe.
            let id_list: Vec<String> = answered_today.iter().map(|id| id.to_string()).collect();
            let insert = format!(
                "
                INSERT OR IGNORE INTO Seen_Morphs (lemma, inflection, reading)
                SELECT morph_lemma, morph_inflection, morph_reading
                FROM Card_Morph_Map
                WHERE card_id IN ({})
                ",
                id_list.join(",")
            );
            tx.execute(&insert, [])?;
        }

        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO Seen_Morphs VALUES (?1, ?2, ?3)")?;
            for name in names {
                stmt.execute(params![name.lemma, name.sub_key, name.reading])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get_all_morphs_seen_today(
        &self,
        only_lemma: bool,
    ) -> Result<Vec<MorphKey>, SieveError> {
        let select = if only_lemma {
            "SELECT lemma, lemma, reading FROM Seen_Morphs"
        } else {
            "SELECT lemma, inflection, reading FROM Seen_Morphs"
        };

        let mut stmt = self.prepare(select)?;
        let rows = stmt.query_map([], |row| {
            let lemma: String = row.get(0)?;
            let sub_key: String = row.get(1)?;
            let reading: String = row.get(2)?;
            Ok(MorphKey::new(&lemma, &sub_key, &reading))
        })?;

        let mut morphs = Vec::new();
        for row in rows {
            morphs.push(row?);
        }
        Ok(morphs)
    }

    /// (lemma, reading, occurrence count) for lemmas at or above the
    /// given interval, for the known-morphs exporter.
    pub fn get_known_lemmas_with_count(
        &self,
        min_lemma_interval: i64,
    ) -> Result<Vec<(String, String, i64)>, SieveError> {
        let mut stmt = self.prepare(
            "
            SELECT morph_lemma, morph_reading, COUNT(morph_lemma)
            FROM Card_Morph_Map cmm
            INNER JOIN Morphs m ON
                cmm.morph_lemma = m.lemma
                AND cmm.morph_inflection = m.inflection
                AND cmm.morph_reading = m.reading
            WHERE m.highest_lemma_learning_interval >= ?1
            GROUP BY morph_lemma, morph_reading
            ORDER BY morph_lemma, morph_reading
            ",
        )?;

        let rows = stmt.query_map([min_lemma_interval], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// (lemma, inflection, reading, occurrence count) at or above the
    /// given inflection interval.
    pub fn get_known_lemmas_and_inflections_with_count(
        &self,
        min_inflection_interval: i64,
    ) -> Result<Vec<(String, String, String, i64)>, SieveError> {
        let mut stmt = self.prepare(
            "
            SELECT morph_lemma, morph_inflection, morph_reading, COUNT(morph_inflection)
            FROM Card_Morph_Map cmm
            INNER JOIN Morphs m ON
                cmm.morph_lemma = m.lemma
                AND cmm.morph_inflection = m.inflection
                AND cmm.morph_reading = m.reading
            WHERE m.highest_inflection_learning_interval >= ?1
            GROUP BY morph_lemma, morph_inflection, morph_reading
            ORDER BY morph_lemma, morph_inflection, morph_reading
            ",
        )?;

        let rows = stmt.query_map([min_inflection_interval], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Prepare a statement, converting a stale-schema failure into the
    /// self-healing `SchemaMismatch` condition: drop everything and tell
    /// the caller to rerun recalc.
    fn prepare(&self, sql: &str) -> Result<rusqlite::Statement<'_>, SieveError> {
        match self.con.prepare(sql) {
            Ok(stmt) => Ok(stmt),
            Err(err) if is_schema_error(&err) => {
                self.drop_all_tables()?;
                Err(SieveError::SchemaMismatch)
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn is_schema_error(err: &rusqlite::Error) -> bool {
    let message = err.to_string();
    message.contains("no such table") || message.contains("no such column")
}
