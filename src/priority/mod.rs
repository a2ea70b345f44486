use std::{
    collections::{
        HashMap,
        HashSet,
    },
    path::{
        Path,
        PathBuf,
    },
};

use csv::ReaderBuilder;

use crate::{
    cache::SieveDb,
    core::{
        MorphKey,
        PrioritySource,
        SieveError,
    },
};

pub const LEMMA_HEADER: &str = "Morph-Lemma";
pub const INFLECTION_HEADER: &str = "Morph-Inflection";
pub const READING_HEADER: &str = "Morph-Reading";
pub const LEMMA_PRIORITY_HEADER: &str = "Lemma-Priority";
pub const INFLECTION_PRIORITY_HEADER: &str = "Inflection-Priority";

/// Column layout of a priority or known-morphs file, derived from its
/// header row. The first matching column wins for each header.
struct FileFormat {
    lemma: usize,
    inflection: Option<usize>,
    reading: Option<usize>,
    priority: Option<usize>,
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

fn resolve_format(headers: &csv::StringRecord, path: &Path) -> Result<FileFormat, SieveError> {
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(SieveError::PriorityFileMalformed {
            path: path.to_path_buf(),
            reason: "no header row".to_string(),
        });
    }

    let lemma = find_column(headers, LEMMA_HEADER).ok_or_else(|| {
        SieveError::PriorityFileMalformed {
            path: path.to_path_buf(),
            reason: format!("missing required '{}' header", LEMMA_HEADER),
        }
    })?;

    let inflection = find_column(headers, INFLECTION_HEADER);
    // Minimal files rank by lemma priority, full files by inflection
    // priority.
    let priority = if inflection.is_some() {
        find_column(headers, INFLECTION_PRIORITY_HEADER)
    } else {
        find_column(headers, LEMMA_PRIORITY_HEADER)
    };

    Ok(FileFormat {
        lemma,
        inflection,
        reading: find_column(headers, READING_HEADER),
        priority,
    })
}

fn parse_rank(
    record: &csv::StringRecord,
    column: usize,
    row_number: usize,
    path: &Path,
) -> Result<usize, SieveError> {
    let raw = record.get(column).unwrap_or("").trim();
    if raw.is_empty() {
        return Err(SieveError::PriorityFileMalformed {
            path: path.to_path_buf(),
            reason: format!("row {} has an empty priority value", row_number),
        });
    }
    raw.parse::<usize>().map_err(|_| SieveError::PriorityFileMalformed {
        path: path.to_path_buf(),
        reason: format!("row {} has a non-integer priority value: '{}'", row_number, raw),
    })
}

fn insert_min(priorities: &mut HashMap<MorphKey, usize>, key: MorphKey, rank: usize) {
    let entry = priorities.entry(key).or_insert(rank);
    if rank < *entry {
        *entry = rank;
    }
}

/// Parse one priority file into a MorphKey -> rank map.
///
/// Every row is written at its exact key and, when it carries a reading,
/// at a reading-less fallback key; both keep the lowest rank seen, so a
/// later duplicate row can never override an earlier better rank.
pub fn load_priority_file(path: &Path) -> Result<HashMap<MorphKey, usize>, SieveError> {
    if !path.is_file() {
        return Err(SieveError::PriorityFileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|_| SieveError::PriorityFileNotFound {
            path: path.to_path_buf(),
        })?;

    let headers = reader.headers()?.clone();
    let format = resolve_format(&headers, path)?;

    let mut priorities: HashMap<MorphKey, usize> = HashMap::new();

    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let row_number = index + 2;

        // A short row without the lemma column is malformed; a row whose
        // lemma cell is merely empty is skipped.
        let lemma = match record.get(format.lemma) {
            Some(lemma) => lemma.trim(),
            None => {
                return Err(SieveError::PriorityFileMalformed {
                    path: path.to_path_buf(),
                    reason: format!("row {} is missing the lemma column", row_number),
                })
            }
        };
        if lemma.is_empty() {
            continue;
        }

        let sub_key = format
            .inflection
            .and_then(|column| record.get(column))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(lemma);

        let reading = format
            .reading
            .and_then(|column| record.get(column))
            .map(str::trim)
            .unwrap_or("");

        let rank = match format.priority {
            Some(column) => parse_rank(&record, column, row_number, path)?,
            None => index,
        };

        insert_min(&mut priorities, MorphKey::new(lemma, sub_key, reading), rank);
        if !reading.is_empty() {
            insert_min(&mut priorities, MorphKey::new(lemma, sub_key, ""), rank);
        }
    }

    Ok(priorities)
}

/// Merge a resolved source into the accumulated map, keeping the lowest
/// rank per key. Min is associative and commutative, so source order
/// never changes the result.
pub fn merge_priorities(into: &mut HashMap<MorphKey, usize>, from: HashMap<MorphKey, usize>) {
    for (key, rank) in from {
        insert_min(into, key, rank);
    }
}

/// Resolve and merge an ordered selection of priority sources.
pub fn get_morph_priorities(
    db: &SieveDb,
    sources: &[PrioritySource],
    priority_files_dir: &Path,
) -> Result<HashMap<MorphKey, usize>, SieveError> {
    let mut merged: HashMap<MorphKey, usize> = HashMap::new();

    for source in sources {
        let resolved = match source {
            PrioritySource::CollectionFrequency => db.get_morph_priorities_from_collection()?,
            PrioritySource::File(file_name) => {
                load_priority_file(&priority_files_dir.join(file_name))?
            }
        };
        merge_priorities(&mut merged, resolved);
    }

    Ok(merged)
}

/// Parse a known-morphs import file into the keys it marks as known.
/// Same header conventions as priority files, but rank columns are
/// ignored and any parse problem collapses into one malformed error.
pub fn load_known_morphs_file(path: &Path) -> Result<Vec<MorphKey>, SieveError> {
    let malformed = || SieveError::KnownMorphsFileMalformed {
        path: path.to_path_buf(),
    };

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|_| malformed())?;

    let headers = reader.headers().map_err(|_| malformed())?.clone();
    let lemma_column = find_column(&headers, LEMMA_HEADER).ok_or_else(malformed)?;
    let inflection_column = find_column(&headers, INFLECTION_HEADER);
    let reading_column = find_column(&headers, READING_HEADER);

    let mut morphs = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|_| malformed())?;
        let lemma = match record.get(lemma_column) {
            Some(lemma) if !lemma.trim().is_empty() => lemma.trim(),
            _ => return Err(malformed()),
        };
        let sub_key = inflection_column
            .and_then(|column| record.get(column))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(lemma);
        let reading = reading_column
            .and_then(|column| record.get(column))
            .map(str::trim)
            .unwrap_or("");
        morphs.push(MorphKey::new(lemma, sub_key, reading));
    }

    Ok(morphs)
}

/// Every CSV file under the known-morphs directory, subdirectories
/// included, sorted for deterministic import order.
pub fn known_morphs_files(dir: &Path) -> Result<Vec<PathBuf>, SieveError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    collect_csv_files(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_csv_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), SieveError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_csv_files(&path, files)?;
        } else if path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
        {
            files.push(path);
        }
    }
    Ok(())
}

/// Priority entries that never matched any morph in the collection,
/// sorted by rank. Reading-less keys match any reading of the same
/// lemma pair; keys with a reading must match exactly. A reading-less
/// fallback entry is dropped from the report whenever a
/// reading-specific sibling exists, so each lemma appears once.
pub fn find_missing_priority_entries(
    priorities: &HashMap<MorphKey, usize>,
    collection_keys: &HashSet<MorphKey>,
) -> Vec<(MorphKey, usize)> {
    let lemma_pairs: HashSet<(&str, &str)> = collection_keys
        .iter()
        .map(|key| (key.lemma.as_str(), key.sub_key.as_str()))
        .collect();
    let reading_specific: HashSet<(&str, &str)> = priorities
        .keys()
        .filter(|key| !key.reading.is_empty())
        .map(|key| (key.lemma.as_str(), key.sub_key.as_str()))
        .collect();

    let mut missing: Vec<(MorphKey, usize)> = priorities
        .iter()
        .filter(|(key, _)| {
            if key.reading.is_empty() {
                !reading_specific.contains(&(key.lemma.as_str(), key.sub_key.as_str()))
                    && !lemma_pairs.contains(&(key.lemma.as_str(), key.sub_key.as_str()))
            } else {
                !collection_keys.contains(key)
            }
        })
        .map(|(key, rank)| (key.clone(), *rank))
        .collect();

    missing.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    missing
}
