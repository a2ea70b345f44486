use std::{
    fs,
    path::Path,
};

use super::{
    errors::SieveError,
    models::MorphKey,
};

/// Load the user's names file: one name per line, `#` comments and blank
/// lines ignored. Each name becomes a lemma-level morph key that always
/// counts as seen. A missing file is treated as empty.
pub fn load_names_file(path: &Path) -> Result<Vec<MorphKey>, SieveError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    let mut names: Vec<MorphKey> = Vec::new();

    for line in content.lines() {
        let name = line.trim();
        if name.is_empty() || name.starts_with('#') {
            continue;
        }
        names.push(MorphKey::new(name, name, ""));
    }

    Ok(names)
}
