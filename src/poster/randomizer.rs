//! Identifier rewriting for descriptor instances
//!
//! The consuming subsystem refuses content whose identifiers it has already
//! seen, so every instance gets a fresh identifier before it is relocated.
//! Property-list rewrites are best effort: a file that fails to parse or
//! serialise is logged and left alone.

use super::defaults::{
    BINARY_PLIST_MAGIC, IDENTIFIER_MAX, IDENTIFIER_MIN, IDENTIFIER_TEXT_FILE, USER_INFO_FILE,
    USER_INFO_KEY, WALLPAPER_PLIST_FILE, WALLPAPER_PLIST_KEY,
};
use crate::exceptions::{Result, TendiesError};
use log::{debug, trace, warn};
use rand::Rng;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a randomization pass did
#[derive(Debug, Clone, Default)]
pub struct RandomizeOutcome {
    /// The identifier written into every carrier
    pub identifier: i64,
    /// Carrier files rewritten
    pub rewritten: Vec<PathBuf>,
    /// Carrier files that could not be rewritten
    pub skipped: Vec<PathBuf>,
}

/// Rewrites identifier carriers with a random value from a fixed range
#[derive(Debug, Clone, Copy)]
pub struct IdentifierRandomizer {
    min: i64,
    max: i64,
}

impl Default for IdentifierRandomizer {
    fn default() -> Self {
        Self {
            min: IDENTIFIER_MIN,
            max: IDENTIFIER_MAX,
        }
    }
}

impl IdentifierRandomizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a fresh identifier
    pub fn next_identifier(&self) -> i64 {
        rand::thread_rng().gen_range(self.min..=self.max)
    }

    /// Rewrite every carrier under `instance` with one fresh identifier
    pub fn randomize(&self, instance: &Path) -> Result<RandomizeOutcome> {
        self.randomize_with(instance, self.next_identifier())
    }

    /// Rewrite every carrier under `instance` with `identifier`
    pub fn randomize_with(&self, instance: &Path, identifier: i64) -> Result<RandomizeOutcome> {
        let mut outcome = RandomizeOutcome {
            identifier,
            ..Default::default()
        };

        let walker = WalkDir::new(instance)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden_name(e.file_name()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("⚠️ Skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            match name {
                IDENTIFIER_TEXT_FILE => {
                    fs::write(path, identifier.to_string())?;
                    outcome.rewritten.push(path.to_path_buf());
                }
                USER_INFO_FILE => self.rewrite_plist(path, USER_INFO_KEY, identifier, &mut outcome),
                WALLPAPER_PLIST_FILE => {
                    self.rewrite_plist(path, WALLPAPER_PLIST_KEY, identifier, &mut outcome)
                }
                _ => {}
            }
        }

        debug!(
            "🎲 Identifier {identifier} written to {} file(s) under {instance:?}",
            outcome.rewritten.len()
        );
        Ok(outcome)
    }

    fn rewrite_plist(&self, path: &Path, key: &str, identifier: i64, outcome: &mut RandomizeOutcome) {
        match set_plist_integer(path, key, identifier) {
            Ok(()) => {
                trace!("🎲 Set {key} in {path:?}");
                outcome.rewritten.push(path.to_path_buf());
            }
            Err(e) => {
                warn!("⚠️ Leaving {path:?} unchanged: {e}");
                outcome.skipped.push(path.to_path_buf());
            }
        }
    }
}

/// Set `key` to an integer in a dictionary property list, keeping its format
pub fn set_plist_integer(path: &Path, key: &str, value: i64) -> Result<()> {
    let bytes = fs::read(path)?;
    let binary = bytes.starts_with(BINARY_PLIST_MAGIC);

    let mut plist = plist::Value::from_reader(Cursor::new(bytes))?;
    let dict = plist.as_dictionary_mut().ok_or_else(|| {
        TendiesError::Generic(format!("{} is not a dictionary", path.display()))
    })?;
    dict.insert(key.to_string(), plist::Value::Integer(value.into()));

    let mut out = Vec::new();
    if binary {
        plist.to_writer_binary(&mut out)?;
    } else {
        plist.to_writer_xml(&mut out)?;
    }
    fs::write(path, out)?;
    Ok(())
}

fn is_hidden_name(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::{Dictionary, Value};
    use tempfile::TempDir;

    fn in_range(id: i64) -> bool {
        (IDENTIFIER_MIN..=IDENTIFIER_MAX).contains(&id)
    }

    fn wallpaper_dict() -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert("identifier".to_string(), Value::Integer(1.into()));
        dict.insert("name".to_string(), Value::String("Sunset".to_string()));
        dict.insert("version".to_string(), Value::Real(2.5));
        dict
    }

    fn read_dict(path: &Path) -> Dictionary {
        Value::from_file(path).unwrap().into_dictionary().unwrap()
    }

    #[test]
    fn test_rewrites_wallpaper_plist_and_keeps_other_keys() {
        let temp = TempDir::new().unwrap();
        let plist_path = temp.path().join("Wallpaper.plist");
        Value::Dictionary(wallpaper_dict())
            .to_file_xml(&plist_path)
            .unwrap();

        let outcome = IdentifierRandomizer::new().randomize(temp.path()).unwrap();
        assert!(in_range(outcome.identifier));
        assert_eq!(outcome.rewritten, vec![plist_path.clone()]);

        let dict = read_dict(&plist_path);
        let id = dict.get("identifier").unwrap().as_signed_integer().unwrap();
        assert_eq!(id, outcome.identifier);
        assert_ne!(id, 1);
        assert_eq!(dict.get("name").unwrap().as_string(), Some("Sunset"));
        assert_eq!(dict.get("version").unwrap().as_real(), Some(2.5));
        assert_eq!(dict.len(), 3);
    }

    #[test]
    fn test_user_info_stays_binary() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("versions/1");
        fs::create_dir_all(&nested).unwrap();
        let path = nested.join(USER_INFO_FILE);

        let mut dict = Dictionary::new();
        dict.insert(USER_INFO_KEY.to_string(), Value::Integer(5.into()));
        dict.insert("keep".to_string(), Value::Boolean(true));
        Value::Dictionary(dict).to_file_binary(&path).unwrap();

        IdentifierRandomizer::new()
            .randomize_with(temp.path(), 12345)
            .unwrap();

        assert!(fs::read(&path).unwrap().starts_with(BINARY_PLIST_MAGIC));
        let dict = read_dict(&path);
        assert_eq!(
            dict.get(USER_INFO_KEY).unwrap().as_signed_integer(),
            Some(12345)
        );
        assert_eq!(dict.get("keep").unwrap().as_boolean(), Some(true));
    }

    #[test]
    fn test_text_identifier_is_overwritten() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(IDENTIFIER_TEXT_FILE);
        fs::write(&path, "1").unwrap();

        IdentifierRandomizer::new()
            .randomize_with(temp.path(), 43210)
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "43210");
    }

    #[test]
    fn test_one_identifier_per_instance() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(IDENTIFIER_TEXT_FILE), "1").unwrap();
        Value::Dictionary(wallpaper_dict())
            .to_file_xml(temp.path().join(WALLPAPER_PLIST_FILE))
            .unwrap();

        let outcome = IdentifierRandomizer::new().randomize(temp.path()).unwrap();
        let text: i64 = fs::read_to_string(temp.path().join(IDENTIFIER_TEXT_FILE))
            .unwrap()
            .parse()
            .unwrap();
        let dict = read_dict(&temp.path().join(WALLPAPER_PLIST_FILE));
        assert_eq!(text, outcome.identifier);
        assert_eq!(
            dict.get("identifier").unwrap().as_signed_integer(),
            Some(outcome.identifier)
        );
    }

    #[test]
    fn test_unrecognised_files_untouched() {
        let temp = TempDir::new().unwrap();
        let other = temp.path().join("Other.plist");
        Value::Dictionary(wallpaper_dict()).to_file_xml(&other).unwrap();
        let before = fs::read(&other).unwrap();

        IdentifierRandomizer::new().randomize(temp.path()).unwrap();
        assert_eq!(fs::read(&other).unwrap(), before);
    }

    #[test]
    fn test_unparseable_plist_is_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(WALLPAPER_PLIST_FILE);
        fs::write(&path, b"definitely not a plist").unwrap();

        let outcome = IdentifierRandomizer::new().randomize(temp.path()).unwrap();
        assert_eq!(outcome.skipped, vec![path.clone()]);
        assert!(outcome.rewritten.is_empty());
        assert_eq!(fs::read(&path).unwrap(), b"definitely not a plist");
    }

    #[test]
    fn test_non_dictionary_plist_is_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(WALLPAPER_PLIST_FILE);
        Value::Array(vec![Value::Integer(1.into())])
            .to_file_xml(&path)
            .unwrap();

        let outcome = IdentifierRandomizer::new().randomize(temp.path()).unwrap();
        assert_eq!(outcome.skipped.len(), 1);
    }

    #[test]
    fn test_hidden_entries_are_ignored() {
        let temp = TempDir::new().unwrap();
        let hidden = temp.path().join(".cache");
        fs::create_dir(&hidden).unwrap();
        fs::write(hidden.join(IDENTIFIER_TEXT_FILE), "1").unwrap();

        IdentifierRandomizer::new().randomize(temp.path()).unwrap();
        assert_eq!(
            fs::read_to_string(hidden.join(IDENTIFIER_TEXT_FILE)).unwrap(),
            "1"
        );
    }
}
