use std::{
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use super::StorageMedium;
use crate::dao::storage::{MediumError, MediumResult};

const VALUE_EXTENSION: &str = "json";
const TMP_EXTENSION: &str = "json.tmp";

/// Medium storing one file per key under a data directory.
///
/// Writes land in a sibling temporary file that is synced and then renamed
/// over the target.
pub struct FileMedium {
    root: PathBuf,
}

impl FileMedium {
    /// Open (and create if needed) the data directory.
    pub fn open(root: impl Into<PathBuf>) -> MediumResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| MediumError::io(&root, source))?;
        Ok(Self { root })
    }

    /// Directory holding the stored values.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str, extension: &str) -> PathBuf {
        self.root.join(format!("{}.{extension}", file_stem(key)))
    }
}

impl StorageMedium for FileMedium {
    fn read(&self, key: &str) -> MediumResult<Option<String>> {
        let path = self.path_for(key, VALUE_EXTENSION);
        match fs::read(&path) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| MediumError::Encoding {
                    key: key.to_string(),
                }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(MediumError::io(path, err)),
        }
    }

    fn write(&self, key: &str, value: &str) -> MediumResult<()> {
        let tmp_path = self.path_for(key, TMP_EXTENSION);
        let final_path = self.path_for(key, VALUE_EXTENSION);

        let mut file =
            File::create(&tmp_path).map_err(|source| MediumError::io(&tmp_path, source))?;
        file.write_all(value.as_bytes())
            .map_err(|source| MediumError::io(&tmp_path, source))?;
        file.sync_all()
            .map_err(|source| MediumError::io(&tmp_path, source))?;

        fs::rename(&tmp_path, &final_path)
            .map_err(|source| MediumError::io(&final_path, source))?;
        debug!(key, bytes = value.len(), "value written to disk");
        Ok(())
    }

    fn remove(&self, key: &str) -> MediumResult<()> {
        let path = self.path_for(key, VALUE_EXTENSION);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(MediumError::io(path, err)),
        }
    }
}

/// Map a key to a file name made only of portable characters.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::open(dir.path()).unwrap();

        assert_eq!(medium.read("sports_app_data").unwrap(), None);
        medium.write("sports_app_data", "{\"players\":[]}").unwrap();
        assert_eq!(
            medium.read("sports_app_data").unwrap().as_deref(),
            Some("{\"players\":[]}")
        );
        assert!(!dir.path().join("sports_app_data.json.tmp").exists());
    }

    #[test]
    fn keys_with_separators_stay_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::open(dir.path()).unwrap();

        medium.write("chat_messages_../x", "[]").unwrap();
        assert!(dir.path().join("chat_messages____x.json").exists());

        medium.remove("chat_messages_../x").unwrap();
        medium.remove("chat_messages_../x").unwrap();
        assert_eq!(medium.read("chat_messages_../x").unwrap(), None);
    }
}
