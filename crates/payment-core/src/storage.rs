//! Persistence boundary for the minor-index cursor.
//!
//! Every payment attempt takes a fresh minor index so no subaddress is handed
//! out twice. `next_minor` is a single read-increment-write under the store's
//! lock; the first call for a major index yields 1.

use fs2::FileExt;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    ffi::OsStr,
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

pub trait CursorStore: Send + Sync + 'static {
    /// Reserve and return the next unused minor index under `major`.
    fn next_minor(&self, major: u32) -> Result<u32>;
    /// Last minor index handed out under `major`, if any.
    fn last_minor(&self, major: u32) -> Result<Option<u32>>;
}

fn advance(major: u32, last: Option<u32>) -> Result<u32> {
    match last {
        None => Ok(1),
        Some(last) => last.checked_add(1).ok_or(Error::CursorExhausted(major)),
    }
}

fn cursor_key(major: u32) -> String {
    format!("cursor/minor/{major}")
}

#[derive(Default)]
pub struct InMemoryStore {
    kv: parking_lot::RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = bincode::serialize(value)?;
        self.kv.write().insert(key.to_string(), bytes);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.kv
            .read()
            .get(key)
            .map(|v| bincode::deserialize(v))
            .transpose()
            .map_err(Into::into)
    }
}

impl CursorStore for InMemoryStore {
    fn next_minor(&self, major: u32) -> Result<u32> {
        let key = cursor_key(major);
        let mut kv = self.kv.write();
        let last = kv
            .get(&key)
            .map(|v| bincode::deserialize::<u32>(v))
            .transpose()?;
        let next = advance(major, last)?;
        kv.insert(key, bincode::serialize(&next)?);
        Ok(next)
    }

    fn last_minor(&self, major: u32) -> Result<Option<u32>> {
        self.get(&cursor_key(major))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CursorFile {
    #[serde(default)]
    minor: BTreeMap<u32, u32>,
}

/// JSON-file backed cursor. Writes go to a sibling temp file which is then
/// renamed over the original.
///
/// Every access holds an exclusive OS lock on a sibling `.lock` file, so
/// processes sharing the same path never hand out the same minor index.
pub struct FileCursorStore {
    path: PathBuf,
    lock: parking_lot::Mutex<()>,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: parking_lot::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(OsStr::new(suffix));
        PathBuf::from(name)
    }

    /// Blocks until no other handle holds the lock; released when the file
    /// is dropped.
    fn lock_file(&self) -> Result<File> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.sibling(".lock"))?;
        FileExt::lock_exclusive(&file)?;
        Ok(file)
    }

    fn load(&self) -> Result<CursorFile> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(CursorFile::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(CursorFile::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn store(&self, file: &CursorFile) -> Result<()> {
        let tmp = self.sibling(".tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(file)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CursorStore for FileCursorStore {
    fn next_minor(&self, major: u32) -> Result<u32> {
        let _guard = self.lock.lock();
        let _os_lock = self.lock_file()?;
        let mut file = self.load()?;
        let next = advance(major, file.minor.get(&major).copied())?;
        file.minor.insert(major, next);
        self.store(&file)?;
        log::debug!("reserved minor index {next} under major {major}");
        Ok(next)
    }

    fn last_minor(&self, major: u32) -> Result<Option<u32>> {
        let _guard = self.lock.lock();
        let _os_lock = self.lock_file()?;
        Ok(self.load()?.minor.get(&major).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn in_memory_cursor_starts_at_one_and_increases() {
        let store = InMemoryStore::new();
        assert_eq!(store.last_minor(1).unwrap(), None);
        assert_eq!(store.next_minor(1).unwrap(), 1);
        assert_eq!(store.next_minor(1).unwrap(), 2);
        assert_eq!(store.next_minor(0).unwrap(), 1);
        assert_eq!(store.last_minor(1).unwrap(), Some(2));
    }

    #[test]
    fn cursor_exhaustion_is_an_error() {
        let store = InMemoryStore::new();
        store.put(&cursor_key(4), &u32::MAX).unwrap();
        assert!(matches!(
            store.next_minor(4),
            Err(Error::CursorExhausted(4))
        ));
    }

    #[test]
    fn kv_put_get() {
        let store = InMemoryStore::new();
        store.put("a", &(7u64, "x".to_string())).unwrap();
        assert_eq!(
            store.get::<(u64, String)>("a").unwrap(),
            Some((7, "x".to_string()))
        );
        assert_eq!(store.get::<u64>("b").unwrap(), None);
    }

    #[test]
    fn concurrent_reservations_are_unique() {
        let store = Arc::new(InMemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| store.next_minor(1).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 400);
        assert_eq!(all.last(), Some(&400));
    }

    #[test]
    fn file_cursor_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("cursor.json");

        let store = FileCursorStore::new(&path);
        assert_eq!(store.next_minor(1).unwrap(), 1);
        assert_eq!(store.next_minor(1).unwrap(), 2);
        drop(store);

        let reopened = FileCursorStore::new(&path);
        assert_eq!(reopened.last_minor(1).unwrap(), Some(2));
        assert_eq!(reopened.next_minor(1).unwrap(), 3);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_cursor_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.json");
        fs::write(&path, b"{not json").unwrap();
        let err = FileCursorStore::new(&path).next_minor(1).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Storage);
    }

    #[test]
    fn separate_handles_on_one_file_never_share_an_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.json");
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let store = FileCursorStore::new(&path);
                std::thread::spawn(move || {
                    (0..20)
                        .map(|_| store.next_minor(1).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 120);
        assert_eq!(FileCursorStore::new(&path).last_minor(1).unwrap(), Some(120));
        assert!(path.with_extension("json.lock").exists());
    }
}
