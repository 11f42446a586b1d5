use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{info, warn};

use crate::store::{now_millis, Database, Entry, SortedSet, StoreError, StoreGuard, Value};

const MAGIC: &[u8; 8] = b"TARDIS01";
const HEADER_LEN: usize = MAGIC.len() + 4;

// On-disk layout of the keyspace. Kept apart from the in-memory types so those can change
// without breaking existing snapshot files.

#[derive(Serialize, Deserialize)]
struct Snapshot {
    databases: Vec<Vec<SnapshotEntry>>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    key: String,
    value: SnapshotValue,
    expires_at: Option<u64>,
}

#[derive(Serialize, Deserialize)]
enum SnapshotValue {
    String(Bytes),
    List(Vec<Bytes>),
    Set(Vec<Bytes>),
    SortedSet(Vec<(Bytes, f64)>),
}

impl From<&Value> for SnapshotValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(s) => SnapshotValue::String(s.clone()),
            Value::List(list) => SnapshotValue::List(list.iter().cloned().collect()),
            Value::Set(set) => SnapshotValue::Set(set.iter().cloned().collect()),
            Value::SortedSet(zset) => SnapshotValue::SortedSet(
                zset.iter()
                    .map(|(member, score)| (member.clone(), score))
                    .collect(),
            ),
        }
    }
}

impl From<SnapshotValue> for Value {
    fn from(value: SnapshotValue) -> Self {
        match value {
            SnapshotValue::String(s) => Value::String(s),
            SnapshotValue::List(list) => Value::List(VecDeque::from(list)),
            SnapshotValue::Set(set) => Value::Set(set.into_iter().collect::<HashSet<_>>()),
            SnapshotValue::SortedSet(members) => {
                let mut zset = SortedSet::new();
                for (member, score) in members {
                    zset.insert(member, score);
                }
                Value::SortedSet(zset)
            }
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, StoreError> {
    let payload =
        bincode::serialize(snapshot).map_err(|err| StoreError::Snapshot(err.to_string()))?;

    let mut encoded = Vec::with_capacity(HEADER_LEN + payload.len());
    encoded.extend_from_slice(MAGIC);
    encoded.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    encoded.extend_from_slice(&payload);

    Ok(encoded)
}

fn decode(data: &[u8]) -> Result<Snapshot, StoreError> {
    if data.len() < HEADER_LEN || &data[..MAGIC.len()] != MAGIC {
        return Err(StoreError::Snapshot("not a snapshot file".to_string()));
    }

    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&data[MAGIC.len()..HEADER_LEN]);
    let payload = &data[HEADER_LEN..];

    if crc32fast::hash(payload) != u32::from_le_bytes(checksum) {
        return Err(StoreError::Snapshot("checksum mismatch".to_string()));
    }

    bincode::deserialize(payload).map_err(|err| StoreError::Snapshot(err.to_string()))
}

impl<'a> StoreGuard<'a> {
    /// Writes every live entry of every database to the snapshot file.
    ///
    /// The data goes to a temporary file first, which replaces the previous snapshot only once
    /// it is fully written and synced.
    pub fn save(&mut self) -> Result<(), StoreError> {
        let snapshot = Snapshot {
            databases: self
                .state
                .databases
                .iter()
                .map(|db| {
                    db.iter()
                        .map(|(key, entry)| SnapshotEntry {
                            key: key.clone(),
                            value: SnapshotValue::from(&entry.value),
                            expires_at: entry.expires_at,
                        })
                        .collect()
                })
                .collect(),
        };

        let encoded = encode(&snapshot)?;
        let inner = self.inner;
        let path = inner.snapshot_path();
        let tmp = temp_path(path);

        let written = write_synced(&tmp, &encoded).and_then(|()| fs::rename(&tmp, path));
        if let Err(err) = written {
            // Leave no partial temp file behind.
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }

        info!("Saved snapshot to {:?} ({} bytes)", path, encoded.len());
        Ok(())
    }

    /// Replaces the keyspace with the content of the snapshot file. Returns `false`, leaving
    /// the keyspace untouched, when there is no snapshot file.
    ///
    /// The file is read into fresh databases first, so a failure leaves the keyspace as it
    /// was. Entries that expired while the server was down are skipped.
    pub fn load(&mut self) -> Result<bool, StoreError> {
        let inner = self.inner;
        let path = inner.snapshot_path();

        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        };

        let snapshot = decode(&data)?;
        let count = self.databases();

        if snapshot.databases.len() > count {
            warn!(
                "Snapshot holds {} databases, only the first {} are loaded",
                snapshot.databases.len(),
                count
            );
        }

        let now = now_millis();
        let mut loaded = 0;
        let mut databases: Vec<Database> = (0..count).map(|_| Database::new()).collect();

        for (db, entries) in databases.iter_mut().zip(snapshot.databases) {
            for SnapshotEntry {
                key,
                value,
                expires_at,
            } in entries
            {
                let entry = Entry {
                    value: value.into(),
                    expires_at,
                };
                if entry.is_expired(now) {
                    continue;
                }
                db.insert_entry(key, entry);
                loaded += 1;
            }
        }

        self.state.databases = databases;

        info!("Loaded {} keys from snapshot {:?}", loaded, path);
        Ok(true)
    }

    /// Saves the keyspace and reads it back from the snapshot file. The keyspace is only
    /// replaced once the file was read back successfully.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        self.save()?;

        if !self.load()? {
            return Err(StoreError::Snapshot("snapshot file vanished".to_string()));
        }

        Ok(())
    }

    /// Modification time of the snapshot file as unix milliseconds, or 0 when there is none.
    pub fn last_save(&self) -> i64 {
        fs::metadata(self.inner.snapshot_path())
            .and_then(|metadata| metadata.modified())
            .ok()
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |elapsed| elapsed.as_millis() as i64)
    }
}
