//! redb-backed store with scalar, hash and list containers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::{Error, Result};
use crate::store::range::{normalize, resolve_index};

/// Plain key/value pairs.
const SCALARS: TableDefinition<&str, &[u8]> = TableDefinition::new("scalars");

/// Hash fields, keyed by `(key, field)`.
const HASHES: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("hashes");

/// List elements, keyed by `(key, sequence)` so a range scan yields insertion order.
const LISTS: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("lists");

/// Last sequence number handed out per list.
const LIST_SEQ: TableDefinition<&str, u64> = TableDefinition::new("list_seq");

/// Embedded key-value store exposing cache-style containers over a single file.
///
/// Every mutating call runs in its own write transaction, so a call either
/// commits completely or leaves the file untouched. redb admits one writer at
/// a time and readers always see the last committed snapshot.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
    path: PathBuf,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("path", &self.path).finish()
    }
}

impl Store {
    /// Open or create a store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path)?;

        // Read transactions fail on tables that were never written, so create them up front.
        let txn = db.begin_write()?;
        {
            txn.open_table(SCALARS)?;
            txn.open_table(HASHES)?;
            txn.open_table(LISTS)?;
            txn.open_table(LIST_SEQ)?;
        }
        txn.commit()?;

        tracing::debug!("Opened store at {}", path.display());

        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // Scalars

    /// Get a scalar value. Fails with `NotFound` when the key is absent.
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SCALARS)?;
        let value = table.get(key)?;
        value
            .map(|v| v.value().to_vec())
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    /// Set a scalar value, replacing any previous one.
    pub fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SCALARS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Delete the scalar, hash and list stored under `key`.
    pub fn del(&self, key: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut scalars = txn.open_table(SCALARS)?;
            scalars.remove(key)?;

            let mut hashes = txn.open_table(HASHES)?;
            for (field, _) in hash_entries(&hashes, key)? {
                hashes.remove((key, field.as_str()))?;
            }

            let mut lists = txn.open_table(LISTS)?;
            for (seq, _) in list_entries(&lists, key)? {
                lists.remove((key, seq))?;
            }

            let mut seqs = txn.open_table(LIST_SEQ)?;
            seqs.remove(key)?;
        }
        txn.commit()?;
        Ok(())
    }

    // Hashes

    /// Set a single hash field.
    pub fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(HASHES)?;
            table.insert((key, field), value)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Get a hash field. Fails with `NotFound` when the key or field is absent.
    pub fn hget(&self, key: &str, field: &str) -> Result<Vec<u8>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(HASHES)?;
        let value = table.get((key, field))?;
        value
            .map(|v| v.value().to_vec())
            .ok_or_else(|| Error::NotFound(format!("{}.{}", key, field)))
    }

    /// All values of a hash, ordered by field. Empty for a missing key.
    pub fn hvals(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(HASHES)?;
        Ok(hash_entries(&table, key)?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }

    /// All field names of a hash. Empty for a missing key.
    pub fn hkeys(&self, key: &str) -> Result<Vec<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(HASHES)?;
        Ok(hash_entries(&table, key)?
            .into_iter()
            .map(|(field, _)| field)
            .collect())
    }

    /// Delete a hash field. Returns whether the field existed.
    pub fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(HASHES)?;
            let previous = table.remove((key, field))?;
            previous.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    /// Replace every field of a hash in one transaction.
    pub fn hreplace(&self, key: &str, entries: &[(String, Vec<u8>)]) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(HASHES)?;
            for (field, _) in hash_entries(&table, key)? {
                table.remove((key, field.as_str()))?;
            }
            for (field, value) in entries {
                table.insert((key, field.as_str()), value.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    // Lists

    /// Append a value to the tail of a list.
    pub fn rpush(&self, key: &str, value: &[u8]) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut seqs = txn.open_table(LIST_SEQ)?;
            let last = seqs.get(key)?.map(|v| v.value());
            let next = last.map_or(0, |seq| seq + 1);
            seqs.insert(key, next)?;

            let mut lists = txn.open_table(LISTS)?;
            lists.insert((key, next), value)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Number of elements in a list, 0 when it does not exist.
    pub fn llen(&self, key: &str) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(LISTS)?;
        Ok(list_entries(&table, key)?.len())
    }

    /// Inclusive slice of a list. Never fails on out-of-range indices.
    pub fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(LISTS)?;
        let entries = list_entries(&table, key)?;

        let Some((start, stop)) = normalize(entries.len(), start, stop) else {
            return Ok(Vec::new());
        };

        Ok(entries
            .into_iter()
            .skip(start)
            .take(stop - start + 1)
            .map(|(_, value)| value)
            .collect())
    }

    /// Overwrite the element at `index`. Negative indices are rejected.
    pub fn lset(&self, key: &str, index: i64, value: &[u8]) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut lists = txn.open_table(LISTS)?;
            let entries = list_entries(&lists, key)?;

            let position =
                resolve_index(entries.len(), index).ok_or_else(|| Error::IndexOutOfRange {
                    key: key.to_string(),
                    index,
                })?;

            let seq = entries[position].0;
            lists.insert((key, seq), value)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Keep only the inclusive `[start, stop]` range of a list.
    ///
    /// An empty resulting range deletes the list. Trimming a missing list does nothing.
    pub fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut lists = txn.open_table(LISTS)?;
            let entries = list_entries(&lists, key)?;
            if entries.is_empty() {
                return Ok(());
            }

            let keep = normalize(entries.len(), start, stop);
            for (position, (seq, _)) in entries.iter().enumerate() {
                let kept = keep.is_some_and(|(start, stop)| position >= start && position <= stop);
                if !kept {
                    lists.remove((key, *seq))?;
                }
            }

            if keep.is_none() {
                let mut seqs = txn.open_table(LIST_SEQ)?;
                seqs.remove(key)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Remove up to `count` elements equal to `value`, scanning head to tail.
    ///
    /// `count <= 0` removes nothing. Returns the number of removed elements.
    pub fn lrem(&self, key: &str, count: i64, value: &[u8]) -> Result<usize> {
        if count <= 0 {
            return Ok(0);
        }

        let txn = self.db.begin_write()?;
        let removed = {
            let mut lists = txn.open_table(LISTS)?;
            let entries = list_entries(&lists, key)?;
            let total = entries.len();

            let mut removed = 0usize;
            for (seq, element) in &entries {
                if removed as i64 >= count {
                    break;
                }
                if element.as_slice() == value {
                    lists.remove((key, *seq))?;
                    removed += 1;
                }
            }

            if removed > 0 && removed == total {
                let mut seqs = txn.open_table(LIST_SEQ)?;
                seqs.remove(key)?;
            }
            removed
        };
        txn.commit()?;
        Ok(removed)
    }
}

/// Collect `(sequence, value)` pairs of one list in insertion order.
fn list_entries<T>(table: &T, key: &str) -> Result<Vec<(u64, Vec<u8>)>>
where
    T: ReadableTable<(&'static str, u64), &'static [u8]>,
{
    let mut entries = Vec::new();
    for entry in table.range((key, 0u64)..=(key, u64::MAX))? {
        let (k, v) = entry?;
        entries.push((k.value().1, v.value().to_vec()));
    }
    Ok(entries)
}

/// Collect `(field, value)` pairs of one hash ordered by field.
fn hash_entries<T>(table: &T, key: &str) -> Result<Vec<(String, Vec<u8>)>>
where
    T: ReadableTable<(&'static str, &'static str), &'static [u8]>,
{
    let mut entries = Vec::new();
    for entry in table.range((key, "")..)? {
        let (k, v) = entry?;
        let (owner, field) = k.value();
        if owner != key {
            break;
        }
        entries.push((field.to_string(), v.value().to_vec()));
    }
    Ok(entries)
}
