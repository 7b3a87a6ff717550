//! The store interface records are written through.
//!
//! The importer never inspects a store's schema: it shapes records and hands
//! each file's records to one of the two batch methods. Implementations must
//! be safe to call from several worker threads at once; a batch call is the
//! unit of work, and any connection or lock it needs is held only for the
//! duration of that call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{HgtError, Result};
use crate::record::{FlatRecord, TileRecord};

/// Accepts batches of elevation records.
pub trait StoreWriter: Send + Sync {
    /// Insert one file's flat records as a single batch.
    fn insert_flat_batch(&self, table: &str, records: &[FlatRecord]) -> Result<()>;

    /// Insert one file's tile records as a single batch.
    fn insert_raster_batch(&self, table: &str, records: &[TileRecord]) -> Result<()>;
}

impl<W: StoreWriter + ?Sized> StoreWriter for Arc<W> {
    fn insert_flat_batch(&self, table: &str, records: &[FlatRecord]) -> Result<()> {
        (**self).insert_flat_batch(table, records)
    }

    fn insert_raster_batch(&self, table: &str, records: &[TileRecord]) -> Result<()> {
        (**self).insert_raster_batch(table, records)
    }
}

impl<W: StoreWriter + ?Sized> StoreWriter for &W {
    fn insert_flat_batch(&self, table: &str, records: &[FlatRecord]) -> Result<()> {
        (**self).insert_flat_batch(table, records)
    }

    fn insert_raster_batch(&self, table: &str, records: &[TileRecord]) -> Result<()> {
        (**self).insert_raster_batch(table, records)
    }
}

#[derive(Default)]
struct Tables {
    flat: HashMap<String, Vec<FlatRecord>>,
    raster: HashMap<String, Vec<TileRecord>>,
    batches: usize,
}

/// An in-process store, keyed by table name.
///
/// Used for dry runs, tests and benchmarks.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A poisoned lock only means another writer panicked mid-push.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Flat records stored in `table`, in insertion order.
    pub fn flat_records(&self, table: &str) -> Vec<FlatRecord> {
        self.lock().flat.get(table).cloned().unwrap_or_default()
    }

    /// Tile records stored in `table`, in insertion order.
    pub fn tile_records(&self, table: &str) -> Vec<TileRecord> {
        self.lock().raster.get(table).cloned().unwrap_or_default()
    }

    /// Number of flat records in `table`.
    pub fn flat_len(&self, table: &str) -> usize {
        self.lock().flat.get(table).map_or(0, Vec::len)
    }

    /// Number of tile records in `table`.
    pub fn tile_len(&self, table: &str) -> usize {
        self.lock().raster.get(table).map_or(0, Vec::len)
    }

    /// Number of batches accepted so far.
    pub fn batch_count(&self) -> usize {
        self.lock().batches
    }
}

impl StoreWriter for MemoryStore {
    fn insert_flat_batch(&self, table: &str, records: &[FlatRecord]) -> Result<()> {
        if table.is_empty() {
            return Err(HgtError::Write {
                table: table.to_string(),
                reason: "table name is empty".to_string(),
            });
        }
        let mut tables = self.lock();
        tables
            .flat
            .entry(table.to_string())
            .or_default()
            .extend_from_slice(records);
        tables.batches += 1;
        Ok(())
    }

    fn insert_raster_batch(&self, table: &str, records: &[TileRecord]) -> Result<()> {
        if table.is_empty() {
            return Err(HgtError::Write {
                table: table.to_string(),
                reason: "table name is empty".to_string(),
            });
        }
        let mut tables = self.lock();
        tables
            .raster
            .entry(table.to_string())
            .or_default()
            .extend_from_slice(records);
        tables.batches += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{BoundingBox, GeoPoint};

    fn flat(value: i16) -> FlatRecord {
        FlatRecord::new(BoundingBox::new(0.0, 10.0, 0.5, 10.5), Some(value))
    }

    #[test]
    fn test_memory_store_keeps_tables_apart() {
        let store = MemoryStore::new();
        store.insert_flat_batch("a", &[flat(1), flat(2)]).unwrap();
        store.insert_flat_batch("b", &[flat(3)]).unwrap();
        store.insert_flat_batch("a", &[flat(4)]).unwrap();

        let values: Vec<_> = store.flat_records("a").iter().map(|r| r.value).collect();
        assert_eq!(values, vec![Some(1), Some(2), Some(4)]);
        assert_eq!(store.flat_len("b"), 1);
        assert_eq!(store.flat_len("missing"), 0);
        assert_eq!(store.batch_count(), 3);
    }

    #[test]
    fn test_memory_store_raster() {
        let store = MemoryStore::new();
        let tile = TileRecord {
            upper_left: GeoPoint::new(1.0, 10.0),
            scale_x: 0.5,
            scale_y: 0.5,
            width: 1,
            height: 1,
            no_data: -32768,
            payload: vec![0, 7],
        };
        store.insert_raster_batch("tiles", &[tile.clone()]).unwrap();

        assert_eq!(store.tile_records("tiles"), vec![tile]);
        assert_eq!(store.tile_len("tiles"), 1);
        assert_eq!(store.flat_len("tiles"), 0);
    }

    #[test]
    fn test_empty_table_name_is_rejected() {
        let store = MemoryStore::new();
        let err = store.insert_flat_batch("", &[flat(1)]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Write);
        assert_eq!(store.batch_count(), 0);
    }

    #[test]
    fn test_shared_store_through_arc() {
        let store = Arc::new(MemoryStore::new());
        let writer: Arc<dyn StoreWriter> = store.clone();
        writer.insert_flat_batch("a", &[flat(1)]).unwrap();
        assert_eq!(store.flat_len("a"), 1);
    }
}
