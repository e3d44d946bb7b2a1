use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

/// Table of per-file reader/writer locks.
///
/// One lock exists per path ever touched through the owning block manager.
/// Locks are created lazily with load-or-store semantics, so concurrent first
/// accesses still agree on a single instance. Entries are removed only by an
/// explicit [`release`](FileLockTable::release) when the caller deletes the
/// file; there is no finalizer.
#[derive(Default)]
pub struct FileLockTable {
    locks: DashMap<PathBuf, Arc<RwLock<()>>>,
}

impl FileLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the lock for `path`, creating it on first use.
    pub fn lock_for(&self, path: &Path) -> Arc<RwLock<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Drop the lock entry for `path`.
    ///
    /// Threads still holding the old `Arc` keep a usable lock; callers that
    /// arrive afterwards get a fresh one. Safe because release accompanies
    /// file deletion, at which point no reader/writer races on the old path.
    pub fn release(&self, path: &Path) {
        self.locks.remove(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.locks.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn same_path_yields_same_lock() {
        let table = FileLockTable::new();
        let a = table.lock_for(Path::new("x"));
        let b = table.lock_for(Path::new("x"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn distinct_paths_yield_distinct_locks() {
        let table = FileLockTable::new();
        let a = table.lock_for(Path::new("x"));
        let b = table.lock_for(Path::new("y"));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn release_removes_entry() {
        let table = FileLockTable::new();
        table.lock_for(Path::new("x"));
        assert!(table.contains(Path::new("x")));

        table.release(Path::new("x"));
        assert!(!table.contains(Path::new("x")));
        assert!(table.is_empty());
    }

    #[test]
    fn concurrent_first_access_creates_one_lock() {
        let table = Arc::new(FileLockTable::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                thread::spawn(move || table.lock_for(Path::new("shared")))
            })
            .collect();

        let locks: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();

        assert_eq!(table.len(), 1);
        for lock in &locks[1..] {
            assert!(Arc::ptr_eq(&locks[0], lock));
        }
    }

    #[test]
    fn shared_and_exclusive_access() {
        let table = FileLockTable::new();
        let lock = table.lock_for(Path::new("x"));

        // Two simultaneous readers are fine.
        let r1 = lock.read();
        let r2 = lock.read();
        drop((r1, r2));

        // Writer gets the lock once readers are gone.
        let w = lock.write();
        drop(w);
    }
}
