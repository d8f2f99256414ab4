//! Single logical writer over the `Store` (spec §5): "WriteEngine
//! serializes writes through a single logical writer... a mutex around
//! Store write calls." Every write path takes this mutex for the duration
//! of its SQLite call; reader connections are untouched by it.

use parking_lot::Mutex;

use telemetry_storage::Store;

/// Serializes access to the one writer `Store` handle. Cloning an `Arc`
/// around this (not done here — left to the caller, typically
/// `telemetry-server`) is how multiple async handlers share it.
pub struct WriterSerializer {
    store: Mutex<Store>,
}

impl WriterSerializer {
    pub fn new(store: Store) -> Self {
        WriterSerializer {
            store: Mutex::new(store),
        }
    }

    /// Run `f` with exclusive access to the writer `Store`. This is the
    /// only suspension point in the write path besides the SQLite call
    /// itself (spec §5 "Suspension points").
    pub fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        let mut guard = self.store.lock();
        f(&mut guard)
    }
}
