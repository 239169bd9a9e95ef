use std::path::Path;

use crate::{sleddb::SledWatcherDb, DbResult};

/// Opens the sled store at `<datadir>/sled` and returns the watcher database.
///
/// Callers wrap the result in `Arc` and share it across the indexer,
/// processor, queue, and cursor manager; all of them see one transactional
/// store.
pub fn init_watcher_db(datadir: &Path) -> DbResult<SledWatcherDb> {
    let db = sled::open(datadir.join("sled"))?;
    SledWatcherDb::new(db)
}
