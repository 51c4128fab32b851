//! Connection tuning shared by every SQLite handle in the crate.

use rusqlite::Connection;
use std::time::Duration;

/// How long a connection waits on the write lock before giving up.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Apply the PRAGMAs used for both the batch writer and the readers.
///
/// - WAL so readers keep serving the last committed snapshot while a run writes
/// - synchronous=NORMAL (safe under WAL)
/// - temp_store=MEMORY for the window-function sorts
/// - 64 MiB page cache, checkpoint every 1000 pages
/// - busy timeout so concurrent runs queue instead of failing
pub fn apply_optimized_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "cache_size", -65536)?;
    conn.pragma_update(None, "wal_autocheckpoint", 1000)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}
