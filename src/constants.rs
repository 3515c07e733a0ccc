/// Fixed cadence of the sync scheduler, measured from cycle completion.
pub const SYNC_INTERVAL_SECS: u64 = 60 * 60;

/// How far back the first sync of an item reaches.
pub const FIRST_SYNC_LOOKBACK_DAYS: i64 = 2 * 365;

/// Buffer re-checked before the last successful windowed sync, catching
/// late-arriving or corrected transactions.
pub const RESYNC_BUFFER_DAYS: i64 = 14;

/// Recency window inside which a stored investment transaction missing from
/// a fresh fetch is treated as removed. Older records are never re-queried
/// and are left alone.
pub const INVESTMENT_REMOVAL_WINDOW_DAYS: i64 = 14;

/// How long a resolved (ticker, currency) -> canonical id mapping stays
/// cached before the store is consulted again.
pub const SECURITY_CACHE_TTL_SECS: i64 = 60 * 60;
