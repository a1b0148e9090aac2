//! Test utilities & fixtures.

use argon2::Params;
use chrono::{DateTime, TimeZone, Utc};
use questkeeper::storage::AccountStore;

/// Store rooted in a fresh temp dir, with cheap Argon2 params so tests stay fast.
/// Keep the returned `TempDir` alive for as long as the store is used.
pub async fn temp_store() -> (tempfile::TempDir, AccountStore) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let params = Params::new(8, 1, 1, None).expect("argon2 params");
    let store = AccountStore::new_with_params(tmp.path().join("data"), Some(params))
        .await
        .expect("store");
    (tmp, store)
}

/// UTC instant helper for calendar-sensitive tests.
#[allow(dead_code)]
pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}
