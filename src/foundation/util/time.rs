use crate::foundation::types::Timestamp;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn current_timestamp_secs() -> Timestamp {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
