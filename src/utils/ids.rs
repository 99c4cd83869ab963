//! Request identifiers

use chrono::{NaiveDateTime, Utc};

const REQUEST_ID_PREFIX: &str = "seg";

/// Generate a request identifier: `seg-<YYYYmmddHHMMSS>-<8 hex chars>`
#[must_use]
pub fn generate_request_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", REQUEST_ID_PREFIX, timestamp, &suffix[..8])
}

/// Recover the UTC timestamp embedded in a request identifier
#[must_use]
pub fn extract_timestamp_from_request_id(request_id: &str) -> Option<NaiveDateTime> {
    let mut parts = request_id.splitn(3, '-');
    if parts.next()? != REQUEST_ID_PREFIX {
        return None;
    }
    let timestamp = parts.next()?;
    parts.next()?;
    NaiveDateTime::parse_from_str(timestamp, "%Y%m%d%H%M%S").ok()
}
