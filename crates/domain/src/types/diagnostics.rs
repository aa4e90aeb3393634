use serde::{Deserialize, Serialize};

use super::records::FailureRecord;

/// Point-in-time introspection snapshot of a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub failed_request_count: usize,
    pub cached_entry_count: usize,
    pub queue_length: usize,
    pub is_online: bool,
    pub errors: Vec<FailureRecord>,
}
