//! Key layout for the ledger's Fjall partitions.
//!
//! - `jobs`: task_id -> Job (JSON)
//! - `waiting_order`: seq:{016} -> task_id, scanned FIFO for queue position
//! - `rate_limits`: client_id -> RateLimitBucket (JSON)
//! - `meta`: counters and pruning cursors

pub fn encode_job_key(task_id: &str) -> Vec<u8> {
    task_id.as_bytes().to_vec()
}

pub fn decode_job_key(key: &[u8]) -> Option<String> {
    std::str::from_utf8(key).ok().map(String::from)
}

/// Encode a FIFO ordering key: seq:{016} -> sortable as bytes.
pub fn encode_waiting_key(seq: u64) -> Vec<u8> {
    format!("{:016}", seq).into_bytes()
}

pub fn decode_waiting_key(key: &[u8]) -> Option<u64> {
    std::str::from_utf8(key).ok()?.parse().ok()
}

pub fn encode_rate_limit_key(client_id: &str) -> Vec<u8> {
    client_id.as_bytes().to_vec()
}

pub const META_SEQ_COUNTER: &str = "seq_counter";
pub const META_LAST_PRUNE: &str = "last_prune";

pub fn encode_meta_key(key: &str) -> Vec<u8> {
    key.as_bytes().to_vec()
}
