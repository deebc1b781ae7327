//! Key families in the shared store. Prefixes never overlap, so a prefix scan
//! of one family never returns records of another.

pub const QUEUE_PREFIX: &str = "appbridge:queue:";
pub const QUEUE_COUNTER: &str = "appbridge:queue_counter";
pub const ACK_PREFIX: &str = "appbridge:ack:";
pub const HEARTBEAT_PREFIX: &str = "appbridge:heartbeat:";
pub const SESSION_PREFIX: &str = "appbridge:session:";

/// Width of the zero-padded queue sequence number. Sixteen decimal digits
/// cannot be exhausted within any realistic retention window.
pub const QUEUE_KEY_WIDTH: usize = 16;

pub fn queue_key(seq: u64) -> String {
    format!("{QUEUE_PREFIX}{seq:0width$}", width = QUEUE_KEY_WIDTH)
}

pub fn ack_key(message_id: &str) -> String {
    format!("{ACK_PREFIX}{message_id}")
}

pub fn heartbeat_key(app_id: &str) -> String {
    format!("{HEARTBEAT_PREFIX}{app_id}")
}

pub fn session_key(key: &str) -> String {
    format!("{SESSION_PREFIX}{key}")
}
