//! Delivery Policy Constants

/// Delivered attempts required before a reading counts as confirmed.
///
/// The reference delivery path publishes each reading under two semantic
/// channels, so a cycle settles after two successful attempts. Single-channel
/// deployments can lower this to 1.
pub const DEFAULT_ATTEMPT_BOUND: u8 = 2;

/// Cloud topic carrying the primary metric (beats per minute).
pub const TOPIC_PRIMARY: &str = "bpm";

/// Cloud topic carrying the secondary metric (oxygen saturation).
pub const TOPIC_SECONDARY: &str = "spo2";

/// Cloud topic carrying both metrics as one JSON object.
pub const TOPIC_COMBINED: &str = "bpm_spo2";
