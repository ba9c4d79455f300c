//! Payload checksums
//!
//! Every receiving record stores the SHA-256 of its payload bytes as written,
//! so byte-for-byte preservation can be audited later.

use crate::domain::record::ReceivingRecord;
use sha2::{Digest, Sha256};

/// Calculate the hex-encoded SHA-256 of a payload
///
/// # Examples
///
/// ```
/// use harbor::core::receiving::checksum::payload_checksum;
///
/// let checksum = payload_checksum("{}");
/// assert_eq!(checksum.len(), 64);
/// ```
pub fn payload_checksum(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whether a stored record's payload still matches its checksum
pub fn verify_record(record: &ReceivingRecord) -> bool {
    payload_checksum(&record.payload) == record.checksum
}
