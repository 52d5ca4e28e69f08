//! Deterministic routing of keys onto an ordered list of targets.
//!
//! The SHA-1 digest of the key is read as a 160-bit big-endian unsigned
//! integer and reduced modulo the number of targets. Routing only depends on
//! the key and the length of the list, so every balancer instance that sees
//! the same membership snapshot routes a key to the same target. A change of
//! length or order can remap keys.

use sha1::{Digest, Sha1};

/// Routing key of a publish or a live subscription.
pub fn publish_key(topic: &str) -> &str {
    topic
}

/// Routing key of a replay session.
pub fn session_key(subscriber_id: &str, topic: &str) -> String {
    format!("{}|{}", subscriber_id, topic)
}

/// Index of the target `key` maps to among `len` targets.
///
/// Returns `None` if `len` is zero.
pub fn index_for(key: &str, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let digest = Sha1::digest(key.as_bytes());
    let modulus = len as u128;
    // Horner's rule over the digest bytes keeps the accumulator below
    // `modulus`, so the shift never overflows.
    let index = digest
        .iter()
        .fold(0u128, |acc, &byte| ((acc << 8) | u128::from(byte)) % modulus);
    Some(index as usize)
}

/// Picks the target for `key`, or `None` if there are no targets.
pub fn pick<'a, T>(key: &str, targets: &'a [T]) -> Option<&'a T> {
    index_for(key, targets.len()).map(|index| &targets[index])
}
