//! Random public codes (order references, employee registration numbers).

use rand::seq::SliceRandom;
use std::future::Future;

use crate::{Result, ShopError};

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated codes. 36^10 possible values.
pub const CODE_LENGTH: usize = 10;

/// Attempts before giving up on finding an unused code.
pub const MAX_ATTEMPTS: usize = 8;

pub fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .filter_map(|_| CHARSET.choose(&mut rng))
        .map(|&b| char::from(b))
        .collect()
}

/// Draws codes until `is_taken` reports one as free.
pub async fn unique_code<F, Fut>(mut is_taken: F) -> Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let code = random_code(CODE_LENGTH);
        if !is_taken(code.clone()).await? {
            return Ok(code);
        }
        tracing::debug!(attempt, "generated code already taken");
    }
    tracing::error!(attempts = MAX_ATTEMPTS, "code space exhausted");
    Err(ShopError::CodeSpaceExhausted(MAX_ATTEMPTS))
}
