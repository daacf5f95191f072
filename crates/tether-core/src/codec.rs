//! Base62 codec between store-assigned link ids and system-generated codes.
//!
//! The symbol order is fixed (digits, lowercase, uppercase) and must never
//! change: every persisted system code was produced with it.

use crate::error::{CoreError, Result};

/// The 62 code symbols in positional order.
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const BASE: i64 = 62;

const INVALID: u8 = u8::MAX;

const INDEX: [u8; 128] = {
    let mut table = [INVALID; 128];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// Returns the alphabet as a string slice.
pub fn alphabet() -> &'static str {
    std::str::from_utf8(ALPHABET).unwrap_or_default()
}

fn index_of(c: char) -> Option<i64> {
    if !c.is_ascii() {
        return None;
    }
    match INDEX[c as usize] {
        INVALID => None,
        idx => Some(i64::from(idx)),
    }
}

/// Encodes a non-negative id as a base62 string.
///
/// `encode(0)` is `"0"`; the result is never empty.
///
/// # Errors
///
/// Returns [`CoreError::InvalidArgument`] for a negative id.
pub fn encode(id: i64) -> Result<String> {
    if id < 0 {
        return Err(CoreError::InvalidArgument(format!(
            "id must be non-negative, got {id}"
        )));
    }
    if id == 0 {
        return Ok((ALPHABET[0] as char).to_string());
    }

    let mut rest = id;
    let mut digits = Vec::with_capacity(11);
    while rest > 0 {
        digits.push(ALPHABET[(rest % BASE) as usize]);
        rest /= BASE;
    }
    digits.reverse();

    Ok(digits.into_iter().map(char::from).collect())
}

/// Decodes a base62 string back into an id.
///
/// Only meaningful for system-generated codes; custom aliases bypass the
/// codec and must never be decoded.
///
/// # Errors
///
/// * [`CoreError::InvalidArgument`] if `code` is empty or has a symbol
///   outside [`ALPHABET`].
/// * [`CoreError::Overflow`] if the value exceeds `i64::MAX`.
pub fn decode(code: &str) -> Result<i64> {
    if code.is_empty() {
        return Err(CoreError::InvalidArgument(
            "code to decode cannot be empty".to_string(),
        ));
    }

    let mut value: i64 = 0;
    let mut power: Option<i64> = Some(1);

    for c in code.chars().rev() {
        let digit = index_of(c).ok_or_else(|| {
            CoreError::InvalidArgument(format!("invalid base62 symbol '{c}' in '{code}'"))
        })?;

        // Leading zeros contribute nothing, even past the representable power.
        if digit == 0 {
            power = power.and_then(|p| p.checked_mul(BASE));
            continue;
        }

        let place = power
            .and_then(|p| p.checked_mul(digit))
            .ok_or_else(|| overflow(code))?;
        value = value.checked_add(place).ok_or_else(|| overflow(code))?;
        power = power.and_then(|p| p.checked_mul(BASE));
    }

    Ok(value)
}

fn overflow(code: &str) -> CoreError {
    CoreError::Overflow(format!("'{code}' exceeds the maximum id {}", i64::MAX))
}

/// Returns `true` iff `s` is non-empty and made only of alphabet symbols.
pub fn is_valid_alphabet(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| index_of(c).is_some())
}
