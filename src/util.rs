//! Random identifier generators.
//!
//! Two flavors are used throughout the proxy: decimal ids for upload base
//! names and alphanumeric keys for multipart boundary ids. Both draw from
//! the OS entropy source.

use rand::Rng;
use rand_core::OsRng;

/// Create a decimal identifier of the given length.
///
/// The leading digit is never zero, so the id keeps its length when read
/// back as a number.
pub fn create_id(size: usize) -> String {
    let mut id = String::with_capacity(size);
    if size == 0 {
        return id;
    }
    id.push(char::from(b'1' + OsRng.gen_range(0..9)));
    while id.len() < size {
        id.push(char::from(b'0' + OsRng.gen_range(0..10)));
    }
    id
}

/// Create an alphanumeric key of the given length.
///
/// The character set is `[a-zA-Z0-9]`.
pub fn create_key(size: usize) -> String {
    let mut key = String::with_capacity(size);
    while key.len() < size {
        let v: u8 = OsRng.gen_range(0..62);
        let c = if v < 26 {
            b'a' + v
        } else if v < 52 {
            b'A' + v - 26
        } else {
            b'0' + v - 52
        };
        key.push(char::from(c));
    }
    key
}
