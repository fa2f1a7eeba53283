//! Document sealing.
//!
//! This module provides:
//! - AES-256-CFB encryption of uploaded documents (`IV || ciphertext`)
//! - Shamir threshold splitting of the document key over GF(p)
//! - per-reviewer OpenPGP wrapping of the shares
//!
//! The [`Sealer`] is initialized once at startup and shared read-only by
//! all sessions.

mod keyring;
mod sealer;
mod shamir;

pub use keyring::{key_label, load_reviewers};
pub use sealer::{
    cfb_decrypt, cfb_encrypt, key_from_secret, Sealer, IV_SIZE, KEY_SIZE,
};
pub use shamir::{reconstruct, share_prime, split, Share};
