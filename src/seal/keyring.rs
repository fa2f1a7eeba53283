//! Reviewer keyring handling.
//!
//! Reviewers are the principals trusted with key shares. Their public keys
//! are read once at startup from an OpenPGP keyring, binary or
//! ASCII-armored.

use std::io::Cursor;
use std::path::Path;

use pgp::composed::{Deserializable, SignedPublicKey};
use pgp::types::KeyTrait;

use crate::error::{Error, Result};

/// Load all reviewer public keys from a keyring file.
///
/// A missing or unparseable keyring is a startup-fatal configuration
/// error, as is an empty one.
pub fn load_reviewers(path: &Path) -> Result<Vec<SignedPublicKey>> {
    let data = std::fs::read(path)
        .map_err(|e| Error::keyring(format!("can't read keyring file {:?}: {}", path, e)))?;

    let keys: Vec<SignedPublicKey> = if data.starts_with(b"-----BEGIN") {
        let (iter, _) = SignedPublicKey::from_armor_many(Cursor::new(&data))
            .map_err(|e| Error::keyring(format!("bad armored keyring: {}", e)))?;
        iter.collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::keyring(format!("bad armored keyring: {}", e)))?
    } else {
        SignedPublicKey::from_bytes_many(Cursor::new(&data))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::keyring(format!("bad keyring: {}", e)))?
    };

    if keys.is_empty() {
        return Err(Error::keyring(format!("keyring {:?} holds no public keys", path)));
    }
    tracing::info!("{} reviewer keys loaded", keys.len());
    Ok(keys)
}

/// File label for a reviewer: the low 32 bits of the primary key id in
/// uppercase hex.
pub fn key_label(key: &SignedPublicKey) -> String {
    let id = key.key_id();
    let raw: &[u8] = id.as_ref();
    hex::encode_upper(&raw[raw.len().saturating_sub(4)..])
}
