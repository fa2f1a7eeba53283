//! Document sealing pipeline.
//!
//! A completed client upload is encrypted under a fresh AES-256 key in CFB
//! mode (file layout `IV || ciphertext`), the key is split into one share
//! per reviewer with the configured threshold, and every share is written
//! as an OpenPGP message encrypted to its reviewer. Losing a single share
//! file costs nothing as long as `t` reviewers can still decrypt theirs.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use aes::Aes256;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use num_bigint::{BigInt, Sign};
use pgp::composed::{Message, SignedPublicKey};
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use rand::RngCore;
use rand_core::OsRng;
use zeroize::Zeroizing;

use super::keyring::{self, key_label};
use super::shamir::{self, Share};
use crate::config::UploadConfig;
use crate::error::{Error, Result};
use crate::util::create_id;

type Aes256CfbEnc = cfb_mode::Encryptor<Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<Aes256>;

/// Symmetric key size in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// IV size in bytes (one AES block).
pub const IV_SIZE: usize = 16;

/// Length of generated upload base ids.
const ID_LEN: usize = 16;

/// Process-wide sealing parameters, immutable after startup.
pub struct Sealer {
    path: PathBuf,
    reviewers: Vec<SignedPublicKey>,
    prime: BigInt,
    threshold: usize,
}

impl Sealer {
    /// Initialize the sealer from upload configuration.
    ///
    /// Reads the reviewer keyring and derives the share modulus. Errors
    /// here are startup-fatal.
    pub fn new(defs: &UploadConfig) -> Result<Self> {
        let reviewers = keyring::load_reviewers(&defs.keyring)?;
        Ok(Self::with_parts(
            defs.path.clone(),
            reviewers,
            shamir::share_prime(defs.share_prime_offset),
            defs.share_threshold,
        ))
    }

    /// Assemble a sealer from already-resolved parts.
    pub fn with_parts(
        path: PathBuf,
        reviewers: Vec<SignedPublicKey>,
        prime: BigInt,
        threshold: usize,
    ) -> Self {
        Self {
            path,
            reviewers,
            prime,
            threshold,
        }
    }

    /// Seal one uploaded document.
    ///
    /// Returns `true` when the encrypted document was written; failed share
    /// files are logged and skipped without affecting the others.
    pub fn seal(&self, doc: &[u8]) -> bool {
        tracing::info!("client upload received, {} bytes", doc.len());
        match self.seal_inner(doc) {
            Ok(base) => {
                tracing::info!("document sealed as {:?}", base);
                true
            }
            Err(e) => {
                tracing::error!("sealing failed: {}", e);
                false
            }
        }
    }

    fn seal_inner(&self, doc: &[u8]) -> Result<PathBuf> {
        let base = self.path.join(create_id(ID_LEN));

        // the key leaves this function only as shares
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        OsRng.fill_bytes(&mut *key);
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let mut data = doc.to_vec();
        cfb_encrypt(&*key, &iv, &mut data)?;

        let doc_name = artifact(&base, "document.aes256");
        write_document(&doc_name, &iv, &data)
            .map_err(|e| Error::sealer(format!("can't create document file {:?}: {}", doc_name, e)))?;

        let secret = BigInt::from_bytes_be(Sign::Plus, &*key);
        let shares = shamir::split(&secret, &self.prime, self.reviewers.len(), self.threshold);
        for (entity, share) in self.reviewers.iter().zip(shares.iter()) {
            if let Err(e) = self.write_share(&base, entity, share) {
                // other reviewers still get their shares
                tracing::error!("share for {} skipped: {}", key_label(entity), e);
            }
        }

        Ok(base)
    }

    /// Encrypt one share to its reviewer and write the armored file.
    fn write_share(&self, base: &Path, entity: &SignedPublicKey, share: &Share) -> Result<()> {
        let fname = artifact(base, &format!("{}.gpg", key_label(entity)));
        let plain = format!("{}\n{}\n{}\n", share.p, share.x, share.y);

        let msg = Message::new_literal("share", &plain);
        let encrypted = match entity.public_subkeys.first() {
            Some(subkey) => {
                msg.encrypt_to_keys(&mut OsRng, SymmetricKeyAlgorithm::AES256, &[subkey])
            }
            None => msg.encrypt_to_keys(&mut OsRng, SymmetricKeyAlgorithm::AES256, &[entity]),
        }
        .map_err(|e| Error::sealer(format!("can't encrypt share: {}", e)))?;

        let armored = encrypted
            .to_armored_string(None)
            .map_err(|e| Error::sealer(format!("can't armor share: {}", e)))?;
        std::fs::write(&fname, armored)
            .map_err(|e| Error::sealer(format!("can't create share file {:?}: {}", fname, e)))?;
        Ok(())
    }
}

/// `<base>.<ext>` without touching the directory part of `base`.
fn artifact(base: &Path, ext: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn write_document(path: &Path, iv: &[u8], ciphertext: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(iv)?;
    file.write_all(ciphertext)?;
    file.flush()
}

/// Encrypt in place with AES-256-CFB.
pub fn cfb_encrypt(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
    let enc = Aes256CfbEnc::new_from_slices(key, iv)
        .map_err(|_| Error::sealer("failed to set up AES cipher"))?;
    enc.encrypt(data);
    Ok(())
}

/// Decrypt in place with AES-256-CFB.
pub fn cfb_decrypt(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
    let dec = Aes256CfbDec::new_from_slices(key, iv)
        .map_err(|_| Error::sealer("failed to set up AES cipher"))?;
    dec.decrypt(data);
    Ok(())
}

/// Rebuild the AES key from a reconstructed secret, restoring leading zero
/// bytes the integer form cannot carry.
pub fn key_from_secret(secret: &BigInt) -> [u8; KEY_SIZE] {
    let (_, bytes) = secret.to_bytes_be();
    let mut key = [0u8; KEY_SIZE];
    let n = bytes.len().min(KEY_SIZE);
    key[KEY_SIZE - n..].copy_from_slice(&bytes[bytes.len() - n..]);
    key
}
