//! Decrypt a client document from its share files.
//!
//! Usage: dcd <document.aes256> <share1> [ ... <shareN> ]
//!
//! Each share file holds three decimal lines `P`, `X`, `Y` — the output a
//! reviewer gets after decrypting their `.gpg` share with their own key.
//! Given enough shares, the document key is reconstructed and the
//! `IV || ciphertext` file is decrypted next to the input.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use num_bigint::BigInt;

use sid::seal::{cfb_decrypt, key_from_secret, reconstruct, Share, IV_SIZE};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 2 {
        eprintln!("At least two arguments are expected -- abort!");
        eprintln!("dcd <document.aes256> <share1> [ ... <shareN> ]");
        std::process::exit(1);
    }

    let shares: Vec<Share> = args[1..]
        .iter()
        .map(|name| read_share(Path::new(name)))
        .collect::<anyhow::Result<_>>()?;

    let secret = reconstruct(&shares);
    let key = key_from_secret(&secret);

    let doc_path = Path::new(&args[0]);
    let doc_name = doc_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match doc_name.strip_suffix(".document.aes256") {
        Some(stem) => stem,
        None => bail!("invalid document file name '{}'", doc_name),
    };

    let blob = fs::read(doc_path).with_context(|| format!("failed to read '{}'", args[0]))?;
    if blob.len() < IV_SIZE {
        bail!("document file '{}' is too short", args[0]);
    }
    let (iv, ciphertext) = blob.split_at(IV_SIZE);
    let mut plain = ciphertext.to_vec();
    cfb_decrypt(&key, iv, &mut plain)?;

    let out_path = doc_path.with_file_name(format!("{}.document", stem));
    fs::write(&out_path, &plain)
        .with_context(|| format!("failed to write '{}'", out_path.display()))?;
    println!("document recovered to '{}'", out_path.display());
    Ok(())
}

/// Read one share file: three decimal lines `P`, `X`, `Y`.
fn read_share(path: &Path) -> anyhow::Result<Share> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to open file '{}'", path.display()))?;
    let mut nums = text.lines().map(|line| {
        BigInt::parse_bytes(line.trim().as_bytes(), 10)
            .with_context(|| format!("bad number in share file '{}'", path.display()))
    });
    let mut next = || {
        nums.next()
            .unwrap_or_else(|| Err(anyhow::anyhow!("share file '{}' is truncated", path.display())))
    };
    let p = next()?;
    let x = next()?;
    let y = next()?;
    Ok(Share { p, x, y })
}
