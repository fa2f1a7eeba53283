//! Threshold secret sharing over GF(p).
//!
//! The document key is the constant term of a random polynomial of degree
//! `t - 1`; each reviewer receives one point of that polynomial. Any `t`
//! points recover the key by Lagrange interpolation at zero, fewer reveal
//! nothing.

use num_bigint::{BigInt, RandBigInt};
use num_traits::{One, Zero};
use rand_core::OsRng;

/// One share: the modulus and a point `(x, y)` on the polynomial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    /// Prime modulus
    pub p: BigInt,
    /// Evaluation point
    pub x: BigInt,
    /// Polynomial value at `x`
    pub y: BigInt,
}

/// Compute the share modulus `2^512 - 1 - offset`.
///
/// The offset is chosen at deployment time so the result is prime; the
/// default offset of 568 yields the largest 512-bit prime.
pub fn share_prime(offset: u64) -> BigInt {
    (BigInt::one() << 512u32) - 1 - BigInt::from(offset)
}

/// Split `secret` into `n` shares with reconstruction threshold `t`.
pub fn split(secret: &BigInt, prime: &BigInt, n: usize, t: usize) -> Vec<Share> {
    let mut coeffs = Vec::with_capacity(t);
    coeffs.push(modp(secret, prime));
    for _ in 1..t {
        coeffs.push(OsRng.gen_bigint_range(&BigInt::one(), prime));
    }

    (1..=n)
        .map(|i| {
            let x = BigInt::from(i);
            let y = eval(&coeffs, &x, prime);
            Share {
                p: prime.clone(),
                x,
                y,
            }
        })
        .collect()
}

/// Recover the secret from at least `t` distinct shares.
pub fn reconstruct(shares: &[Share]) -> BigInt {
    if shares.is_empty() {
        return BigInt::zero();
    }
    let p = &shares[0].p;
    let mut secret = BigInt::zero();

    for (i, si) in shares.iter().enumerate() {
        // Lagrange basis polynomial evaluated at zero
        let mut num = BigInt::one();
        let mut den = BigInt::one();
        for (j, sj) in shares.iter().enumerate() {
            if i == j {
                continue;
            }
            num = modp(&(num * (p - &sj.x)), p);
            den = modp(&(den * (&si.x - &sj.x)), p);
        }
        let basis = modp(&(num * modinv(&den, p)), p);
        secret = modp(&(secret + &si.y * basis), p);
    }
    secret
}

/// Evaluate the polynomial at `x` (Horner form, mod `p`).
fn eval(coeffs: &[BigInt], x: &BigInt, p: &BigInt) -> BigInt {
    let mut acc = BigInt::zero();
    for c in coeffs.iter().rev() {
        acc = modp(&(acc * x + c), p);
    }
    acc
}

/// Reduce into `[0, p)`.
fn modp(a: &BigInt, p: &BigInt) -> BigInt {
    let r = a % p;
    if r < BigInt::zero() {
        r + p
    } else {
        r
    }
}

/// Modular inverse via Fermat's little theorem (`p` is prime).
fn modinv(a: &BigInt, p: &BigInt) -> BigInt {
    a.modpow(&(p.clone() - 2u32), p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_prime() -> BigInt {
        // 2^61 - 1, a Mersenne prime
        BigInt::from(2_305_843_009_213_693_951u64)
    }

    #[test]
    fn test_share_prime_value() {
        let p = share_prime(568);
        let expected = (BigInt::one() << 512u32) - 569;
        assert_eq!(p, expected);
        assert_eq!(p.bits(), 512);
    }

    #[test]
    fn test_split_shapes() {
        let p = small_prime();
        let secret = BigInt::from(123_456_789u64);
        let shares = split(&secret, &p, 5, 3);
        assert_eq!(shares.len(), 5);
        for (i, s) in shares.iter().enumerate() {
            assert_eq!(s.x, BigInt::from(i + 1));
            assert_eq!(s.p, p);
            assert!(s.y >= BigInt::zero() && s.y < p);
        }
    }

    #[test]
    fn test_any_threshold_subset_reconstructs() {
        let p = small_prime();
        let secret = BigInt::from(987_654_321u64);
        let shares = split(&secret, &p, 5, 3);

        for subset in [
            [0usize, 1, 2],
            [0, 2, 4],
            [4, 1, 3],
            [2, 3, 4],
        ] {
            let picked: Vec<Share> = subset.iter().map(|&i| shares[i].clone()).collect();
            assert_eq!(reconstruct(&picked), secret);
        }
    }

    #[test]
    fn test_below_threshold_misses() {
        let p = small_prime();
        let secret = BigInt::from(42u64);
        let shares = split(&secret, &p, 4, 3);
        let two: Vec<Share> = shares[..2].to_vec();
        assert_ne!(reconstruct(&two), secret);
    }

    #[test]
    fn test_full_width_secret() {
        // a 256-bit secret under the production modulus
        let p = share_prime(568);
        let secret = BigInt::parse_bytes(
            b"98417062132844073369871354571300985306292520515677211322696380925255115636502",
            10,
        )
        .unwrap();
        let shares = split(&secret, &p, 3, 2);
        assert_eq!(reconstruct(&shares[1..].to_vec()), secret);
        assert_eq!(reconstruct(&[shares[2].clone(), shares[0].clone()]), secret);
    }

    #[test]
    fn test_threshold_one_is_constant() {
        let p = small_prime();
        let secret = BigInt::from(7u64);
        let shares = split(&secret, &p, 3, 1);
        for s in &shares {
            assert_eq!(s.y, secret);
            assert_eq!(reconstruct(&[s.clone()]), secret);
        }
    }
}
