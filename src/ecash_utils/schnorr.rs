//! eCash Schnorr signatures
//!
//! This is the 2019 Bitcoin Cash Schnorr scheme, not BIP340: the public key is committed
//! in compressed form and the nonce point must have a quadratic-residue y coordinate.
//! Nonces are derived with RFC6979 so the same key and message always sign identically.

use bitcoin::hashes::{hmac, sha256, Hash, HashEngine};
use num::{BigUint, One};
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Extra nonce data Bitcoin ABC mixes into RFC6979 for Schnorr signing.
const NONCE_ALGO: &[u8; 16] = b"Schnorr+SHA256  ";

const FIELD_PRIME: &str = "fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f";
const CURVE_ORDER: &str = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";

/// Sign a 32-byte digest, returning `R.x || s`.
pub fn schnorr_sign(sk: &SecretKey, msg: &[u8; 32]) -> Result<[u8; 64]> {
    let secp = Secp256k1::signing_only();
    let pubkey = PublicKey::from_secret_key(&secp, sk).serialize();

    let mut nonces = Rfc6979::new(&sk.secret_bytes(), msg);
    let mut k = loop {
        if let Ok(k) = SecretKey::from_slice(&nonces.next_candidate()) {
            break k;
        }
    };

    let r_point = PublicKey::from_secret_key(&secp, &k).serialize_uncompressed();
    if !is_quadratic_residue(&r_point[33..]) {
        k = k.negate();
    }
    let mut r_x = [0u8; 32];
    r_x.copy_from_slice(&r_point[1..33]);

    let e = challenge(&r_x, &pubkey, msg)?;
    // s = k + e * x; e is never zero for a real hash
    let ex = sk.mul_tweak(&e).map_err(|e| Error::Key(e.to_string()))?;
    let s = ex
        .add_tweak(&Scalar::from(k))
        .map_err(|e| Error::Key(e.to_string()))?;

    let mut sig = [0u8; 64];
    sig[..32].copy_from_slice(&r_x);
    sig[32..].copy_from_slice(&s.secret_bytes());
    Ok(sig)
}

/// Verify a 64-byte signature against a compressed or uncompressed public key.
pub fn schnorr_verify(sig: &[u8], msg: &[u8; 32], pubkey: &[u8]) -> bool {
    if sig.len() != 64 {
        return false;
    }
    let Ok(pk) = PublicKey::from_slice(pubkey) else {
        return false;
    };
    let secp = Secp256k1::new();

    let mut r_x = [0u8; 32];
    r_x.copy_from_slice(&sig[..32]);
    if BigUint::from_bytes_be(&r_x) >= prime() {
        return false;
    }
    // s must be a valid non-zero scalar
    let Ok(s) = SecretKey::from_slice(&sig[32..]) else {
        return false;
    };
    let Ok(e) = challenge(&r_x, &pk.serialize(), msg) else {
        return false;
    };

    // R = sG - eP
    let s_g = PublicKey::from_secret_key(&secp, &s);
    let Ok(e_p) = pk.mul_tweak(&secp, &e) else {
        return false;
    };
    let Ok(r_point) = s_g.combine(&e_p.negate(&secp)) else {
        return false;
    };

    let r_point = r_point.serialize_uncompressed();
    r_point[1..33] == r_x && is_quadratic_residue(&r_point[33..])
}

/// e = SHA256(R.x || P || m) mod n
fn challenge(r_x: &[u8; 32], pubkey: &[u8; 33], msg: &[u8; 32]) -> Result<Scalar> {
    let mut h = Sha256::new();
    h.update(r_x);
    h.update(pubkey);
    h.update(msg);
    let digest: [u8; 32] = h.finalize().into();

    let reduced = BigUint::from_bytes_be(&digest) % order();
    Scalar::from_be_bytes(to_be_32(&reduced)).map_err(|e| Error::Key(e.to_string()))
}

fn is_quadratic_residue(y: &[u8]) -> bool {
    let p = prime();
    let exp = (&p - BigUint::one()) >> 1;
    BigUint::from_bytes_be(y).modpow(&exp, &p).is_one()
}

fn prime() -> BigUint {
    BigUint::parse_bytes(FIELD_PRIME.as_bytes(), 16).unwrap_or_default()
}

fn order() -> BigUint {
    BigUint::parse_bytes(CURVE_ORDER.as_bytes(), 16).unwrap_or_default()
}

fn to_be_32(n: &BigUint) -> [u8; 32] {
    let bytes = n.to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// RFC6979 HMAC-SHA256 generator, keyed as libsecp256k1 does:
/// `key || msg || algo16`.
struct Rfc6979 {
    k: [u8; 32],
    v: [u8; 32],
    retry: bool,
}

impl Rfc6979 {
    fn new(key: &[u8; 32], msg: &[u8; 32]) -> Self {
        let mut seed = Vec::with_capacity(80);
        seed.extend_from_slice(key);
        seed.extend_from_slice(msg);
        seed.extend_from_slice(NONCE_ALGO);

        let mut k = [0u8; 32];
        let mut v = [1u8; 32];
        for marker in [0x00u8, 0x01] {
            k = hmac_sha256(&k, &[&v, &[marker], &seed]);
            v = hmac_sha256(&k, &[&v]);
        }
        Self { k, v, retry: false }
    }

    fn next_candidate(&mut self) -> [u8; 32] {
        if self.retry {
            self.k = hmac_sha256(&self.k, &[&self.v, &[0x00]]);
            self.v = hmac_sha256(&self.k, &[&self.v]);
        }
        self.v = hmac_sha256(&self.k, &[&self.v]);
        self.retry = true;
        self.v
    }
}

fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut engine = hmac::HmacEngine::<sha256::Hash>::new(key);
    for part in parts {
        engine.input(part);
    }
    hmac::Hmac::<sha256::Hash>::from_engine(engine).to_byte_array()
}
