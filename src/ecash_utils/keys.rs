//! Key management for the contract signing key

use secp256k1::{PublicKey, Secp256k1, SecretKey};

use crate::error::{Error, Result};
use crate::types::CONTRACT_PRV_KEY;

/// Parse private key from WIF or raw hex
pub fn parse_private_key(key_str: &str) -> Result<SecretKey> {
    let key_str = key_str.trim();

    // WIF (K, L or 5 prefixes); eCash shares Bitcoin's mainnet WIF version byte
    if key_str.len() == 51 || key_str.len() == 52 {
        if let Ok(wif) = bitcoin::PrivateKey::from_wif(key_str) {
            return Ok(wif.inner);
        }
    }

    if key_str.len() == 64 {
        let bytes = hex::decode(key_str).map_err(|e| Error::Key(e.to_string()))?;
        return Ok(SecretKey::from_slice(&bytes)?);
    }

    Err(Error::Key(
        "unsupported key format, expected WIF or 64 hex characters".to_string(),
    ))
}

/// The published key every contract built by this service is signed with.
pub fn contract_key() -> Result<SecretKey> {
    parse_private_key(CONTRACT_PRV_KEY)
}

/// Compressed 33-byte public key, as embedded in the contract script.
pub fn derive_public_key(sk: &SecretKey) -> [u8; 33] {
    let secp = Secp256k1::signing_only();
    PublicKey::from_secret_key(&secp, sk).serialize()
}
