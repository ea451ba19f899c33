use std::str::FromStr;

use anyhow::{Context, Result};
use bitcoin::bip32::{ChildNumber, Xpriv};
use bitcoin::secp256k1::Secp256k1;
use nostr_sdk::{Keys, SecretKey};

/// Hardened key family used for the zap receipt signing key.
pub const NOSTR_KEY_FAMILY: u32 = 999;

/// Derive the server's nostr signing keys from the wallet's lightning xprv.
///
/// Path is `m/999'/0/0`. A persistent key lets clients that cached our
/// `nostrPubkey` keep validating receipts across restarts.
pub fn derive_signing_keys(lightning_xprv: &str) -> Result<Keys> {
    let secp = Secp256k1::signing_only();
    let xprv = Xpriv::from_str(lightning_xprv).context("invalid lightning xprv")?;

    let path = [
        ChildNumber::from_hardened_idx(NOSTR_KEY_FAMILY)?,
        ChildNumber::from_normal_idx(0)?,
        ChildNumber::from_normal_idx(0)?,
    ];
    let child = xprv
        .derive_priv(&secp, &path)
        .context("failed to derive nostr key")?;

    let secret_key = SecretKey::from_slice(&child.private_key.secret_bytes())
        .context("derived key is not a valid nostr secret key")?;
    Ok(Keys::new(secret_key))
}

#[cfg(test)]
mod tests {
    use bitcoin::Network;

    use super::*;

    fn test_xprv(seed: u8) -> String {
        Xpriv::new_master(Network::Bitcoin, &[seed; 32])
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let xprv = test_xprv(1);
        let a = derive_signing_keys(&xprv).unwrap();
        let b = derive_signing_keys(&xprv).unwrap();
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.public_key().to_hex().len(), 64);
    }

    #[test]
    fn test_different_wallets_get_different_keys() {
        let a = derive_signing_keys(&test_xprv(1)).unwrap();
        let b = derive_signing_keys(&test_xprv(2)).unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_invalid_xprv() {
        assert!(derive_signing_keys("not an xprv").is_err());
    }
}
