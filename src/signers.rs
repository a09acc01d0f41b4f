//! Signer key management.
//!
//! Each [`DynSigner`] exclusively owns one private key; no other component
//! holds direct key access.

use alloy::{
    network::{FullSigner, TxSigner},
    primitives::{Address, Signature},
    signers::local::PrivateKeySigner,
};
use std::{fmt, str::FromStr, sync::Arc};

/// Abstraction over a local signer.
#[derive(Clone)]
pub struct DynSigner(pub Arc<dyn FullSigner<Signature> + Send + Sync>);

impl fmt::Debug for DynSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DynSigner").field(&self.address()).finish()
    }
}

impl DynSigner {
    /// Loads a private key from a hex string.
    pub fn from_signing_key(key: &str) -> eyre::Result<Self> {
        Ok(Self(Arc::new(PrivateKeySigner::from_str(key)?)))
    }

    /// Generates a random signer.
    pub fn random() -> Self {
        Self(Arc::new(PrivateKeySigner::random()))
    }

    /// Returns the signer's Ethereum address.
    pub fn address(&self) -> Address {
        TxSigner::address(&self.0)
    }
}
