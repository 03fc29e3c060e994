// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Conversion of key material into transaction signers.
//!
//! Key material is either a 32-byte hex private key (with or without a `0x`
//! prefix) or a SEC1 / PKCS#8 PEM block.

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use k256::SecretKey;

use super::client::ChainError;

/// Build a signer from hex or PEM key material.
pub fn signer_from_key_material(material: &str) -> Result<PrivateKeySigner, ChainError> {
    let material = material.trim();
    if material.starts_with("-----BEGIN") {
        return signer_from_pem(material.as_bytes());
    }
    signer_from_hex(material)
}

/// Create a signer from a hex private key.
pub fn signer_from_hex(hex_key: &str) -> Result<PrivateKeySigner, ChainError> {
    let key = hex_key.strip_prefix("0x").unwrap_or(hex_key);
    let bytes = alloy::hex::decode(key)
        .map_err(|e| ChainError::InvalidPrivateKey(format!("Invalid hex: {e}")))?;
    if bytes.len() != 32 {
        return Err(ChainError::InvalidPrivateKey(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    PrivateKeySigner::from_slice(&bytes).map_err(|e| ChainError::InvalidPrivateKey(e.to_string()))
}

/// Create a signer from a PEM-encoded private key.
pub fn signer_from_pem(pem_bytes: &[u8]) -> Result<PrivateKeySigner, ChainError> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| ChainError::InvalidPrivateKey(format!("Invalid UTF-8: {e}")))?;
    let pem = pem::parse(pem_str)
        .map_err(|e| ChainError::InvalidPrivateKey(format!("Invalid PEM: {e}")))?;

    let secret_key = SecretKey::from_sec1_der(pem.contents())
        .or_else(|_| {
            use k256::pkcs8::DecodePrivateKey;
            SecretKey::from_pkcs8_der(pem.contents())
        })
        .map_err(|e| ChainError::InvalidPrivateKey(format!("Invalid key format: {e}")))?;

    PrivateKeySigner::from_slice(&secret_key.to_bytes())
        .map_err(|e| ChainError::InvalidPrivateKey(e.to_string()))
}

/// Parse a `0x` address.
pub fn parse_address(address: &str) -> Result<Address, ChainError> {
    let trimmed = address.trim();
    if !trimmed.starts_with("0x") || trimmed.len() != 42 {
        return Err(ChainError::InvalidAddress(format!(
            "`{trimmed}` is not a 0x-prefixed 20-byte address"
        )));
    }
    trimmed
        .parse::<Address>()
        .map_err(|e| ChainError::InvalidAddress(e.to_string()))
}
