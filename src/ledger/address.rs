// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! NullNet address format: `null_` followed by 20 alphanumeric characters.

use k256::elliptic_curve::rand_core::{OsRng, RngCore};

use super::{LedgerError, LedgerResult};

pub const ADDRESS_PREFIX: &str = "null_";
pub const ADDRESS_BODY_LEN: usize = 20;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub fn is_valid_address(address: &str) -> bool {
    address
        .strip_prefix(ADDRESS_PREFIX)
        .is_some_and(|body| {
            body.len() == ADDRESS_BODY_LEN && body.bytes().all(|b| b.is_ascii_alphanumeric())
        })
}

/// Fail with `InvalidAddressFormat` unless `address` is well formed.
pub fn validate_address(address: &str) -> LedgerResult<()> {
    if is_valid_address(address) {
        Ok(())
    } else {
        Err(LedgerError::InvalidAddressFormat(address.to_string()))
    }
}

/// Generate a fresh random address.
pub fn generate_address() -> String {
    let mut body = String::with_capacity(ADDRESS_BODY_LEN);
    while body.len() < ADDRESS_BODY_LEN {
        let mut buf = [0u8; 32];
        OsRng.fill_bytes(&mut buf);
        // Bytes >= 248 are discarded so every character is equally likely.
        for byte in buf {
            if body.len() == ADDRESS_BODY_LEN {
                break;
            }
            if (byte as usize) < ALPHABET.len() * 4 {
                body.push(ALPHABET[byte as usize % ALPHABET.len()] as char);
            }
        }
    }
    format!("{ADDRESS_PREFIX}{body}")
}

/// Normalize and validate an asset ticker (`[A-Z0-9]{1,10}`).
pub fn normalize_ticker(ticker: &str) -> LedgerResult<String> {
    let ticker = ticker.trim().to_ascii_uppercase();
    if (1..=10).contains(&ticker.len()) && ticker.bytes().all(|b| b.is_ascii_alphanumeric()) {
        Ok(ticker)
    } else {
        Err(LedgerError::InvalidTicker(ticker))
    }
}
