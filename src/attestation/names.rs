// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

//! Display names for the numeric constants found in attestation records.

use super::record::SecurityLevel;
use std::collections::BTreeSet;

fn unknown(v: i64) -> String {
    format!("Unknown ({v})")
}

pub fn security_level(l: SecurityLevel) -> &'static str {
    match l {
        SecurityLevel::Software => "Software",
        SecurityLevel::TrustedEnvironment => "TEE",
        SecurityLevel::StrongBox => "StrongBox",
    }
}

pub fn attestation_version(v: i64) -> String {
    match v {
        1 => "Keymaster 2.0",
        2 => "Keymaster 3.0",
        3 => "Keymaster 4.0",
        4 => "Keymaster 4.1",
        100 => "KeyMint 1.0",
        200 => "KeyMint 2.0",
        300 => "KeyMint 3.0",
        400 => "KeyMint 4.0",
        _ => return unknown(v),
    }
    .to_string()
}

pub fn keymint_version(v: i64) -> String {
    match v {
        0 => "Keymaster 0.2 or 0.3",
        1 => "Keymaster 1.0",
        2 => "Keymaster 2.0",
        3 => "Keymaster 3.0",
        4 => "Keymaster 4.0",
        41 => "Keymaster 4.1",
        100 => "KeyMint 1.0",
        200 => "KeyMint 2.0",
        300 => "KeyMint 3.0",
        400 => "KeyMint 4.0",
        _ => return unknown(v),
    }
    .to_string()
}

pub fn algorithm(v: i64) -> String {
    match v {
        1 => "RSA",
        3 => "ECDSA",
        32 => "AES",
        33 => "3DES",
        128 => "HMAC",
        _ => return unknown(v),
    }
    .to_string()
}

pub fn ec_curve(v: i64) -> String {
    match v {
        0 => "secp224r1",
        1 => "secp256r1",
        2 => "secp384r1",
        3 => "secp521r1",
        4 => "Curve25519",
        _ => return unknown(v),
    }
    .to_string()
}

pub fn purpose(v: i64) -> String {
    match v {
        0 => "ENCRYPT",
        1 => "DECRYPT",
        2 => "SIGN",
        3 => "VERIFY",
        5 => "WRAP",
        6 => "AGREE_KEY",
        7 => "ATTEST_KEY",
        _ => return unknown(v),
    }
    .to_string()
}

pub fn digest(v: i64) -> String {
    match v {
        0 => "NONE",
        1 => "MD5",
        2 => "SHA1",
        3 => "SHA224",
        4 => "SHA256",
        5 => "SHA384",
        6 => "SHA512",
        _ => return unknown(v),
    }
    .to_string()
}

pub fn padding(v: i64) -> String {
    match v {
        1 => "NONE",
        2 => "OAEP",
        3 => "PSS",
        4 => "PKCS1 ENCRYPT",
        5 => "PKCS1 SIGN",
        64 => "PKCS7",
        _ => return unknown(v),
    }
    .to_string()
}

pub fn origin(v: i64) -> String {
    match v {
        0 => "Generated",
        1 => "Derived",
        2 => "Imported",
        3 => "Unknown (KM0)",
        4 => "Securely Imported",
        _ => return unknown(v),
    }
    .to_string()
}

/// User auth types form a bitmask.
pub fn user_auth_type(v: i64) -> String {
    let mut types = vec![];

    if v & 2 != 0 {
        types.push("Biometric");
    }
    if v & 1 != 0 {
        types.push("Password");
    }

    format!("[{}]", types.join(", "))
}

/// Render a set of constants with `f`, e.g. `[SIGN, VERIFY]`.
pub fn set(s: &BTreeSet<i64>, f: fn(i64) -> String) -> String {
    let names: Vec<String> = s.iter().map(|v| f(*v)).collect();

    format!("[{}]", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions() {
        assert_eq!(attestation_version(4), "Keymaster 4.1");
        assert_eq!(keymint_version(41), "Keymaster 4.1");
        assert_eq!(keymint_version(0), "Keymaster 0.2 or 0.3");
        assert_eq!(attestation_version(41), "Unknown (41)");
    }

    #[test]
    fn sets_and_masks() {
        let purposes: BTreeSet<i64> = [3, 2, 9].into_iter().collect();

        assert_eq!(set(&purposes, purpose), "[SIGN, VERIFY, Unknown (9)]");
        assert_eq!(user_auth_type(3), "[Biometric, Password]");
        assert_eq!(user_auth_type(0), "[]");
    }
}
