// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use base64::{engine::general_purpose, Engine as _};
use log::info;
use openssl::x509::X509;
use serde::Serialize;

// SubjectPublicKeyInfo of the known attestation roots
const GOOGLE_ROOT_PUBLIC_KEY: &str = concat!(
    "MIICIjANBgkqhkiG9w0BAQEFAAOCAg8AMIICCgKCAgEAr7bHgiuxpwHsK7Qui8xU",
    "FmOr75gvMsd/dTEDDJdSSxtf6An7xyqpRR90PL2abxM1dEqlXnf2tqw1Ne4Xwl5j",
    "lRfdnJLmN0pTy/4lj4/7tv0Sk3iiKkypnEUtR6WfMgH0QZfKHM1+di+y9TFRtv6y",
    "//0rb+T+W8a9nsNL/ggjnar86461qO0rOs2cXjp3kOG1FEJ5MVmFmBGtnrKpa73X",
    "pXyTqRxB/M0n1n/W9nGqC4FSYa04T6N5RIZGBN2z2MT5IKGbFlbC8UrW0DxW7AYI",
    "mQQcHtGl/m00QLVWutHQoVJYnFPlXTcHYvASLu+RhhsbDmxMgJJ0mcDpvsC4PjvB",
    "+TxywElgS70vE0XmLD+OJtvsBslHZvPBKCOdT0MS+tgSOIfga+z1Z1g7+DVagf7q",
    "uvmag8jfPioyKvxnK/EgsTUVi2ghzq8wm27ud/mIM7AY2qEORR8Go3TVB4HzWQgp",
    "Zrt3i5MIlCaY504LzSRiigHCzAPlHws+W0rB5N+er5/2pJKnfBSDiCiFAVtCLOZ7",
    "gLiMm0jhO2B6tUXHI/+MRPjy02i59lINMRRev56GKtcd9qO/0kUJWdZTdA2XoS82",
    "ixPvZtXQpUpuL12ab+9EaDK8Z4RHJYYfCT3Q5vNAXaiWQ+8PTWm2QgBR/bkwSWc+",
    "NpUFgNPN9PvQi8WEg5UmAGMCAwEAAQ==",
);

const AOSP_ROOT_EC_PUBLIC_KEY: &str = concat!(
    "MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAE7l1ex+HA220Dpn7mthvsTWpdamgu",
    "D/9/SQ59dx9EIm29sa/6FsvHrcV30lacqrewLVQBXT5DKyqO107sSHVBpA==",
);

const AOSP_ROOT_RSA_PUBLIC_KEY: &str = concat!(
    "MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQCia63rbi5EYe/VDoLmt5TRdSMf",
    "d5tjkWP/96r/C3JHTsAsQ+wzfNes7UA+jCigZtX3hwszl94OuE4TQKuvpSe/lWmg",
    "MdsGUmX4RFlXYfC78hdLt0GAZMAoDo9Sd47b0ke2RekZyOmLw9vCkT/X11DEHTVm",
    "+Vfkl5YLCazOkjWFmwIDAQAB",
);

const KNOX_SAKV1_ROOT_PUBLIC_KEY: &str = concat!(
    "MIGbMBAGByqGSM49AgEGBSuBBAAjA4GGAAQBs9Qjr//REhkXW7jUqjY9KNwWac4r",
    "5+kdUGk+TZjRo1YEa47Axwj6AJsbOjo4QsHiYRiWTELvFeiuBsKqyuF0xyAAKvDo",
    "fBqrEq1/Ckxo2mz7Q4NQes3g4ahSjtgUSh0k85fYwwHjCeLyZ5kEqgHG9OpOH526",
    "FFAK3slSUgC8RObbxys=",
);

const KNOX_SAKV2_ROOT_PUBLIC_KEY: &str = concat!(
    "MIGbMBAGByqGSM49AgEGBSuBBAAjA4GGAAQBhbGuLrpql5I2WJmrE5kEVZOo+dgA",
    "46mKrVJf/sgzfzs2u7M9c1Y9ZkCEiiYkhTFE9vPbasmUfXybwgZ2EM30A1ABPd12",
    "4n3JbEDfsB/wnMH1AcgsJyJFPbETZiy42Fhwi+2BCA5bcHe7SrdkRIYSsdBRaKBo",
    "ZsapxB0gAOs0jSPRX5M=",
);

const KNOX_SAKMV1_ROOT_PUBLIC_KEY: &str = concat!(
    "MIGbMBAGByqGSM49AgEGBSuBBAAjA4GGAAQB9XeEN8lg6p5xvMVWG42P2Qi/aRKX",
    "2rPRNgK92UlO9O/TIFCKHC1AWCLFitPVEow5W+yEgC2wOiYxgepY85TOoH0AuEkL",
    "oiC6ldbF2uNVU3rYYSytWAJg3GFKd1l9VLDmxox58Hyw2Jmdd5VSObGiTFQ/SgKs",
    "n2fbQPtpGlNxgEfd6Y8=",
);

/// Who issued a chain, judged by its root public key.  `Null`, `Failed` and
/// `GoogleRkp` are only ever assigned to whole chains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum IssuerKind {
    Null,
    Failed,
    Unknown,
    Aosp,
    Google,
    GoogleRkp,
    Knox,
    Oem,
}

/// The set of root public keys a chain is classified against: the built-in
/// Google, AOSP and Knox roots plus any OEM roots the caller adds.
#[derive(Clone, Debug)]
pub struct RootKeyStore {
    builtin: Vec<(IssuerKind, Vec<u8>)>,
    oem: Vec<Vec<u8>>,
}

impl Default for RootKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RootKeyStore {
    /// Returns a store holding only the built-in roots
    pub fn new() -> Self {
        // order matters: it is the classification order
        let builtin = [
            (IssuerKind::Google, GOOGLE_ROOT_PUBLIC_KEY),
            (IssuerKind::Aosp, AOSP_ROOT_EC_PUBLIC_KEY),
            (IssuerKind::Aosp, AOSP_ROOT_RSA_PUBLIC_KEY),
            (IssuerKind::Knox, KNOX_SAKV2_ROOT_PUBLIC_KEY),
            (IssuerKind::Knox, KNOX_SAKV1_ROOT_PUBLIC_KEY),
            (IssuerKind::Knox, KNOX_SAKMV1_ROOT_PUBLIC_KEY),
        ]
        .into_iter()
        .filter_map(|(k, b64)| general_purpose::STANDARD.decode(b64).ok().map(|d| (k, d)))
        .collect();

        Self {
            builtin,
            oem: vec![],
        }
    }

    /// Add an OEM root public key (DER SubjectPublicKeyInfo).  The Google
    /// root is never treated as an OEM root.
    pub fn add_oem_key(&mut self, spki: &[u8]) -> bool {
        if self.is_google(spki) || self.oem.iter().any(|k| k == spki) {
            return false;
        }

        self.oem.push(spki.to_vec());

        true
    }

    /// Add the public keys of the PEM encoded OEM root certificates, returns
    /// how many new keys were added
    pub fn add_oem_pem(&mut self, pem: &[u8]) -> Result<usize, Error> {
        let certs = X509::stack_from_pem(pem).map_err(|e| Error::Crypto(e.to_string()))?;

        if certs.is_empty() {
            return Err(Error::Syntax("no certificate found in PEM".to_string()));
        }

        let mut n = 0;

        for c in certs {
            let spki = c
                .public_key()
                .and_then(|k| k.public_key_to_der())
                .map_err(|e| Error::Crypto(e.to_string()))?;

            if self.add_oem_key(&spki) {
                info!("added OEM root key ({} bytes)", spki.len());
                n += 1;
            }
        }

        Ok(n)
    }

    pub fn oem_keys(&self) -> usize {
        self.oem.len()
    }

    fn is_google(&self, spki: &[u8]) -> bool {
        self.builtin
            .iter()
            .any(|(k, d)| *k == IssuerKind::Google && d == spki)
    }

    /// Classify a root public key (DER SubjectPublicKeyInfo)
    pub fn classify(&self, spki: &[u8]) -> IssuerKind {
        if let Some((k, _)) = self.builtin.iter().find(|(_, d)| d == spki) {
            return *k;
        }

        if self.oem.iter().any(|d| d == spki) {
            return IssuerKind::Oem;
        }

        IssuerKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_ROOT_PEM: &[u8] = include_bytes!("../../testdata/root.pem");

    fn spki(b64: &str) -> Vec<u8> {
        general_purpose::STANDARD.decode(b64).unwrap()
    }

    #[test]
    fn builtin_roots() {
        let s = RootKeyStore::new();

        assert_eq!(s.classify(&spki(GOOGLE_ROOT_PUBLIC_KEY)), IssuerKind::Google);
        assert_eq!(s.classify(&spki(AOSP_ROOT_EC_PUBLIC_KEY)), IssuerKind::Aosp);
        assert_eq!(s.classify(&spki(AOSP_ROOT_RSA_PUBLIC_KEY)), IssuerKind::Aosp);
        assert_eq!(s.classify(&spki(KNOX_SAKMV1_ROOT_PUBLIC_KEY)), IssuerKind::Knox);
        assert_eq!(s.classify(b"not a key"), IssuerKind::Unknown);
    }

    #[test]
    fn oem_roots() {
        let mut s = RootKeyStore::new();
        let root = X509::from_pem(TEST_ROOT_PEM).unwrap();
        let key = root.public_key().unwrap().public_key_to_der().unwrap();

        assert_eq!(s.classify(&key), IssuerKind::Unknown);

        assert_eq!(s.add_oem_pem(TEST_ROOT_PEM).unwrap(), 1);
        assert_eq!(s.classify(&key), IssuerKind::Oem);

        // already there
        assert_eq!(s.add_oem_pem(TEST_ROOT_PEM).unwrap(), 0);
    }

    #[test]
    fn google_is_never_oem() {
        let mut s = RootKeyStore::new();

        assert!(!s.add_oem_key(&spki(GOOGLE_ROOT_PUBLIC_KEY)));
        assert_eq!(s.oem_keys(), 0);
    }

    #[test]
    fn bad_pem() {
        let mut s = RootKeyStore::new();

        assert!(s.add_oem_pem(b"garbage").is_err());
    }
}
