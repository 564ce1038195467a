// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

extern crate keyattestation;

use keyattestation::attestation::{names, AttestationRecord};
use keyattestation::chain::CertificateChain;
use std::fs;

fn main() {
    leaf_records_decode();
}

fn leaf_records_decode() {
    let files = vec![
        "testdata/chain-standard.der",
        "testdata/chain-eat.der",
        "testdata/chain-knox.der",
    ];

    for f in files {
        let buf = fs::read(f).unwrap_or_else(|_| panic!("loading file {}", f));

        let chain = CertificateChain::from_der(&buf).unwrap();
        let leaf = chain.leaf().unwrap();

        let r = AttestationRecord::from_certificate(leaf.der()).unwrap();

        println!(
            "{}: KeyMint {} at {}",
            f,
            r.keymint_version()
                .map_or("absent".to_string(), names::keymint_version),
            names::security_level(r.keymint_security_level()),
        );
        println!("{:#?}", r.hardware_enforced());
    }
}
