// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

extern crate keyattestation;

use keyattestation::chain::{evaluate, CertificateChain, TrustContext};
use keyattestation::store::{MemoRevocationStore, RootKeyStore};
use std::fs;

fn main() {
    chains_evaluate();
}

fn chains_evaluate() {
    let files = vec![
        "testdata/chain-standard.der",
        "testdata/chain-standard.p7b",
        "testdata/chain-attest-key.der",
    ];

    let mut roots = RootKeyStore::new();
    roots
        .add_oem_pem(&fs::read("testdata/root.pem").unwrap())
        .unwrap();

    let revocation = MemoRevocationStore::new();
    revocation
        .load_json(&fs::read_to_string("testdata/status-revoked.json").unwrap())
        .unwrap();

    let ctx = TrustContext::new(revocation, roots);

    for f in files {
        let buf = fs::read(f).unwrap_or_else(|_| panic!("loading file {}", f));

        let chain = CertificateChain::load(&buf).unwrap();
        let e = evaluate(&chain, &ctx).unwrap();

        println!("{}: {:?}, worst status {:?}", f, e.issuer, e.worst_status());
    }
}
