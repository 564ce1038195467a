// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use keyattestation::attestation::names;
use keyattestation::chain::{self, CertificateChain, ChainEvaluation, TrustContext};
use keyattestation::rkp::{EekResponse, RkpClient, RkpConfig, DEFAULT_URL};
use keyattestation::store::{MemoRevocationStore, RootKeyStore, DEFAULT_STATUS_URL};
use log::{info, warn};
use std::error::Error;
use std::fs;

#[derive(Parser)]
#[command(author, version, about = "Android key attestation tool")]
struct Cli {
    /// Log more: `-v` warnings, `-vv` info, `-vvv` debug, `-vvvv` trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    Verify(VerifyArgs),
    FetchEek(FetchEekArgs),
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Evaluate the supplied attestation certificate chain (DER, PEM or \
    PKCS#7) and print the result as JSON")]
struct VerifyArgs {
    #[arg(short, long, default_value = "chain.der")]
    chain: String,

    /// Revocation status list, as published by Google
    #[arg(short, long)]
    revocation: Option<String>,

    /// PEM bundle of additional trusted OEM root certificates
    #[arg(short, long)]
    oem_roots: Option<String>,

    /// Download the current status list, falling back to --revocation
    #[arg(long)]
    fetch_revocation: bool,

    /// Write the chain out as a DER PKCS#7 bundle
    #[arg(long)]
    export: Option<String>,
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Fetch the endpoint encryption key chains and challenge from the \
    remote provisioning server")]
struct FetchEekArgs {
    #[arg(long, default_value = DEFAULT_URL)]
    host: String,

    /// Build fingerprint to report
    #[arg(short, long, default_value = "")]
    fingerprint: String,
}

fn main() {
    let cli = Cli::parse();

    init_logger(cli.verbose);

    match cli.command {
        Command::Verify(args) => match verify(&args) {
            Ok(_) => println!("verification successful"),
            Err(e) => eprintln!("verification failed: {e}"),
        },

        Command::FetchEek(args) => match fetch_eek(&args) {
            Ok(_) => println!("EEK fetch successful"),
            Err(e) => eprintln!("EEK fetch failed: {e}"),
        },
    }
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn verify(args: &VerifyArgs) -> Result<ChainEvaluation, Box<dyn Error>> {
    let c: Vec<u8> = fs::read(&args.chain)?;
    let chain = CertificateChain::load(&c)?;

    let revocation = MemoRevocationStore::new();
    let bundled = args.revocation.as_ref().map(fs::read_to_string).transpose()?;

    if args.fetch_revocation {
        let src = revocation.refresh_or_fallback(DEFAULT_STATUS_URL, bundled.as_deref())?;
        info!("revocation list source: {src:?}");
    } else if let Some(j) = &bundled {
        revocation.load_json(j)?;
    } else {
        warn!("no revocation list, revocation is not checked");
    }

    let mut roots = RootKeyStore::new();
    if let Some(p) = &args.oem_roots {
        let n = roots.add_oem_pem(&fs::read(p)?)?;
        info!("added {n} OEM root keys");
    }

    let ctx = TrustContext::new(revocation, roots);
    let ev = chain::evaluate(&chain, &ctx)?;

    if let Some(p) = &args.export {
        fs::write(p, chain.to_pkcs7()?)?;
    }

    if let Some(r) = &ev.record {
        info!(
            "attestation {} at {}, KeyMint {} at {}",
            r.attestation_version()
                .map_or("absent".to_string(), names::attestation_version),
            r.attestation_security_level()
                .map_or("unknown", names::security_level),
            r.keymint_version()
                .map_or("absent".to_string(), names::keymint_version),
            names::security_level(r.keymint_security_level()),
        );
    }

    println!("{}", serde_json::to_string_pretty(&ev)?);

    Ok(ev)
}

fn fetch_eek(args: &FetchEekArgs) -> Result<EekResponse, Box<dyn Error>> {
    let client = RkpClient::new(RkpConfig {
        url: args.host.clone(),
        fingerprint: args.fingerprint.clone(),
        ..Default::default()
    });

    let eek = client.fetch_eek_chain()?;

    println!("{}", serde_json::to_string_pretty(&eek)?);

    Ok(eek)
}
