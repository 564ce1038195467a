// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::authorization::AuthorizationList;
use super::common::*;
use super::errors::DecodeError;
use super::record::SecurityLevel;
use super::rootoftrust::{eat_boot_state, RootOfTrust};
use bitmask::*;
use ciborium::Value;
use serde::Serialize;

const EAT_CTI_LABEL: i128 = 7;
const EAT_NONCE_LABEL: i128 = -75008;
const EAT_SUBMODS_LABEL: i128 = -76000;
const EAT_SECURITY_LEVEL_LABEL: i128 = -76002;
const EAT_BOOT_STATE_LABEL: i128 = -76003;
const EAT_VERIFIED_BOOT_KEY_LABEL: i128 = -81500;
const EAT_DEVICE_LOCKED_LABEL: i128 = -81501;
const EAT_VERIFIED_BOOT_HASH_LABEL: i128 = -81502;
const EAT_ATTESTATION_VERSION_LABEL: i128 = -81503;
const EAT_KEYMINT_VERSION_LABEL: i128 = -81504;
const EAT_OFFICIAL_BUILD_LABEL: i128 = -81505;

const SUBMOD_SOFTWARE: &str = "software";
const SUBMOD_TEE: &str = "tee";

bitmask! {
    #[derive(Debug)]
    mask ClaimsSet: u16 where flags Claims {
        Cti                = 0x0001,
        Nonce              = 0x0002,
        Submods            = 0x0004,
        SecurityLevel      = 0x0008,
        BootState          = 0x0010,
        VerifiedBootKey    = 0x0020,
        DeviceLocked       = 0x0040,
        VerifiedBootHash   = 0x0080,
        AttestationVersion = 0x0100,
        KeymintVersion     = 0x0200,
        OfficialBuild      = 0x0400,
    }
}

/// Attestation carried as an Entity Attestation Token claims-set.  The key
/// properties live in the `software` and `tee` submodules, the boot state in
/// top level claims.
#[serde_with::serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EatRecord {
    pub attestation_version: Option<i64>,
    pub keymint_version: Option<i64>,
    pub keymint_security_level: SecurityLevel,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub challenge: Vec<u8>,
    #[serde_as(as = "Option<serde_with::hex::Hex>")]
    pub unique_id: Option<Vec<u8>>,
    pub software_enforced: AuthorizationList,
    pub hardware_enforced: AuthorizationList,
    pub boot_state: Option<Vec<bool>>,
    pub official_build: bool,
    pub root_of_trust: Option<RootOfTrust>,

    #[serde(skip)]
    verified_boot_key: Option<Vec<u8>>,
    #[serde(skip)]
    device_locked: Option<bool>,
    #[serde(skip)]
    verified_boot_hash: Option<Vec<u8>>,
}

impl EatRecord {
    pub fn new() -> Self {
        Default::default()
    }

    /// Decode the CBOR encoded contents of the EAT attestation extension
    pub fn decode(buf: &[u8]) -> Result<EatRecord, DecodeError> {
        let v = parse_cbor(buf, "eat")?;

        let mut r = EatRecord::new();
        let mut claims_set = ClaimsSet::none();

        r.parse(to_map(&v, "eat")?, &mut claims_set)?;

        r.validate(&claims_set)?;

        r.root_of_trust = r.derive_root_of_trust(&claims_set)?;

        Ok(r)
    }

    /// The security level of the submodule that describes the key: the TEE
    /// one if it declares an algorithm, else the software one, else `None`.
    pub fn attestation_security_level(&self) -> Option<SecurityLevel> {
        if self.hardware_enforced.algorithm.is_some() {
            self.hardware_enforced.security_level
        } else if self.software_enforced.algorithm.is_some() {
            self.software_enforced.security_level
        } else {
            None
        }
    }

    fn parse(
        &mut self,
        contents: &[(Value, Value)],
        cs: &mut ClaimsSet,
    ) -> Result<(), DecodeError> {
        for (k, v) in contents.iter() {
            let k = to_int(k, "eat claim key")?;

            let (claim, name) = match k {
                EAT_CTI_LABEL => (Claims::Cti, "cti"),
                EAT_NONCE_LABEL => (Claims::Nonce, "nonce"),
                EAT_SUBMODS_LABEL => (Claims::Submods, "submods"),
                EAT_SECURITY_LEVEL_LABEL => (Claims::SecurityLevel, "security-level"),
                EAT_BOOT_STATE_LABEL => (Claims::BootState, "boot-state"),
                EAT_VERIFIED_BOOT_KEY_LABEL => (Claims::VerifiedBootKey, "verified-boot-key"),
                EAT_DEVICE_LOCKED_LABEL => (Claims::DeviceLocked, "device-locked"),
                EAT_VERIFIED_BOOT_HASH_LABEL => (Claims::VerifiedBootHash, "verified-boot-hash"),
                EAT_ATTESTATION_VERSION_LABEL => {
                    (Claims::AttestationVersion, "attestation-version")
                }
                EAT_KEYMINT_VERSION_LABEL => (Claims::KeymintVersion, "keymint-version"),
                EAT_OFFICIAL_BUILD_LABEL => (Claims::OfficialBuild, "official-build"),
                _ => return Err(DecodeError::UnknownTag(format!("{k} in eat"))),
            };

            if cs.contains(claim) {
                return Err(DecodeError::DuplicatedTag(name.to_string()));
            }

            match claim {
                Claims::Cti => self.unique_id = Some(to_bstr(v, name)?),
                Claims::Nonce => self.challenge = to_bstr(v, name)?,
                Claims::Submods => self.set_submods(v)?,
                Claims::SecurityLevel => {
                    self.keymint_security_level = SecurityLevel::from_eat(v.int(name)?)?
                }
                Claims::BootState => {
                    self.boot_state = Some(
                        to_array(v, name)?
                            .iter()
                            .map(|b| to_bool(b, name))
                            .collect::<Result<_, _>>()?,
                    )
                }
                Claims::VerifiedBootKey => self.verified_boot_key = Some(to_bstr(v, name)?),
                Claims::DeviceLocked => self.device_locked = Some(to_bool(v, name)?),
                Claims::VerifiedBootHash => self.verified_boot_hash = Some(to_bstr(v, name)?),
                Claims::AttestationVersion => self.attestation_version = Some(v.int(name)?),
                Claims::KeymintVersion => self.keymint_version = Some(v.int(name)?),
                Claims::OfficialBuild => self.official_build = to_bool(v, name)?,
            }

            cs.set(claim);
        }

        Ok(())
    }

    fn set_submods(&mut self, v: &Value) -> Result<(), DecodeError> {
        let mut software = None;
        let mut tee = None;

        for (k, v) in to_map(v, "submods")? {
            let slot = match to_tstr(k, "submod name")?.as_str() {
                SUBMOD_SOFTWARE => &mut software,
                SUBMOD_TEE => &mut tee,
                x => return Err(DecodeError::UnknownTag(format!("submod {x}"))),
            };

            if slot.is_some() {
                return Err(DecodeError::DuplicatedTag(format!("submod {k:?}")));
            }

            *slot = Some(AuthorizationList::from_cbor(v)?);
        }

        self.software_enforced = software.unwrap_or_default();
        self.hardware_enforced = tee.unwrap_or_default();

        Ok(())
    }

    fn validate(&self, cs: &ClaimsSet) -> Result<(), DecodeError> {
        let mandatory_claims = [
            (Claims::Nonce, "nonce"),
            (Claims::SecurityLevel, "security-level"),
        ];

        for (c, n) in mandatory_claims.iter() {
            if !cs.contains(*c) {
                return Err(DecodeError::Malformed(format!("eat: missing claim {n}")));
            }
        }

        Ok(())
    }

    // Only a boot state vector makes the root of trust meaningful; key and
    // lock state must then accompany it.
    fn derive_root_of_trust(&self, cs: &ClaimsSet) -> Result<Option<RootOfTrust>, DecodeError> {
        let Some(boot_state) = &self.boot_state else {
            return Ok(None);
        };

        let state = eat_boot_state(boot_state, self.official_build)?;

        for (c, n) in [
            (Claims::VerifiedBootKey, "verified-boot-key"),
            (Claims::DeviceLocked, "device-locked"),
        ] {
            if !cs.contains(c) {
                return Err(DecodeError::Malformed(format!(
                    "root-of-trust: missing claim {n}"
                )));
            }
        }

        Ok(Some(RootOfTrust {
            verified_boot_key: self.verified_boot_key.clone().unwrap_or_default(),
            device_locked: self.device_locked.unwrap_or_default(),
            verified_boot_state: state,
            verified_boot_hash: self.verified_boot_hash.clone(),
        }))
    }
}
