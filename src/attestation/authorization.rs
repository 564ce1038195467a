// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::appid::AttestationApplicationId;
use super::common::*;
use super::errors::DecodeError;
use super::record::SecurityLevel;
use super::rootoftrust::RootOfTrust;
use super::tags::Tag;
use chrono::{DateTime, Utc};
use ciborium::Value;
use serde::Serialize;
use std::collections::BTreeSet;
use x509_parser::der_parser::ber::BerObject;

/// EAT submodules carry their own security level next to the tags.
pub(crate) const EAT_SECURITY_LEVEL_LABEL: i128 = -76002;

/// The set of key properties enforced by one layer (software or secure
/// hardware).  Every field is independently optional; flags encoded by
/// presence alone are plain `bool`s.
#[serde_with::serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AuthorizationList {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_level: Option<SecurityLevel>,
    pub purposes: Option<BTreeSet<i64>>,
    pub algorithm: Option<i64>,
    pub key_size: Option<i64>,
    pub digests: Option<BTreeSet<i64>>,
    pub paddings: Option<BTreeSet<i64>>,
    pub ec_curve: Option<i64>,
    pub rsa_public_exponent: Option<u64>,
    pub mgf_digests: Option<BTreeSet<i64>>,
    pub rollback_resistance: bool,
    pub early_boot_only: bool,
    pub active_date_time: Option<DateTime<Utc>>,
    pub origination_expire_date_time: Option<DateTime<Utc>>,
    pub usage_expire_date_time: Option<DateTime<Utc>>,
    pub usage_count_limit: Option<i64>,
    pub no_auth_required: bool,
    pub user_auth_type: Option<i64>,
    pub auth_timeout: Option<i64>,
    pub allow_while_on_body: bool,
    pub trusted_user_presence_required: bool,
    pub trusted_confirmation_required: bool,
    pub unlocked_device_required: bool,
    pub all_applications: bool,
    #[serde_as(as = "Option<serde_with::hex::Hex>")]
    pub application_id: Option<Vec<u8>>,
    pub creation_date_time: Option<DateTime<Utc>>,
    pub origin: Option<i64>,
    pub rollback_resistant: bool,
    pub root_of_trust: Option<RootOfTrust>,
    pub os_version: Option<i64>,
    pub os_patch_level: Option<i64>,
    pub attestation_application_id: Option<AttestationApplicationId>,
    pub brand: Option<String>,
    pub device: Option<String>,
    pub product: Option<String>,
    pub serial: Option<String>,
    pub imei: Option<String>,
    pub meid: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub vendor_patch_level: Option<i64>,
    pub boot_patch_level: Option<i64>,
    pub device_unique_attestation: bool,
    pub second_imei: Option<String>,
    #[serde_as(as = "Option<serde_with::hex::Hex>")]
    pub module_hash: Option<Vec<u8>>,
}

impl AuthorizationList {
    pub fn new() -> Self {
        Default::default()
    }

    /// Decode a DER encoded AuthorizationList SEQUENCE
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let obj = parse_asn1(buf, "authorization-list")?;

        Self::from_asn1(&obj)
    }

    pub fn from_asn1(obj: &BerObject) -> Result<Self, DecodeError> {
        let mut al = Self::new();
        let mut seen = BTreeSet::new();

        for e in asn1_sequence(obj, "authorization-list")? {
            let n = asn1_context_tag(e).ok_or_else(|| {
                DecodeError::TypeMismatch(format!(
                    "authorization-list entries MUST be context-specific, got {:?}",
                    e.header.tag()
                ))
            })?;

            let tag = Tag::from_number(n)
                .ok_or_else(|| DecodeError::UnknownTag(format!("{n} in authorization-list")))?;

            let v = asn1_explicit(e, tag.name())?;

            al.set(tag, &v, &mut seen)?;
        }

        Ok(al)
    }

    /// Decode an EAT submodule (a CBOR map keyed by claim number)
    pub fn from_cbor(v: &Value) -> Result<Self, DecodeError> {
        let mut al = Self::new();
        let mut seen = BTreeSet::new();

        for (k, v) in to_map(v, "authorization-list")? {
            let k = to_int(k, "authorization-list key")?;

            if k == EAT_SECURITY_LEVEL_LABEL {
                if al.security_level.is_some() {
                    return Err(DecodeError::DuplicatedTag("security-level".to_string()));
                }
                al.security_level = Some(SecurityLevel::from_eat(v.int("security-level")?)?);
                continue;
            }

            let tag = Tag::from_eat_claim(k)
                .ok_or_else(|| DecodeError::UnknownTag(format!("{k} in authorization-list")))?;

            al.set(tag, v, &mut seen)?;
        }

        Ok(al)
    }

    fn set(
        &mut self,
        tag: Tag,
        v: &impl ClaimValue,
        seen: &mut BTreeSet<Tag>,
    ) -> Result<(), DecodeError> {
        if !seen.insert(tag) {
            return Err(DecodeError::DuplicatedTag(tag.to_string()));
        }

        let n = tag.name();

        match tag {
            Tag::Purpose => self.purposes = Some(v.int_set(n)?),
            Tag::Algorithm => self.algorithm = Some(v.int(n)?),
            Tag::KeySize => self.key_size = Some(v.int(n)?),
            Tag::Digest => self.digests = Some(v.int_set(n)?),
            Tag::Padding => self.paddings = Some(v.int_set(n)?),
            Tag::EcCurve => self.ec_curve = Some(v.int(n)?),
            Tag::RsaPublicExponent => self.rsa_public_exponent = Some(v.uint(n)?),
            Tag::MgfDigest => self.mgf_digests = Some(v.int_set(n)?),
            Tag::RollbackResistance => self.rollback_resistance = true,
            Tag::EarlyBootOnly => self.early_boot_only = true,
            Tag::ActiveDateTime => self.active_date_time = Some(v.date(n)?),
            Tag::OriginationExpireDateTime => self.origination_expire_date_time = Some(v.date(n)?),
            Tag::UsageExpireDateTime => self.usage_expire_date_time = Some(v.date(n)?),
            Tag::UsageCountLimit => self.usage_count_limit = Some(v.int(n)?),
            Tag::NoAuthRequired => self.no_auth_required = true,
            Tag::UserAuthType => self.user_auth_type = Some(v.int(n)?),
            Tag::AuthTimeout => self.auth_timeout = Some(v.int(n)?),
            Tag::AllowWhileOnBody => self.allow_while_on_body = true,
            Tag::TrustedUserPresenceRequired => self.trusted_user_presence_required = true,
            Tag::TrustedConfirmationRequired => self.trusted_confirmation_required = true,
            Tag::UnlockedDeviceRequired => self.unlocked_device_required = true,
            Tag::AllApplications => self.all_applications = true,
            Tag::ApplicationId => self.application_id = Some(v.bytes(n)?),
            Tag::CreationDateTime => self.creation_date_time = Some(v.date(n)?),
            Tag::Origin => self.origin = Some(v.int(n)?),
            Tag::RollbackResistant => self.rollback_resistant = true,
            Tag::RootOfTrust => self.root_of_trust = Some(v.root_of_trust(n)?),
            Tag::OsVersion => self.os_version = Some(v.int(n)?),
            Tag::OsPatchLevel => self.os_patch_level = Some(v.int(n)?),
            Tag::AttestationApplicationId => {
                self.attestation_application_id = Some(v.application_id(n)?)
            }
            Tag::AttestationIdBrand => self.brand = Some(v.text(n)?),
            Tag::AttestationIdDevice => self.device = Some(v.text(n)?),
            Tag::AttestationIdProduct => self.product = Some(v.text(n)?),
            Tag::AttestationIdSerial => self.serial = Some(v.text(n)?),
            Tag::AttestationIdImei => self.imei = Some(v.text(n)?),
            Tag::AttestationIdMeid => self.meid = Some(v.text(n)?),
            Tag::AttestationIdManufacturer => self.manufacturer = Some(v.text(n)?),
            Tag::AttestationIdModel => self.model = Some(v.text(n)?),
            Tag::VendorPatchLevel => self.vendor_patch_level = Some(v.int(n)?),
            Tag::BootPatchLevel => self.boot_patch_level = Some(v.int(n)?),
            Tag::DeviceUniqueAttestation => self.device_unique_attestation = true,
            Tag::AttestationIdSecondImei => self.second_imei = Some(v.text(n)?),
            Tag::ModuleHash => self.module_hash = Some(v.bytes(n)?),
        }

        Ok(())
    }
}
