// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

//! KeyMint authorization tags.  The ASN.1 encoding uses the tag number as
//! an EXPLICIT context-specific tag, the EAT encoding uses it as an offset
//! below [`EAT_PRIVATE_BASE`].

/// EAT claim keys of authorization tags are `EAT_PRIVATE_BASE - tag`.
pub const EAT_PRIVATE_BASE: i128 = -80000;

macro_rules! authorization_tags {
    ($($name:ident = $num:literal => $label:literal,)*) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Tag {
            $($name,)*
        }

        impl Tag {
            pub fn number(self) -> u32 {
                match self {
                    $(Tag::$name => $num,)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Tag::$name => $label,)*
                }
            }

            pub fn from_number(n: u32) -> Option<Tag> {
                match n {
                    $($num => Some(Tag::$name),)*
                    _ => None,
                }
            }
        }
    };
}

authorization_tags! {
    Purpose = 1 => "purpose",
    Algorithm = 2 => "algorithm",
    KeySize = 3 => "key-size",
    Digest = 5 => "digest",
    Padding = 6 => "padding",
    EcCurve = 10 => "ec-curve",
    RsaPublicExponent = 200 => "rsa-public-exponent",
    MgfDigest = 203 => "rsa-oaep-mgf-digest",
    RollbackResistance = 303 => "rollback-resistance",
    EarlyBootOnly = 305 => "early-boot-only",
    ActiveDateTime = 400 => "active-date-time",
    OriginationExpireDateTime = 401 => "origination-expire-date-time",
    UsageExpireDateTime = 402 => "usage-expire-date-time",
    UsageCountLimit = 405 => "usage-count-limit",
    NoAuthRequired = 503 => "no-auth-required",
    UserAuthType = 504 => "user-auth-type",
    AuthTimeout = 505 => "auth-timeout",
    AllowWhileOnBody = 506 => "allow-while-on-body",
    TrustedUserPresenceRequired = 507 => "trusted-user-presence-required",
    TrustedConfirmationRequired = 508 => "trusted-confirmation-required",
    UnlockedDeviceRequired = 509 => "unlocked-device-required",
    AllApplications = 600 => "all-applications",
    ApplicationId = 601 => "application-id",
    CreationDateTime = 701 => "creation-date-time",
    Origin = 702 => "origin",
    RollbackResistant = 703 => "rollback-resistant",
    RootOfTrust = 704 => "root-of-trust",
    OsVersion = 705 => "os-version",
    OsPatchLevel = 706 => "os-patch-level",
    AttestationApplicationId = 709 => "attestation-application-id",
    AttestationIdBrand = 710 => "attestation-id-brand",
    AttestationIdDevice = 711 => "attestation-id-device",
    AttestationIdProduct = 712 => "attestation-id-product",
    AttestationIdSerial = 713 => "attestation-id-serial",
    AttestationIdImei = 714 => "attestation-id-imei",
    AttestationIdMeid = 715 => "attestation-id-meid",
    AttestationIdManufacturer = 716 => "attestation-id-manufacturer",
    AttestationIdModel = 717 => "attestation-id-model",
    VendorPatchLevel = 718 => "vendor-patch-level",
    BootPatchLevel = 719 => "boot-patch-level",
    DeviceUniqueAttestation = 720 => "device-unique-attestation",
    AttestationIdSecondImei = 723 => "attestation-id-second-imei",
    ModuleHash = 724 => "module-hash",
}

impl Tag {
    pub fn eat_claim(self) -> i128 {
        EAT_PRIVATE_BASE - i128::from(self.number())
    }

    pub fn from_eat_claim(k: i128) -> Option<Tag> {
        u32::try_from(EAT_PRIVATE_BASE - k)
            .ok()
            .and_then(Tag::from_number)
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.number())
    }
}
