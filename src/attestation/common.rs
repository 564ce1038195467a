// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::appid::AttestationApplicationId;
use super::errors::DecodeError;
use super::rootoftrust::RootOfTrust;
use chrono::{DateTime, Utc};
use ciborium::Value;
use std::collections::BTreeSet;
use x509_parser::der_parser::ber::{parse_ber, BerObject, BerObjectContent};

/// Parse exactly one BER/DER object spanning the whole of `buf`.
pub fn parse_asn1<'a>(buf: &'a [u8], n: &str) -> Result<BerObject<'a>, DecodeError> {
    let (rem, obj) = parse_ber(buf).map_err(|e| DecodeError::Syntax(format!("{n}: {e:?}")))?;

    if !rem.is_empty() {
        return Err(DecodeError::Malformed(format!(
            "{n}: {} trailing bytes",
            rem.len()
        )));
    }

    Ok(obj)
}

/// Decode a CBOR data item spanning the whole of `buf`.
pub fn parse_cbor(buf: &[u8], n: &str) -> Result<Value, DecodeError> {
    let mut rd = buf;

    let v: Value =
        ciborium::de::from_reader(&mut rd).map_err(|e| DecodeError::Syntax(format!("{n}: {e}")))?;

    if !rd.is_empty() {
        return Err(DecodeError::Malformed(format!(
            "{n}: {} trailing bytes",
            rd.len()
        )));
    }

    Ok(v)
}

pub fn asn1_sequence<'a, 'b>(
    obj: &'b BerObject<'a>,
    n: &str,
) -> Result<&'b [BerObject<'a>], DecodeError> {
    match &obj.content {
        BerObjectContent::Sequence(v) => Ok(v),
        _ => Err(DecodeError::TypeMismatch(format!(
            "{n} MUST be SEQUENCE, got {:?}",
            obj.header.tag()
        ))),
    }
}

pub fn asn1_set<'a, 'b>(
    obj: &'b BerObject<'a>,
    n: &str,
) -> Result<&'b [BerObject<'a>], DecodeError> {
    match &obj.content {
        BerObjectContent::Set(v) => Ok(v),
        _ => Err(DecodeError::TypeMismatch(format!(
            "{n} MUST be SET, got {:?}",
            obj.header.tag()
        ))),
    }
}

/// Tag number of a context-specific element, `None` for any other class.
pub fn asn1_context_tag(obj: &BerObject) -> Option<u32> {
    if obj.header.is_contextspecific() {
        Some(obj.header.tag().0)
    } else {
        None
    }
}

/// Unwrap an EXPLICIT context-specific element and return what it wraps.
pub fn asn1_explicit<'a>(obj: &BerObject<'a>, n: &str) -> Result<BerObject<'a>, DecodeError> {
    let inner = obj
        .content
        .as_slice()
        .map_err(|e| DecodeError::TypeMismatch(format!("{n}: explicit tag: {e:?}")))?;

    parse_asn1(inner, n)
}

pub fn asn1_to_int(obj: &BerObject, n: &str) -> Result<i64, DecodeError> {
    let x = match &obj.content {
        BerObjectContent::Integer(b) => be_to_i128(b, n)?,
        BerObjectContent::Enum(e) => i128::from(*e),
        _ => {
            return Err(DecodeError::TypeMismatch(format!(
                "{n} MUST be INTEGER or ENUMERATED, got {:?}",
                obj.header.tag()
            )))
        }
    };

    i64::try_from(x).map_err(|_| DecodeError::TypeMismatch(format!("{n}: {x} out of range")))
}

pub fn asn1_to_uint(obj: &BerObject, n: &str) -> Result<u64, DecodeError> {
    match &obj.content {
        BerObjectContent::Integer(b) => {
            let x = be_to_i128(b, n)?;
            u64::try_from(x)
                .map_err(|_| DecodeError::TypeMismatch(format!("{n}: {x} out of range")))
        }
        _ => asn1_to_int(obj, n).and_then(|x| {
            u64::try_from(x)
                .map_err(|_| DecodeError::TypeMismatch(format!("{n}: {x} out of range")))
        }),
    }
}

pub fn asn1_to_bool(obj: &BerObject, n: &str) -> Result<bool, DecodeError> {
    match &obj.content {
        BerObjectContent::Boolean(b) => Ok(*b),
        _ => Err(DecodeError::TypeMismatch(format!(
            "{n} MUST be BOOLEAN, got {:?}",
            obj.header.tag()
        ))),
    }
}

pub fn asn1_to_bstr(obj: &BerObject, n: &str) -> Result<Vec<u8>, DecodeError> {
    match &obj.content {
        BerObjectContent::OctetString(b) => Ok(b.to_vec()),
        _ => Err(DecodeError::TypeMismatch(format!(
            "{n} MUST be OCTET STRING, got {:?}",
            obj.header.tag()
        ))),
    }
}

/// Any of the ASN.1 character string types.
pub fn asn1_to_string(obj: &BerObject, n: &str) -> Result<String, DecodeError> {
    obj.as_str().map(|s| s.to_string()).map_err(|_| {
        DecodeError::TypeMismatch(format!(
            "{n} MUST be a character string, got {:?}",
            obj.header.tag()
        ))
    })
}

// two's complement, big endian
fn be_to_i128(b: &[u8], n: &str) -> Result<i128, DecodeError> {
    if b.is_empty() || b.len() > 16 {
        return Err(DecodeError::Malformed(format!(
            "{n}: integer of {} bytes",
            b.len()
        )));
    }

    let mut x: i128 = if b[0] & 0x80 != 0 { -1 } else { 0 };

    for byte in b {
        x = (x << 8) | i128::from(*byte);
    }

    Ok(x)
}

pub fn to_int(v: &Value, n: &str) -> Result<i128, DecodeError> {
    if let Value::Integer(i) = v {
        Ok((*i).into())
    } else {
        Err(DecodeError::TypeMismatch(format!("{n} MUST be integer")))
    }
}

pub fn to_bstr(v: &Value, n: &str) -> Result<Vec<u8>, DecodeError> {
    match v {
        Value::Bytes(b) => Ok(b.clone()),
        _ => Err(DecodeError::TypeMismatch(format!("{n} MUST be bstr"))),
    }
}

pub fn to_tstr(v: &Value, n: &str) -> Result<String, DecodeError> {
    match v {
        Value::Text(s) => Ok(s.clone()),
        _ => Err(DecodeError::TypeMismatch(format!("{n} MUST be tstr"))),
    }
}

pub fn to_bool(v: &Value, n: &str) -> Result<bool, DecodeError> {
    match v {
        Value::Bool(b) => Ok(*b),
        _ => Err(DecodeError::TypeMismatch(format!("{n} MUST be bool"))),
    }
}

pub fn to_array<'a>(v: &'a Value, n: &str) -> Result<&'a Vec<Value>, DecodeError> {
    v.as_array()
        .ok_or_else(|| DecodeError::TypeMismatch(format!("{n} MUST be array")))
}

pub fn to_map<'a>(v: &'a Value, n: &str) -> Result<&'a Vec<(Value, Value)>, DecodeError> {
    v.as_map()
        .ok_or_else(|| DecodeError::TypeMismatch(format!("{n} MUST be map")))
}

fn millis_to_date(ms: i64, n: &str) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| DecodeError::TypeMismatch(format!("{n}: {ms} is not a valid date")))
}

/// A tagged value of an authorization list, regardless of the wire encoding
/// it was carried in.
pub trait ClaimValue {
    fn int(&self, n: &str) -> Result<i64, DecodeError>;

    fn uint(&self, n: &str) -> Result<u64, DecodeError>;

    fn int_set(&self, n: &str) -> Result<BTreeSet<i64>, DecodeError>;

    fn bytes(&self, n: &str) -> Result<Vec<u8>, DecodeError>;

    /// ASN.1 carries the root of trust inline, CBOR wraps its DER encoding
    /// in a bstr.
    fn root_of_trust(&self, n: &str) -> Result<RootOfTrust, DecodeError>;

    /// Both encodings wrap the DER encoding in a byte string.
    fn application_id(&self, n: &str) -> Result<AttestationApplicationId, DecodeError> {
        AttestationApplicationId::decode(&self.bytes(n)?)
    }

    /// Milliseconds since the epoch.
    fn date(&self, n: &str) -> Result<DateTime<Utc>, DecodeError> {
        millis_to_date(self.int(n)?, n)
    }

    /// Text carried as (assumed UTF-8) bytes.
    fn text(&self, n: &str) -> Result<String, DecodeError> {
        Ok(String::from_utf8_lossy(&self.bytes(n)?).into_owned())
    }
}

impl ClaimValue for BerObject<'_> {
    fn int(&self, n: &str) -> Result<i64, DecodeError> {
        asn1_to_int(self, n)
    }

    fn uint(&self, n: &str) -> Result<u64, DecodeError> {
        asn1_to_uint(self, n)
    }

    fn int_set(&self, n: &str) -> Result<BTreeSet<i64>, DecodeError> {
        asn1_set(self, n)?
            .iter()
            .map(|x| asn1_to_int(x, n))
            .collect()
    }

    fn bytes(&self, n: &str) -> Result<Vec<u8>, DecodeError> {
        asn1_to_bstr(self, n)
    }

    fn root_of_trust(&self, _n: &str) -> Result<RootOfTrust, DecodeError> {
        RootOfTrust::from_asn1(self)
    }
}

impl ClaimValue for Value {
    fn int(&self, n: &str) -> Result<i64, DecodeError> {
        let x = to_int(self, n)?;

        i64::try_from(x).map_err(|_| DecodeError::TypeMismatch(format!("{n}: {x} out of range")))
    }

    fn uint(&self, n: &str) -> Result<u64, DecodeError> {
        let x = to_int(self, n)?;

        u64::try_from(x).map_err(|_| DecodeError::TypeMismatch(format!("{n}: {x} out of range")))
    }

    fn int_set(&self, n: &str) -> Result<BTreeSet<i64>, DecodeError> {
        to_array(self, n)?.iter().map(|x| x.int(n)).collect()
    }

    fn bytes(&self, n: &str) -> Result<Vec<u8>, DecodeError> {
        to_bstr(self, n)
    }

    fn root_of_trust(&self, n: &str) -> Result<RootOfTrust, DecodeError> {
        RootOfTrust::decode(&to_bstr(self, n)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn negative_and_wide_integers() {
        let buf = hex!("0201ff");
        let obj = parse_asn1(&buf, "int").unwrap();
        assert_eq!(asn1_to_int(&obj, "int").unwrap(), -1);
        assert!(asn1_to_uint(&obj, "int").is_err());

        // 2^63 needs a leading zero octet
        let buf = hex!("0209008000000000000000");
        let obj = parse_asn1(&buf, "int").unwrap();
        assert_eq!(asn1_to_uint(&obj, "int").unwrap(), 1u64 << 63);
        assert!(matches!(
            asn1_to_int(&obj, "int"),
            Err(DecodeError::TypeMismatch(_))
        ));
    }

    #[test]
    fn enumerated_is_an_integer() {
        let buf = hex!("0a0102");
        let obj = parse_asn1(&buf, "enum").unwrap();
        assert_eq!(obj.int("enum").unwrap(), 2);
    }

    #[test]
    fn trailing_bytes() {
        let buf = hex!("02010100");
        assert!(matches!(
            parse_asn1(&buf, "int"),
            Err(DecodeError::Malformed(_))
        ));

        let buf = hex!("0100");
        assert!(matches!(
            parse_cbor(&buf, "int"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn truncated() {
        let buf = hex!("0405aabb");
        assert!(matches!(
            parse_asn1(&buf, "octets"),
            Err(DecodeError::Syntax(_))
        ));
    }

    #[test]
    fn sets_both_encodings() {
        let buf = hex!("3106020102020103");
        let obj = parse_asn1(&buf, "set").unwrap();
        let want: BTreeSet<i64> = [2, 3].into_iter().collect();
        assert_eq!(obj.int_set("set").unwrap(), want);

        let v = Value::Array(vec![Value::from(3), Value::from(2)]);
        assert_eq!(v.int_set("set").unwrap(), want);

        let v = Value::Array(vec![Value::from("x")]);
        assert!(v.int_set("set").is_err());
    }

    #[test]
    fn dates_are_millis() {
        let v = Value::from(1704067200000u64);
        let d = v.date("creation").unwrap();
        assert_eq!(d.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn explicit_tag_unwrapping() {
        // [705] { INTEGER 140000 }
        let buf = hex!("bf85410502030222e0");
        let obj = parse_asn1(&buf, "os-version").unwrap();
        assert_eq!(asn1_context_tag(&obj), Some(705));

        let inner = asn1_explicit(&obj, "os-version").unwrap();
        assert_eq!(inner.int("os-version").unwrap(), 140000);
    }
}
