// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::ProtocolError;
use ciborium::Value;

/// Decode a CBOR data item spanning the whole of `buf`
pub fn decode(buf: &[u8], n: &str) -> Result<Value, ProtocolError> {
    let mut rd = buf;

    let v: Value = ciborium::de::from_reader(&mut rd)
        .map_err(|e| ProtocolError::MalformedResponse(format!("{n}: {e}")))?;

    if !rd.is_empty() {
        return Err(ProtocolError::MalformedResponse(format!(
            "{n}: {} trailing bytes",
            rd.len()
        )));
    }

    Ok(v)
}

pub fn encode(v: &Value) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = vec![];

    ciborium::ser::into_writer(v, &mut buf)
        .map_err(|e| ProtocolError::MalformedResponse(format!("encoding CBOR: {e}")))?;

    Ok(buf)
}

pub fn to_array<'a>(v: &'a Value, n: &str) -> Result<&'a Vec<Value>, ProtocolError> {
    v.as_array()
        .ok_or_else(|| ProtocolError::MalformedResponse(format!("{n} MUST be array")))
}

pub fn to_bstr<'a>(v: &'a Value, n: &str) -> Result<&'a Vec<u8>, ProtocolError> {
    v.as_bytes()
        .ok_or_else(|| ProtocolError::MalformedResponse(format!("{n} MUST be bstr")))
}

pub fn to_int(v: &Value, n: &str) -> Result<i64, ProtocolError> {
    v.as_integer()
        .and_then(|i| i64::try_from(i).ok())
        .ok_or_else(|| ProtocolError::MalformedResponse(format!("{n} MUST be int")))
}

/// Element `i` of the array `v`
pub fn nth<'a>(v: &'a [Value], i: usize, n: &str) -> Result<&'a Value, ProtocolError> {
    v.get(i).ok_or_else(|| {
        ProtocolError::MalformedResponse(format!("{n}: expecting at least {} items", i + 1))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn decode_whole_buffer() {
        let v = decode(&hex!("820102"), "test").unwrap();
        assert_eq!(to_array(&v, "test").unwrap().len(), 2);

        assert!(matches!(
            decode(&hex!("82010203"), "test"),
            Err(ProtocolError::MalformedResponse(_))
        ));
        assert!(decode(&hex!("8201"), "test").is_err());
    }

    #[test]
    fn accessors() {
        let v = decode(&hex!("8301420a0b80"), "test").unwrap();
        let a = to_array(&v, "test").unwrap();

        assert_eq!(to_int(nth(a, 0, "test").unwrap(), "int").unwrap(), 1);
        assert_eq!(to_bstr(nth(a, 1, "test").unwrap(), "bstr").unwrap(), &vec![0x0a, 0x0b]);
        assert!(to_bstr(nth(a, 2, "test").unwrap(), "bstr").is_err());
        assert!(nth(a, 3, "test").is_err());
    }
}
