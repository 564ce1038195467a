// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::common::*;
use super::csr::{device_info_v3, legacy_mac0, legacy_request, v3_request};
use super::device::RemotelyProvisionedComponent;
use super::eek::EekResponse;
use super::errors::ProtocolError;
use base64::{engine::general_purpose, Engine as _};
use ciborium::Value;
use log::{debug, info};
use serde::Serialize;
use std::io::Read;
use std::time::Duration;

pub const DEFAULT_URL: &str = "https://remoteprovisioning.googleapis.com/v1";

const MAX_RESPONSE_SIZE: u64 = 1 << 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RkpConfig {
    /// Base URL the endpoints are appended to
    pub url: String,
    /// Build fingerprint reported to the server
    pub fingerprint: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for RkpConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            fingerprint: String::new(),
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(20),
        }
    }
}

/// A certificate request ready to send, and the device info it carries.
#[serde_with::serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CertificateRequest {
    #[serde_as(as = "serde_with::hex::Hex")]
    pub csr: Vec<u8>,
    /// CBOR DeviceInfo map
    #[serde_as(as = "serde_with::hex::Hex")]
    pub device_info: Vec<u8>,
}

#[serde_with::serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Provisioned {
    /// DER certificates, leaf first
    #[serde_as(as = "serde_with::hex::Hex")]
    pub certificates: Vec<u8>,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub device_info: Vec<u8>,
}

/// One remote key provisioning session.  Every request it makes carries the
/// same random request id.
#[derive(Debug)]
pub struct RkpClient {
    config: RkpConfig,
    agent: ureq::Agent,
    request_id: String,
}

impl RkpClient {
    pub fn new(config: RkpConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout_read(config.read_timeout)
            .build();

        Self {
            config,
            agent,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    fn post(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        body: &[u8],
    ) -> Result<Value, ProtocolError> {
        let url = format!("{}/{endpoint}", self.config.url.trim_end_matches('/'));

        let req = query
            .iter()
            .fold(self.agent.post(&url), |r, (k, v)| r.query(k, v))
            .query("requestId", &self.request_id);

        debug!("POST {url} ({} bytes)", body.len());

        let resp = match req.send_bytes(body) {
            Ok(r) => r,
            Err(ureq::Error::Status(444, _)) => return Err(ProtocolError::NotRegistered),
            Err(ureq::Error::Status(status, r)) => {
                return Err(ProtocolError::Server {
                    status,
                    body: r.into_string().unwrap_or_default(),
                })
            }
            Err(ureq::Error::Transport(t)) => {
                return Err(ProtocolError::Network(format!("{url}: {t}")))
            }
        };

        if resp.status() != 200 {
            return Err(ProtocolError::Server {
                status: resp.status(),
                body: resp.into_string().unwrap_or_default(),
            });
        }

        let mut buf = vec![];
        resp.into_reader()
            .take(MAX_RESPONSE_SIZE)
            .read_to_end(&mut buf)
            .map_err(|e| ProtocolError::Network(format!("{url}: {e}")))?;

        decode(&buf, endpoint)
    }

    /// Ask the server for its endpoint encryption keys and a challenge
    pub fn fetch_eek_chain(&self) -> Result<EekResponse, ProtocolError> {
        let body = encode(&Value::Map(vec![
            (
                Value::Text("fingerprint".to_string()),
                Value::Text(self.config.fingerprint.clone()),
            ),
            (Value::Text("id".to_string()), Value::Integer(0.into())),
        ]))?;

        let resp = self.post(":fetchEekChain", &[], &body)?;

        EekResponse::decode(&encode(&resp)?)
    }

    fn unverified_device_info(&self) -> Value {
        Value::Map(vec![(
            Value::Text("fingerprint".to_string()),
            Value::Text(self.config.fingerprint.clone()),
        )])
    }

    /// Have the device generate a key and a certificate request for it, in
    /// the shape its interface version calls for.
    pub fn generate_csr(
        &self,
        device: &dyn RemotelyProvisionedComponent,
        eek: &EekResponse,
    ) -> Result<CertificateRequest, ProtocolError> {
        let hw = device.hardware_info()?;
        let keys = vec![device.generate_ecdsa_p256_key_pair(false)?];

        debug!("generating a version {} certificate request", hw.version_number);

        if hw.version_number < 3 {
            let chain = eek.eek_chain(hw.supported_eek_curve).ok_or_else(|| {
                ProtocolError::MalformedResponse(format!(
                    "no EEK chain for curve {}",
                    hw.supported_eek_curve
                ))
            })?;

            let req = device.generate_certificate_request(false, &keys, chain, &eek.challenge)?;
            let mac0 = legacy_mac0(&keys[0], &req.keys_to_sign_mac)?;
            let csr = legacy_request(&req, self.unverified_device_info(), &eek.challenge, mac0)?;

            Ok(CertificateRequest {
                csr,
                device_info: req.device_info,
            })
        } else {
            let raw = device.generate_certificate_request_v2(&keys, &eek.challenge)?;
            let csr = decode(&raw, "CSR")?;
            let device_info = encode(&device_info_v3(&csr)?)?;

            Ok(CertificateRequest {
                csr: v3_request(csr, self.unverified_device_info())?,
                device_info,
            })
        }
    }

    /// Generate a certificate request against the test EEK, without talking
    /// to the server
    pub fn local_csr(
        &self,
        device: &dyn RemotelyProvisionedComponent,
    ) -> Result<CertificateRequest, ProtocolError> {
        self.generate_csr(device, &EekResponse::local())
    }

    /// Send the request and return the issued certificates, leaf first
    pub fn sign_certificates(
        &self,
        csr: &[u8],
        challenge: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        let challenge = general_purpose::URL_SAFE.encode(challenge);

        let resp = self.post(":signCertificates", &[("challenge", &challenge)], csr)?;
        let items = to_array(&resp, "signCertificates response")?;

        let shared = to_bstr(nth(items, 0, "signCertificates response")?, "shared certs")?;
        let leaves = to_array(nth(items, 1, "signCertificates response")?, "unique certs")?;
        let leaf = to_bstr(nth(leaves, 0, "unique certs")?, "unique cert")?;

        Ok([leaf.as_slice(), shared.as_slice()].concat())
    }

    /// Fetch the EEK, generate a request and have it signed
    pub fn provision(
        &self,
        device: &dyn RemotelyProvisionedComponent,
    ) -> Result<Provisioned, ProtocolError> {
        let eek = self.fetch_eek_chain()?;
        info!("EEK chains for curves {:?}", eek.chains.keys().collect::<Vec<_>>());
        debug!("challenge {}", hex::encode(&eek.challenge));

        let req = self.generate_csr(device, &eek)?;
        info!("certificate request of {} bytes", req.csr.len());

        let certificates = self.sign_certificates(&req.csr, &eek.challenge)?;
        info!("received {} bytes of certificates", certificates.len());

        Ok(Provisioned {
            certificates,
            device_info: req.device_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rkp::csr::fixtures;
    use crate::rkp::device::{
        HardwareInfo, LegacyCertificateRequest, MacedPublicKey, CURVE_25519,
    };
    use crate::testutil::{closed_port_url, serve, serve_once, split_request};
    use std::cell::RefCell;

    struct FakeDevice {
        version: i32,
        curve: i64,
        eek_chains: RefCell<Vec<Vec<u8>>>,
    }

    impl FakeDevice {
        fn new(version: i32, curve: i64) -> Self {
            Self {
                version,
                curve,
                eek_chains: RefCell::new(vec![]),
            }
        }
    }

    impl RemotelyProvisionedComponent for FakeDevice {
        fn hardware_info(&self) -> Result<HardwareInfo, ProtocolError> {
            Ok(HardwareInfo {
                version_number: self.version,
                rpc_author_name: "Example".to_string(),
                supported_eek_curve: self.curve,
                unique_id: None,
                supported_num_keys_in_csr: 20,
            })
        }

        fn generate_ecdsa_p256_key_pair(
            &self,
            _test_mode: bool,
        ) -> Result<MacedPublicKey, ProtocolError> {
            Ok(fixtures::maced_key())
        }

        fn generate_certificate_request(
            &self,
            _test_mode: bool,
            _keys: &[MacedPublicKey],
            eek_chain: &[u8],
            _challenge: &[u8],
        ) -> Result<LegacyCertificateRequest, ProtocolError> {
            self.eek_chains.borrow_mut().push(eek_chain.to_vec());

            let protected_data = Value::Array(vec![
                Value::Bytes(vec![]),
                Value::Map(vec![]),
                Value::Bytes(vec![0x66; 16]),
                Value::Array(vec![]),
            ]);

            Ok(LegacyCertificateRequest {
                device_info: encode(&fixtures::device_info())?,
                protected_data: encode(&protected_data)?,
                keys_to_sign_mac: vec![0x55; 32],
            })
        }

        fn generate_certificate_request_v2(
            &self,
            _keys: &[MacedPublicKey],
            challenge: &[u8],
        ) -> Result<Vec<u8>, ProtocolError> {
            Ok(fixtures::v3_csr(challenge))
        }
    }

    fn client(url: &str) -> RkpClient {
        RkpClient::new(RkpConfig {
            url: url.to_string(),
            fingerprint: "example/device:14/AP1A/1:user/release-keys".to_string(),
            connect_timeout: Duration::from_millis(500),
            read_timeout: Duration::from_secs(5),
        })
    }

    fn sign_response() -> Vec<u8> {
        // [h'5555', [h'1111']]
        encode(&Value::Array(vec![
            Value::Bytes(vec![0x55, 0x55]),
            Value::Array(vec![Value::Bytes(vec![0x11, 0x11])]),
        ]))
        .unwrap()
    }

    #[test]
    fn sign_certificates_ok() {
        let (url, server) = serve_once(200, sign_response());
        let c = client(&url);

        let certs = c.sign_certificates(b"csr", b"challenge").unwrap();

        assert_eq!(certs, vec![0x11, 0x11, 0x55, 0x55]);

        let (head, body) = split_request(&server.join().unwrap());
        assert!(head.starts_with("POST /:signCertificates?challenge=Y2hhbGxlbmdl&requestId="));
        assert!(head.contains(c.request_id()));
        assert_eq!(body, b"csr");
    }

    #[test]
    fn sign_certificates_not_registered() {
        let (url, server) = serve_once(444, vec![]);

        let e = client(&url).sign_certificates(b"csr", b"challenge").unwrap_err();

        assert_eq!(e, ProtocolError::NotRegistered);
        assert!(!e.is_retryable());
        server.join().unwrap();
    }

    #[test]
    fn server_error_carries_body() {
        let (url, server) = serve_once(500, b"quota exceeded".to_vec());

        let e = client(&url).sign_certificates(b"csr", b"challenge").unwrap_err();

        assert_eq!(
            e,
            ProtocolError::Server {
                status: 500,
                body: "quota exceeded".to_string()
            }
        );
        server.join().unwrap();
    }

    #[test]
    fn malformed_response() {
        let (url, server) = serve_once(200, vec![0x82, 0x01]);

        let e = client(&url).sign_certificates(b"csr", b"challenge").unwrap_err();

        assert!(matches!(e, ProtocolError::MalformedResponse(_)));
        server.join().unwrap();
    }

    #[test]
    fn network_error_is_retryable() {
        let e = client(&closed_port_url()).fetch_eek_chain().unwrap_err();

        assert!(matches!(e, ProtocolError::Network(_)));
        assert!(e.is_retryable());
    }

    #[test]
    fn fetch_eek_chain_ok() {
        let eek = EekResponse::local();
        let (url, server) = serve_once(200, eek.encode().unwrap());

        let got = client(&url).fetch_eek_chain().unwrap();

        assert_eq!(got, eek);

        let (head, body) = split_request(&server.join().unwrap());
        assert!(head.starts_with("POST /:fetchEekChain?requestId="));

        let req = decode(&body, "request").unwrap();
        let m = req.as_map().unwrap();
        assert_eq!(m[0].0, Value::Text("fingerprint".to_string()));
        assert_eq!(
            m[0].1,
            Value::Text("example/device:14/AP1A/1:user/release-keys".to_string())
        );
        assert_eq!(m[1].1, Value::Integer(0.into()));
    }

    #[test]
    fn legacy_csr() {
        let d = FakeDevice::new(2, CURVE_25519);
        let c = client(&closed_port_url());
        let eek = EekResponse::local();

        let req = c.generate_csr(&d, &eek).unwrap();

        assert_eq!(
            d.eek_chains.borrow().as_slice(),
            &[eek.eek_chain(CURVE_25519).unwrap().to_vec()]
        );
        assert_eq!(req.device_info, encode(&fixtures::device_info()).unwrap());

        let csr = decode(&req.csr, "CSR").unwrap();
        let a = csr.as_array().unwrap();
        assert_eq!(a.len(), 4);
        assert_eq!(a[0].as_array().unwrap()[0], fixtures::device_info());
        assert_eq!(a[1], Value::Bytes(eek.challenge.clone()));
        assert_eq!(a[3].as_array().unwrap().len(), 4);
    }

    #[test]
    fn legacy_csr_unsupported_curve() {
        let d = FakeDevice::new(1, 7);

        let e = client(&closed_port_url()).local_csr(&d).unwrap_err();

        assert!(matches!(e, ProtocolError::MalformedResponse(_)));
    }

    #[test]
    fn v3_csr() {
        let d = FakeDevice::new(3, 0);

        let req = client(&closed_port_url()).local_csr(&d).unwrap();

        assert_eq!(req.device_info, encode(&fixtures::device_info()).unwrap());

        let csr = decode(&req.csr, "CSR").unwrap();
        let a = csr.as_array().unwrap();
        assert_eq!(a.len(), 5);
        assert!(a[4].is_map());
    }

    #[test]
    fn provision_full_cycle() {
        let eek = EekResponse::local();
        let (url, server) = serve(vec![
            (200, eek.encode().unwrap()),
            (200, sign_response()),
        ]);
        let c = client(&url);

        let p = c.provision(&FakeDevice::new(3, 0)).unwrap();

        assert_eq!(p.certificates, vec![0x11, 0x11, 0x55, 0x55]);
        assert_eq!(p.device_info, encode(&fixtures::device_info()).unwrap());

        let reqs = server.join().unwrap();
        assert_eq!(reqs.len(), 2);
        for r in &reqs {
            let (head, _) = split_request(r);
            assert!(head.contains(c.request_id()));
        }

        let (head, _) = split_request(&reqs[1]);
        let challenge = general_purpose::URL_SAFE.encode(&eek.challenge);
        assert!(head.contains(&challenge[..8]));
    }
}
