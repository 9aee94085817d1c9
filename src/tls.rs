//! Certificates for the HTTPS mock provider.
//!
//! Every HTTPS mock provider gets its own throwaway root CA, plus a server certificate for
//! `localhost` and `127.0.0.1` signed by it. Clients trust the root via
//! [`MockServerConfig::tls`](crate::MockServerConfig).
//!
//! Based on https://github.com/rustls/rustls/blob/main/rustls/examples/internal/test_ca.rs
use std::{
    fmt::Display,
    net::{IpAddr, Ipv4Addr},
    sync::atomic::{AtomicU64, Ordering},
};

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, ExtendedKeyUsagePurpose,
    Ia5String, IsCa, KeyPair, KeyUsagePurpose, SanType, SerialNumber, SignatureAlgorithm,
    PKCS_ED25519,
};

use crate::transport::TlsMaterial;

pub const DEFAULT_ALGORITHM: &SignatureAlgorithm = &PKCS_ED25519;

const ISSUER_KEY_USAGES: &[KeyUsagePurpose; 7] = &[
    KeyUsagePurpose::CrlSign,
    KeyUsagePurpose::KeyCertSign,
    KeyUsagePurpose::DigitalSignature,
    KeyUsagePurpose::ContentCommitment,
    KeyUsagePurpose::KeyEncipherment,
    KeyUsagePurpose::DataEncipherment,
    KeyUsagePurpose::KeyAgreement,
];

const ISSUER_EXTENDED_KEY_USAGES: &[ExtendedKeyUsagePurpose; 2] = &[
    ExtendedKeyUsagePurpose::ServerAuth,
    ExtendedKeyUsagePurpose::ClientAuth,
];

const EE_KEY_USAGES: &[KeyUsagePurpose; 2] = &[
    KeyUsagePurpose::DigitalSignature,
    KeyUsagePurpose::ContentCommitment,
];

static SERIAL_NUMBER: AtomicU64 = AtomicU64::new(1);

pub struct MockTlsCertificates {
    root_cert: Certificate,
    server_cert: Certificate,
    server_key: KeyPair,
}

impl MockTlsCertificates {
    /// Creates an instance with "localhost" and "127.0.0.1" as hostnames.
    pub fn generate() -> Result<Self, rcgen::Error> {
        Self::with_hostnames(default_hostnames()?)
    }

    /// Creates an instance with custom hostnames and IPs.
    pub fn with_hostnames(hostnames: impl Into<Vec<SanType>>) -> Result<Self, rcgen::Error> {
        let (root_cert, root_key) = gen_root_cert(DEFAULT_ALGORITHM)?;
        // We do not bother to have an intermediate certificate because CAs use them for flexibility only.
        let (server_cert, server_key) =
            gen_server_cert(&root_cert, &root_key, DEFAULT_ALGORITHM, hostnames.into())?;

        Ok(Self {
            root_cert,
            server_cert,
            server_key,
        })
    }

    pub fn root_cert(&self) -> &Certificate {
        &self.root_cert
    }

    pub fn server_cert_der(&self) -> Vec<u8> {
        self.server_cert.der().to_vec()
    }

    pub fn server_private_key_der(&self) -> Vec<u8> {
        self.server_key.serialize_der()
    }

    /// What a client needs to trust the mock provider.
    pub fn material(&self) -> TlsMaterial {
        TlsMaterial {
            root_cert_der: self.root_cert.der().to_vec(),
            root_cert_pem: self.root_cert.pem(),
        }
    }
}

// The methods are not const, so we use a function.
fn default_hostnames() -> Result<Vec<SanType>, rcgen::Error> {
    Ok(vec![
        SanType::DnsName(Ia5String::try_from("localhost".to_string())?),
        SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)),
    ])
}

fn gen_root_cert(alg: &'static SignatureAlgorithm) -> Result<(Certificate, KeyPair), rcgen::Error> {
    let keypair = KeyPair::generate_for(alg)?;
    let serial = SERIAL_NUMBER.fetch_add(1, Ordering::SeqCst);

    let mut params = CertificateParams::default();
    params.distinguished_name = common_name(format!("Test-only pact provider root CA #{serial}"));
    params.use_authority_key_identifier_extension = true;
    params.serial_number = Some(SerialNumber::from_slice(&serial.to_be_bytes()[..]));

    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = ISSUER_KEY_USAGES.to_vec();
    params.extended_key_usages = ISSUER_EXTENDED_KEY_USAGES.to_vec();

    let cert = params.self_signed(&keypair)?;
    Ok((cert, keypair))
}

fn gen_server_cert(
    signer_cert: &Certificate,
    signer_key: &KeyPair,
    alg: &'static SignatureAlgorithm,
    hostnames: Vec<SanType>,
) -> Result<(Certificate, KeyPair), rcgen::Error> {
    let keypair = KeyPair::generate_for(alg)?;
    let serial = SERIAL_NUMBER.fetch_add(1, Ordering::SeqCst);

    let mut params = CertificateParams::default();
    params.distinguished_name = common_name(format!("Test-only pact provider #{serial}"));
    params.use_authority_key_identifier_extension = true;
    params.serial_number = Some(SerialNumber::from_slice(&serial.to_be_bytes()[..]));
    params.is_ca = IsCa::NoCa;
    params.key_usages = EE_KEY_USAGES.to_vec();
    params.subject_alt_names = hostnames;

    let cert = params.signed_by(&keypair, signer_cert, signer_key)?;
    Ok((cert, keypair))
}

fn common_name(name: impl Display) -> DistinguishedName {
    let mut distinguished_name = DistinguishedName::new();
    distinguished_name.push(rcgen::DnType::CommonName, name.to_string());
    distinguished_name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_root_is_exposed_in_both_encodings() {
        let certificates = MockTlsCertificates::generate().unwrap();
        let material = certificates.material();

        assert!(!material.root_cert_der.is_empty());
        assert!(material.root_cert_pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert_ne!(material.root_cert_der, certificates.server_cert_der());
    }
}
