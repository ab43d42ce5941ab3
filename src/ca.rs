//! Key generation and certificate issuance.

use crate::crypto::{CryptoProvider, KeyPair};
use crate::entity::{CertificateParts, ZkPkiCertificate};
use crate::error::{Error, Result};
use crate::types::{
    CertificateOptions, ExtendedKeyUsage, KeyAlgorithm, KeySpec, KeyUsage, KeyUsages,
    STARTING_SERIAL_NUMBER,
};
use crate::x509::build_certificate;
use std::sync::Arc;
use tracing::info;

/// Key usages every root CA carries.
pub fn ca_key_usages() -> KeyUsages {
    KeyUsage::KeySignCert | KeyUsage::CrlSign
}

/// Extended key usages every root CA carries, in extension order.
pub const CA_EXTENDED_KEY_USAGES: [ExtendedKeyUsage; 5] = [
    ExtendedKeyUsage::MsCertificateTrustListSigning,
    ExtendedKeyUsage::ServerAuthentication,
    ExtendedKeyUsage::ClientAuthentication,
    ExtendedKeyUsage::OcspSigning,
    ExtendedKeyUsage::TimeStamping,
];

/// Builds keys and certificates through an injected [`CryptoProvider`].
#[derive(Debug, Clone)]
pub struct CertificateFactory {
    provider: Arc<dyn CryptoProvider>,
}

impl CertificateFactory {
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &dyn CryptoProvider {
        self.provider.as_ref()
    }

    pub fn generate_key_pair(&self, spec: &KeySpec) -> Result<KeyPair> {
        self.provider.generate_key_pair(spec)
    }

    /// Self-signed root CA with serial [`STARTING_SERIAL_NUMBER`].
    pub fn create_certificate_authority(
        &self,
        dn: &str,
        lifetime_days: u32,
        spec: &KeySpec,
    ) -> Result<ZkPkiCertificate> {
        let options = CertificateOptions::new(STARTING_SERIAL_NUMBER, dn, dn, lifetime_days)
            .with_ca(None)
            .with_key_usages(ca_key_usages(), false)
            .with_extended_key_usages(CA_EXTENDED_KEY_USAGES, false);
        options.validate()?;

        let key = self.generate_key_pair(spec)?;
        let certificate = build_certificate(self.provider(), &key, key.public_key_der(), &options)?;
        let ca = ZkPkiCertificate::load(
            self.provider(),
            CertificateParts::from_certificate(certificate, Some(key)),
        )?;
        info!(
            subject = %dn,
            algorithm = %spec.algorithm,
            parameter = %spec.parameter,
            lifetime_days,
            "created certificate authority"
        );
        Ok(ca)
    }

    /// Signs a certificate for an existing public key.
    pub fn create_certificate(
        &self,
        issuer: &KeyPair,
        subject_spki: &[u8],
        options: &CertificateOptions,
    ) -> Result<ZkPkiCertificate> {
        let certificate = build_certificate(self.provider(), issuer, subject_spki, options)?;
        ZkPkiCertificate::load(
            self.provider(),
            CertificateParts::from_certificate(certificate, None),
        )
    }

    /// Generates a fresh subject key and issues a certificate for it under
    /// `issuer`.
    pub fn issue_certificate(
        &self,
        issuer: &KeyPair,
        spec: &KeySpec,
        options: &CertificateOptions,
    ) -> Result<ZkPkiCertificate> {
        options.validate()?;
        let key = self.generate_key_pair(spec)?;
        let certificate = build_certificate(self.provider(), issuer, key.public_key_der(), options)?;
        let issued = ZkPkiCertificate::load(
            self.provider(),
            CertificateParts::from_certificate(certificate, Some(key)),
        )?;
        info!(
            serial = %issued.serial_number(),
            subject = %options.subject_dn,
            "issued certificate"
        );
        Ok(issued)
    }

    /// CSR decoding is not supported.
    pub fn create_certificate_from_csr(
        &self,
        _issuer: &KeyPair,
        _csr_pem: &str,
        _options: &CertificateOptions,
    ) -> Result<ZkPkiCertificate> {
        Err(Error::NotImplemented("certificate signing requests"))
    }

    pub fn load_certificate(
        &self,
        certificate_pem: &str,
        private_key_pem: Option<&str>,
    ) -> Result<ZkPkiCertificate> {
        ZkPkiCertificate::from_pem(self.provider(), certificate_pem, private_key_pem)
    }

    /// Resolves an algorithm name and optional size/curve, then creates a CA.
    pub fn create_certificate_authority_with(
        &self,
        dn: &str,
        lifetime_days: u32,
        algorithm: &str,
        size_or_curve: Option<&str>,
    ) -> Result<ZkPkiCertificate> {
        let algorithm: KeyAlgorithm = algorithm.parse()?;
        let spec = KeySpec::from_parts(algorithm, size_or_curve)?;
        self.create_certificate_authority(dn, lifetime_days, &spec)
    }
}

impl Default for CertificateFactory {
    fn default() -> Self {
        Self::new(crate::crypto::default_provider())
    }
}
