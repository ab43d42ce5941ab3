//! `ZkPkiCertificate`: a certificate together with its optional private key,
//! held both as PEM text and in decoded form.

use crate::crypto::{CryptoProvider, KeyPair};
use crate::dn::DistinguishedName;
use crate::error::{Error, Result};
use crate::pem::{from_pem_labeled, PRIVATE_KEY_LABEL};
use crate::types::{ExtendedKeyUsage, KeyAlgorithm, KeyUsages, SubjectAltName};
use crate::x509::Certificate;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use tracing::debug;
use zeroize::Zeroizing;

/// Inputs accepted by [`ZkPkiCertificate::load`]. At least one certificate
/// form must be present.
#[derive(Debug, Clone, Default)]
pub struct CertificateParts {
    pub certificate_pem: Option<String>,
    pub certificate: Option<Certificate>,
    pub private_key_pem: Option<String>,
    pub private_key: Option<KeyPair>,
}

impl CertificateParts {
    pub fn from_pem(certificate_pem: impl Into<String>, private_key_pem: Option<String>) -> Self {
        Self {
            certificate_pem: Some(certificate_pem.into()),
            private_key_pem,
            ..Default::default()
        }
    }

    pub fn from_certificate(certificate: Certificate, private_key: Option<KeyPair>) -> Self {
        Self {
            certificate: Some(certificate),
            private_key,
            ..Default::default()
        }
    }
}

/// Both representations are derived when the entity is loaded and never
/// change afterwards.
#[derive(Clone)]
pub struct ZkPkiCertificate {
    certificate_pem: String,
    certificate: Certificate,
    private_key: Option<(Zeroizing<String>, KeyPair)>,
}

impl ZkPkiCertificate {
    pub fn load(provider: &dyn CryptoProvider, parts: CertificateParts) -> Result<Self> {
        let CertificateParts {
            certificate_pem,
            certificate,
            private_key_pem,
            private_key,
        } = parts;

        let (certificate_pem, certificate) = match (certificate_pem, certificate) {
            (None, None) => return Err(Error::MissingCertificate),
            (Some(pem), None) => {
                let certificate = Certificate::from_pem(&pem)?;
                (pem, certificate)
            }
            (None, Some(certificate)) => (certificate.to_pem(), certificate),
            (Some(pem), Some(certificate)) => {
                if Certificate::from_pem(&pem)?.der() != certificate.der() {
                    return Err(Error::validation(
                        "certificatePemData",
                        "PEM does not encode the supplied certificate",
                    ));
                }
                (pem, certificate)
            }
        };

        let private_key = match (private_key_pem, private_key) {
            (None, None) => None,
            (None, Some(key)) => Some((key.private_key_pem(), key)),
            (Some(pem), key) => {
                let pem = Zeroizing::new(pem);
                let der = Zeroizing::new(from_pem_labeled(&pem, PRIVATE_KEY_LABEL)?);
                let key = match key {
                    Some(key) if key.private_key_der() == der.as_slice() => key,
                    Some(_) => {
                        return Err(Error::validation(
                            "privateKeyPemData",
                            "PEM does not encode the supplied private key",
                        ))
                    }
                    None => {
                        let rsa_algorithm = certificate
                            .public_key_algorithm()
                            .unwrap_or(KeyAlgorithm::RsaSsaPkcs1V1_5);
                        provider.import_private_key(&der, rsa_algorithm)?
                    }
                };
                Some((pem, key))
            }
        };

        if let Some((_, key)) = &private_key {
            if key.public_key_der() != certificate.public_key().der.as_slice() {
                return Err(Error::validation(
                    "privateKeyPemData",
                    "private key does not match the certificate public key",
                ));
            }
        }

        debug!(
            serial = %certificate.serial_number(),
            has_private_key = private_key.is_some(),
            "loaded certificate"
        );
        Ok(Self {
            certificate_pem,
            certificate,
            private_key,
        })
    }

    pub fn from_pem(
        provider: &dyn CryptoProvider,
        certificate_pem: &str,
        private_key_pem: Option<&str>,
    ) -> Result<Self> {
        Self::load(
            provider,
            CertificateParts::from_pem(certificate_pem, private_key_pem.map(str::to_string)),
        )
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn certificate_pem_data(&self) -> &str {
        &self.certificate_pem
    }

    pub fn private_key_pem_data(&self) -> Option<&str> {
        self.private_key.as_ref().map(|(pem, _)| pem.as_str())
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    pub fn key_pair(&self) -> Result<&KeyPair> {
        self.private_key
            .as_ref()
            .map(|(_, key)| key)
            .ok_or(Error::NotLoaded("private key"))
    }

    pub fn serial_number(&self) -> String {
        self.certificate.serial_number()
    }

    pub fn subject(&self) -> Result<String> {
        self.certificate.subject()
    }

    pub fn issuer(&self) -> Result<String> {
        self.certificate.issuer()
    }

    pub fn subject_name(&self) -> &DistinguishedName {
        self.certificate.subject_name()
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.certificate.not_before()
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.certificate.not_after()
    }

    pub fn key_usages(&self) -> KeyUsages {
        self.certificate.key_usages()
    }

    pub fn key_usages_critical(&self) -> bool {
        self.certificate.key_usages_critical()
    }

    pub fn extended_key_usages(&self) -> Vec<ExtendedKeyUsage> {
        self.certificate.extended_key_usages()
    }

    pub fn extended_key_usages_critical(&self) -> bool {
        self.certificate.extended_key_usages_critical()
    }

    pub fn public_key_algorithm(&self) -> Result<KeyAlgorithm> {
        self.certificate.public_key_algorithm()
    }

    pub fn public_key_size(&self) -> u32 {
        self.certificate.public_key_size()
    }

    pub fn elliptic_curve_name(&self) -> Option<&'static str> {
        self.certificate.elliptic_curve().map(|c| c.name())
    }

    pub fn is_ca(&self) -> bool {
        self.certificate.is_ca()
    }

    pub fn path_length(&self) -> Option<u32> {
        self.certificate.path_length()
    }

    pub fn subject_alternative_names(&self) -> &[SubjectAltName] {
        self.certificate.subject_alternative_names()
    }

    /// PKCS#12 bundles are not produced yet.
    pub fn to_pkcs12(&self, _password: &str) -> Result<Vec<u8>> {
        Err(Error::NotImplemented("PKCS#12 export"))
    }

    /// Writes the certificate PEM, and the key PEM when a path is given and a
    /// key is held.
    pub fn save_pem(
        &self,
        cert_path: impl AsRef<Path>,
        key_path: Option<impl AsRef<Path>>,
    ) -> Result<()> {
        fs::write(cert_path, &self.certificate_pem)?;
        if let Some(path) = key_path {
            let pem = self
                .private_key_pem_data()
                .ok_or(Error::NotLoaded("private key"))?;
            fs::write(path, pem)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ZkPkiCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZkPkiCertificate")
            .field("serial_number", &self.certificate.serial_number())
            .field("subject", &self.certificate.subject_name())
            .field("has_private_key", &self.private_key.is_some())
            .finish()
    }
}
