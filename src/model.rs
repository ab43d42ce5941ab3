//! The CA model: one root CA, the certificates issued under it, and opaque
//! settings, persisted as a PEM-only JSON snapshot.

use crate::ca::CertificateFactory;
use crate::crypto::CryptoProvider;
use crate::entity::ZkPkiCertificate;
use crate::error::{Error, Result};
use crate::types::{
    CertificateOptions, ExtendedKeyUsage, KeyAlgorithm, KeySpec, KeyUsages, SubjectAltName,
    STARTING_SERIAL_NUMBER, TEN_YEARS_DAYS,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// A certificate issuance request against the model's root CA. The issuer DN
/// and serial number are filled in by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub subject_dn: String,
    pub lifetime_days: u32,
    #[serde(default)]
    pub key_algorithm: Option<KeyAlgorithm>,
    /// Modulus length or curve name; the algorithm default when absent.
    #[serde(default)]
    pub key_size_or_curve: Option<String>,
    #[serde(default)]
    pub is_ca: bool,
    #[serde(default)]
    pub path_length: Option<u32>,
    #[serde(default)]
    pub key_usages: KeyUsages,
    #[serde(default)]
    pub key_usages_critical: bool,
    #[serde(default)]
    pub extended_key_usages: Vec<ExtendedKeyUsage>,
    #[serde(default)]
    pub extended_key_usages_critical: bool,
    #[serde(default)]
    pub subject_alternative_names: Vec<SubjectAltName>,
}

impl IssueRequest {
    pub fn new(subject_dn: impl Into<String>, lifetime_days: u32) -> Self {
        Self {
            subject_dn: subject_dn.into(),
            lifetime_days,
            key_algorithm: None,
            key_size_or_curve: None,
            is_ca: false,
            path_length: None,
            key_usages: KeyUsages::NONE,
            key_usages_critical: false,
            extended_key_usages: Vec::new(),
            extended_key_usages_critical: false,
            subject_alternative_names: Vec::new(),
        }
    }

    /// Key to generate for the subject. Without an explicit algorithm the
    /// issuer's algorithm is reused.
    pub fn key_spec(&self, issuer_algorithm: KeyAlgorithm) -> Result<KeySpec> {
        let algorithm = self.key_algorithm.unwrap_or(issuer_algorithm);
        KeySpec::from_parts(algorithm, self.key_size_or_curve.as_deref())
    }

    pub fn to_options(&self, serial_number: u64, issuer_dn: &str) -> CertificateOptions {
        CertificateOptions {
            serial_number,
            issuer_dn: issuer_dn.to_string(),
            issuer_name_der: None,
            subject_dn: self.subject_dn.clone(),
            lifetime_days: self.lifetime_days,
            is_ca: self.is_ca,
            path_length: self.path_length,
            key_usages: self.key_usages,
            key_usages_critical: self.key_usages_critical,
            extended_key_usages: self.extended_key_usages.clone(),
            extended_key_usages_critical: self.extended_key_usages_critical,
            subject_alternative_names: self.subject_alternative_names.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertificateSnapshot {
    certificate_pem_data: String,
    #[serde(default)]
    private_key_pem_data: Option<String>,
}

impl From<&ZkPkiCertificate> for CertificateSnapshot {
    fn from(cert: &ZkPkiCertificate) -> Self {
        Self {
            certificate_pem_data: cert.certificate_pem_data().to_string(),
            private_key_pem_data: cert.private_key_pem_data().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelSnapshot {
    #[serde(default)]
    root_ca: Option<CertificateSnapshot>,
    #[serde(default)]
    settings: serde_json::Value,
    #[serde(default)]
    certificates: Vec<CertificateSnapshot>,
}

/// Mutators take `&mut self`; share a model across threads behind a `Mutex`.
#[derive(Debug, Clone)]
pub struct ZkPkiModel {
    factory: CertificateFactory,
    root_ca: Option<ZkPkiCertificate>,
    certificates: Vec<ZkPkiCertificate>,
    settings: serde_json::Value,
    next_serial: u64,
}

impl ZkPkiModel {
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            factory: CertificateFactory::new(provider),
            root_ca: None,
            certificates: Vec::new(),
            settings: serde_json::Value::Null,
            next_serial: STARTING_SERIAL_NUMBER + 1,
        }
    }

    pub fn from_json(provider: Arc<dyn CryptoProvider>, json: &str) -> Result<Self> {
        let mut model = Self::new(provider);
        model.deserialize(json)?;
        Ok(model)
    }

    pub fn factory(&self) -> &CertificateFactory {
        &self.factory
    }

    pub fn is_initialized(&self) -> bool {
        self.root_ca.is_some()
    }

    pub fn root_ca(&self) -> Option<&ZkPkiCertificate> {
        self.root_ca.as_ref()
    }

    pub fn certificates(&self) -> &[ZkPkiCertificate] {
        &self.certificates
    }

    pub fn settings(&self) -> &serde_json::Value {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: serde_json::Value) {
        self.settings = settings;
    }

    /// Serial number the next issued certificate will carry.
    pub fn next_serial(&self) -> u64 {
        self.next_serial
    }

    /// Creates a new root CA valid for ten years and forgets every previously
    /// issued certificate.
    pub fn initialize(&mut self, dn: &str, spec: &KeySpec) -> Result<&ZkPkiCertificate> {
        let root = self
            .factory
            .create_certificate_authority(dn, TEN_YEARS_DAYS, spec)?;
        self.certificates.clear();
        self.next_serial = STARTING_SERIAL_NUMBER + 1;
        info!(subject = %dn, "initialized model");
        Ok(self.root_ca.insert(root))
    }

    pub fn issue_certificate(&mut self, request: &IssueRequest) -> Result<&ZkPkiCertificate> {
        let root = self.root_ca.as_ref().ok_or(Error::Uninitialized)?;
        let issuer = root.key_pair()?;
        let spec = request.key_spec(issuer.algorithm())?;
        let options = issuer_options(root, request, self.next_serial)?;

        let issued = self.factory.issue_certificate(issuer, &spec, &options)?;
        self.next_serial += 1;
        self.certificates.push(issued);
        let index = self.certificates.len() - 1;
        Ok(&self.certificates[index])
    }

    pub fn issue_certificate_for_csr(
        &mut self,
        csr_pem: &str,
        request: &IssueRequest,
    ) -> Result<&ZkPkiCertificate> {
        let root = self.root_ca.as_ref().ok_or(Error::Uninitialized)?;
        let issuer = root.key_pair()?;
        let options = issuer_options(root, request, self.next_serial)?;
        let issued = self
            .factory
            .create_certificate_from_csr(issuer, csr_pem, &options)?;
        self.next_serial += 1;
        self.certificates.push(issued);
        let index = self.certificates.len() - 1;
        Ok(&self.certificates[index])
    }

    /// JSON snapshot holding only PEM text and the settings value.
    pub fn serialize(&self) -> Result<String> {
        let snapshot = ModelSnapshot {
            root_ca: self.root_ca.as_ref().map(CertificateSnapshot::from),
            settings: self.settings.clone(),
            certificates: self
                .certificates
                .iter()
                .map(CertificateSnapshot::from)
                .collect(),
        };
        let json = serde_json::to_string(&snapshot)?;
        debug!(certificates = self.certificates.len(), "serialized model");
        Ok(json)
    }

    /// Replaces the model state with a snapshot. Nothing changes unless every
    /// certificate in the snapshot loads.
    pub fn deserialize(&mut self, json: &str) -> Result<()> {
        let snapshot: ModelSnapshot = serde_json::from_str(json)?;
        let provider = self.factory.provider();
        let load = |snap: &CertificateSnapshot| {
            ZkPkiCertificate::from_pem(
                provider,
                &snap.certificate_pem_data,
                snap.private_key_pem_data.as_deref(),
            )
        };

        let root_ca = snapshot.root_ca.as_ref().map(load).transpose()?;
        let certificates = snapshot
            .certificates
            .iter()
            .map(load)
            .collect::<Result<Vec<_>>>()?;
        let next_serial = next_serial_after(root_ca.iter().chain(certificates.iter()));

        info!(
            initialized = root_ca.is_some(),
            certificates = certificates.len(),
            "loaded model snapshot"
        );
        self.root_ca = root_ca;
        self.certificates = certificates;
        self.settings = snapshot.settings;
        self.next_serial = next_serial;
        Ok(())
    }
}

// Serials wider than 64 bits were not allocated by this model and are skipped.
/// Options for a certificate under `root`, naming the issuer with the root's
/// subject bytes as encoded.
fn issuer_options(
    root: &ZkPkiCertificate,
    request: &IssueRequest,
    serial_number: u64,
) -> Result<CertificateOptions> {
    Ok(request
        .to_options(serial_number, &root.subject()?)
        .with_issuer_name_der(root.certificate().subject_name_der()))
}

fn next_serial_after<'a>(certs: impl Iterator<Item = &'a ZkPkiCertificate>) -> u64 {
    certs
        .filter_map(|cert| {
            let bytes = cert.certificate().serial_bytes();
            let significant = match bytes.iter().position(|b| *b != 0) {
                Some(first) => &bytes[first..],
                None => return Some(0),
            };
            if significant.len() > 8 {
                return None;
            }
            Some(significant.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
        })
        .fold(STARTING_SERIAL_NUMBER, u64::max)
        .saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::default_provider;
    use crate::types::{EllipticCurve, KeyUsage};

    const PSS_ROOT_MODEL: &str = include_str!("../testdata/pss_root_model.json");

    fn ec_model() -> ZkPkiModel {
        let mut model = ZkPkiModel::new(default_provider());
        model
            .initialize("CN=Model Root,O=org,C=US", &KeySpec::ecdsa(EllipticCurve::P256))
            .unwrap();
        model
    }

    #[test]
    fn test_issue_requires_root() {
        let mut model = ZkPkiModel::new(default_provider());
        assert!(!model.is_initialized());
        assert!(matches!(
            model.issue_certificate(&IssueRequest::new("CN=leaf", 1)),
            Err(Error::Uninitialized)
        ));
        assert!(matches!(
            model.issue_certificate_for_csr("", &IssueRequest::new("CN=leaf", 1)),
            Err(Error::Uninitialized)
        ));
    }

    #[test]
    fn test_issue_allocates_serials() {
        let mut model = ec_model();
        let root = model.root_ca().unwrap();
        assert_eq!(root.serial_number(), "186a0");
        assert_eq!(root.not_after() - root.not_before(), chrono::Duration::days(3652));

        let mut request = IssueRequest::new("CN=first", 30);
        request.key_usages = KeyUsage::DigitalSignature.into();
        let first = model.issue_certificate(&request).unwrap();
        assert_eq!(first.serial_number(), "186a1");
        assert_eq!(first.issuer().unwrap(), "CN=Model Root,O=org,C=US");
        assert_eq!(first.public_key_algorithm().unwrap(), KeyAlgorithm::Ecdsa);

        let mut request = IssueRequest::new("CN=second", 30);
        request.key_algorithm = Some(KeyAlgorithm::Ecdsa);
        request.key_size_or_curve = Some("P-384".into());
        let second = model.issue_certificate(&request).unwrap();
        assert_eq!(second.serial_number(), "186a2");
        assert_eq!(second.elliptic_curve_name(), Some("P-384"));
        assert_eq!(model.certificates().len(), 2);
        assert_eq!(model.next_serial(), 100_003);
    }

    #[test]
    fn test_failed_issue_leaves_model_untouched() {
        let mut model = ec_model();
        let before = model.serialize().unwrap();
        assert!(model
            .issue_certificate(&IssueRequest::new("Nope=leaf", 30))
            .is_err());
        let mut bad_ip = IssueRequest::new("CN=leaf", 30);
        bad_ip.subject_alternative_names = vec![SubjectAltName::Ip("300.1.1.1".into())];
        assert!(model.issue_certificate(&bad_ip).is_err());
        assert_eq!(model.serialize().unwrap(), before);
        assert_eq!(model.next_serial(), 100_001);
    }

    #[test]
    fn test_csr_issuance_not_implemented() {
        let mut model = ec_model();
        assert!(matches!(
            model.issue_certificate_for_csr("", &IssueRequest::new("CN=leaf", 1)),
            Err(Error::NotImplemented(_))
        ));
        assert!(model.certificates().is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut model = ec_model();
        model
            .issue_certificate(&IssueRequest::new("CN=leaf", 10))
            .unwrap();
        model.set_settings(serde_json::json!({"theme": "dark", "retries": 3}));

        let json = model.serialize().unwrap();
        let restored = ZkPkiModel::from_json(default_provider(), &json).unwrap();

        let (a, b) = (model.root_ca().unwrap(), restored.root_ca().unwrap());
        assert_eq!(a.certificate_pem_data(), b.certificate_pem_data());
        assert_eq!(a.private_key_pem_data(), b.private_key_pem_data());
        assert_eq!(a.subject().unwrap(), b.subject().unwrap());
        assert_eq!(a.serial_number(), b.serial_number());
        assert_eq!(a.not_before(), b.not_before());
        assert_eq!(a.not_after(), b.not_after());
        assert_eq!(restored.certificates().len(), 1);
        assert_eq!(restored.settings()["theme"], "dark");
        assert_eq!(restored.next_serial(), 100_002);
        assert_eq!(restored.serialize().unwrap(), json);
    }

    #[test]
    fn test_settings_keep_key_order() {
        let json = r#"{"rootCa":null,"settings":{"b":1,"a":{"z":true,"y":null}},"certificates":[]}"#;
        let model = ZkPkiModel::from_json(default_provider(), json).unwrap();
        assert_eq!(
            serde_json::to_string(model.settings()).unwrap(),
            r#"{"b":1,"a":{"z":true,"y":null}}"#
        );
    }

    #[test]
    fn test_load_pss_snapshot() {
        let model = ZkPkiModel::from_json(default_provider(), PSS_ROOT_MODEL).unwrap();
        let root = model.root_ca().unwrap();
        assert_eq!(root.subject().unwrap(), "CN=Another CA,OU=blah,O=zkpki,C=US");
        assert_eq!(root.public_key_algorithm().unwrap(), KeyAlgorithm::RsaPss);
        assert_eq!(root.key_pair().unwrap().algorithm(), KeyAlgorithm::RsaPss);
        assert!(model.settings().is_null());
        assert!(model.certificates().is_empty());
        assert_eq!(model.serialize().unwrap(), PSS_ROOT_MODEL.trim_end());
    }

    #[test]
    fn test_issue_under_loaded_root_chains() {
        let mut model = ZkPkiModel::from_json(default_provider(), PSS_ROOT_MODEL).unwrap();
        let leaf = model
            .issue_certificate(&IssueRequest::new("CN=leaf,O=zkpki", 30))
            .unwrap()
            .clone();
        let root = model.root_ca().unwrap();
        assert_eq!(
            leaf.certificate().issuer_name_der(),
            root.certificate().subject_name_der()
        );
        assert_eq!(leaf.issuer().unwrap(), root.subject().unwrap());
        assert!(leaf
            .certificate()
            .verify_signature(
                default_provider().as_ref(),
                &root.certificate().public_key().der
            )
            .unwrap());
    }

    #[test]
    fn test_deserialize_is_atomic() {
        let mut model = ec_model();
        let before = model.serialize().unwrap();
        let broken = r#"{"rootCa":{"certificatePemData":"not pem","privateKeyPemData":null},"certificates":[]}"#;
        assert!(model.deserialize(broken).is_err());
        assert!(matches!(
            model.deserialize("{"),
            Err(Error::Serialization(_))
        ));
        assert_eq!(model.serialize().unwrap(), before);
    }

    #[test]
    fn test_issue_request_json() {
        let request: IssueRequest = serde_json::from_str(
            r#"{"subjectDn":"CN=web","lifetimeDays":90,"keyAlgorithm":"ECDSA",
                "subjectAlternativeNames":[{"dns":"web.example"},{"ip":"10.0.0.1"}]}"#,
        )
        .unwrap();
        assert_eq!(request.key_algorithm, Some(KeyAlgorithm::Ecdsa));
        assert_eq!(
            request.key_spec(KeyAlgorithm::RsaPss).unwrap(),
            KeySpec::ecdsa(EllipticCurve::P256)
        );
        let options = request.to_options(7, "CN=Root");
        assert_eq!(options.issuer_dn, "CN=Root");
        assert_eq!(options.subject_alternative_names.len(), 2);
    }
}
