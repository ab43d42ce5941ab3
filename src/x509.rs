//! Certificate engine: builds and signs X.509v3 certificates with yasna and
//! reads them back with x509-parser.

use crate::crypto::{key_algorithm_from_oid, CryptoProvider, KeyPair, SignatureAlgorithm};
use crate::dn::{dotted_oid, name_to_string, string_to_name, DistinguishedName};
use crate::error::{Error, Result};
use crate::extensions::{build_extensions, write_extensions, Extension, OID_EXT_KEY_USAGE};
use crate::pem::{from_pem_labeled, to_pem, CERTIFICATE_LABEL};
use crate::types::{
    CertificateOptions, EllipticCurve, ExtendedKeyUsage, KeyAlgorithm, KeyUsage, KeyUsages,
    SubjectAltName,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::{debug, info};
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;
use yasna::{DERWriter, Tag};

/// X.509 version field value for v3.
const X509_V3: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    /// Complete SubjectPublicKeyInfo DER.
    pub der: Vec<u8>,
    pub algorithm_oid: String,
    pub curve_oid: Option<String>,
    pub modulus_bits: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicConstraints {
    pub ca: bool,
    pub path_length: Option<u32>,
    pub critical: bool,
}

/// A signed certificate, decoded into owned fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    tbs_der: Vec<u8>,
    version: u32,
    serial: Vec<u8>,
    issuer: DistinguishedName,
    subject: DistinguishedName,
    issuer_der: Vec<u8>,
    subject_der: Vec<u8>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    public_key: PublicKeyInfo,
    extensions: Vec<Extension>,
    basic_constraints: Option<BasicConstraints>,
    key_usage: Option<(KeyUsages, bool)>,
    extended_key_usage: Option<(Vec<String>, bool)>,
    subject_alt_names: Vec<SubjectAltName>,
    signature_algorithm_oid: String,
    signature: Vec<u8>,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        parse_certificate(der)
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        parse_certificate(&from_pem_labeled(pem, CERTIFICATE_LABEL)?)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn tbs_der(&self) -> &[u8] {
        &self.tbs_der
    }

    pub fn to_pem(&self) -> String {
        to_pem(CERTIFICATE_LABEL, &self.der)
    }

    /// Human version number (3 for X.509v3).
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn serial_bytes(&self) -> &[u8] {
        &self.serial
    }

    /// Lower-case hex with leading zeros removed.
    pub fn serial_number(&self) -> String {
        let hex = hex::encode(&self.serial);
        let trimmed = hex.trim_start_matches('0');
        if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    }

    pub fn subject_name(&self) -> &DistinguishedName {
        &self.subject
    }

    pub fn issuer_name(&self) -> &DistinguishedName {
        &self.issuer
    }

    /// The subject Name exactly as encoded, multi-valued RDNs included.
    pub fn subject_name_der(&self) -> &[u8] {
        &self.subject_der
    }

    pub fn issuer_name_der(&self) -> &[u8] {
        &self.issuer_der
    }

    pub fn subject(&self) -> Result<String> {
        name_to_string(&self.subject)
    }

    pub fn issuer(&self) -> Result<String> {
        name_to_string(&self.issuer)
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    pub fn public_key(&self) -> &PublicKeyInfo {
        &self.public_key
    }

    pub fn public_key_algorithm(&self) -> Result<KeyAlgorithm> {
        key_algorithm_from_oid(
            &self.public_key.algorithm_oid,
            self.signature_algorithm() == Some(SignatureAlgorithm::RsaPssSha256),
        )
    }

    /// RSA modulus length in bits, 0 for elliptic curve keys.
    pub fn public_key_size(&self) -> u32 {
        self.public_key.modulus_bits.unwrap_or(0)
    }

    pub fn elliptic_curve(&self) -> Option<EllipticCurve> {
        self.public_key
            .curve_oid
            .as_deref()
            .and_then(EllipticCurve::from_oid)
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    pub fn basic_constraints(&self) -> Option<BasicConstraints> {
        self.basic_constraints
    }

    pub fn is_ca(&self) -> bool {
        self.basic_constraints.map(|bc| bc.ca).unwrap_or(false)
    }

    pub fn path_length(&self) -> Option<u32> {
        self.basic_constraints.and_then(|bc| bc.path_length)
    }

    pub fn key_usages(&self) -> KeyUsages {
        self.key_usage.map(|(ku, _)| ku).unwrap_or_default()
    }

    pub fn key_usages_critical(&self) -> bool {
        self.key_usage.map(|(_, critical)| critical).unwrap_or(false)
    }

    /// Raw EKU purpose OIDs in certificate order.
    pub fn extended_key_usage_oids(&self) -> &[String] {
        self.extended_key_usage
            .as_ref()
            .map(|(oids, _)| oids.as_slice())
            .unwrap_or(&[])
    }

    /// Purposes from the known EKU table; unrecognised OIDs are skipped.
    pub fn extended_key_usages(&self) -> Vec<ExtendedKeyUsage> {
        self.extended_key_usage_oids()
            .iter()
            .filter_map(|oid| ExtendedKeyUsage::from_oid(oid))
            .collect()
    }

    pub fn extended_key_usages_critical(&self) -> bool {
        self.extended_key_usage
            .as_ref()
            .map(|(_, critical)| *critical)
            .unwrap_or(false)
    }

    pub fn subject_alternative_names(&self) -> &[SubjectAltName] {
        &self.subject_alt_names
    }

    pub fn signature_algorithm_oid(&self) -> &str {
        &self.signature_algorithm_oid
    }

    pub fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(&self.signature_algorithm_oid)
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Checks the signature against the issuer's SubjectPublicKeyInfo.
    pub fn verify_signature(
        &self,
        provider: &dyn CryptoProvider,
        issuer_spki: &[u8],
    ) -> Result<bool> {
        let algorithm = self.signature_algorithm().ok_or_else(|| {
            Error::UnsupportedAlgorithm(format!(
                "signature algorithm {}",
                self.signature_algorithm_oid
            ))
        })?;
        provider.verify(issuer_spki, algorithm, &self.tbs_der, &self.signature)
    }

    pub fn is_self_signed(&self, provider: &dyn CryptoProvider) -> bool {
        self.issuer == self.subject
            && self
                .verify_signature(provider, &self.public_key.der)
                .unwrap_or(false)
    }
}

/// `[today, today + lifetime_days]`, both at UTC midnight.
pub fn validity_window(lifetime_days: u32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    validity_window_from(Utc::now().date_naive(), lifetime_days)
}

fn validity_window_from(
    today: NaiveDate,
    lifetime_days: u32,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let midnight = today
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::validation("lifetimeDays", "cannot compute start of day"))?;
    let not_before = Utc.from_utc_datetime(&midnight);
    let not_after = not_before
        .checked_add_signed(Duration::days(i64::from(lifetime_days)))
        .ok_or_else(|| Error::validation("lifetimeDays", "validity end is out of range"))?;
    Ok((not_before, not_after))
}

// UTCTime through 2049, GeneralizedTime after (RFC 5280 4.1.2.5).
fn write_time(writer: DERWriter, time: &DateTime<Utc>) {
    if (1950..2050).contains(&time.year()) {
        let text = time.format("%y%m%d%H%M%SZ").to_string();
        writer.write_tagged_implicit(yasna::tags::TAG_UTCTIME, |w| w.write_bytes(text.as_bytes()));
    } else {
        let text = time.format("%Y%m%d%H%M%SZ").to_string();
        writer.write_tagged_implicit(yasna::tags::TAG_GENERALIZEDTIME, |w| {
            w.write_bytes(text.as_bytes())
        });
    }
}

fn serial_to_bytes(serial: u64) -> Vec<u8> {
    let bytes = serial.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

/// Builds and signs a certificate for `subject_spki`, signed by `issuer`.
pub fn build_certificate(
    provider: &dyn CryptoProvider,
    issuer: &KeyPair,
    subject_spki: &[u8],
    options: &CertificateOptions,
) -> Result<Certificate> {
    options.validate()?;

    let issuer_der = match &options.issuer_name_der {
        Some(der) => der.clone(),
        None => string_to_name(&options.issuer_dn)?.to_der()?,
    };
    let subject_der = string_to_name(&options.subject_dn)?.to_der()?;
    let (not_before, not_after) = validity_window(options.lifetime_days)?;
    let extensions = build_extensions(provider, options, subject_spki, issuer.public_key_der())?;
    let mut ext_result = Ok(());
    let extensions_der =
        yasna::construct_der(|writer| ext_result = write_extensions(writer, &extensions));
    ext_result?;

    let serial = serial_to_bytes(options.serial_number);
    let signature_algorithm = SignatureAlgorithm::for_key(issuer);

    let tbs = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer
                .next()
                .write_tagged(Tag::context(0), |w| w.write_u8(X509_V3));
            writer.next().write_bigint_bytes(&serial, true);
            signature_algorithm.write_algorithm_identifier(writer.next());
            writer.next().write_der(&issuer_der);
            writer.next().write_sequence(|writer| {
                write_time(writer.next(), &not_before);
                write_time(writer.next(), &not_after);
            });
            writer.next().write_der(&subject_der);
            writer.next().write_der(subject_spki);
            writer
                .next()
                .write_tagged(Tag::context(3), |w| w.write_der(&extensions_der));
        });
    });

    let signature = provider.sign(issuer, &tbs)?;
    let der = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_der(&tbs);
            signature_algorithm.write_algorithm_identifier(writer.next());
            writer
                .next()
                .write_bitvec_bytes(&signature, signature.len() * 8);
        });
    });

    let certificate = parse_certificate(&der)?;
    info!(
        serial = %certificate.serial_number(),
        subject = %options.subject_dn,
        issuer = %options.issuer_dn,
        "signed certificate"
    );
    Ok(certificate)
}

fn key_usages_from_flags(flags: u16) -> KeyUsages {
    // x509-parser numbers bits as in RFC 5280: bit 0 is digitalSignature.
    let mut mask = 0u16;
    for bit in 0..8 {
        if flags & (1 << bit) != 0 {
            mask |= 1 << (7 - bit);
        }
    }
    if flags & (1 << 8) != 0 {
        mask |= KeyUsage::DecipherOnly.bit();
    }
    KeyUsages(mask)
}

fn modulus_bits(modulus: &[u8]) -> u32 {
    let significant: &[u8] = match modulus.iter().position(|b| *b != 0) {
        Some(first) => &modulus[first..],
        None => return 0,
    };
    (significant.len() as u32 - 1) * 8 + (8 - significant[0].leading_zeros())
}

fn parse_eku_oids(value: &[u8]) -> Result<Vec<String>> {
    let oids = yasna::parse_der(value, |reader| {
        reader.collect_sequence_of(|reader| reader.read_oid())
    })?;
    Ok(oids.iter().map(dotted_oid).collect())
}

fn ip_to_string(octets: &[u8]) -> Option<String> {
    match octets.len() {
        4 => {
            let v4: [u8; 4] = octets.try_into().ok()?;
            Some(Ipv4Addr::from(v4).to_string())
        }
        16 => {
            let v6: [u8; 16] = octets.try_into().ok()?;
            Some(Ipv6Addr::from(v6).to_string())
        }
        _ => None,
    }
}

fn to_utc(time: &ASN1Time) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(time.timestamp(), 0)
        .single()
        .ok_or_else(|| Error::Decode(format!("time {} out of range", time)))
}

/// Decodes a DER certificate.
pub fn parse_certificate(der: &[u8]) -> Result<Certificate> {
    let (rest, x509) = parse_x509_certificate(der)?;
    if !rest.is_empty() {
        return Err(Error::Decode(format!(
            "{} trailing bytes after certificate",
            rest.len()
        )));
    }

    let spki = x509.public_key();
    let modulus = match spki.parsed() {
        Ok(PublicKey::RSA(rsa)) => Some(modulus_bits(rsa.modulus)),
        _ => None,
    };
    let public_key = PublicKeyInfo {
        der: spki.raw.to_vec(),
        algorithm_oid: spki.algorithm.algorithm.to_id_string(),
        curve_oid: spki
            .algorithm
            .parameters
            .as_ref()
            .and_then(|params| params.as_oid().ok())
            .map(|oid| oid.to_id_string()),
        modulus_bits: modulus,
    };

    let extensions = x509
        .extensions()
        .iter()
        .map(|ext| Extension {
            oid: ext.oid.to_id_string(),
            critical: ext.critical,
            value: ext.value.to_vec(),
        })
        .collect::<Vec<_>>();

    let basic_constraints = x509.basic_constraints()?.map(|bc| BasicConstraints {
        ca: bc.value.ca,
        path_length: bc.value.path_len_constraint,
        critical: bc.critical,
    });

    let key_usage = x509
        .key_usage()?
        .map(|ku| (key_usages_from_flags(ku.value.flags), ku.critical));

    let extended_key_usage = match extensions.iter().find(|e| e.oid == OID_EXT_KEY_USAGE) {
        Some(ext) => Some((parse_eku_oids(&ext.value)?, ext.critical)),
        None => None,
    };

    let mut subject_alt_names = Vec::new();
    if let Some(san) = x509.subject_alternative_name()? {
        for name in &san.value.general_names {
            match name {
                GeneralName::DNSName(dns) => {
                    subject_alt_names.push(SubjectAltName::Dns(dns.to_string()))
                }
                GeneralName::IPAddress(octets) => {
                    if let Some(ip) = ip_to_string(octets) {
                        subject_alt_names.push(SubjectAltName::Ip(ip));
                    }
                }
                _ => {}
            }
        }
    }

    let certificate = Certificate {
        der: der.to_vec(),
        tbs_der: x509.tbs_certificate.as_ref().to_vec(),
        version: x509.version().0 + 1,
        serial: x509.raw_serial().to_vec(),
        issuer: DistinguishedName::from_x509(x509.issuer())?,
        subject: DistinguishedName::from_x509(x509.subject())?,
        issuer_der: x509.issuer().as_raw().to_vec(),
        subject_der: x509.subject().as_raw().to_vec(),
        not_before: to_utc(&x509.validity().not_before)?,
        not_after: to_utc(&x509.validity().not_after)?,
        public_key,
        extensions,
        basic_constraints,
        key_usage,
        extended_key_usage,
        subject_alt_names,
        signature_algorithm_oid: x509.signature_algorithm.algorithm.to_id_string(),
        signature: x509.signature_value.data.to_vec(),
    };
    debug!(serial = %certificate.serial_number(), "parsed certificate");
    Ok(certificate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::RustCryptoProvider;
    use crate::types::KeySpec;

    const DAN_ISSUING_CA: &str = include_str!("../testdata/dan_issuing_ca.pem");
    const BLUE_USER: &str = include_str!("../testdata/blue_user.pem");
    const PSS_ROOT: &str = include_str!("../testdata/pss_root.pem");

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_microsoft_ca_certificate() {
        let cert = Certificate::from_pem(DAN_ISSUING_CA).unwrap();
        assert_eq!(cert.version(), 3);
        assert_eq!(cert.serial_number(), "7c000000028f702488e6979673000000000002");
        assert_eq!(cert.subject().unwrap(), "CN=IssuingCA-CA1,O=DAN,C=US");
        assert_eq!(cert.issuer().unwrap(), "CN=DAN Root CA,O=DAN,C=US");
        assert_eq!(cert.not_before(), utc(2016, 5, 23, 19, 7, 19));
        assert_eq!(cert.not_after(), utc(2026, 5, 23, 19, 17, 19));
        assert_eq!(
            cert.public_key_algorithm().unwrap(),
            KeyAlgorithm::RsaSsaPkcs1V1_5
        );
        assert_eq!(cert.public_key_size(), 4096);
        assert_eq!(cert.elliptic_curve(), None);
        assert_eq!(
            cert.key_usages().names(),
            vec!["DigitalSignature", "KeySignCert", "CrlSign"]
        );
        assert!(!cert.key_usages_critical());
        assert!(cert.is_ca());
        assert!(cert.basic_constraints().unwrap().critical);
        assert!(cert.extended_key_usages().is_empty());
    }

    #[test]
    fn test_parse_openssl_leaf() {
        let cert = Certificate::from_pem(BLUE_USER).unwrap();
        assert_eq!(cert.serial_number(), "1000");
        assert_eq!(
            cert.subject().unwrap(),
            "CN=BlueUser,OU=PAM,O=One Identity LLC,L=Lindon,S=Utah,C=US"
        );
        assert_eq!(
            cert.issuer().unwrap(),
            "CN=issuing-BlueCA,OU=PAM,O=One Identity LLC,S=Utah,C=US"
        );
        assert_eq!(cert.public_key_size(), 2048);
        assert_eq!(
            cert.key_usages(),
            KeyUsage::DigitalSignature | KeyUsage::NonRepudiation | KeyUsage::KeyEncipherment
        );
        assert!(cert.key_usages_critical());
        assert_eq!(
            cert.extended_key_usages(),
            vec![
                ExtendedKeyUsage::ClientAuthentication,
                ExtendedKeyUsage::EmailProtection
            ]
        );
        assert!(!cert.extended_key_usages_critical());
        assert!(!cert.is_ca());
    }

    #[test]
    fn test_parse_pss_root() {
        let cert = Certificate::from_pem(PSS_ROOT).unwrap();
        assert_eq!(cert.serial_number(), "186a0");
        assert_eq!(cert.subject().unwrap(), "CN=Another CA,OU=blah,O=zkpki,C=US");
        assert_eq!(cert.issuer().unwrap(), cert.subject().unwrap());
        assert_eq!(cert.public_key_algorithm().unwrap(), KeyAlgorithm::RsaPss);
        assert_eq!(cert.public_key_size(), 4096);
        assert_eq!(cert.not_before(), utc(2019, 1, 1, 7, 0, 0));
        assert_eq!(cert.not_after(), utc(2028, 12, 31, 7, 0, 0));
        assert_eq!(cert.key_usages(), KeyUsage::KeySignCert | KeyUsage::CrlSign);
        // The stored signature uses a salt length the PSS verifier cannot
        // recover, so the root does not count as self-signed.
        assert!(!cert.is_self_signed(&RustCryptoProvider));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_certificate(&[0x30, 0x03, 0x02, 0x01]),
            Err(Error::Decode(_))
        ));
        let mut der = Certificate::from_pem(BLUE_USER).unwrap().der().to_vec();
        der.push(0);
        assert!(matches!(parse_certificate(&der), Err(Error::Decode(_))));
    }

    #[test]
    fn test_build_self_signed_ecdsa() {
        let provider = RustCryptoProvider;
        let key = provider
            .generate_key_pair(&KeySpec::ecdsa(EllipticCurve::P384))
            .unwrap();
        let options = CertificateOptions::new(42, "CN=Root,O=org,C=US", "CN=Root,O=org,C=US", 30)
            .with_ca(Some(1))
            .with_key_usages(KeyUsage::KeySignCert | KeyUsage::CrlSign, true)
            .with_dns_san("root.example")
            .with_ip_san("192.0.2.1");
        let cert = build_certificate(&provider, &key, key.public_key_der(), &options).unwrap();

        assert_eq!(cert.version(), 3);
        assert_eq!(cert.serial_number(), "2a");
        assert_eq!(cert.subject().unwrap(), "CN=Root,O=org,C=US");
        assert_eq!(cert.public_key_algorithm().unwrap(), KeyAlgorithm::Ecdsa);
        assert_eq!(cert.public_key_size(), 0);
        assert_eq!(cert.elliptic_curve(), Some(EllipticCurve::P384));
        assert_eq!(cert.path_length(), Some(1));
        assert!(cert.key_usages_critical());
        assert_eq!(
            cert.subject_alternative_names(),
            &[
                SubjectAltName::Dns("root.example".into()),
                SubjectAltName::Ip("192.0.2.1".into())
            ]
        );
        assert_eq!(cert.signature_algorithm(), Some(SignatureAlgorithm::EcdsaSha256));
        assert_eq!(cert.signature_algorithm_oid(), "1.2.840.10045.4.3.2");
        assert!(cert.is_self_signed(&provider));

        let (start, end) = validity_window(30).unwrap();
        assert_eq!(cert.not_before(), start);
        assert_eq!(cert.not_after(), end);
    }

    #[test]
    fn test_build_p521_signs_over_sha256() {
        let provider = RustCryptoProvider;
        let key = provider
            .generate_key_pair(&KeySpec::ecdsa(EllipticCurve::P521))
            .unwrap();
        let options = CertificateOptions::new(9, "CN=Root521", "CN=Root521", 5).with_ca(None);
        let cert = build_certificate(&provider, &key, key.public_key_der(), &options).unwrap();
        assert_eq!(cert.elliptic_curve(), Some(EllipticCurve::P521));
        assert_eq!(cert.signature_algorithm(), Some(SignatureAlgorithm::EcdsaSha256));
        assert!(cert.is_self_signed(&provider));
    }

    #[test]
    fn test_build_rejects_bad_ip_san() {
        let provider = RustCryptoProvider;
        let key = provider
            .generate_key_pair(&KeySpec::ecdsa(EllipticCurve::P256))
            .unwrap();
        let options = CertificateOptions::new(7, "CN=Issuer", "CN=leaf", 1).with_ip_san("10.1.2");
        assert!(matches!(
            build_certificate(&provider, &key, key.public_key_der(), &options),
            Err(Error::InvalidAddress(ip)) if ip == "10.1.2"
        ));
    }

    #[test]
    fn test_build_issued_is_verified_by_issuer_only() {
        let provider = RustCryptoProvider;
        let issuer = provider
            .generate_key_pair(&KeySpec::ecdsa(EllipticCurve::P256))
            .unwrap();
        let subject = provider
            .generate_key_pair(&KeySpec::ecdsa(EllipticCurve::P256))
            .unwrap();
        let options = CertificateOptions::new(7, "CN=Issuer", "CN=leaf", 1);
        let cert =
            build_certificate(&provider, &issuer, subject.public_key_der(), &options).unwrap();
        assert_eq!(cert.public_key().der, subject.public_key_der());
        assert!(cert
            .verify_signature(&provider, issuer.public_key_der())
            .unwrap());
        assert!(!cert
            .verify_signature(&provider, subject.public_key_der())
            .unwrap());
        assert!(!cert.is_ca());
        assert!(cert.key_usages().is_empty());
    }

    #[test]
    fn test_build_rejects_invalid_options() {
        let provider = RustCryptoProvider;
        let key = provider
            .generate_key_pair(&KeySpec::ecdsa(EllipticCurve::P256))
            .unwrap();
        let options = CertificateOptions::new(7, "CN=Issuer", "Bogus=leaf", 1);
        assert!(matches!(
            build_certificate(&provider, &key, key.public_key_der(), &options),
            Err(Error::Validation { field: "subjectDn", .. })
        ));
    }

    #[test]
    fn test_validity_window_is_day_aligned() {
        let day = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        let (start, end) = validity_window_from(day, 2).unwrap();
        assert_eq!(start, utc(2024, 2, 28, 0, 0, 0));
        assert_eq!(end, utc(2024, 3, 1, 0, 0, 0));
    }

    #[test]
    fn test_time_encoding_switches_to_generalized() {
        let utc_der = yasna::construct_der(|w| write_time(w, &utc(2049, 12, 31, 0, 0, 0)));
        assert_eq!(utc_der[0], 0x17);
        assert_eq!(&utc_der[2..], b"491231000000Z");
        let gen_der = yasna::construct_der(|w| write_time(w, &utc(2050, 1, 1, 0, 0, 0)));
        assert_eq!(gen_der[0], 0x18);
        assert_eq!(&gen_der[2..], b"20500101000000Z");
    }

    #[test]
    fn test_helpers() {
        assert_eq!(serial_to_bytes(100_000), vec![0x01, 0x86, 0xa0]);
        assert_eq!(serial_to_bytes(0), vec![0]);
        assert_eq!(modulus_bits(&[0x00, 0x80, 0x00]), 16);
        assert_eq!(modulus_bits(&[0x01, 0xff]), 9);
        assert_eq!(
            key_usages_from_flags(0b1_0110_0001),
            KeyUsage::DigitalSignature
                | KeyUsage::KeySignCert
                | KeyUsage::CrlSign
                | KeyUsage::DecipherOnly
        );
    }
}
