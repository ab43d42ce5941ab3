use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// Serial number given to every root CA created by the factory.
pub const STARTING_SERIAL_NUMBER: u64 = 100_000;

/// Root CA lifetime used by [`crate::model::ZkPkiModel::initialize`].
pub const TEN_YEARS_DAYS: u32 = 3652;

pub const DEFAULT_RSA_MODULUS_BITS: u32 = 2048;
pub const DEFAULT_CURVE: EllipticCurve = EllipticCurve::P256;

const MIN_RSA_MODULUS_BITS: u32 = 1024;
const MAX_RSA_MODULUS_BITS: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    #[serde(rename = "RSASSA-PKCS1-v1_5")]
    RsaSsaPkcs1V1_5,
    #[serde(rename = "RSA-PSS")]
    RsaPss,
    #[serde(rename = "ECDSA")]
    Ecdsa,
}

impl KeyAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            KeyAlgorithm::RsaSsaPkcs1V1_5 => "RSASSA-PKCS1-v1_5",
            KeyAlgorithm::RsaPss => "RSA-PSS",
            KeyAlgorithm::Ecdsa => "ECDSA",
        }
    }

    pub fn is_rsa(&self) -> bool {
        matches!(self, KeyAlgorithm::RsaSsaPkcs1V1_5 | KeyAlgorithm::RsaPss)
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "RSASSA-PKCS1-V1_5" | "RSA" => Ok(KeyAlgorithm::RsaSsaPkcs1V1_5),
            "RSA-PSS" | "PSS" => Ok(KeyAlgorithm::RsaPss),
            "ECDSA" | "EC" => Ok(KeyAlgorithm::Ecdsa),
            _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EllipticCurve {
    #[serde(rename = "P-256")]
    P256,
    #[serde(rename = "P-384")]
    P384,
    #[serde(rename = "P-521")]
    P521,
}

impl EllipticCurve {
    pub fn name(&self) -> &'static str {
        match self {
            EllipticCurve::P256 => "P-256",
            EllipticCurve::P384 => "P-384",
            EllipticCurve::P521 => "P-521",
        }
    }

    /// Named-curve OID carried in the SPKI algorithm parameters.
    pub fn oid(&self) -> &'static str {
        match self {
            EllipticCurve::P256 => "1.2.840.10045.3.1.7",
            EllipticCurve::P384 => "1.3.132.0.34",
            EllipticCurve::P521 => "1.3.132.0.35",
        }
    }

    pub fn from_oid(oid: &str) -> Option<Self> {
        [EllipticCurve::P256, EllipticCurve::P384, EllipticCurve::P521]
            .into_iter()
            .find(|c| c.oid() == oid)
    }
}

impl fmt::Display for EllipticCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EllipticCurve {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().replace('_', "-").as_str() {
            "P-256" | "P256" | "SECP256R1" => Ok(EllipticCurve::P256),
            "P-384" | "P384" | "SECP384R1" => Ok(EllipticCurve::P384),
            "P-521" | "P521" | "SECP521R1" => Ok(EllipticCurve::P521),
            _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Modulus size for the RSA variants, named curve for ECDSA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyParameter {
    ModulusLength(u32),
    Curve(EllipticCurve),
}

impl fmt::Display for KeyParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyParameter::ModulusLength(bits) => write!(f, "{}", bits),
            KeyParameter::Curve(curve) => write!(f, "{}", curve),
        }
    }
}

/// What kind of key pair to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub algorithm: KeyAlgorithm,
    pub parameter: KeyParameter,
}

impl KeySpec {
    pub fn rsa(bits: u32) -> Self {
        Self {
            algorithm: KeyAlgorithm::RsaSsaPkcs1V1_5,
            parameter: KeyParameter::ModulusLength(bits),
        }
    }

    pub fn rsa_pss(bits: u32) -> Self {
        Self {
            algorithm: KeyAlgorithm::RsaPss,
            parameter: KeyParameter::ModulusLength(bits),
        }
    }

    pub fn ecdsa(curve: EllipticCurve) -> Self {
        Self {
            algorithm: KeyAlgorithm::Ecdsa,
            parameter: KeyParameter::Curve(curve),
        }
    }

    /// Default parameter for `algorithm`: 2048-bit modulus or P-256.
    pub fn default_for(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::Ecdsa => Self::ecdsa(DEFAULT_CURVE),
            rsa => Self {
                algorithm: rsa,
                parameter: KeyParameter::ModulusLength(DEFAULT_RSA_MODULUS_BITS),
            },
        }
    }

    /// Builds a spec from an algorithm plus an optional textual modulus size or
    /// curve name, falling back to the algorithm default when it is absent.
    pub fn from_parts(algorithm: KeyAlgorithm, size_or_curve: Option<&str>) -> Result<Self> {
        let spec = match (algorithm, size_or_curve) {
            (algorithm, None) => Self::default_for(algorithm),
            (KeyAlgorithm::Ecdsa, Some(curve)) => Self::ecdsa(curve.parse()?),
            (rsa, Some(bits)) => {
                let bits = bits.trim().parse::<u32>().map_err(|_| {
                    Error::validation("modulusLength", format!("'{}' is not a bit count", bits))
                })?;
                Self {
                    algorithm: rsa,
                    parameter: KeyParameter::ModulusLength(bits),
                }
            }
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        match (self.algorithm, self.parameter) {
            (KeyAlgorithm::Ecdsa, KeyParameter::Curve(_)) => Ok(()),
            (KeyAlgorithm::Ecdsa, KeyParameter::ModulusLength(bits)) => Err(
                Error::UnsupportedAlgorithm(format!("ECDSA with a {}-bit modulus", bits)),
            ),
            (rsa, KeyParameter::Curve(curve)) => Err(Error::UnsupportedAlgorithm(format!(
                "{} on curve {}",
                rsa, curve
            ))),
            (_, KeyParameter::ModulusLength(bits)) => {
                if !(MIN_RSA_MODULUS_BITS..=MAX_RSA_MODULUS_BITS).contains(&bits) || bits % 8 != 0
                {
                    return Err(Error::validation(
                        "modulusLength",
                        format!(
                            "{} must be a multiple of 8 between {} and {}",
                            bits, MIN_RSA_MODULUS_BITS, MAX_RSA_MODULUS_BITS
                        ),
                    ));
                }
                Ok(())
            }
        }
    }
}

impl Default for KeySpec {
    fn default() -> Self {
        Self::default_for(KeyAlgorithm::RsaSsaPkcs1V1_5)
    }
}

/// A single key usage. The discriminant is the bit it occupies in a
/// [`KeyUsages`] mask; the low byte is written to the Key Usage BIT STRING
/// as-is and DecipherOnly spills into a second octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum KeyUsage {
    DigitalSignature = 1 << 7,
    NonRepudiation = 1 << 6,
    KeyEncipherment = 1 << 5,
    DataEncipherment = 1 << 4,
    KeyAgreement = 1 << 3,
    KeySignCert = 1 << 2,
    CrlSign = 1 << 1,
    EncipherOnly = 1 << 0,
    DecipherOnly = 1 << 15,
}

impl KeyUsage {
    pub const ALL: [KeyUsage; 9] = [
        KeyUsage::DigitalSignature,
        KeyUsage::NonRepudiation,
        KeyUsage::KeyEncipherment,
        KeyUsage::DataEncipherment,
        KeyUsage::KeyAgreement,
        KeyUsage::KeySignCert,
        KeyUsage::CrlSign,
        KeyUsage::EncipherOnly,
        KeyUsage::DecipherOnly,
    ];

    pub fn bit(self) -> u16 {
        self as u16
    }

    pub fn name(&self) -> &'static str {
        match self {
            KeyUsage::DigitalSignature => "DigitalSignature",
            KeyUsage::NonRepudiation => "NonRepudiation",
            KeyUsage::KeyEncipherment => "KeyEncipherment",
            KeyUsage::DataEncipherment => "DataEncipherment",
            KeyUsage::KeyAgreement => "KeyAgreement",
            KeyUsage::KeySignCert => "KeySignCert",
            KeyUsage::CrlSign => "CrlSign",
            KeyUsage::EncipherOnly => "EncipherOnly",
            KeyUsage::DecipherOnly => "DecipherOnly",
        }
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyUsage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        KeyUsage::ALL
            .into_iter()
            .find(|u| u.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownUsage(s.to_string()))
    }
}

/// Key usage bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyUsages(pub u16);

impl KeyUsages {
    pub const NONE: KeyUsages = KeyUsages(0);

    pub fn contains(&self, usage: KeyUsage) -> bool {
        self.0 & usage.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = KeyUsage> + '_ {
        KeyUsage::ALL.into_iter().filter(move |u| self.contains(*u))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|u| u.name()).collect()
    }

    /// Parses a comma separated list of usage names.
    pub fn parse_list(list: &str) -> Result<Self> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .try_fold(KeyUsages::NONE, |acc, name| Ok(acc | name.parse::<KeyUsage>()?))
    }
}

impl From<KeyUsage> for KeyUsages {
    fn from(usage: KeyUsage) -> Self {
        KeyUsages(usage.bit())
    }
}

impl FromIterator<KeyUsage> for KeyUsages {
    fn from_iter<I: IntoIterator<Item = KeyUsage>>(iter: I) -> Self {
        iter.into_iter().fold(KeyUsages::NONE, |acc, u| acc | u)
    }
}

impl BitOr<KeyUsage> for KeyUsages {
    type Output = KeyUsages;

    fn bitor(self, rhs: KeyUsage) -> KeyUsages {
        KeyUsages(self.0 | rhs.bit())
    }
}

impl BitOr for KeyUsage {
    type Output = KeyUsages;

    fn bitor(self, rhs: KeyUsage) -> KeyUsages {
        KeyUsages(self.bit() | rhs.bit())
    }
}

impl BitOrAssign<KeyUsage> for KeyUsages {
    fn bitor_assign(&mut self, rhs: KeyUsage) {
        self.0 |= rhs.bit();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtendedKeyUsage {
    ServerAuthentication,
    ClientAuthentication,
    CodeSigning,
    EmailProtection,
    TimeStamping,
    OcspSigning,
    MsCertificateTrustListSigning,
    MsEncryptedFileSystem,
}

impl ExtendedKeyUsage {
    pub const ALL: [ExtendedKeyUsage; 8] = [
        ExtendedKeyUsage::ServerAuthentication,
        ExtendedKeyUsage::ClientAuthentication,
        ExtendedKeyUsage::CodeSigning,
        ExtendedKeyUsage::EmailProtection,
        ExtendedKeyUsage::TimeStamping,
        ExtendedKeyUsage::OcspSigning,
        ExtendedKeyUsage::MsCertificateTrustListSigning,
        ExtendedKeyUsage::MsEncryptedFileSystem,
    ];

    pub fn oid(&self) -> &'static str {
        match self {
            ExtendedKeyUsage::ServerAuthentication => "1.3.6.1.5.5.7.3.1",
            ExtendedKeyUsage::ClientAuthentication => "1.3.6.1.5.5.7.3.2",
            ExtendedKeyUsage::CodeSigning => "1.3.6.1.5.5.7.3.3",
            ExtendedKeyUsage::EmailProtection => "1.3.6.1.5.5.7.3.4",
            ExtendedKeyUsage::TimeStamping => "1.3.6.1.5.5.7.3.8",
            ExtendedKeyUsage::OcspSigning => "1.3.6.1.5.5.7.3.9",
            ExtendedKeyUsage::MsCertificateTrustListSigning => "1.3.6.1.4.1.311.10.3.1",
            ExtendedKeyUsage::MsEncryptedFileSystem => "1.3.6.1.4.1.311.10.3.4",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExtendedKeyUsage::ServerAuthentication => "ServerAuthentication",
            ExtendedKeyUsage::ClientAuthentication => "ClientAuthentication",
            ExtendedKeyUsage::CodeSigning => "CodeSigning",
            ExtendedKeyUsage::EmailProtection => "EmailProtection",
            ExtendedKeyUsage::TimeStamping => "TimeStamping",
            ExtendedKeyUsage::OcspSigning => "OcspSigning",
            ExtendedKeyUsage::MsCertificateTrustListSigning => "MsCertificateTrustListSigning",
            ExtendedKeyUsage::MsEncryptedFileSystem => "MsEncryptedFileSystem",
        }
    }

    pub fn from_oid(oid: &str) -> Option<Self> {
        ExtendedKeyUsage::ALL.into_iter().find(|e| e.oid() == oid)
    }
}

impl fmt::Display for ExtendedKeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExtendedKeyUsage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ExtendedKeyUsage::ALL
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(s) || e.oid() == s)
            .ok_or_else(|| Error::UnknownUsage(s.to_string()))
    }
}

/// One subject alternative name entry. In JSON this is an object with exactly
/// one of the keys `ip` or `dns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectAltName {
    Ip(String),
    Dns(String),
}

impl fmt::Display for SubjectAltName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectAltName::Ip(ip) => write!(f, "IP:{}", ip),
            SubjectAltName::Dns(dns) => write!(f, "DNS:{}", dns),
        }
    }
}

/// Everything the certificate engine needs to build one certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateOptions {
    pub serial_number: u64,
    pub issuer_dn: String,
    /// Encoded issuer Name to write in place of `issuer_dn`, so certificates
    /// chain to an issuer whose subject uses multi-valued RDNs.
    #[serde(skip)]
    pub issuer_name_der: Option<Vec<u8>>,
    pub subject_dn: String,
    pub lifetime_days: u32,
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

impl CertificateOptions {
    pub fn new(
        serial_number: u64,
        issuer_dn: impl Into<String>,
        subject_dn: impl Into<String>,
        lifetime_days: u32,
    ) -> Self {
        Self {
            serial_number,
            issuer_dn: issuer_dn.into(),
            issuer_name_der: None,
            subject_dn: subject_dn.into(),
            lifetime_days,
            is_ca: false,
            path_length: None,
            key_usages: KeyUsages::NONE,
            key_usages_critical: false,
            extended_key_usages: Vec::new(),
            extended_key_usages_critical: false,
            subject_alternative_names: Vec::new(),
        }
    }

    pub fn with_issuer_name_der(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.issuer_name_der = Some(der.into());
        self
    }

    pub fn with_ca(mut self, path_length: Option<u32>) -> Self {
        self.is_ca = true;
        self.path_length = path_length;
        self
    }

    pub fn with_key_usages(mut self, usages: KeyUsages, critical: bool) -> Self {
        self.key_usages = usages;
        self.key_usages_critical = critical;
        self
    }

    pub fn with_extended_key_usages(
        mut self,
        usages: impl IntoIterator<Item = ExtendedKeyUsage>,
        critical: bool,
    ) -> Self {
        self.extended_key_usages = usages.into_iter().collect();
        self.extended_key_usages_critical = critical;
        self
    }

    pub fn with_dns_san(mut self, dns: impl Into<String>) -> Self {
        self.subject_alternative_names
            .push(SubjectAltName::Dns(dns.into()));
        self
    }

    pub fn with_ip_san(mut self, ip: impl Into<String>) -> Self {
        self.subject_alternative_names
            .push(SubjectAltName::Ip(ip.into()));
        self
    }

    /// Checks every field, reporting the first offending one by its JSON name.
    pub fn validate(&self) -> Result<()> {
        if self.serial_number == 0 {
            return Err(Error::validation("serialNumber", "must be a positive integer"));
        }
        if self.lifetime_days == 0 {
            return Err(Error::validation("lifetimeDays", "must be at least one day"));
        }
        validate_dn("issuerDn", &self.issuer_dn)?;
        validate_dn("subjectDn", &self.subject_dn)?;
        if self.path_length.is_some() && !self.is_ca {
            return Err(Error::validation(
                "pathLength",
                "only allowed on CA certificates",
            ));
        }
        for san in &self.subject_alternative_names {
            match san {
                SubjectAltName::Ip(ip) => {
                    ip.parse::<std::net::IpAddr>()
                        .map_err(|_| Error::InvalidAddress(ip.clone()))?;
                }
                SubjectAltName::Dns(dns) if dns.trim().is_empty() => {
                    return Err(Error::validation(
                        "subjectAlternativeNames",
                        "empty DNS name",
                    ));
                }
                SubjectAltName::Dns(_) => {}
            }
        }
        Ok(())
    }
}

fn validate_dn(field: &'static str, dn: &str) -> Result<()> {
    if dn.trim().is_empty() {
        return Err(Error::validation(field, "must not be empty"));
    }
    crate::dn::string_to_name(dn)
        .map(|_| ())
        .map_err(|e| Error::validation(field, e.to_string()))
}
