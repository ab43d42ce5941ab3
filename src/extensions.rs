//! X.509v3 extensions assembled from [`CertificateOptions`].

use crate::crypto::{CryptoProvider, DigestAlgorithm};
use crate::dn::der_oid;
use crate::error::{Error, Result};
use crate::types::{CertificateOptions, ExtendedKeyUsage, KeyUsage, KeyUsages, SubjectAltName};
use std::net::IpAddr;
use yasna::{DERWriter, Tag};

pub const OID_BASIC_CONSTRAINTS: &str = "2.5.29.19";
pub const OID_KEY_USAGE: &str = "2.5.29.15";
pub const OID_EXT_KEY_USAGE: &str = "2.5.29.37";
pub const OID_SUBJECT_KEY_IDENTIFIER: &str = "2.5.29.14";
pub const OID_AUTHORITY_KEY_IDENTIFIER: &str = "2.5.29.35";
pub const OID_SUBJECT_ALT_NAME: &str = "2.5.29.17";

/// One encoded extension; `value` is the DER placed inside the extnValue
/// OCTET STRING.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub oid: String,
    pub critical: bool,
    pub value: Vec<u8>,
}

impl Extension {
    fn new(oid: &str, critical: bool, value: Vec<u8>) -> Self {
        Self {
            oid: oid.to_string(),
            critical,
            value,
        }
    }
}

/// Always critical; only emitted for CA certificates.
pub fn basic_constraints(path_length: Option<u32>) -> Extension {
    let value = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_bool(true);
            if let Some(len) = path_length {
                writer.next().write_u32(len);
            }
        });
    });
    Extension::new(OID_BASIC_CONSTRAINTS, true, value)
}

/// The low byte of the mask is the first BIT STRING octet; DecipherOnly adds
/// a second octet with its top bit set. Returns `None` for an empty mask.
pub fn key_usage(usages: KeyUsages, critical: bool) -> Option<Extension> {
    if usages.is_empty() {
        return None;
    }
    let mut bytes = vec![(usages.0 & 0xff) as u8];
    if usages.contains(KeyUsage::DecipherOnly) {
        bytes.push((KeyUsage::DecipherOnly.bit() >> 8) as u8);
    }
    let value = yasna::construct_der(|writer| writer.write_bitvec_bytes(&bytes, bytes.len() * 8));
    Some(Extension::new(OID_KEY_USAGE, critical, value))
}

pub fn extended_key_usage(
    usages: &[ExtendedKeyUsage],
    critical: bool,
) -> Result<Option<Extension>> {
    if usages.is_empty() {
        return Ok(None);
    }
    let oids = usages
        .iter()
        .map(|u| der_oid(u.oid()))
        .collect::<Result<Vec<_>>>()?;
    let value = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            for oid in &oids {
                writer.next().write_oid(oid);
            }
        });
    });
    Ok(Some(Extension::new(OID_EXT_KEY_USAGE, critical, value)))
}

/// SHA-1 over the complete SubjectPublicKeyInfo DER.
pub fn key_identifier(provider: &dyn CryptoProvider, spki_der: &[u8]) -> Vec<u8> {
    provider.digest(DigestAlgorithm::Sha1, spki_der)
}

pub fn subject_key_identifier(provider: &dyn CryptoProvider, subject_spki: &[u8]) -> Extension {
    let id = key_identifier(provider, subject_spki);
    let value = yasna::construct_der(|writer| writer.write_bytes(&id));
    Extension::new(OID_SUBJECT_KEY_IDENTIFIER, false, value)
}

pub fn authority_key_identifier(provider: &dyn CryptoProvider, issuer_spki: &[u8]) -> Extension {
    let id = key_identifier(provider, issuer_spki);
    let value = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer
                .next()
                .write_tagged_implicit(Tag::context(0), |writer| writer.write_bytes(&id));
        });
    });
    Extension::new(OID_AUTHORITY_KEY_IDENTIFIER, false, value)
}

enum GeneralName<'a> {
    Ip(Vec<u8>),
    Dns(&'a str),
}

pub fn subject_alt_names(names: &[SubjectAltName]) -> Result<Option<Extension>> {
    if names.is_empty() {
        return Ok(None);
    }
    let mut general_names = Vec::with_capacity(names.len());
    for name in names {
        general_names.push(match name {
            SubjectAltName::Ip(ip) => {
                let addr: IpAddr = ip
                    .parse()
                    .map_err(|_| Error::InvalidAddress(ip.clone()))?;
                GeneralName::Ip(match addr {
                    IpAddr::V4(v4) => v4.octets().to_vec(),
                    IpAddr::V6(v6) => v6.octets().to_vec(),
                })
            }
            SubjectAltName::Dns(dns) => GeneralName::Dns(dns),
        });
    }
    let value = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            for name in &general_names {
                match name {
                    GeneralName::Ip(octets) => writer
                        .next()
                        .write_tagged_implicit(Tag::context(7), |w| w.write_bytes(octets)),
                    GeneralName::Dns(dns) => writer
                        .next()
                        .write_tagged_implicit(Tag::context(2), |w| w.write_ia5_string(dns)),
                }
            }
        });
    });
    Ok(Some(Extension::new(OID_SUBJECT_ALT_NAME, false, value)))
}

/// Full extension list in emission order: basic constraints, key usage,
/// extended key usage, subject and authority key identifiers, SAN.
pub fn build_extensions(
    provider: &dyn CryptoProvider,
    options: &CertificateOptions,
    subject_spki: &[u8],
    issuer_spki: &[u8],
) -> Result<Vec<Extension>> {
    let mut extensions = Vec::new();
    if options.is_ca {
        extensions.push(basic_constraints(options.path_length));
    }
    extensions.extend(key_usage(options.key_usages, options.key_usages_critical));
    extensions.extend(extended_key_usage(
        &options.extended_key_usages,
        options.extended_key_usages_critical,
    )?);
    extensions.push(subject_key_identifier(provider, subject_spki));
    extensions.push(authority_key_identifier(provider, issuer_spki));
    extensions.extend(subject_alt_names(&options.subject_alternative_names)?);
    Ok(extensions)
}

/// Writes the `Extensions` SEQUENCE (without the `[3]` wrapper).
pub fn write_extensions(writer: DERWriter, extensions: &[Extension]) -> Result<()> {
    let oids = extensions
        .iter()
        .map(|e| der_oid(&e.oid))
        .collect::<Result<Vec<_>>>()?;
    writer.write_sequence(|writer| {
        for (ext, oid) in extensions.iter().zip(&oids) {
            writer.next().write_sequence(|writer| {
                writer.next().write_oid(oid);
                if ext.critical {
                    writer.next().write_bool(true);
                }
                writer.next().write_bytes(&ext.value);
            });
        }
    });
    Ok(())
}
