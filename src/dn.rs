//! Distinguished name codec.
//!
//! The string form lists attributes most significant first (`CN=leaf,O=org,C=US`),
//! the structured form keeps them in wire order (`C`, `O`, `CN`). Converting
//! between the two reverses the attribute order exactly once.

use crate::error::{Error, Result};
use x509_parser::x509::X509Name;
use yasna::models::ObjectIdentifier;
use yasna::DERWriter;

/// (mnemonics, OID). The first mnemonic is the one printed for names read off
/// the wire.
const ATTRIBUTES: &[(&[&str], &str)] = &[
    (&["C"], "2.5.4.6"),
    (&["O"], "2.5.4.10"),
    (&["OU"], "2.5.4.11"),
    (&["DNQUALIFIER"], "2.5.4.46"),
    (&["S", "ST"], "2.5.4.8"),
    (&["CN"], "2.5.4.3"),
    (&["SERIALNUMBER"], "2.5.4.5"),
    (&["L"], "2.5.4.7"),
    (&["T", "TITLE"], "2.5.4.12"),
    (&["SN"], "2.5.4.4"),
    (&["G"], "2.5.4.42"),
    (&["I", "INITIALS"], "2.5.4.43"),
    (&["PSEUDONYM"], "2.5.4.65"),
    (&["GENERATIONQUALIFIER"], "2.5.4.44"),
    (&["DC"], "0.9.2342.19200300.100.1.25"),
    (&["E"], "1.2.840.113549.1.9.1"),
    (&["MAIL"], "0.9.2342.19200300.100.1.3"),
    (&["UID"], "0.9.2342.19200300.100.1.1"),
    (&["UNSTRUCTUREDNAME"], "1.2.840.113549.1.9.2"),
    (&["UNSTRUCTUREDADDRESS"], "1.2.840.113549.1.9.8"),
];

const COUNTRY: &str = "2.5.4.6";
const SERIAL_NUMBER: &str = "2.5.4.5";
const DN_QUALIFIER: &str = "2.5.4.46";
const IA5_ATTRIBUTES: [&str; 3] = [
    "1.2.840.113549.1.9.1",
    "0.9.2342.19200300.100.1.25",
    "0.9.2342.19200300.100.1.3",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTypeAndValue {
    pub oid: String,
    pub value: String,
    /// Mnemonic the attribute was written with, if it came from a DN string.
    pub mnemonic: Option<&'static str>,
}

/// Attributes in wire order, one per RDN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub attributes: Vec<AttributeTypeAndValue>,
}

impl DistinguishedName {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// First value recorded for `oid`.
    pub fn get(&self, oid: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.oid == oid)
            .map(|a| a.value.as_str())
    }

    pub fn common_name(&self) -> Option<&str> {
        self.get("2.5.4.3")
    }

    /// Reads a name decoded by x509-parser. Multi-valued RDNs are flattened in
    /// encoded order.
    pub fn from_x509(name: &X509Name<'_>) -> Result<Self> {
        let mut attributes = Vec::new();
        for rdn in name.iter() {
            for attr in rdn.iter() {
                let value = attr.attr_value();
                let text = value
                    .as_str()
                    .ok()
                    .or_else(|| std::str::from_utf8(value.data).ok())
                    .ok_or_else(|| {
                        Error::Decode(format!(
                            "attribute {} has an undecodable string value",
                            attr.attr_type().to_id_string()
                        ))
                    })?;
                attributes.push(AttributeTypeAndValue {
                    oid: attr.attr_type().to_id_string(),
                    value: text.to_string(),
                    mnemonic: None,
                });
            }
        }
        Ok(Self { attributes })
    }

    /// Writes the RDNSequence, one single-valued RDN per attribute.
    pub fn write_der(&self, writer: DERWriter) -> Result<()> {
        let mut oids = Vec::with_capacity(self.attributes.len());
        for attr in &self.attributes {
            oids.push(der_oid(&attr.oid)?);
        }
        writer.write_sequence(|writer| {
            for (attr, oid) in self.attributes.iter().zip(&oids) {
                writer.next().write_set(|writer| {
                    writer.next().write_sequence(|writer| {
                        writer.next().write_oid(oid);
                        write_value(writer.next(), &attr.oid, &attr.value);
                    });
                });
            }
        });
        Ok(())
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        let mut result = Ok(());
        let der = yasna::construct_der(|writer| result = self.write_der(writer));
        result.map(|_| der)
    }
}

fn write_value(writer: DERWriter, oid: &str, value: &str) {
    let printable = value.chars().all(is_printable);
    if oid == COUNTRY || oid == SERIAL_NUMBER || oid == DN_QUALIFIER {
        if printable {
            return writer.write_printable_string(value);
        }
    } else if IA5_ATTRIBUTES.contains(&oid) {
        if value.is_ascii() {
            return writer.write_ia5_string(value);
        }
    } else if printable {
        return writer.write_printable_string(value);
    }
    writer.write_utf8_string(value)
}

fn is_printable(c: char) -> bool {
    c.is_ascii_alphanumeric() || " '()+,-./:=?".contains(c)
}

fn lookup_mnemonic(name: &str) -> Option<(&'static str, &'static str)> {
    let upper = name.to_ascii_uppercase();
    ATTRIBUTES.iter().find_map(|(mnemonics, oid)| {
        mnemonics
            .iter()
            .find(|m| **m == upper)
            .map(|m| (*m, *oid))
    })
}

fn lookup_oid(oid: &str) -> Option<&'static str> {
    ATTRIBUTES
        .iter()
        .find(|(_, o)| *o == oid)
        .map(|(mnemonics, _)| mnemonics[0])
}

fn split_part(part: &str) -> Result<(&str, &str)> {
    let (attr, value) = part
        .split_once('=')
        .ok_or_else(|| Error::Parse(format!("'{}' is not ATTR=value", part)))?;
    let attr = attr.trim();
    if attr.is_empty() || value.is_empty() {
        return Err(Error::Parse(format!("'{}' is not ATTR=value", part)));
    }
    Ok((attr, value))
}

/// Parses `CN=x,O=y` into a structured name, reversing into wire order.
pub fn string_to_name(dn: &str) -> Result<DistinguishedName> {
    let mut attributes = Vec::new();
    for part in dn.split(',') {
        let (attr, value) = split_part(part)?;
        let (mnemonic, oid) =
            lookup_mnemonic(attr).ok_or_else(|| Error::UnknownAttribute(attr.to_string()))?;
        attributes.push(AttributeTypeAndValue {
            oid: oid.to_string(),
            value: value.to_string(),
            mnemonic: Some(mnemonic),
        });
    }
    attributes.reverse();
    Ok(DistinguishedName { attributes })
}

/// Inverse of [`string_to_name`]; names read from a certificate print with
/// the primary mnemonic (`S` for state, `T` for title).
pub fn name_to_string(name: &DistinguishedName) -> Result<String> {
    let mut parts = Vec::with_capacity(name.len());
    for attr in name.attributes.iter().rev() {
        let mnemonic = match attr.mnemonic {
            Some(m) => m,
            None => lookup_oid(&attr.oid).ok_or_else(|| Error::UnknownOid(attr.oid.clone()))?,
        };
        parts.push(format!("{}={}", mnemonic, attr.value));
    }
    Ok(parts.join(","))
}

/// Upper-cases every attribute name, keeping order and values.
pub fn beautify(dn: &str) -> Result<String> {
    let parts = dn
        .split(',')
        .map(|part| {
            let (attr, value) = split_part(part)?;
            Ok(format!("{}={}", attr.to_ascii_uppercase(), value))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(","))
}

/// Converts a dotted OID string into yasna's representation.
pub(crate) fn der_oid(dotted: &str) -> Result<ObjectIdentifier> {
    let components = dotted
        .split('.')
        .map(|c| c.parse::<u64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| Error::UnknownOid(dotted.to_string()))?;
    if components.len() < 2 {
        return Err(Error::UnknownOid(dotted.to_string()));
    }
    Ok(ObjectIdentifier::from_slice(&components))
}

/// Dotted form of a yasna OID.
pub(crate) fn dotted_oid(oid: &ObjectIdentifier) -> String {
    oid.components()
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_name_reverses() {
        let name = string_to_name("CN=Root,O=org,C=US").unwrap();
        let oids: Vec<_> = name.attributes.iter().map(|a| a.oid.as_str()).collect();
        assert_eq!(oids, vec!["2.5.4.6", "2.5.4.10", "2.5.4.3"]);
        assert_eq!(name.common_name(), Some("Root"));
        assert_eq!(name.get("2.5.4.6"), Some("US"));
    }

    #[test]
    fn test_round_trip_matches_beautify() {
        for dn in [
            "cn=dan,o=zkpki,c=US",
            "CN=BlueUser,OU=PAM,O=One Identity LLC,L=Lindon,st=Utah,C=US",
            "E=ops@example.com,CN=ops,DC=example,DC=com",
            "uid=jdoe,serialNumber=42,title=Jr Engineer,dnQualifier=x",
            "CN=a=b",
        ] {
            let name = string_to_name(dn).unwrap();
            assert_eq!(name_to_string(&name).unwrap(), beautify(dn).unwrap());
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(string_to_name(""), Err(Error::Parse(_))));
        assert!(matches!(string_to_name("CN="), Err(Error::Parse(_))));
        assert!(matches!(string_to_name("=foo"), Err(Error::Parse(_))));
        assert!(matches!(string_to_name("CN=a,,O=b"), Err(Error::Parse(_))));
        assert!(matches!(
            string_to_name("CN=a,XYZ=b"),
            Err(Error::UnknownAttribute(attr)) if attr == "XYZ"
        ));
    }

    #[test]
    fn test_unknown_oid_fails_to_print() {
        let name = DistinguishedName {
            attributes: vec![AttributeTypeAndValue {
                oid: "1.2.3.4".into(),
                value: "x".into(),
                mnemonic: None,
            }],
        };
        assert!(matches!(name_to_string(&name), Err(Error::UnknownOid(oid)) if oid == "1.2.3.4"));
    }

    #[test]
    fn test_wire_names_use_primary_mnemonic() {
        let mut name = string_to_name("TITLE=Boss,ST=Utah").unwrap();
        for attr in &mut name.attributes {
            attr.mnemonic = None;
        }
        assert_eq!(name_to_string(&name).unwrap(), "T=Boss,S=Utah");
    }

    #[test]
    fn test_beautify() {
        assert_eq!(beautify("cn=foo").unwrap(), "CN=foo");
        assert_eq!(beautify("Cn=Capitalized Name").unwrap(), "CN=Capitalized Name");
        assert_eq!(beautify("cn=dan,o=zkpki,c=US").unwrap(), "CN=dan,O=zkpki,C=US");
        assert!(beautify("cn").is_err());
    }

    #[test]
    fn test_der_string_types() {
        let der = string_to_name("CN=José,C=US").unwrap().to_der().unwrap();
        // C=US as PrintableString (tag 0x13)
        assert!(der.windows(4).any(|w| w == [0x13, 0x02, b'U', b'S']));
        // CN with a non-printable character falls back to UTF8String (tag 0x0c)
        assert!(der.windows(2).any(|w| w == [0x0c, "José".len() as u8]));
    }

    #[test]
    fn test_oid_conversion() {
        let oid = der_oid("1.2.840.113549.1.9.1").unwrap();
        assert_eq!(dotted_oid(&oid), "1.2.840.113549.1.9.1");
        assert!(matches!(der_oid("1.x"), Err(Error::UnknownOid(_))));
        assert!(matches!(der_oid("7"), Err(Error::UnknownOid(_))));
    }
}
