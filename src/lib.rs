//! zkpki - a minimal certificate authority
//!
//! This library covers the pieces of a small, self-contained CA:
//!
//! - Generating RSA (PKCS#1 v1.5 or PSS) and ECDSA (P-256/P-384/P-521) key pairs
//! - Building and signing X.509v3 certificates: self-signed root CAs and
//!   certificates issued under them
//! - Parsing certificates back into queryable metadata
//! - Persisting the CA as a PEM-only JSON snapshot
//! - Keeping that snapshot in an encrypted, content-addressed file store
//!
//! Cryptography goes through a [`CryptoProvider`] passed in at construction;
//! [`RustCryptoProvider`] is the default.
//!
//! # Examples
//!
//! ## Creating a Root CA
//!
//! ```no_run
//! use zkpki::{CertificateFactory, KeySpec};
//!
//! let factory = CertificateFactory::default();
//! let ca = factory
//!     .create_certificate_authority("CN=My Root CA,O=My Company,C=US", 3652, &KeySpec::rsa(2048))
//!     .unwrap();
//!
//! println!("{}", ca.certificate_pem_data());
//! ```
//!
//! ## Issuing a Certificate from a Model
//!
//! ```no_run
//! use zkpki::crypto::default_provider;
//! use zkpki::{EllipticCurve, IssueRequest, KeySpec, ZkPkiModel};
//!
//! let mut model = ZkPkiModel::new(default_provider());
//! model
//!     .initialize("CN=Root,O=org,C=US", &KeySpec::ecdsa(EllipticCurve::P256))
//!     .unwrap();
//!
//! let mut request = IssueRequest::new("CN=www.example.com", 90);
//! request.subject_alternative_names.push(zkpki::SubjectAltName::Dns("www.example.com".into()));
//! let issued = model.issue_certificate(&request).unwrap();
//! println!("issued serial {}", issued.serial_number());
//!
//! let snapshot = model.serialize().unwrap();
//! # let _ = snapshot;
//! ```
//!
//! ## Storing the Snapshot
//!
//! ```no_run
//! use zkpki::crypto::default_provider;
//! use zkpki::{FileStorage, StorageOptions};
//!
//! let storage = FileStorage::new(default_provider(), StorageOptions::new("/var/lib/zkpki"));
//! let blob = storage.open_or_create("Ohneo4ahthahSeG9AeT0thai4Moineex").unwrap();
//! blob.set(b"{}").unwrap();
//! assert_eq!(blob.get().unwrap(), b"{}");
//! ```

pub mod ca;
pub mod crypto;
pub mod dn;
pub mod entity;
pub mod error;
pub mod extensions;
pub mod model;
pub mod pem;
pub mod storage;
pub mod types;
pub mod x509;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Result};

pub use ca::CertificateFactory;
pub use crypto::{CryptoProvider, KeyPair, RustCryptoProvider, SignatureAlgorithm};
pub use dn::{beautify, name_to_string, string_to_name, DistinguishedName};
pub use entity::{CertificateParts, ZkPkiCertificate};
pub use model::{IssueRequest, ZkPkiModel};
pub use pem::{from_pem, to_pem};
pub use storage::{Blob, FileStorage, StorageOptions};
pub use types::{
    CertificateOptions, EllipticCurve, ExtendedKeyUsage, KeyAlgorithm, KeySpec, KeyUsage,
    KeyUsages, SubjectAltName,
};
pub use x509::{build_certificate, parse_certificate, Certificate};
