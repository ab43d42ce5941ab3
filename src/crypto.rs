//! Cryptographic primitives behind a provider trait.
//!
//! The certificate engine and the store never touch RSA, ECDSA or AES
//! directly; they call a [`CryptoProvider`] handed to them at construction.
//! [`RustCryptoProvider`] implements it with the RustCrypto crates.

use crate::error::{Error, Result};
use crate::pem::{to_pem, PRIVATE_KEY_LABEL};
use crate::types::{EllipticCurve, KeyAlgorithm, KeyParameter, KeySpec};
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes256;
use p521::elliptic_curve::sec1::ToEncodedPoint;
use pkcs8::spki::SubjectPublicKeyInfoRef;
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, PrivateKeyInfo};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use yasna::models::ObjectIdentifier;
use yasna::{DERWriter, Tag};
use zeroize::Zeroizing;

pub const AES_KEY_LEN: usize = 32;
pub const AES_IV_LEN: usize = 16;

const RSA_ENCRYPTION_OID: &str = "1.2.840.113549.1.1.1";
const RSA_PSS_OID: &str = "1.2.840.113549.1.1.10";
const EC_PUBLIC_KEY_OID: &str = "1.2.840.10045.2.1";

const OID_SHA256_WITH_RSA: &[u64] = &[1, 2, 840, 113549, 1, 1, 11];
const OID_RSASSA_PSS: &[u64] = &[1, 2, 840, 113549, 1, 1, 10];
const OID_MGF1: &[u64] = &[1, 2, 840, 113549, 1, 1, 8];
const OID_SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
const OID_ECDSA_SHA256: &[u64] = &[1, 2, 840, 10045, 4, 3, 2];
const OID_ECDSA_SHA384: &[u64] = &[1, 2, 840, 10045, 4, 3, 3];
const OID_ECDSA_SHA512: &[u64] = &[1, 2, 840, 10045, 4, 3, 4];

const PSS_SALT_LEN: u32 = 32;

/// Maps the algorithm OID of an SPKI (or PKCS#8 key) to a key algorithm.
/// Plain `rsaEncryption` keys report PKCS#1 v1.5 unless the certificate was
/// signed with RSA-PSS.
pub fn key_algorithm_from_oid(oid: &str, signed_with_pss: bool) -> Result<KeyAlgorithm> {
    match oid {
        RSA_ENCRYPTION_OID if signed_with_pss => Ok(KeyAlgorithm::RsaPss),
        RSA_ENCRYPTION_OID => Ok(KeyAlgorithm::RsaSsaPkcs1V1_5),
        RSA_PSS_OID => Ok(KeyAlgorithm::RsaPss),
        EC_PUBLIC_KEY_OID => Ok(KeyAlgorithm::Ecdsa),
        other => Err(Error::UnsupportedAlgorithm(format!(
            "public key algorithm {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

/// Signature algorithms the engine can check. Certificates it builds are always
/// signed over a SHA-256 digest; the SHA-384/512 ECDSA variants are only read
/// from foreign certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    RsaPkcs1Sha256,
    RsaPssSha256,
    EcdsaSha256,
    EcdsaSha384,
    EcdsaSha512,
}

impl SignatureAlgorithm {
    pub fn for_key(key: &KeyPair) -> Self {
        match key.algorithm {
            KeyAlgorithm::RsaPss => SignatureAlgorithm::RsaPssSha256,
            KeyAlgorithm::Ecdsa => SignatureAlgorithm::EcdsaSha256,
            KeyAlgorithm::RsaSsaPkcs1V1_5 => SignatureAlgorithm::RsaPkcs1Sha256,
        }
    }

    fn oid_components(&self) -> &'static [u64] {
        match self {
            SignatureAlgorithm::RsaPkcs1Sha256 => OID_SHA256_WITH_RSA,
            SignatureAlgorithm::RsaPssSha256 => OID_RSASSA_PSS,
            SignatureAlgorithm::EcdsaSha256 => OID_ECDSA_SHA256,
            SignatureAlgorithm::EcdsaSha384 => OID_ECDSA_SHA384,
            SignatureAlgorithm::EcdsaSha512 => OID_ECDSA_SHA512,
        }
    }

    pub fn oid(&self) -> String {
        self.oid_components()
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn from_oid(oid: &str) -> Option<Self> {
        [
            SignatureAlgorithm::RsaPkcs1Sha256,
            SignatureAlgorithm::RsaPssSha256,
            SignatureAlgorithm::EcdsaSha256,
            SignatureAlgorithm::EcdsaSha384,
            SignatureAlgorithm::EcdsaSha512,
        ]
        .into_iter()
        .find(|alg| alg.oid() == oid)
    }

    pub fn digest(&self) -> DigestAlgorithm {
        match self {
            SignatureAlgorithm::RsaPkcs1Sha256
            | SignatureAlgorithm::RsaPssSha256
            | SignatureAlgorithm::EcdsaSha256 => DigestAlgorithm::Sha256,
            SignatureAlgorithm::EcdsaSha384 => DigestAlgorithm::Sha384,
            SignatureAlgorithm::EcdsaSha512 => DigestAlgorithm::Sha512,
        }
    }

    /// Writes the AlgorithmIdentifier used in both the TBS `signature` field
    /// and the outer `signatureAlgorithm`.
    pub fn write_algorithm_identifier(&self, writer: DERWriter) {
        writer.write_sequence(|writer| {
            writer
                .next()
                .write_oid(&ObjectIdentifier::from_slice(self.oid_components()));
            match self {
                SignatureAlgorithm::RsaPkcs1Sha256 => writer.next().write_null(),
                SignatureAlgorithm::RsaPssSha256 => write_pss_params(writer.next()),
                _ => {}
            }
        });
    }
}

fn write_sha256_identifier(writer: DERWriter) {
    writer.write_sequence(|writer| {
        writer
            .next()
            .write_oid(&ObjectIdentifier::from_slice(OID_SHA256));
        writer.next().write_null();
    });
}

// RSASSA-PSS-params with SHA-256, MGF1(SHA-256) and a 32 byte salt.
fn write_pss_params(writer: DERWriter) {
    writer.write_sequence(|writer| {
        writer
            .next()
            .write_tagged(Tag::context(0), write_sha256_identifier);
        writer.next().write_tagged(Tag::context(1), |writer| {
            writer.write_sequence(|writer| {
                writer
                    .next()
                    .write_oid(&ObjectIdentifier::from_slice(OID_MGF1));
                write_sha256_identifier(writer.next());
            });
        });
        writer
            .next()
            .write_tagged(Tag::context(2), |writer| writer.write_u32(PSS_SALT_LEN));
    });
}

/// A generated or imported key pair. The public half is kept as SPKI DER and
/// the private half as PKCS#8 DER.
#[derive(Clone)]
pub struct KeyPair {
    algorithm: KeyAlgorithm,
    parameter: KeyParameter,
    public_key_der: Vec<u8>,
    private_key_der: Zeroizing<Vec<u8>>,
}

impl KeyPair {
    pub fn from_parts(
        algorithm: KeyAlgorithm,
        parameter: KeyParameter,
        public_key_der: Vec<u8>,
        private_key_der: Vec<u8>,
    ) -> Self {
        Self {
            algorithm,
            parameter,
            public_key_der,
            private_key_der: Zeroizing::new(private_key_der),
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn parameter(&self) -> KeyParameter {
        self.parameter
    }

    pub fn spec(&self) -> KeySpec {
        KeySpec {
            algorithm: self.algorithm,
            parameter: self.parameter,
        }
    }

    /// SubjectPublicKeyInfo DER.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    /// PKCS#8 PrivateKeyInfo DER.
    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key_der
    }

    pub fn private_key_pem(&self) -> Zeroizing<String> {
        Zeroizing::new(to_pem(PRIVATE_KEY_LABEL, &self.private_key_der))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm)
            .field("parameter", &self.parameter)
            .field("private_key_der", &"<redacted>")
            .finish()
    }
}

pub trait CryptoProvider: Send + Sync + fmt::Debug {
    fn generate_key_pair(&self, spec: &KeySpec) -> Result<KeyPair>;

    /// Loads a PKCS#8 private key. RSA keys are tagged with `rsa_algorithm`
    /// when it names an RSA variant, PKCS#1 v1.5 otherwise.
    fn import_private_key(&self, pkcs8_der: &[u8], rsa_algorithm: KeyAlgorithm)
        -> Result<KeyPair>;

    fn sign(&self, key: &KeyPair, message: &[u8]) -> Result<Vec<u8>>;

    /// Checks `signature` over `message` against an SPKI. A well-formed but
    /// wrong signature yields `Ok(false)`.
    fn verify(
        &self,
        spki_der: &[u8],
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool>;

    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Vec<u8>;

    fn random_bytes(&self, len: usize) -> Vec<u8>;

    /// AES-256-CBC with PKCS#7 padding.
    fn encrypt(&self, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// Provider backed by the `rsa`, `p256`/`p384`/`p521`, `sha1`/`sha2` and
/// `aes`/`cbc` crates.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCryptoProvider;

pub fn default_provider() -> Arc<dyn CryptoProvider> {
    Arc::new(RustCryptoProvider)
}

fn crypto_err(context: &str, err: impl fmt::Display) -> Error {
    Error::Crypto(format!("{}: {}", context, err))
}

// SPKI and PKCS#8 DER for one of the NIST curve crates.
macro_rules! ec_key_material {
    ($secret:expr) => {{
        let secret = $secret;
        let private = secret
            .to_pkcs8_der()
            .map_err(|e| crypto_err("PKCS#8 export", e))?;
        let public = secret
            .public_key()
            .to_public_key_der()
            .map_err(|e| crypto_err("SPKI export", e))?;
        (
            public.as_bytes().to_vec(),
            private.as_bytes().to_vec(),
        )
    }};
}

impl RustCryptoProvider {
    fn rsa_key_pair(algorithm: KeyAlgorithm, private: &RsaPrivateKey) -> Result<KeyPair> {
        let public = RsaPublicKey::from(private)
            .to_public_key_der()
            .map_err(|e| crypto_err("SPKI export", e))?;
        let pkcs8 = private
            .to_pkcs8_der()
            .map_err(|e| crypto_err("PKCS#8 export", e))?;
        Ok(KeyPair::from_parts(
            algorithm,
            KeyParameter::ModulusLength(rsa_modulus_bits(private)),
            public.as_bytes().to_vec(),
            pkcs8.as_bytes().to_vec(),
        ))
    }

    fn ec_key_pair(curve: EllipticCurve, pkcs8_der: Option<&[u8]>) -> Result<KeyPair> {
        let (public, private) = match (curve, pkcs8_der) {
            (EllipticCurve::P256, None) => ec_key_material!(p256::SecretKey::random(&mut OsRng)),
            (EllipticCurve::P384, None) => ec_key_material!(p384::SecretKey::random(&mut OsRng)),
            (EllipticCurve::P521, None) => ec_key_material!(p521::SecretKey::random(&mut OsRng)),
            (EllipticCurve::P256, Some(der)) => ec_key_material!(
                p256::SecretKey::from_pkcs8_der(der).map_err(|e| crypto_err("P-256 key", e))?
            ),
            (EllipticCurve::P384, Some(der)) => ec_key_material!(
                p384::SecretKey::from_pkcs8_der(der).map_err(|e| crypto_err("P-384 key", e))?
            ),
            (EllipticCurve::P521, Some(der)) => ec_key_material!(
                p521::SecretKey::from_pkcs8_der(der).map_err(|e| crypto_err("P-521 key", e))?
            ),
        };
        // Imported keys keep their original encoding.
        let private = pkcs8_der.map(|der| der.to_vec()).unwrap_or(private);
        Ok(KeyPair::from_parts(
            KeyAlgorithm::Ecdsa,
            KeyParameter::Curve(curve),
            public,
            private,
        ))
    }

    fn curve_of(key: &KeyPair) -> Result<EllipticCurve> {
        match key.parameter {
            KeyParameter::Curve(curve) => Ok(curve),
            KeyParameter::ModulusLength(_) => Err(Error::UnsupportedAlgorithm(
                "ECDSA key without a named curve".to_string(),
            )),
        }
    }
}

fn rsa_modulus_bits(key: &impl rsa::traits::PublicKeyParts) -> u32 {
    key.n().bits() as u32
}

impl CryptoProvider for RustCryptoProvider {
    fn generate_key_pair(&self, spec: &KeySpec) -> Result<KeyPair> {
        spec.validate()?;
        debug!(algorithm = %spec.algorithm, parameter = %spec.parameter, "generating key pair");
        match spec.parameter {
            KeyParameter::ModulusLength(bits) => {
                let private = RsaPrivateKey::new(&mut OsRng, bits as usize)
                    .map_err(|e| crypto_err("RSA key generation", e))?;
                Self::rsa_key_pair(spec.algorithm, &private)
            }
            KeyParameter::Curve(curve) => Self::ec_key_pair(curve, None),
        }
    }

    fn import_private_key(
        &self,
        pkcs8_der: &[u8],
        rsa_algorithm: KeyAlgorithm,
    ) -> Result<KeyPair> {
        let info = PrivateKeyInfo::try_from(pkcs8_der)
            .map_err(|e| Error::Decode(format!("PKCS#8 private key: {}", e)))?;
        let oid = info.algorithm.oid.to_string();
        match oid.as_str() {
            RSA_ENCRYPTION_OID => {
                let algorithm = if rsa_algorithm.is_rsa() {
                    rsa_algorithm
                } else {
                    KeyAlgorithm::RsaSsaPkcs1V1_5
                };
                let private = RsaPrivateKey::from_pkcs8_der(pkcs8_der)
                    .map_err(|e| crypto_err("RSA private key", e))?;
                let mut key = Self::rsa_key_pair(algorithm, &private)?;
                key.private_key_der = Zeroizing::new(pkcs8_der.to_vec());
                Ok(key)
            }
            EC_PUBLIC_KEY_OID => {
                let curve_oid = info
                    .algorithm
                    .parameters_oid()
                    .map_err(|e| Error::Decode(format!("EC key without named curve: {}", e)))?
                    .to_string();
                let curve = EllipticCurve::from_oid(&curve_oid).ok_or_else(|| {
                    Error::UnsupportedAlgorithm(format!("elliptic curve {}", curve_oid))
                })?;
                Self::ec_key_pair(curve, Some(pkcs8_der))
            }
            other => Err(Error::UnsupportedAlgorithm(format!(
                "private key algorithm {}",
                other
            ))),
        }
    }

    fn sign(&self, key: &KeyPair, message: &[u8]) -> Result<Vec<u8>> {
        match key.algorithm {
            KeyAlgorithm::RsaSsaPkcs1V1_5 => {
                let private = RsaPrivateKey::from_pkcs8_der(key.private_key_der())
                    .map_err(|e| crypto_err("RSA private key", e))?;
                let signer = rsa::pkcs1v15::SigningKey::<Sha256>::new(private);
                let signature = signer
                    .try_sign(message)
                    .map_err(|e| crypto_err("RSA signing", e))?;
                Ok(signature.to_vec())
            }
            KeyAlgorithm::RsaPss => {
                let private = RsaPrivateKey::from_pkcs8_der(key.private_key_der())
                    .map_err(|e| crypto_err("RSA private key", e))?;
                let signer = rsa::pss::BlindedSigningKey::<Sha256>::new(private);
                let signature = signer
                    .try_sign_with_rng(&mut OsRng, message)
                    .map_err(|e| crypto_err("RSA-PSS signing", e))?;
                Ok(signature.to_vec())
            }
            KeyAlgorithm::Ecdsa => {
                let prehash = Sha256::digest(message);
                match Self::curve_of(key)? {
                    EllipticCurve::P256 => {
                        let signer = p256::ecdsa::SigningKey::from_pkcs8_der(key.private_key_der())
                            .map_err(|e| crypto_err("P-256 key", e))?;
                        let signature: p256::ecdsa::Signature = signer
                            .sign_prehash(&prehash)
                            .map_err(|e| crypto_err("ECDSA signing", e))?;
                        Ok(signature.to_der().as_bytes().to_vec())
                    }
                    EllipticCurve::P384 => {
                        let signer = p384::ecdsa::SigningKey::from_pkcs8_der(key.private_key_der())
                            .map_err(|e| crypto_err("P-384 key", e))?;
                        let signature: p384::ecdsa::Signature = signer
                            .sign_prehash(&prehash)
                            .map_err(|e| crypto_err("ECDSA signing", e))?;
                        Ok(signature.to_der().as_bytes().to_vec())
                    }
                    EllipticCurve::P521 => {
                        let secret = p521::SecretKey::from_pkcs8_der(key.private_key_der())
                            .map_err(|e| crypto_err("P-521 key", e))?;
                        let signer = p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes())
                            .map_err(|e| crypto_err("P-521 key", e))?;
                        let signature: p521::ecdsa::Signature = signer
                            .sign_prehash(&p521_prehash(&prehash))
                            .map_err(|e| crypto_err("ECDSA signing", e))?;
                        Ok(signature.to_der().as_bytes().to_vec())
                    }
                }
            }
        }
    }

    fn verify(
        &self,
        spki_der: &[u8],
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool> {
        match algorithm {
            SignatureAlgorithm::RsaPkcs1Sha256 => {
                let public = RsaPublicKey::from_public_key_der(spki_der)
                    .map_err(|e| crypto_err("RSA public key", e))?;
                let verifier = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public);
                let Ok(signature) = rsa::pkcs1v15::Signature::try_from(signature) else {
                    return Ok(false);
                };
                Ok(verifier.verify(message, &signature).is_ok())
            }
            SignatureAlgorithm::RsaPssSha256 => {
                let public = RsaPublicKey::from_public_key_der(spki_der)
                    .map_err(|e| crypto_err("RSA public key", e))?;
                let verifier = rsa::pss::VerifyingKey::<Sha256>::new(public);
                let Ok(signature) = rsa::pss::Signature::try_from(signature) else {
                    return Ok(false);
                };
                Ok(verifier.verify(message, &signature).is_ok())
            }
            ecdsa => {
                let spki = SubjectPublicKeyInfoRef::try_from(spki_der)
                    .map_err(|e| Error::Decode(format!("SPKI: {}", e)))?;
                let curve_oid = spki
                    .algorithm
                    .parameters_oid()
                    .map_err(|e| Error::Decode(format!("EC key without named curve: {}", e)))?
                    .to_string();
                let curve = EllipticCurve::from_oid(&curve_oid).ok_or_else(|| {
                    Error::UnsupportedAlgorithm(format!("elliptic curve {}", curve_oid))
                })?;
                let prehash = self.digest(ecdsa.digest(), message);
                match curve {
                    EllipticCurve::P256 => {
                        let verifier = p256::ecdsa::VerifyingKey::from_public_key_der(spki_der)
                            .map_err(|e| crypto_err("P-256 public key", e))?;
                        let Ok(signature) = p256::ecdsa::Signature::from_der(signature) else {
                            return Ok(false);
                        };
                        Ok(verifier.verify_prehash(&prehash, &signature).is_ok())
                    }
                    EllipticCurve::P384 => {
                        let verifier = p384::ecdsa::VerifyingKey::from_public_key_der(spki_der)
                            .map_err(|e| crypto_err("P-384 public key", e))?;
                        let Ok(signature) = p384::ecdsa::Signature::from_der(signature) else {
                            return Ok(false);
                        };
                        Ok(verifier.verify_prehash(&prehash, &signature).is_ok())
                    }
                    EllipticCurve::P521 => {
                        let public = p521::PublicKey::from_public_key_der(spki_der)
                            .map_err(|e| crypto_err("P-521 public key", e))?;
                        let verifier = p521::ecdsa::VerifyingKey::from_sec1_bytes(
                            public.to_encoded_point(false).as_bytes(),
                        )
                        .map_err(|e| crypto_err("P-521 public key", e))?;
                        let Ok(signature) = p521::ecdsa::Signature::from_der(signature) else {
                            return Ok(false);
                        };
                        Ok(verifier
                            .verify_prehash(&p521_prehash(&prehash), &signature)
                            .is_ok())
                    }
                }
            }
        }
    }

    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Vec<u8> {
        match algorithm {
            DigestAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        OsRng.fill_bytes(&mut buf);
        buf
    }

    fn encrypt(&self, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = cbc::Encryptor::<Aes256>::new_from_slices(key, iv).map_err(|_| {
            Error::Crypto(format!(
                "AES-256-CBC needs a {} byte key and {} byte IV",
                AES_KEY_LEN, AES_IV_LEN
            ))
        })?;
        Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
    }

    fn decrypt(&self, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let cipher = cbc::Decryptor::<Aes256>::new_from_slices(key, iv).map_err(|_| {
            Error::Crypto(format!(
                "AES-256-CBC needs a {} byte key and {} byte IV",
                AES_KEY_LEN, AES_IV_LEN
            ))
        })?;
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| Error::Crypto("decryption failed: bad padding or wrong key".to_string()))
    }
}

/// Left-pads a digest to the P-521 field width. The ECDSA primitive rejects
/// prehashes shorter than half the field; zero padding keeps the digest's
/// integer value unchanged.
fn p521_prehash(digest: &[u8]) -> Vec<u8> {
    const FIELD_LEN: usize = 66;
    let mut padded = vec![0u8; FIELD_LEN.saturating_sub(digest.len())];
    padded.extend_from_slice(digest);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsa_sign_verify() {
        let provider = RustCryptoProvider;
        let key = provider.generate_key_pair(&KeySpec::rsa(1024)).unwrap();
        assert_eq!(key.parameter(), KeyParameter::ModulusLength(1024));

        for algorithm in [KeyAlgorithm::RsaSsaPkcs1V1_5, KeyAlgorithm::RsaPss] {
            let key = provider
                .import_private_key(key.private_key_der(), algorithm)
                .unwrap();
            let sig_alg = SignatureAlgorithm::for_key(&key);
            let signature = provider.sign(&key, b"to be signed").unwrap();
            assert!(provider
                .verify(key.public_key_der(), sig_alg, b"to be signed", &signature)
                .unwrap());
            assert!(!provider
                .verify(key.public_key_der(), sig_alg, b"tampered", &signature)
                .unwrap());
        }
    }

    #[test]
    fn test_ecdsa_sign_verify_all_curves() {
        let provider = RustCryptoProvider;
        for curve in [EllipticCurve::P256, EllipticCurve::P384, EllipticCurve::P521] {
            let key = provider.generate_key_pair(&KeySpec::ecdsa(curve)).unwrap();
            let sig_alg = SignatureAlgorithm::for_key(&key);
            assert_eq!(sig_alg, SignatureAlgorithm::EcdsaSha256);
            assert_eq!(sig_alg.oid(), "1.2.840.10045.4.3.2");
            let signature = provider.sign(&key, b"message").unwrap();
            assert!(
                provider
                    .verify(key.public_key_der(), sig_alg, b"message", &signature)
                    .unwrap(),
                "{} signature did not verify",
                curve
            );
            assert!(!provider
                .verify(key.public_key_der(), sig_alg, b"other", &signature)
                .unwrap());
        }
    }

    #[test]
    fn test_import_keeps_encoding_and_curve() {
        let provider = RustCryptoProvider;
        let key = provider
            .generate_key_pair(&KeySpec::ecdsa(EllipticCurve::P384))
            .unwrap();
        let imported = provider
            .import_private_key(key.private_key_der(), KeyAlgorithm::RsaPss)
            .unwrap();
        assert_eq!(imported.spec(), KeySpec::ecdsa(EllipticCurve::P384));
        assert_eq!(imported.private_key_der(), key.private_key_der());
        assert_eq!(imported.public_key_der(), key.public_key_der());
    }

    #[test]
    fn test_import_rejects_garbage() {
        let provider = RustCryptoProvider;
        assert!(matches!(
            provider.import_private_key(&[0x30, 0x00], KeyAlgorithm::Ecdsa),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_aes_round_trip() {
        let provider = RustCryptoProvider;
        let key = [7u8; AES_KEY_LEN];
        let iv = provider.random_bytes(AES_IV_LEN);
        let plaintexts: [&[u8]; 4] = [b"", b"x", &[0u8; 16], b"a longer plaintext spanning blocks"];
        for plaintext in plaintexts {
            let ct = provider.encrypt(&key, &iv, plaintext).unwrap();
            assert_eq!(ct.len() % 16, 0);
            assert!(ct.len() > plaintext.len());
            assert_eq!(provider.decrypt(&key, &iv, &ct).unwrap(), plaintext);
        }
        assert!(matches!(
            provider.encrypt(&key[..16], &iv, b"x"),
            Err(Error::Crypto(_))
        ));
        let ct = provider.encrypt(&key, &iv, b"secret").unwrap();
        let wrong = [8u8; AES_KEY_LEN];
        // a wrong key almost always breaks the padding
        if let Ok(pt) = provider.decrypt(&wrong, &iv, &ct) {
            assert_ne!(pt, b"secret");
        }
    }

    #[test]
    fn test_digests() {
        let provider = RustCryptoProvider;
        assert_eq!(
            hex::encode(provider.digest(DigestAlgorithm::Sha1, b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            hex::encode(provider.digest(DigestAlgorithm::Sha256, b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(provider.digest(DigestAlgorithm::Sha384, b"").len(), 48);
        assert_eq!(provider.digest(DigestAlgorithm::Sha512, b"").len(), 64);
    }

    #[test]
    fn test_signature_algorithm_oids() {
        assert_eq!(
            SignatureAlgorithm::RsaPkcs1Sha256.oid(),
            "1.2.840.113549.1.1.11"
        );
        assert_eq!(
            SignatureAlgorithm::from_oid("1.2.840.10045.4.3.3"),
            Some(SignatureAlgorithm::EcdsaSha384)
        );
        assert_eq!(SignatureAlgorithm::from_oid("1.2.840.113549.1.1.5"), None);
        assert_eq!(
            key_algorithm_from_oid("1.2.840.113549.1.1.1", true).unwrap(),
            KeyAlgorithm::RsaPss
        );
        assert!(matches!(
            key_algorithm_from_oid("1.3.101.112", false),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_pss_identifier_encoding() {
        let der = yasna::construct_der(|w| {
            SignatureAlgorithm::RsaPssSha256.write_algorithm_identifier(w)
        });
        // Same AlgorithmIdentifier bytes as an RSA-PSS certificate issued by
        // the WebCrypto based tooling.
        assert_eq!(
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &der),
            "MEEGCSqGSIb3DQEBCjA0oA8wDQYJYIZIAWUDBAIBBQChHDAaBgkqhkiG9w0BAQgwDQYJYIZIAWUDBAIBBQCiAwIBIA=="
        );
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let key = KeyPair::from_parts(
            KeyAlgorithm::Ecdsa,
            KeyParameter::Curve(EllipticCurve::P256),
            vec![1],
            vec![0xde, 0xad],
        );
        let debug = format!("{:?}", key);
        assert!(debug.contains("redacted"));
        assert!(!debug.contains("222"));
    }
}
