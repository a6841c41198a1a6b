#![deny(clippy::pedantic, unsafe_code)]

//! Detached signature verification against the trusted publisher key
//!
//! The trusted key is compiled into the binary from `keys/trusted-public.pem`
//! and is never fetched at runtime. Signatures are raw detached signatures
//! over the whole artifact byte stream.

use ed25519_dalek::pkcs8::DecodePublicKey as _;
use plugfetch_errors::{Error, SigningError};
use rsa::pkcs1::DecodeRsaPublicKey as _;
use rsa::signature::Verifier as _;
use rsa::RsaPublicKey;
use sha1::Sha1;
use sha2::Sha256;
use std::borrow::Cow;
use std::fmt;

/// Public key the shipped build trusts, in PEM form
pub const EMBEDDED_PUBLIC_KEY_PEM: &str = include_str!("../keys/trusted-public.pem");

/// Scheme the embedded key signs with
pub const EMBEDDED_KEY_SCHEME: SignatureScheme = SignatureScheme::Ed25519;

/// Digest + signature scheme used by a publisher key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// RSA PKCS#1 v1.5 over a SHA-1 digest (`openssl dgst -sha1 -sign`)
    RsaPkcs1v15Sha1,
    /// RSA PKCS#1 v1.5 over a SHA-256 digest (`openssl dgst -sha256 -sign`)
    RsaPkcs1v15Sha256,
    /// Ed25519 over the raw message (`openssl pkeyutl -sign -rawin`)
    Ed25519,
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RsaPkcs1v15Sha1 => "rsa-pkcs1v15-sha1",
            Self::RsaPkcs1v15Sha256 => "rsa-pkcs1v15-sha256",
            Self::Ed25519 => "ed25519",
        })
    }
}

/// Unparsed trusted key material plus the scheme it is used with
///
/// Parsing is deferred to [`TrustedKeySource::load`] so a damaged key
/// surfaces as a `KeyLoad` failure of the install attempt that needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedKeySource {
    scheme: SignatureScheme,
    pem: Cow<'static, str>,
}

impl TrustedKeySource {
    /// The key compiled into this build
    #[must_use]
    pub fn embedded() -> Self {
        Self {
            scheme: EMBEDDED_KEY_SCHEME,
            pem: Cow::Borrowed(EMBEDDED_PUBLIC_KEY_PEM),
        }
    }

    /// Key material supplied by an embedding application
    #[must_use]
    pub fn new(scheme: SignatureScheme, pem: impl Into<Cow<'static, str>>) -> Self {
        Self {
            scheme,
            pem: pem.into(),
        }
    }

    #[must_use]
    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Parse the key
    ///
    /// # Errors
    ///
    /// Returns `SigningError::KeyLoad` if the PEM does not hold a public key
    /// usable with the scheme.
    pub fn load(&self) -> Result<TrustedKey, Error> {
        TrustedKey::from_pem(self.scheme, &self.pem)
    }
}

impl Default for TrustedKeySource {
    fn default() -> Self {
        Self::embedded()
    }
}

#[derive(Debug, Clone)]
enum KeyMaterial {
    RsaSha1(rsa::pkcs1v15::VerifyingKey<Sha1>),
    RsaSha256(rsa::pkcs1v15::VerifyingKey<Sha256>),
    Ed25519(ed25519_dalek::VerifyingKey),
}

/// A parsed public key ready to verify detached signatures
#[derive(Debug, Clone)]
pub struct TrustedKey {
    scheme: SignatureScheme,
    material: KeyMaterial,
}

impl TrustedKey {
    /// Parse a PEM public key for the given scheme
    ///
    /// RSA keys are accepted as SubjectPublicKeyInfo (`PUBLIC KEY`) or
    /// PKCS#1 (`RSA PUBLIC KEY`); Ed25519 keys as SubjectPublicKeyInfo.
    ///
    /// # Errors
    ///
    /// Returns `SigningError::KeyLoad` if the PEM cannot be parsed.
    pub fn from_pem(scheme: SignatureScheme, pem: &str) -> Result<Self, Error> {
        let material = match scheme {
            SignatureScheme::RsaPkcs1v15Sha1 => {
                KeyMaterial::RsaSha1(rsa::pkcs1v15::VerifyingKey::new(parse_rsa(scheme, pem)?))
            }
            SignatureScheme::RsaPkcs1v15Sha256 => {
                KeyMaterial::RsaSha256(rsa::pkcs1v15::VerifyingKey::new(parse_rsa(scheme, pem)?))
            }
            SignatureScheme::Ed25519 => KeyMaterial::Ed25519(
                ed25519_dalek::VerifyingKey::from_public_key_pem(pem.trim())
                    .map_err(|e| key_load(format!("invalid {scheme} public key: {e}")))?,
            ),
        };
        Ok(Self { scheme, material })
    }

    #[must_use]
    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Verify `signature` over `message`
    ///
    /// `artifact` names the signed subject in the error.
    ///
    /// # Errors
    ///
    /// Returns `SigningError::SignatureMismatch` if the signature is malformed
    /// or does not match.
    pub fn verify(&self, artifact: &str, message: &[u8], signature: &[u8]) -> Result<(), Error> {
        let verified = match &self.material {
            KeyMaterial::RsaSha1(key) => rsa::pkcs1v15::Signature::try_from(signature)
                .is_ok_and(|sig| key.verify(message, &sig).is_ok()),
            KeyMaterial::RsaSha256(key) => rsa::pkcs1v15::Signature::try_from(signature)
                .is_ok_and(|sig| key.verify(message, &sig).is_ok()),
            KeyMaterial::Ed25519(key) => ed25519_dalek::Signature::from_slice(signature)
                .is_ok_and(|sig| key.verify_strict(message, &sig).is_ok()),
        };

        if verified {
            Ok(())
        } else {
            Err(SigningError::SignatureMismatch {
                artifact: artifact.to_string(),
            }
            .into())
        }
    }
}

fn parse_rsa(scheme: SignatureScheme, pem: &str) -> Result<RsaPublicKey, Error> {
    let pem = pem.trim();
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| key_load(format!("invalid {scheme} public key: {e}")))
}

fn key_load(message: String) -> Error {
    SigningError::KeyLoad { message }.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
    use ed25519_dalek::pkcs8::EncodePublicKey;
    use ed25519_dalek::Signer as _;
    use proptest::prelude::*;
    use rsa::pkcs8::DecodePrivateKey;
    use rsa::signature::{SignatureEncoding, Signer};

    const PAYLOAD: &[u8] = include_bytes!("../testdata/payload.bin");
    const RSA_PUBLIC: &str = include_str!("../testdata/rsa-test-key.pub.pem");
    const RSA_PRIVATE: &str = include_str!("../testdata/rsa-test-key.pem");
    const RSA_SHA1_SIG: &[u8] = include_bytes!("../testdata/payload.bin.rsa-sha1.sig");
    const ED25519_PUBLIC: &str = include_str!("../testdata/ed25519-test-key.pub.pem");
    const ED25519_SIG: &[u8] = include_bytes!("../testdata/payload.bin.ed25519.sig");

    fn ed25519_pair(seed: u8) -> (ed25519_dalek::SigningKey, String) {
        let signing = ed25519_dalek::SigningKey::from_bytes(&[seed; 32]);
        let pem = signing
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        (signing, pem)
    }

    fn flip(bytes: &[u8], bit: usize) -> Vec<u8> {
        let mut out = bytes.to_vec();
        let bit = bit % (out.len() * 8);
        out[bit / 8] ^= 1 << (bit % 8);
        out
    }

    #[test]
    fn embedded_key_parses() {
        let key = TrustedKeySource::embedded().load().unwrap();
        assert_eq!(key.scheme(), SignatureScheme::Ed25519);
    }

    #[test]
    fn openssl_rsa_sha1_signature_verifies() {
        let key = TrustedKey::from_pem(SignatureScheme::RsaPkcs1v15Sha1, RSA_PUBLIC).unwrap();
        key.verify("payload.bin", PAYLOAD, RSA_SHA1_SIG).unwrap();
    }

    #[test]
    fn rsa_sha1_signature_does_not_verify_under_sha256() {
        let key = TrustedKey::from_pem(SignatureScheme::RsaPkcs1v15Sha256, RSA_PUBLIC).unwrap();
        assert!(key.verify("payload.bin", PAYLOAD, RSA_SHA1_SIG).is_err());
    }

    #[test]
    fn rsa_sha256_round_trip() {
        let private = rsa::RsaPrivateKey::from_pkcs8_pem(RSA_PRIVATE).unwrap();
        let signer = rsa::pkcs1v15::SigningKey::<Sha256>::new(private);
        let signature = signer.sign(b"libplugin bytes").to_vec();

        let key = TrustedKey::from_pem(SignatureScheme::RsaPkcs1v15Sha256, RSA_PUBLIC).unwrap();
        key.verify("libplugin.so.1", b"libplugin bytes", &signature)
            .unwrap();
    }

    #[test]
    fn openssl_ed25519_signature_verifies() {
        let key = TrustedKey::from_pem(SignatureScheme::Ed25519, ED25519_PUBLIC).unwrap();
        key.verify("payload.bin", PAYLOAD, ED25519_SIG).unwrap();
        assert!(key.verify("payload.bin", PAYLOAD, RSA_SHA1_SIG).is_err());
    }

    #[test]
    fn mismatch_names_the_artifact() {
        let (_, pem) = ed25519_pair(3);
        let key = TrustedKey::from_pem(SignatureScheme::Ed25519, &pem).unwrap();
        let err = key.verify("plugin-host", b"data", &[0u8; 64]).unwrap_err();
        assert!(matches!(
            err,
            Error::Signing(SigningError::SignatureMismatch { ref artifact }) if artifact == "plugin-host"
        ));
        // truncated signatures are mismatches too, not format errors
        assert!(key.verify("plugin-host", b"data", &[1u8; 12]).is_err());
    }

    #[test]
    fn garbage_key_fails_to_load() {
        for scheme in [
            SignatureScheme::RsaPkcs1v15Sha1,
            SignatureScheme::RsaPkcs1v15Sha256,
            SignatureScheme::Ed25519,
        ] {
            let err = TrustedKeySource::new(scheme, "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n")
                .load()
                .unwrap_err();
            assert!(matches!(err, Error::Signing(SigningError::KeyLoad { .. })));
        }
        // an Ed25519 key is not an RSA key
        let err = TrustedKey::from_pem(SignatureScheme::RsaPkcs1v15Sha1, ED25519_PUBLIC).unwrap_err();
        assert!(err.to_string().contains("rsa-pkcs1v15-sha1"), "{err}");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn any_bit_flip_breaks_rsa_sha1(bit in 0usize..4096, in_signature: bool) {
            let key = TrustedKey::from_pem(SignatureScheme::RsaPkcs1v15Sha1, RSA_PUBLIC).unwrap();
            let result = if in_signature {
                key.verify("payload.bin", PAYLOAD, &flip(RSA_SHA1_SIG, bit))
            } else {
                key.verify("payload.bin", &flip(PAYLOAD, bit), RSA_SHA1_SIG)
            };
            prop_assert!(result.is_err());
        }

        #[test]
        fn any_bit_flip_breaks_ed25519(
            message in proptest::collection::vec(any::<u8>(), 1..512),
            bit in 0usize..8192,
            in_signature: bool,
        ) {
            let (signing, pem) = ed25519_pair(42);
            let key = TrustedKey::from_pem(SignatureScheme::Ed25519, &pem).unwrap();
            let signature = signing.sign(&message).to_bytes();
            prop_assert!(key.verify("m", &message, &signature).is_ok());

            let result = if in_signature {
                key.verify("m", &message, &flip(&signature, bit))
            } else {
                key.verify("m", &flip(&message, bit), &signature)
            };
            prop_assert!(result.is_err());
        }
    }
}
