//! Algorithm suite `v1`: P-256 ECDSA over SHA-512 for signing, SHA-512 for
//! digests, ECDH + AES-256-GCM for authenticated encryption.
//!
//! A closed, tagged-variant registry of suites (see [`crate::registry`])
//! stands in for ad-hoc version strings — each suite is an implementation of
//! [`AlgorithmSuite`], and `v1` is the only one this crate ships.

use aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use p256::ecdsa::signature::{DigestSigner, DigestVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::{PublicKey, SecretKey};
use rand::RngCore;
use sha2::{Digest as _, Sha512};

use crate::error::{ErrorKind, NotaryError, Result};

/// A keypair generated by an [`AlgorithmSuite`]: the uncompressed public
/// point and the raw private scalar. Callers are responsible for zeroizing
/// the private half once it has been handed to a [`crate::ssm`] state.
pub struct KeyPair {
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
}

/// An authenticated-encrypted message body, prior to being wrapped in an AEM
/// envelope.
pub struct Encrypted {
    pub ephemeral_public: Vec<u8>,
    pub iv: Vec<u8>,
    pub auth: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

const GCM_TAG_LEN: usize = 16;
const GCM_IV_LEN: usize = 12;

/// The operations every protocol version must provide.
pub trait AlgorithmSuite: Send + Sync {
    /// The protocol version string this suite implements, e.g. `"v1"`.
    fn protocol(&self) -> &'static str;

    fn digest(&self, bytes: &[u8]) -> Vec<u8>;

    fn keypair(&self) -> KeyPair;

    /// The public key matching `private_key`, for cross-checking a loaded
    /// key against its paired certificate.
    fn derive_public(&self, private_key: &[u8]) -> Result<Vec<u8>>;

    fn sign(&self, private_key: &[u8], bytes: &[u8]) -> Result<Vec<u8>>;

    fn verify(&self, public_key: &[u8], bytes: &[u8], signature: &[u8]) -> bool;

    fn encrypt(&self, recipient_public: &[u8], plaintext: &[u8]) -> Result<Encrypted>;

    fn decrypt(
        &self,
        private_key: &[u8],
        ephemeral_public: &[u8],
        iv: &[u8],
        auth: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;
}

/// `v1`: SHA-512 / P-256 ECDSA / ECDH+AES-256-GCM.
#[derive(Default)]
pub struct SuiteV1;

impl SuiteV1 {
    pub fn new() -> Self {
        SuiteV1
    }

    fn shared_secret(secret: &SecretKey, public: &PublicKey) -> [u8; 32] {
        let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
        let mut key = [0u8; 32];
        key.copy_from_slice(&shared.raw_secret_bytes()[..32]);
        key
    }
}

impl AlgorithmSuite for SuiteV1 {
    fn protocol(&self) -> &'static str {
        "v1"
    }

    fn digest(&self, bytes: &[u8]) -> Vec<u8> {
        Sha512::digest(bytes).to_vec()
    }

    fn keypair(&self) -> KeyPair {
        let secret = SecretKey::random(&mut rand::rngs::OsRng);
        let public = secret.public_key();
        KeyPair {
            public_key: public.to_encoded_point(false).as_bytes().to_vec(),
            private_key: secret.to_bytes().to_vec(),
        }
    }

    fn derive_public(&self, private_key: &[u8]) -> Result<Vec<u8>> {
        let secret = SecretKey::from_slice(private_key).map_err(|e| {
            NotaryError::with_cause("suite/v1", "derive_public", ErrorKind::MalformedComponent, e)
        })?;
        Ok(secret.public_key().to_encoded_point(false).as_bytes().to_vec())
    }

    fn sign(&self, private_key: &[u8], bytes: &[u8]) -> Result<Vec<u8>> {
        let signing_key = SigningKey::from_slice(private_key).map_err(|e| {
            NotaryError::with_cause("suite/v1", "sign", ErrorKind::MalformedComponent, e)
        })?;
        let digest = Sha512::new_with_prefix(bytes);
        let signature: Signature = signing_key.sign_digest(digest);
        Ok(signature.to_der().as_bytes().to_vec())
    }

    fn verify(&self, public_key: &[u8], bytes: &[u8], signature: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(public_key) else {
            return false;
        };
        let Ok(sig) = Signature::from_der(signature) else {
            return false;
        };
        let digest = Sha512::new_with_prefix(bytes);
        verifying_key.verify_digest(digest, &sig).is_ok()
    }

    fn encrypt(&self, recipient_public: &[u8], plaintext: &[u8]) -> Result<Encrypted> {
        let recipient = PublicKey::from_sec1_bytes(recipient_public).map_err(|e| {
            NotaryError::with_cause("suite/v1", "encrypt", ErrorKind::MalformedComponent, e)
        })?;
        let ephemeral = SecretKey::random(&mut rand::rngs::OsRng);
        let ephemeral_public = ephemeral.public_key().to_encoded_point(false).as_bytes().to_vec();
        let key = Self::shared_secret(&ephemeral, &recipient);

        let mut iv = [0u8; GCM_IV_LEN];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let cipher = Aes256Gcm::new_from_slice(&key).expect("32-byte key");
        let sealed = cipher
            .encrypt(Nonce::from_slice(&iv), Payload { msg: plaintext, aad: &[] })
            .map_err(|_| {
                NotaryError::new("suite/v1", "encrypt", ErrorKind::AuthenticationFailed)
            })?;
        let split_at = sealed.len() - GCM_TAG_LEN;
        let (ciphertext, auth) = sealed.split_at(split_at);

        Ok(Encrypted {
            ephemeral_public,
            iv: iv.to_vec(),
            auth: auth.to_vec(),
            ciphertext: ciphertext.to_vec(),
        })
    }

    fn decrypt(
        &self,
        private_key: &[u8],
        ephemeral_public: &[u8],
        iv: &[u8],
        auth: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        let secret = SecretKey::from_slice(private_key).map_err(|e| {
            NotaryError::with_cause("suite/v1", "decrypt", ErrorKind::MalformedComponent, e)
        })?;
        let ephemeral = PublicKey::from_sec1_bytes(ephemeral_public).map_err(|e| {
            NotaryError::with_cause("suite/v1", "decrypt", ErrorKind::MalformedComponent, e)
        })?;
        let key = Self::shared_secret(&secret, &ephemeral);

        if iv.len() != GCM_IV_LEN {
            return Err(NotaryError::new("suite/v1", "decrypt", ErrorKind::MalformedComponent));
        }
        let mut sealed = Vec::with_capacity(ciphertext.len() + auth.len());
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(auth);

        let cipher = Aes256Gcm::new_from_slice(&key).expect("32-byte key");
        cipher
            .decrypt(Nonce::from_slice(iv), Payload { msg: &sealed, aad: &[] })
            .map_err(|_| NotaryError::new("suite/v1", "decrypt", ErrorKind::AuthenticationFailed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let suite = SuiteV1::new();
        let kp = suite.keypair();
        let msg = b"notarize this";
        let sig = suite.sign(&kp.private_key, msg).unwrap();
        assert!(suite.verify(&kp.public_key, msg, &sig));
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let suite = SuiteV1::new();
        let kp = suite.keypair();
        let sig = suite.sign(&kp.private_key, b"original").unwrap();
        assert!(!suite.verify(&kp.public_key, b"tampered", &sig));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let suite = SuiteV1::new();
        let kp_a = suite.keypair();
        let kp_b = suite.keypair();
        let sig = suite.sign(&kp_a.private_key, b"hello").unwrap();
        assert!(!suite.verify(&kp_b.public_key, b"hello", &sig));
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let suite = SuiteV1::new();
        let kp = suite.keypair();
        let plaintext = b"This is a test...";
        let enc = suite.encrypt(&kp.public_key, plaintext).unwrap();
        let out = suite
            .decrypt(&kp.private_key, &enc.ephemeral_public, &enc.iv, &enc.auth, &enc.ciphertext)
            .unwrap();
        assert_eq!(out, plaintext);
    }

    #[test]
    fn decrypt_fails_on_tampered_ciphertext() {
        let suite = SuiteV1::new();
        let kp = suite.keypair();
        let enc = suite.encrypt(&kp.public_key, b"secret message").unwrap();
        let mut bad_ct = enc.ciphertext.clone();
        bad_ct[0] ^= 0x01;
        let err = suite
            .decrypt(&kp.private_key, &enc.ephemeral_public, &enc.iv, &enc.auth, &bad_ct)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthenticationFailed);
    }

    #[test]
    fn decrypt_fails_on_tampered_auth_tag() {
        let suite = SuiteV1::new();
        let kp = suite.keypair();
        let enc = suite.encrypt(&kp.public_key, b"secret message").unwrap();
        let mut bad_auth = enc.auth.clone();
        bad_auth[0] ^= 0x01;
        let err = suite
            .decrypt(&kp.private_key, &enc.ephemeral_public, &enc.iv, &bad_auth, &enc.ciphertext)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthenticationFailed);
    }

    #[test]
    fn decrypt_fails_on_tampered_iv() {
        let suite = SuiteV1::new();
        let kp = suite.keypair();
        let enc = suite.encrypt(&kp.public_key, b"secret message").unwrap();
        let mut bad_iv = enc.iv.clone();
        bad_iv[0] ^= 0x01;
        let err = suite
            .decrypt(&kp.private_key, &enc.ephemeral_public, &bad_iv, &enc.auth, &enc.ciphertext)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthenticationFailed);
    }

    #[test]
    fn derive_public_matches_the_generated_public_key() {
        let suite = SuiteV1::new();
        let kp = suite.keypair();
        assert_eq!(suite.derive_public(&kp.private_key).unwrap(), kp.public_key);
    }

    #[test]
    fn digest_is_deterministic_and_64_bytes() {
        let suite = SuiteV1::new();
        let d1 = suite.digest(b"hello world");
        let d2 = suite.digest(b"hello world");
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64);
    }
}
