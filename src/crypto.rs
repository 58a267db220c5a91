//! At-rest protection for voiceprints.
//!
//! Each record is encrypted under a key derived from the process secret,
//! the owning user id, and a per-record salt, so records are bound to
//! their user and cannot be swapped or decrypted in bulk. The ciphersuite
//! is the fernet token format (AES-128-CBC + HMAC-SHA256, versioned,
//! timestamped, authenticated); token verification uses a constant-time
//! MAC comparison.

use crate::config::ProcessSecret;
use crate::error::{AuthError, Result};
use crate::voiceprint::Voiceprint;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Raw salt length; the encoded form is twice this in hex characters.
pub const SALT_LEN: usize = 16;

/// Derived key length fed to the token cipher.
const KEY_LEN: usize = 32;

/// Per-user authenticated encryption of serialized voiceprints.
pub struct VoiceprintCipher {
    secret: ProcessSecret,
    iterations: u32,
}

impl VoiceprintCipher {
    pub fn new(secret: ProcessSecret, iterations: u32) -> Self {
        Self { secret, iterations }
    }

    /// Fresh per-record salt from the platform CSPRNG, hex-encoded.
    pub fn generate_salt() -> String {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        hex::encode(salt)
    }

    /// Encrypt a voiceprint for `user_id` under the given salt.
    ///
    /// The payload is the compact little-endian binary encoding of the
    /// voiceprint; the returned token is ASCII and safe to store as-is.
    pub fn encrypt(&self, voiceprint: &Voiceprint, user_id: &str, salt_hex: &str) -> Result<String> {
        let fernet = self.build_cipher(user_id, salt_hex)?;
        let payload = Zeroizing::new(
            bincode::serialize(voiceprint)
                .map_err(|e| AuthError::InternalInvariant(format!("payload encoding: {e}")))?,
        );
        Ok(fernet.encrypt(&payload))
    }

    /// Decrypt a stored token back into a voiceprint.
    ///
    /// Token verification failure (wrong key, wrong user, tampering)
    /// reports `IntegrityViolation`; a verified token whose payload does
    /// not decode reports `CorruptVoiceprint`.
    pub fn decrypt(&self, token: &str, user_id: &str, salt_hex: &str) -> Result<Voiceprint> {
        let fernet = self.build_cipher(user_id, salt_hex)?;
        let payload = Zeroizing::new(
            fernet
                .decrypt(token)
                .map_err(|_| AuthError::IntegrityViolation)?,
        );
        bincode::deserialize(&payload).map_err(|_| AuthError::CorruptVoiceprint)
    }

    fn build_cipher(&self, user_id: &str, salt_hex: &str) -> Result<fernet::Fernet> {
        let key = self.derive_key(user_id, salt_hex);
        fernet::Fernet::new(&key)
            .ok_or_else(|| AuthError::InternalInvariant("derived key rejected by cipher".into()))
    }

    /// PBKDF2-HMAC-SHA256 over `secret || "_" || user_id`, salted by the
    /// hex-encoded salt string, emitted as a URL-safe base64 key.
    fn derive_key(&self, user_id: &str, salt_hex: &str) -> Zeroizing<String> {
        let mut material =
            Zeroizing::new(Vec::with_capacity(self.secret.as_bytes().len() + 1 + user_id.len()));
        material.extend_from_slice(self.secret.as_bytes());
        material.push(b'_');
        material.extend_from_slice(user_id.as_bytes());

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2_hmac::<Sha256>(&material, salt_hex.as_bytes(), self.iterations, &mut *key);
        Zeroizing::new(URL_SAFE.encode(&*key))
    }
}
