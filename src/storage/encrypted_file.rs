// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Encrypted on-disk backend, the desktop/CLI stand-in for a device keychain.
//!
//! Each key is stored in its own file as `base64(nonce || ciphertext || tag)`
//! sealed with AES-256-GCM. The storage key name is bound as AAD so a blob
//! copied to another key's file fails to decrypt.
//!
//! The master key lives in `<dir>/.key` and is created exactly once. An
//! existing but unreadable key file is an error, never a reason to mint a
//! fresh key: that would orphan every blob already on disk.

use super::SecureBackend;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hkdf::Hkdf;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const KEY_FILE: &str = ".key";
const MASTER_KEY_LEN: usize = 32;
const HKDF_SALT: &[u8] = b"huddle.secure-storage";
const HKDF_INFO: &[u8] = b"aes-256-gcm data key v1";

pub struct EncryptedFileBackend {
    dir: PathBuf,
    key: LessSafeKey,
    rng: SystemRandom,
}

impl EncryptedFileBackend {
    /// Open (or initialize) the store in `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", dir.display(), e)))?;

        let rng = SystemRandom::new();
        let master = load_or_create_master_key(&dir, &rng).await?;
        let key = derive_data_key(&master)?;

        tracing::debug!(dir = %dir.display(), "Encrypted storage opened");
        Ok(Self { dir, key, rng })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.enc", hex::encode(key)))
    }

    /// Unique per write, so concurrent writers to one key never share it.
    fn temp_path_for(&self, key: &str) -> Result<PathBuf> {
        let mut suffix = [0u8; 8];
        self.rng
            .fill(&mut suffix)
            .map_err(|_| AppError::Storage("Random temp name generation failed".to_string()))?;
        Ok(self
            .dir
            .join(format!("{}.{}.tmp", hex::encode(key), hex::encode(suffix))))
    }

    fn seal(&self, key: &str, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AppError::Storage("Random nonce generation failed".to_string()))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(key.as_bytes()),
                &mut in_out,
            )
            .map_err(|_| AppError::Storage(format!("Failed to encrypt {}", key)))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + in_out.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&in_out);
        Ok(BASE64.encode(blob))
    }

    fn unseal(&self, key: &str, encoded: &str) -> Result<String> {
        let blob = BASE64
            .decode(encoded.trim())
            .map_err(|e| AppError::Storage(format!("Corrupt blob for {}: {}", key, e)))?;
        if blob.len() < NONCE_LEN {
            return Err(AppError::Storage(format!("Truncated blob for {}", key)));
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| AppError::Storage(format!("Bad nonce for {}", key)))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from(key.as_bytes()), &mut in_out)
            .map_err(|_| AppError::Storage(format!("Failed to decrypt {}", key)))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|e| AppError::Storage(format!("Invalid UTF-8 in {}: {}", key, e)))
    }
}

#[async_trait]
impl SecureBackend for EncryptedFileBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(encoded) => self.unseal(key, &encoded).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!("Failed to read {}: {}", key, e))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let sealed = self.seal(key, value)?;
        let path = self.path_for(key);
        let tmp = self.temp_path_for(key)?;

        // Write-then-rename so a crash never leaves a half-written blob.
        tokio::fs::write(&tmp, sealed)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", key, e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to persist {}: {}", key, e)))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to remove {}: {}", key, e))),
        }
    }

    fn name(&self) -> &'static str {
        "encrypted_file"
    }
}

async fn load_or_create_master_key(dir: &Path, rng: &SystemRandom) -> Result<[u8; MASTER_KEY_LEN]> {
    let path = dir.join(KEY_FILE);

    match tokio::fs::read_to_string(&path).await {
        Ok(encoded) => {
            let bytes = BASE64
                .decode(encoded.trim())
                .map_err(|e| AppError::Storage(format!("Corrupt key file: {}", e)))?;
            bytes
                .try_into()
                .map_err(|_| AppError::Storage("Key file has the wrong length".to_string()))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let mut master = [0u8; MASTER_KEY_LEN];
            rng.fill(&mut master)
                .map_err(|_| AppError::Storage("Random key generation failed".to_string()))?;

            tokio::fs::write(&path, BASE64.encode(master))
                .await
                .map_err(|e| AppError::Storage(format!("Failed to write key file: {}", e)))?;
            restrict_permissions(&path).await?;

            tracing::info!(path = %path.display(), "Created storage encryption key");
            Ok(master)
        }
        Err(e) => Err(AppError::Storage(format!("Failed to read key file: {}", e))),
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| AppError::Storage(format!("Failed to restrict key file: {}", e)))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

fn derive_data_key(master: &[u8]) -> Result<LessSafeKey> {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), master);
    let mut okm = [0u8; 32];
    hk.expand(HKDF_INFO, &mut okm)
        .map_err(|_| AppError::Storage("Key derivation failed".to_string()))?;

    let unbound = UnboundKey::new(&AES_256_GCM, &okm)
        .map_err(|_| AppError::Storage("Invalid data key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}
