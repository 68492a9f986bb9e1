// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence layer: key/value backends and the stores built on them.
//!
//! Backends only move strings in and out of a medium. Expiration, metadata
//! and fallback behavior live in the stores so every medium behaves the same.

pub mod encrypted_file;
pub mod memory;
pub mod profile_cache;
pub mod token_store;

pub use encrypted_file::EncryptedFileBackend;
pub use memory::MemoryBackend;
pub use profile_cache::ProfileCache;
pub use token_store::SecureTokenStore;

use crate::error::Result;
use async_trait::async_trait;

/// Storage key names, fixed so other platforms can read the same blobs.
pub mod keys {
    pub const AUTH_TOKENS: &str = "huddle.auth_tokens";
    pub const TOKEN_METADATA: &str = "huddle.token_metadata";
    pub const REMEMBER_ME: &str = "huddle.remember_me";
    pub const PROFILE_CACHE: &str = "huddle.profile_cache";
}

/// A string key/value medium (memory, encrypted file, keychain).
#[async_trait]
pub trait SecureBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
    /// Short name for logs.
    fn name(&self) -> &'static str;
}
