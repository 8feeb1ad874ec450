//! Credential Store (C2): per-user per-integration secrets, encrypted at
//! rest in memory with AES-256-GCM under a process-wide key.

use std::collections::HashMap;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use parking_lot::RwLock;
use zeroize::Zeroize;

use crate::error::{BrokerError, BrokerResult};
use crate::types::{IntegrationId, IntegrationSecret, StoredCredentialMeta, UserId};

/// The process-wide symmetric encryption key. Zeroized on drop, mirroring
/// `TokenSecret`'s handling of the signing secret (spec.md §9).
pub struct EncryptionKey(Vec<u8>);

impl EncryptionKey {
    /// Build an encryption key from 32 bytes of key material.
    pub fn new(bytes: impl Into<Vec<u8>>) -> BrokerResult<Self> {
        let bytes = bytes.into();
        if bytes.len() != 32 {
            return Err(BrokerError::Internal(format!(
                "encryption key must be exactly 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

struct StoredRecord {
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
    meta: StoredCredentialMeta,
}

/// In-memory, encrypted-at-rest store of integration credentials.
///
/// Non-secret fields (display name, cloud role references, account ids)
/// are kept in cleartext inside [`StoredCredentialMeta`] to support
/// `list` without decryption, per spec.md §4.2.
pub struct CredentialStore {
    key: EncryptionKey,
    records: RwLock<HashMap<(UserId, IntegrationId), StoredRecord>>,
}

impl CredentialStore {
    pub fn new(key: EncryptionKey) -> Self {
        Self {
            key,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Store an encrypted record, overwriting any prior record for the
    /// pair. A fresh random nonce is drawn on every call.
    pub fn put(
        &self,
        user_id: &str,
        integration_id: &str,
        secret: &IntegrationSecret,
        display_name: impl Into<String>,
    ) -> BrokerResult<()> {
        let plaintext = serde_json::to_vec(secret)
            .map_err(|e| BrokerError::Internal(format!("secret encode: {e}")))?;

        let cipher = self.key.cipher();
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|e| BrokerError::Internal(format!("encryption failed: {e}")))?;

        let record = StoredRecord {
            nonce: nonce.to_vec(),
            ciphertext,
            meta: StoredCredentialMeta {
                integration_id: integration_id.to_string(),
                display_name: display_name.into(),
            },
        };

        self.records
            .write()
            .insert((user_id.to_string(), integration_id.to_string()), record);
        Ok(())
    }

    /// Retrieve and decrypt a stored secret. Failure to decrypt is a
    /// fatal integrity error, never "not found" (spec.md §4.2).
    pub fn get(&self, user_id: &str, integration_id: &str) -> BrokerResult<IntegrationSecret> {
        let records = self.records.read();
        let key = (user_id.to_string(), integration_id.to_string());
        let record = records
            .get(&key)
            .ok_or_else(|| BrokerError::NotFound(format!("no credential for {integration_id}")))?;

        let cipher = self.key.cipher();
        let nonce = Nonce::from_slice(&record.nonce);
        let plaintext = cipher
            .decrypt(nonce, record.ciphertext.as_ref())
            .map_err(|_| {
                BrokerError::Integrity(format!(
                    "failed to decrypt stored credential for {integration_id}"
                ))
            })?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| BrokerError::Integrity(format!("corrupt stored credential: {e}")))
    }

    /// Delete a stored record. No error if absent.
    pub fn delete(&self, user_id: &str, integration_id: &str) {
        self.records
            .write()
            .remove(&(user_id.to_string(), integration_id.to_string()));
    }

    /// List non-secret metadata for every integration stored for a user.
    pub fn list(&self, user_id: &str) -> Vec<StoredCredentialMeta> {
        self.records
            .read()
            .iter()
            .filter(|((uid, _), _)| uid == user_id)
            .map(|(_, record)| record.meta.clone())
            .collect()
    }
}
