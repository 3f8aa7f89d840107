//! Encrypted item handles.
//!
//! `EncryptedFile` and `EncryptedDir` tie a decrypted logical name to
//! its storage path and parent directory ID. Handles are snapshots:
//! they hold no locks and reflect storage at construction time. A
//! mutating operation (`move_to`, delete) consumes the handle — the
//! underlying storage path may have changed, so callers relist.

use std::sync::RwLock;

use crate::error::VaultResult;
use crate::names::{
    shorten_name, CONTENTS_FILE, DIR_ID_FILE, LONG_NAME_FILE, REGULAR_SUFFIX, SHORTENED_SUFFIX,
};
use crate::provider::join_path;
use crate::vault::Vault;

/// Handle to an encrypted file entry.
pub struct EncryptedFile<'v> {
    vault: &'v Vault,
    /// On-storage entry name (`<encoded>.c9r` or `<sha1>.c9s`).
    pub stored_name: String,
    /// Full storage path of the entry.
    pub full_name: String,
    /// Decrypted logical name.
    pub decrypted_name: String,
    /// Parent directory ID (`None` never occurs for files in practice).
    pub parent_id: Option<String>,
    /// Last modification time as reported by the backend.
    pub last_mod: Option<String>,
    /// Whether the entry is stored under a `.c9s` shortened name.
    pub shortened: bool,
}

impl<'v> std::fmt::Debug for EncryptedDir<'v> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedDir")
            .field("stored_name", &self.stored_name)
            .field("full_name", &self.full_name)
            .field("decrypted_name", &self.decrypted_name)
            .field("parent_id", &self.parent_id)
            .field("last_mod", &self.last_mod)
            .field("shortened", &self.shortened)
            .finish()
    }
}

/// Handle to an encrypted directory entry.
pub struct EncryptedDir<'v> {
    vault: &'v Vault,
    pub stored_name: String,
    pub full_name: String,
    pub decrypted_name: String,
    /// `None` marks the root handle.
    pub parent_id: Option<String>,
    pub last_mod: Option<String>,
    pub shortened: bool,
    /// Lazily resolved directory ID. Concurrent resolutions may race,
    /// but both read the same `dir.c9r` so the write is idempotent.
    dir_id_cache: RwLock<Option<String>>,
}

/// A listed vault entry: file or directory.
pub enum EncryptedItem<'v> {
    File(EncryptedFile<'v>),
    Dir(EncryptedDir<'v>),
}

impl<'v> EncryptedFile<'v> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        vault: &'v Vault,
        stored_name: String,
        full_name: String,
        decrypted_name: String,
        parent_id: Option<String>,
        last_mod: Option<String>,
        shortened: bool,
    ) -> Self {
        Self {
            vault,
            stored_name,
            full_name,
            decrypted_name,
            parent_id,
            last_mod,
            shortened,
        }
    }

    /// Remove this file from storage. Consumes the handle.
    pub async fn delete(self) -> VaultResult<()> {
        self.vault.delete_file_at(&self.full_name, self.shortened).await
    }

    /// Move this file into the directory identified by `dest_dir_id`,
    /// re-encrypting its name under the new parent. Consumes the handle.
    pub async fn move_to(self, dest_dir_id: &str) -> VaultResult<()> {
        let vault = self.vault;
        let provider = vault.provider();

        let encoded = vault.encrypt_file_name(&self.decrypted_name, dest_dir_id)?;
        let to_short = encoded.len() > vault.settings().shortening_threshold as usize;
        let dest_dir = vault.get_dir(dest_dir_id)?;

        match (self.shortened, to_short) {
            (false, false) => {
                let target = join_path(&dest_dir, &format!("{encoded}{REGULAR_SUFFIX}"));
                provider.rename(&self.full_name, &target).await?;
            }
            (false, true) => {
                let entry = join_path(
                    &dest_dir,
                    &format!("{}{SHORTENED_SUFFIX}", shorten_name(&encoded)),
                );
                provider.create_dir(&entry, true).await?;
                provider
                    .rename(&self.full_name, &join_path(&entry, CONTENTS_FILE))
                    .await?;
                provider
                    .write_file(&join_path(&entry, LONG_NAME_FILE), encoded.as_bytes())
                    .await?;
            }
            (true, false) => {
                let target = join_path(&dest_dir, &format!("{encoded}{REGULAR_SUFFIX}"));
                provider
                    .rename(&join_path(&self.full_name, CONTENTS_FILE), &target)
                    .await?;
                provider.remove_dir(&self.full_name).await?;
            }
            (true, true) => {
                let entry = join_path(
                    &dest_dir,
                    &format!("{}{SHORTENED_SUFFIX}", shorten_name(&encoded)),
                );
                provider.rename(&self.full_name, &entry).await?;
                provider
                    .write_file(&join_path(&entry, LONG_NAME_FILE), encoded.as_bytes())
                    .await?;
            }
        }
        Ok(())
    }
}

impl<'v> EncryptedDir<'v> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        vault: &'v Vault,
        stored_name: String,
        full_name: String,
        decrypted_name: String,
        parent_id: Option<String>,
        last_mod: Option<String>,
        dir_id: Option<String>,
        shortened: bool,
    ) -> Self {
        Self {
            vault,
            stored_name,
            full_name,
            decrypted_name,
            parent_id,
            last_mod,
            shortened,
            dir_id_cache: RwLock::new(dir_id),
        }
    }

    /// Whether this handle is the vault root.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Resolve this directory's ID.
    ///
    /// The root is always `""`. Anything else reads `dir.c9r` inside the
    /// entry once and caches the result for the handle's lifetime.
    pub async fn get_dir_id(&self) -> VaultResult<String> {
        if self.is_root() {
            return Ok(String::new());
        }
        if let Some(id) = self.dir_id_cache.read().unwrap().clone() {
            return Ok(id);
        }

        let content = self
            .vault
            .provider()
            .read_file_string(&join_path(&self.full_name, DIR_ID_FILE))
            .await?;
        let id = content.trim().to_string();
        *self.dir_id_cache.write().unwrap() = Some(id.clone());
        Ok(id)
    }

    /// Drop the cached directory ID; the next `get_dir_id` re-reads
    /// storage.
    pub fn clear_dir_id_cache(&self) {
        *self.dir_id_cache.write().unwrap() = None;
    }

    /// Move this directory entry into the directory identified by
    /// `dest_dir_id`, re-encrypting its name under the new parent. Only
    /// the entry moves — the subtree is reachable through the unchanged
    /// directory ID. Consumes the handle.
    pub async fn move_to(self, dest_dir_id: &str) -> VaultResult<()> {
        let vault = self.vault;
        let provider = vault.provider();

        let encoded = vault.encrypt_file_name(&self.decrypted_name, dest_dir_id)?;
        let to_short = encoded.len() > vault.settings().shortening_threshold as usize;
        let dest_dir = vault.get_dir(dest_dir_id)?;

        let target = if to_short {
            join_path(
                &dest_dir,
                &format!("{}{SHORTENED_SUFFIX}", shorten_name(&encoded)),
            )
        } else {
            join_path(&dest_dir, &format!("{encoded}{REGULAR_SUFFIX}"))
        };

        provider.rename(&self.full_name, &target).await?;

        match (self.shortened, to_short) {
            (_, true) => {
                provider
                    .write_file(&join_path(&target, LONG_NAME_FILE), encoded.as_bytes())
                    .await?;
            }
            (true, false) => {
                provider
                    .remove_file(&join_path(&target, LONG_NAME_FILE))
                    .await?;
            }
            (false, false) => {}
        }
        Ok(())
    }
}

impl<'v> EncryptedItem<'v> {
    pub fn name(&self) -> &str {
        match self {
            EncryptedItem::File(f) => &f.decrypted_name,
            EncryptedItem::Dir(d) => &d.decrypted_name,
        }
    }

    pub fn stored_name(&self) -> &str {
        match self {
            EncryptedItem::File(f) => &f.stored_name,
            EncryptedItem::Dir(d) => &d.stored_name,
        }
    }

    pub fn full_name(&self) -> &str {
        match self {
            EncryptedItem::File(f) => &f.full_name,
            EncryptedItem::Dir(d) => &d.full_name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, EncryptedItem::Dir(_))
    }

    pub fn shortened(&self) -> bool {
        match self {
            EncryptedItem::File(f) => f.shortened,
            EncryptedItem::Dir(d) => d.shortened,
        }
    }

    /// Handle-level move; dispatches to the file or directory logic.
    pub async fn move_to(self, dest_dir_id: &str) -> VaultResult<()> {
        match self {
            EncryptedItem::File(f) => f.move_to(dest_dir_id).await,
            EncryptedItem::Dir(d) => d.move_to(dest_dir_id).await,
        }
    }
}
