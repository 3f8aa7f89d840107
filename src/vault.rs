//! Vault facade: lifecycle and namespace operations.
//!
//! A `Vault` composes the key hierarchy, the two on-storage documents
//! and the name/directory cryptography with a [`DataProvider`]. It is
//! immutable once constructed — the two live keys are read-only for the
//! vault's lifetime and every operation translates logical paths into
//! storage paths before delegating blob I/O to the provider.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{self, VaultConfigClaims, CIPHER_COMBO, DEFAULT_SHORTENING_THRESHOLD, VAULT_FORMAT};
use crate::error::{VaultError, VaultResult};
use crate::items::{EncryptedDir, EncryptedFile, EncryptedItem};
use crate::keys::{EncryptionKey, MacKey, SivKey};
use crate::masterkey::MasterkeyFile;
use crate::names::{
    self, CONTENTS_FILE, DIR_ID_BACKUP_FILE, DIR_ID_FILE, LONG_NAME_FILE, REGULAR_SUFFIX,
    SHORTENED_SUFFIX,
};
use crate::provider::{join_path, DataProvider, Item, ItemKind, ProviderError};

/// Config document file name inside the vault root.
pub const VAULT_CONFIG_FILE: &str = "vault.cryptomator";
/// Masterkey document file name inside the vault root.
pub const MASTERKEY_FILE: &str = "masterkey.cryptomator";
/// Data directory holding the DirID-mapped tree.
pub const DATA_DIR: &str = "d";

/// Default scrypt cost parameter (N) for new vaults.
pub const DEFAULT_SCRYPT_COST: u32 = 32768;
/// Default scrypt block size (r) for new vaults.
pub const DEFAULT_SCRYPT_BLOCK_SIZE: u32 = 8;

/// Phases of vault creation, fired in ordinal order.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CreationStep {
    DupeCheck = 0,
    KeyGen = 1,
    CreatingFiles = 2,
    CreatingRoot = 3,
}

/// Per-completion `(done, total)` progress for list/delete operations.
pub type ProgressFn<'a> = dyn Fn(usize, usize) + Send + Sync + 'a;

/// Vault parameters fixed at create/open time.
#[derive(Debug, Clone)]
pub struct VaultSettings {
    pub format: u32,
    pub shortening_threshold: u32,
    pub scrypt_cost: u32,
    pub scrypt_block_size: u32,
}

/// Fan-out control: `-1` is unbounded, any positive `n` caps each batch.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub concurrency: i32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { concurrency: -1 }
    }
}

/// Options for [`Vault::create`].
///
/// Exactly one layout applies: `name` creates a `dir/name` subdirectory
/// (failing if it exists), `create_here` writes straight into `dir`
/// (failing if any vault artifact already exists there).
pub struct CreateOptions {
    pub name: Option<String>,
    pub create_here: bool,
    pub shortening_threshold: u32,
    pub scrypt_cost: u32,
    pub scrypt_block_size: u32,
    pub concurrency: i32,
    pub on_progress: Option<Box<dyn Fn(CreationStep) + Send + Sync>>,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            name: None,
            create_here: false,
            shortening_threshold: DEFAULT_SHORTENING_THRESHOLD,
            scrypt_cost: DEFAULT_SCRYPT_COST,
            scrypt_block_size: DEFAULT_SCRYPT_BLOCK_SIZE,
            concurrency: -1,
            on_progress: None,
        }
    }
}

/// Options for [`Vault::open`].
#[derive(Default)]
pub struct OpenOptions {
    /// Custom path to `vault.cryptomator`; defaults to `dir/vault.cryptomator`.
    pub vault_config_path: Option<String>,
    /// Custom path to `masterkey.cryptomator`; defaults to `dir/masterkey.cryptomator`.
    pub masterkey_path: Option<String>,
    pub concurrency: Option<i32>,
    /// Fired after both documents are fetched, before any key derivation.
    pub on_key_load: Option<Box<dyn Fn() + Send + Sync>>,
}

/// An unlocked vault.
pub struct Vault {
    provider: Arc<dyn DataProvider>,
    storage_root: String,
    name: String,
    enc_key: EncryptionKey,
    mac_key: MacKey,
    siv_key: SivKey,
    settings: VaultSettings,
    query_opts: QueryOptions,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("storage_root", &self.storage_root)
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("query_opts", &self.query_opts)
            .finish_non_exhaustive()
    }
}

enum Resolved {
    File { shortened: bool },
    Dir { shortened: bool },
}

impl Vault {
    // ─── Lifecycle ────────────────────────────────────────────────────

    /// Bootstrap a new vault under `dir`.
    pub async fn create(
        provider: Arc<dyn DataProvider>,
        dir: &str,
        password: &str,
        options: CreateOptions,
    ) -> VaultResult<Vault> {
        let CreateOptions {
            name,
            create_here,
            shortening_threshold,
            scrypt_cost,
            scrypt_block_size,
            concurrency,
            on_progress,
        } = options;
        let fire = |step: CreationStep| {
            if let Some(cb) = &on_progress {
                cb(step);
            }
        };

        fire(CreationStep::DupeCheck);
        let storage_root = match (&name, create_here) {
            (Some(vault_name), _) => {
                let root = join_path(dir, vault_name);
                if provider.exists(&root).await? {
                    return Err(VaultError::AlreadyExists(root));
                }
                root
            }
            (None, true) => {
                let masterkey_path = join_path(dir, MASTERKEY_FILE);
                let config_path = join_path(dir, VAULT_CONFIG_FILE);
                let data_path = join_path(dir, DATA_DIR);
                let (has_masterkey, has_config, has_data) = tokio::try_join!(
                    provider.exists(&masterkey_path),
                    provider.exists(&config_path),
                    provider.exists(&data_path),
                )?;
                if has_masterkey {
                    return Err(VaultError::AlreadyExists(masterkey_path));
                }
                if has_config {
                    return Err(VaultError::AlreadyExists(config_path));
                }
                if has_data {
                    return Err(VaultError::AlreadyExists(data_path));
                }
                dir.to_string()
            }
            (None, false) => {
                return Err(VaultError::Format(
                    "create options must provide a vault name or set create_here".to_string(),
                ))
            }
        };

        fire(CreationStep::KeyGen);
        let password_owned = password.to_string();
        let (masterkey_doc, enc_key, mac_key) = tokio::task::spawn_blocking(move || {
            MasterkeyFile::build(&password_owned, VAULT_FORMAT, scrypt_cost, scrypt_block_size)
        })
        .await
        .map_err(|e| VaultError::Format(format!("key generation task: {e}")))??;

        let claims = VaultConfigClaims {
            format: VAULT_FORMAT,
            shortening_threshold,
            jti: Uuid::new_v4().to_string(),
            cipher_combo: CIPHER_COMBO.to_string(),
        };
        let config_token = config::sign(&claims, &enc_key, &mac_key)?;
        let masterkey_json = masterkey_doc.to_json()?;

        let vault = Vault {
            provider: Arc::clone(&provider),
            name: name.clone().unwrap_or_else(|| display_name(&storage_root)),
            siv_key: SivKey::assemble(&enc_key, &mac_key),
            enc_key,
            mac_key,
            settings: VaultSettings {
                format: VAULT_FORMAT,
                shortening_threshold,
                scrypt_cost,
                scrypt_block_size,
            },
            query_opts: QueryOptions { concurrency },
            storage_root,
        };

        fire(CreationStep::CreatingFiles);
        let masterkey_path = join_path(&vault.storage_root, MASTERKEY_FILE);
        let config_path = join_path(&vault.storage_root, VAULT_CONFIG_FILE);
        let written = async {
            if name.is_some() {
                provider.create_dir(&vault.storage_root, true).await?;
            }
            tokio::try_join!(
                provider.write_file(&masterkey_path, masterkey_json.as_bytes()),
                provider.write_file(&config_path, config_token.as_bytes()),
            )?;

            fire(CreationStep::CreatingRoot);
            let root_path = vault.get_root_dir_path()?;
            provider.create_dir(&root_path, true).await?;
            Ok::<(), VaultError>(())
        }
        .await;

        if let Err(err) = written {
            // Best-effort rollback; cleanup errors are swallowed and the
            // original error propagates.
            let data_path = join_path(&vault.storage_root, DATA_DIR);
            let _ = tokio::join!(
                provider.remove_file(&masterkey_path),
                provider.remove_file(&config_path),
                provider.remove_dir(&data_path),
            );
            return Err(err);
        }

        info!(vault = %vault.name, "created vault");
        Ok(vault)
    }

    /// Unlock an existing vault under `dir`.
    ///
    /// A wrong password fails at the AES-KW unwrap, before the config
    /// signature is ever checked.
    pub async fn open(
        provider: Arc<dyn DataProvider>,
        dir: &str,
        password: &str,
        name: Option<String>,
        options: OpenOptions,
    ) -> VaultResult<Vault> {
        let config_path = options
            .vault_config_path
            .unwrap_or_else(|| join_path(dir, VAULT_CONFIG_FILE));
        let masterkey_path = options
            .masterkey_path
            .unwrap_or_else(|| join_path(dir, MASTERKEY_FILE));

        let (config_token, masterkey_json) = tokio::try_join!(
            provider.read_file_string(&config_path),
            provider.read_file_string(&masterkey_path),
        )?;

        if let Some(cb) = &options.on_key_load {
            cb();
        }

        let masterkey_doc = MasterkeyFile::parse(&masterkey_json)?;
        let password_owned = password.to_string();
        let unlock_doc = masterkey_doc.clone();
        let (enc_key, mac_key) =
            tokio::task::spawn_blocking(move || unlock_doc.unlock(&password_owned))
                .await
                .map_err(|e| VaultError::Format(format!("key derivation task: {e}")))??;

        let claims = config::verify(&config_token, &enc_key, &mac_key)?;
        if claims.format != VAULT_FORMAT {
            return Err(VaultError::Format(format!(
                "unsupported vault format: {} (expected {VAULT_FORMAT})",
                claims.format
            )));
        }
        if claims.cipher_combo != CIPHER_COMBO {
            return Err(VaultError::Format(format!(
                "unsupported cipher combo: {}",
                claims.cipher_combo
            )));
        }
        if !masterkey_doc.verify_version_mac(&mac_key, claims.format) {
            warn!("masterkey version MAC does not match the vault format");
        }

        let vault = Vault {
            provider,
            storage_root: dir.to_string(),
            name: name.unwrap_or_else(|| display_name(dir)),
            siv_key: SivKey::assemble(&enc_key, &mac_key),
            enc_key,
            mac_key,
            settings: VaultSettings {
                format: claims.format,
                shortening_threshold: claims.shortening_threshold,
                scrypt_cost: masterkey_doc.scrypt_cost_param,
                scrypt_block_size: masterkey_doc.scrypt_block_size,
            },
            query_opts: QueryOptions {
                concurrency: options.concurrency.unwrap_or(-1),
            },
        };

        info!(vault = %vault.name, "opened vault");
        Ok(vault)
    }

    // ─── Accessors ────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage_root(&self) -> &str {
        &self.storage_root
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    /// AES master key, for the external file-content cipher.
    pub fn encryption_key(&self) -> &EncryptionKey {
        &self.enc_key
    }

    /// HMAC master key, for the external file-content cipher.
    pub fn mac_key(&self) -> &MacKey {
        &self.mac_key
    }

    pub fn query_opts(&self) -> QueryOptions {
        self.query_opts
    }

    pub(crate) fn provider(&self) -> &dyn DataProvider {
        self.provider.as_ref()
    }

    // ─── Directory mapping and name codec ─────────────────────────────

    /// Storage path of the directory identified by `dir_id`:
    /// `<root>/d/XX/YYYY…`.
    pub fn get_dir(&self, dir_id: &str) -> VaultResult<String> {
        let hash = names::hash_dir_id(&self.siv_key, dir_id)?;
        let (prefix, rest) = hash.split_at(2);
        Ok(join_path(
            &join_path(&join_path(&self.storage_root, DATA_DIR), prefix),
            rest,
        ))
    }

    /// Storage path of the vault root directory (`dir_id = ""`).
    pub fn get_root_dir_path(&self) -> VaultResult<String> {
        self.get_dir("")
    }

    /// Fabricate the root directory handle.
    pub fn root_dir(&self) -> VaultResult<EncryptedDir<'_>> {
        Ok(EncryptedDir::new(
            self,
            String::new(),
            self.get_root_dir_path()?,
            "root".to_string(),
            None,
            None,
            Some(String::new()),
            false,
        ))
    }

    /// Encrypt a logical name under its parent directory ID. Returns the
    /// padded base64url form without a suffix.
    pub fn encrypt_file_name(&self, name: &str, parent_id: &str) -> VaultResult<String> {
        names::encrypt_name(&self.siv_key, parent_id, name)
    }

    /// Decrypt a listed item's name. The on-storage name dictates the
    /// branch: `.c9r` decodes directly, `.c9s` reads the `name.c9s`
    /// sidecar first, anything else passes through as plaintext.
    pub async fn decrypt_file_name(&self, item: &Item, parent_id: &str) -> VaultResult<String> {
        if let Some(encoded) = item.name.strip_suffix(REGULAR_SUFFIX) {
            names::decrypt_name(&self.siv_key, parent_id, encoded)
                .map_err(|_| VaultError::name_decryption(item.name.clone()))
        } else if item.name.ends_with(SHORTENED_SUFFIX) {
            let sidecar = join_path(&item.full_name, LONG_NAME_FILE);
            let long_name = self.provider.read_file_string(&sidecar).await?;
            let encoded = long_name.trim().trim_end_matches(REGULAR_SUFFIX);
            names::decrypt_name(&self.siv_key, parent_id, encoded)
                .map_err(|_| VaultError::name_decryption(item.name.clone()))
        } else {
            Ok(item.name.clone())
        }
    }

    // ─── Listing ──────────────────────────────────────────────────────

    /// Raw listing of a directory, filtered to vault entries
    /// (`.c9r`/`.c9s`, excluding the reserved `dirid.c9r`).
    pub async fn list_encrypted(&self, dir_id: &str) -> VaultResult<Vec<Item>> {
        let path = self.get_dir(dir_id)?;
        let items = self.provider.list_items(&path).await?;
        Ok(items
            .into_iter()
            .filter(|item| {
                (item.name.ends_with(REGULAR_SUFFIX) || item.name.ends_with(SHORTENED_SUFFIX))
                    && item.name != DIR_ID_BACKUP_FILE
            })
            .collect())
    }

    /// List and decrypt the entries of a directory.
    ///
    /// Phase one decrypts every name, phase two resolves each entry to a
    /// file or directory handle; both fan out under the configured
    /// `concurrency` ceiling and report per-completion progress. Result
    /// order matches the provider's listing order.
    pub async fn list_items<'v>(
        &'v self,
        dir_id: &str,
        on_name: Option<&ProgressFn<'_>>,
        on_type: Option<&ProgressFn<'_>>,
    ) -> VaultResult<Vec<EncryptedItem<'v>>> {
        let raw = self.list_encrypted(dir_id).await?;
        let total = raw.len();

        let names_done = AtomicUsize::new(0);
        let name_futures: Vec<_> = raw
            .iter()
            .map(|item| {
                let names_done = &names_done;
                async move {
                    let result = self.decrypt_file_name(item, dir_id).await;
                    let done = names_done.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(cb) = on_name {
                        cb(done, total);
                    }
                    result
                }
            })
            .collect();
        let mut decrypted = Vec::with_capacity(total);
        for result in run_batched(name_futures, self.query_opts.concurrency).await {
            decrypted.push(result?);
        }

        let types_done = AtomicUsize::new(0);
        let type_futures: Vec<_> = raw
            .iter()
            .map(|item| {
                let types_done = &types_done;
                async move {
                    let result = self.resolve_entry(item).await;
                    let done = types_done.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(cb) = on_type {
                        cb(done, total);
                    }
                    result
                }
            })
            .collect();
        let mut resolved = Vec::with_capacity(total);
        for result in run_batched(type_futures, self.query_opts.concurrency).await {
            resolved.push(result?);
        }

        let mut items = Vec::with_capacity(total);
        for ((item, decrypted_name), kind) in raw.into_iter().zip(decrypted).zip(resolved) {
            let entry = match kind {
                Resolved::File { shortened } => EncryptedItem::File(EncryptedFile::new(
                    self,
                    item.name,
                    item.full_name,
                    decrypted_name,
                    Some(dir_id.to_string()),
                    item.modified,
                    shortened,
                )),
                Resolved::Dir { shortened } => EncryptedItem::Dir(EncryptedDir::new(
                    self,
                    item.name,
                    item.full_name,
                    decrypted_name,
                    Some(dir_id.to_string()),
                    item.modified,
                    None,
                    shortened,
                )),
            };
            items.push(entry);
        }
        Ok(items)
    }

    /// Classify a raw entry. The raw item kind decides, except a `.c9s`
    /// directory containing `contents.c9r` is a shortened file.
    async fn resolve_entry(&self, item: &Item) -> VaultResult<Resolved> {
        match item.kind {
            ItemKind::File => Ok(Resolved::File { shortened: false }),
            ItemKind::Dir => {
                if item.name.ends_with(SHORTENED_SUFFIX) {
                    let contents = join_path(&item.full_name, CONTENTS_FILE);
                    if self.provider.exists(&contents).await? {
                        Ok(Resolved::File { shortened: true })
                    } else {
                        Ok(Resolved::Dir { shortened: true })
                    }
                } else {
                    Ok(Resolved::Dir { shortened: false })
                }
            }
        }
    }

    // ─── Namespace mutations ──────────────────────────────────────────

    /// Create a directory named `name` under `parent`.
    ///
    /// `dir_id`: `None` generates a fresh UUIDv4; `Some` is used
    /// verbatim (including the empty string, which maps to the root —
    /// only reachable by passing it explicitly).
    pub async fn create_directory<'v>(
        &'v self,
        name: &str,
        parent: &EncryptedDir<'v>,
        dir_id: Option<&str>,
    ) -> VaultResult<EncryptedDir<'v>> {
        let dir_id = match dir_id {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        let parent_id = parent.get_dir_id().await?;
        let parent_path = self.get_dir(&parent_id)?;

        let encoded = self.encrypt_file_name(name, &parent_id)?;
        let shortened = encoded.len() > self.settings.shortening_threshold as usize;
        let stored_name = if shortened {
            format!("{}{SHORTENED_SUFFIX}", names::shorten_name(&encoded))
        } else {
            format!("{encoded}{REGULAR_SUFFIX}")
        };
        let entry_path = join_path(&parent_path, &stored_name);

        if self.provider.exists(&entry_path).await? {
            return Err(VaultError::AlreadyExists(entry_path));
        }

        let mapped_path = self.get_dir(&dir_id)?;
        let written = async {
            tokio::try_join!(
                self.provider.create_dir(&entry_path, true),
                self.provider.create_dir(&mapped_path, true),
            )?;

            let dir_id_path = join_path(&entry_path, DIR_ID_FILE);
            if shortened {
                let long_name_path = join_path(&entry_path, LONG_NAME_FILE);
                tokio::try_join!(
                    self.provider.write_file(&dir_id_path, dir_id.as_bytes()),
                    self.provider.write_file(
                        &long_name_path,
                        encoded.as_bytes()
                    ),
                )?;
            } else {
                self.provider
                    .write_file(&dir_id_path, dir_id.as_bytes())
                    .await?;
            }
            Ok::<(), VaultError>(())
        }
        .await;

        if let Err(err) = written {
            let _ = tokio::join!(
                self.provider.remove_dir(&entry_path),
                self.provider.remove_dir(&mapped_path),
            );
            return Err(err);
        }

        debug!(name, dir_id = %dir_id, shortened, "created directory");
        Ok(EncryptedDir::new(
            self,
            stored_name,
            entry_path,
            name.to_string(),
            Some(parent_id),
            None,
            Some(dir_id),
            shortened,
        ))
    }

    /// Remove a file entry from storage.
    pub async fn delete_file(&self, file: &EncryptedFile<'_>) -> VaultResult<()> {
        self.delete_file_at(&file.full_name, file.shortened).await
    }

    pub(crate) async fn delete_file_at(&self, full_name: &str, shortened: bool) -> VaultResult<()> {
        // A shortened file is a .c9s directory on storage.
        if shortened {
            self.provider.remove_dir(full_name).await?;
        } else {
            self.provider.remove_file(full_name).await?;
        }
        debug!(path = full_name, "deleted file");
        Ok(())
    }

    /// Recursively delete a directory.
    ///
    /// Phase one walks the tree (LIFO over directory IDs) accumulating
    /// every storage path, reporting `(discovered, to_discover)` after
    /// each step and a final `(n, 0)` when the stack drains. Phase two
    /// removes every accumulated path, batched by `concurrency`.
    pub async fn delete_dir(
        &self,
        dir: &EncryptedDir<'_>,
        on_discover: Option<&ProgressFn<'_>>,
    ) -> VaultResult<()> {
        // (path, is_tree): plain file blobs need remove_file, everything
        // else is a directory tree.
        let mut removals: Vec<(String, bool)> = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |removals: &mut Vec<(String, bool)>, path: String, is_tree: bool| {
            if seen.insert(path.clone()) {
                removals.push((path, is_tree));
            }
        };

        let mut stack = vec![dir.get_dir_id().await?];
        push(&mut removals, dir.full_name.clone(), true);

        while let Some(dir_id) = stack.pop() {
            let children = self.list_items(&dir_id, None, None).await?;
            for child in children {
                match child {
                    EncryptedItem::File(file) => {
                        let is_tree = file.shortened;
                        push(&mut removals, file.full_name, is_tree);
                    }
                    EncryptedItem::Dir(child_dir) => {
                        stack.push(child_dir.get_dir_id().await?);
                        push(&mut removals, child_dir.full_name, true);
                    }
                }
            }
            // The DirID-mapped storage directory itself.
            push(&mut removals, self.get_dir(&dir_id)?, true);

            if let Some(cb) = on_discover {
                cb(removals.len(), stack.len());
            }
        }
        if let Some(cb) = on_discover {
            cb(removals.len(), 0);
        }

        let delete_futures: Vec<_> = removals
            .iter()
            .map(|(path, is_tree)| async move {
                if *is_tree {
                    self.provider.remove_dir(path).await
                } else {
                    self.provider.remove_file(path).await
                }
            })
            .collect();
        for result in run_batched(delete_futures, self.query_opts.concurrency).await {
            // A tree removed earlier in the same batch may have taken
            // this path with it; ordering within a batch is undefined.
            match result {
                Err(ProviderError::NotFound(_)) | Ok(()) => {}
                Err(err) => return Err(err.into()),
            }
        }

        info!(paths = removals.len(), "recursively deleted directory");
        Ok(())
    }

    /// Move each item into the directory identified by `dest_dir_id`,
    /// in parallel. Handles are consumed; relist to observe the result.
    pub async fn move_items(
        &self,
        items: Vec<EncryptedItem<'_>>,
        dest_dir_id: &str,
    ) -> VaultResult<()> {
        let moves: Vec<_> = items
            .into_iter()
            .map(|item| item.move_to(dest_dir_id))
            .collect();
        for result in join_all(moves).await {
            result?;
        }
        Ok(())
    }
}

/// Display name for a vault: the last path segment.
fn display_name(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("vault")
        .to_string()
}

/// Drive a set of futures either all at once (`concurrency == -1`) or in
/// sequential batches of at most `concurrency`, each batch fully
/// parallel. Output order matches input order.
pub(crate) async fn run_batched<F>(futures: Vec<F>, concurrency: i32) -> Vec<F::Output>
where
    F: std::future::Future,
{
    if concurrency < 0 {
        return join_all(futures).await;
    }
    let batch_size = concurrency.max(1) as usize;
    let mut output = Vec::with_capacity(futures.len());
    let mut pending = futures.into_iter();
    loop {
        let batch: Vec<F> = pending.by_ref().take(batch_size).collect();
        if batch.is_empty() {
            break;
        }
        output.extend(join_all(batch).await);
    }
    output
}
