//! # Storage Module - Account Persistence Layer
//!
//! File-based persistence for accounts: one pretty-printed JSON record per
//! user, named after the percent-encoded normalized username.
//!
//! ```text
//! data/
//! └── accounts/
//!     ├── alice.json
//!     └── bob.json
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use questkeeper::storage::AccountStore;
//! use questkeeper::quest::SharedAccount;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = AccountStore::new("./data").await?;
//!     store.register("alice", "hunter2").await?;
//!
//!     let account = SharedAccount::new(store.authenticate("alice", "hunter2").await?);
//!     account.add_quest("Morning run")?;
//!     store.save_shared(&account).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees
//!
//! - **Atomic saves**: records are written to a temp file, fsynced and renamed
//!   over the old record while holding an exclusive `fs2` lock, so a crash
//!   leaves either the old or the new record, never a torn one.
//! - **Whole-record overwrite**: the last save wins. Two sessions holding the
//!   same account each persist their own copy.
//! - **Schema upgrades**: older records load with defaults for absent fields
//!   (see [`crate::quest`]).
//! - **Password hashing**: Argon2id PHC strings; plaintext never touches disk
//!   or logs.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use argon2::{Algorithm, Argon2, Params, Version};
use fs2::FileExt;
use log::{debug, info, warn};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use tokio::fs;

use crate::errors::{AuthFailure, QuestError, Result};
use crate::quest::{Account, SharedAccount};
use crate::validation::{normalize_username, safe_filename, validate_password};

/// Largest account record accepted on load.
const MAX_RECORD_BYTES: u64 = 4 * 1024 * 1024;

/// Main account storage interface
pub struct AccountStore {
    data_dir: PathBuf,
    argon2: Argon2<'static>,
}

impl AccountStore {
    /// Initialize storage with the given data directory
    pub async fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::new_with_params(data_dir, None).await
    }

    /// Initialize storage with explicit Argon2 params
    pub async fn new_with_params(data_dir: impl AsRef<Path>, params: Option<Params>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(data_dir.join("accounts")).await?;
        let argon2 = match params {
            Some(p) => Argon2::new(Algorithm::Argon2id, Version::V0x13, p),
            None => Argon2::default(),
        };
        Ok(AccountStore { data_dir, argon2 })
    }

    /// Return the base data directory path used by this store
    pub fn base_dir(&self) -> &Path {
        &self.data_dir
    }

    fn account_path(&self, normalized: &str) -> PathBuf {
        self.data_dir
            .join("accounts")
            .join(format!("{}.json", safe_filename(normalized)))
    }

    /// True when a non-empty record exists for `username` (after normalization).
    pub async fn account_exists(&self, username: &str) -> bool {
        match normalize_username(username) {
            Ok(name) => matches!(fs::metadata(self.account_path(&name)).await, Ok(m) if m.len() > 0),
            Err(_) => false,
        }
    }

    /// Register a new account; fails if the username is taken.
    ///
    /// The record is written and synced under a temporary name, then published
    /// with a hard link, which refuses to replace an existing file. Two
    /// concurrent registrations of one name cannot both succeed, and a crash
    /// never leaves a partial record under the real name.
    pub async fn register(&self, username: &str, password: &str) -> Result<Account> {
        let username = normalize_username(username)?;
        validate_password(password)?;
        let path = self.account_path(&username);
        Self::clear_stale_record(&path).await?;
        if fs::metadata(&path).await.is_ok() {
            return Err(QuestError::Conflict(username));
        }

        let account = Account::new(username, self.hash_password(password)?);
        let content = serde_json::to_string_pretty(&account)?;
        let tmp_path = Self::write_temp(&path, &content)?;
        let published = std::fs::hard_link(&tmp_path, &path);
        let _ = std::fs::remove_file(&tmp_path);
        match published {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(QuestError::Conflict(account.username));
            }
            Err(e) => return Err(e.into()),
        }
        Self::sync_dir(&path);
        info!("Registered account {}", account.username);
        Ok(account)
    }

    /// Remove a zero-length record left behind by an interrupted write.
    async fn clear_stale_record(path: &Path) -> Result<()> {
        match fs::metadata(path).await {
            Ok(m) if m.len() == 0 => {
                warn!("Removing empty account record {}", path.display());
                match fs::remove_file(path).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e.into()),
                }
            }
            _ => Ok(()),
        }
    }

    /// Load and verify an account. Unknown accounts and wrong passwords are
    /// distinct [`AuthFailure`] kinds but render the same message.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Account> {
        let username = normalize_username(username)?;
        let Some(account) = self.load(&username).await? else {
            debug!("Login for unknown account {}", username);
            return Err(QuestError::Authentication(AuthFailure::UnknownAccount));
        };
        let parsed = PasswordHash::new(&account.password_hash)
            .map_err(|e| QuestError::Hash(format!("corrupt stored hash for {}: {}", username, e)))?;
        if self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            debug!("Invalid credentials for {}", username);
            return Err(QuestError::Authentication(AuthFailure::InvalidCredentials));
        }
        Ok(account)
    }

    /// Read the record for `username`, upgrading older layouts.
    pub async fn load(&self, username: &str) -> Result<Option<Account>> {
        let username = normalize_username(username)?;
        let path = self.account_path(&username);
        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if metadata.len() > MAX_RECORD_BYTES {
            return Err(QuestError::Storage(std::io::Error::new(
                ErrorKind::InvalidData,
                format!("account record for {} exceeds {} bytes", username, MAX_RECORD_BYTES),
            )));
        }
        let content = fs::read_to_string(&path).await?;
        // Guard against any accidental leading NULs
        let content = content.trim_start_matches('\0');
        if content.trim().is_empty() {
            warn!("Account record {} is empty; treating as absent", path.display());
            return Ok(None);
        }
        let account: Account = serde_json::from_str(content)?;
        if account.username != username {
            warn!(
                "Account record {} names user {}; keeping file name as identity",
                path.display(),
                account.username
            );
            return Ok(Some(Account { username, ..account }));
        }
        Ok(Some(account))
    }

    /// Persist the whole record, replacing whatever is on disk.
    pub async fn save(&self, account: &Account) -> Result<()> {
        let username = normalize_username(&account.username)?;
        let content = serde_json::to_string_pretty(account)?;
        Self::write_file_locked(&self.account_path(&username), &content).await?;
        debug!("Saved account {}", username);
        Ok(())
    }

    /// Save a consistent snapshot of a shared account.
    pub async fn save_shared(&self, account: &SharedAccount) -> Result<()> {
        let snapshot = account.snapshot();
        self.save(&snapshot).await
    }

    fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| QuestError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Write `content` to `path` via temp file + rename under an exclusive lock.
    async fn write_file_locked(path: &Path, content: &str) -> Result<()> {
        // fs2 locks are synchronous; the critical section is a single small file.
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        lock_file.lock_exclusive()?;

        let tmp_path = Self::write_temp(path, content)?;
        if let Err(e) = std::fs::rename(&tmp_path, path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Self::sync_dir(path);
        drop(lock_file);
        Ok(())
    }

    /// Write and fsync `content` to a fresh hidden file beside `path`.
    fn write_temp(path: &Path, content: &str) -> Result<PathBuf> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let base = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("account.json");
        let mut counter = 0u32;
        loop {
            let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(mut tmp) => {
                    let written = tmp
                        .write_all(content.as_bytes())
                        .and_then(|_| tmp.sync_all());
                    if let Err(e) = written {
                        let _ = std::fs::remove_file(&candidate);
                        return Err(e.into());
                    }
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    counter = counter.saturating_add(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Persist a rename or link in `path`'s directory (best-effort).
    fn sync_dir(path: &Path) {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        if let Ok(dir_file) = File::open(dir) {
            let _ = dir_file.sync_all();
        }
    }
}
