//! # Account Storage Boundary
//!
//! The persistent account store as seen by the session core: synchronous
//! calls that may fail with a connectivity error. Failures are propagated to
//! the caller, never retried here, and no operation in the core leaves a
//! partial session mutation behind when one fails.
//!
//! [`MemoryAccountStore`] is the reference in-memory implementation, used by
//! the test suite and useful for embedding without a database.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use crate::error::{ProtocolError, Result};
use crate::session::privileges::Privileges;
use crate::session::stats::{GameMode, ModeData};
use crate::utils::time::unix_time;

/// A persistent account record, limited to the fields the session core
/// reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i32,
    pub name: String,
    pub safe_name: String,
    pub privileges: Privileges,
    pub country: String,
    pub silence_end: u64,
    pub donor_end: u64,
    pub creation_time: u64,
    pub latest_activity: u64,
    pub clan_id: Option<i32>,
    pub clan_tag: Option<String>,
    pub preferred_mode: GameMode,
}

/// Parameters for creating a new account record.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_bcrypt: Vec<u8>,
    pub country: String,
}

/// One moderation audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: i32,
    pub target_id: i32,
    pub action: String,
    pub reason: String,
    pub timestamp: u64,
}

/// Synchronous persistent-storage collaborator.
pub trait AccountStore: Send + Sync {
    fn find_by_id(&self, id: i32) -> Result<Option<Account>>;

    /// Look up by safe (normalized) name.
    fn find_by_normalized_name(&self, safe_name: &str) -> Result<Option<Account>>;

    fn create(&self, new: NewAccount) -> Result<Account>;

    fn update_privileges(&self, id: i32, privileges: Privileges) -> Result<()>;

    fn insert_audit_log(&self, entry: AuditEntry) -> Result<()>;

    /// Per-mode statistics for one account, refreshed at login.
    fn load_stats(&self, id: i32) -> Result<HashMap<GameMode, ModeData>>;
}

/// In-memory [`AccountStore`] backed by hash maps.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<i32, Account>>,
    stats: Mutex<HashMap<i32, HashMap<GameMode, ModeData>>>,
    audit_log: Mutex<Vec<AuditEntry>>,
    next_id: AtomicI32,
    lookups: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(3), // ids 1-2 are reserved (bot, system)
            ..Self::default()
        }
    }

    /// Insert a pre-built record, e.g. fixtures with known ids.
    pub fn insert_account(&self, account: Account) {
        self.accounts.lock().insert(account.id, account);
    }

    pub fn insert_stats(&self, id: i32, stats: HashMap<GameMode, ModeData>) {
        self.stats.lock().insert(id, stats);
    }

    /// Simulate a connectivity outage: every call fails until re-enabled.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// How many name/id lookups have been issued.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit_log.lock().clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProtocolError::Storage("connection refused".to_string()));
        }
        Ok(())
    }
}

impl AccountStore for MemoryAccountStore {
    fn find_by_id(&self, id: i32) -> Result<Option<Account>> {
        self.check_available()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.lock().get(&id).cloned())
    }

    fn find_by_normalized_name(&self, safe_name: &str) -> Result<Option<Account>> {
        self.check_available()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .accounts
            .lock()
            .values()
            .find(|a| a.safe_name == safe_name)
            .cloned())
    }

    fn create(&self, new: NewAccount) -> Result<Account> {
        self.check_available()?;
        let now = unix_time();
        let account = Account {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            safe_name: crate::session::player::make_safe_name(&new.name),
            name: new.name,
            privileges: Privileges::UNRESTRICTED,
            country: new.country,
            silence_end: 0,
            donor_end: 0,
            creation_time: now,
            latest_activity: now,
            clan_id: None,
            clan_tag: None,
            preferred_mode: GameMode::Osu,
        };
        self.accounts.lock().insert(account.id, account.clone());
        Ok(account)
    }

    fn update_privileges(&self, id: i32, privileges: Privileges) -> Result<()> {
        self.check_available()?;
        let mut accounts = self.accounts.lock();
        match accounts.get_mut(&id) {
            Some(account) => {
                account.privileges = privileges;
                Ok(())
            }
            None => Err(ProtocolError::Storage(format!("no account with id {id}"))),
        }
    }

    fn insert_audit_log(&self, entry: AuditEntry) -> Result<()> {
        self.check_available()?;
        self.audit_log.lock().push(entry);
        Ok(())
    }

    fn load_stats(&self, id: i32) -> Result<HashMap<GameMode, ModeData>> {
        self.check_available()?;
        Ok(self.stats.lock().get(&id).cloned().unwrap_or_else(|| {
            GameMode::ALL
                .iter()
                .map(|mode| (*mode, ModeData::default()))
                .collect()
        }))
    }
}
