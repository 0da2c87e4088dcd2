//! User profiles.
//!
//! Profiles are kept either in memory or in a sled database. The persistent
//! layout uses two trees:
//! - `profiles`: profile id (16 bytes) → JSON profile
//! - `wallets`: lowercase derived wallet address → profile id
//!
//! The `wallets` tree is claimed with compare-and-swap, which is what keeps a
//! derived wallet from being registered twice.

use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{Arc, Mutex, RwLock},
};

use alpha_common::UserType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Db;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const PROFILES_TREE: &str = "profiles";
const WALLETS_TREE: &str = "wallets";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("user {0} not found")]
    NotFound(Uuid),

    #[error("wallet {0} is already registered")]
    WalletTaken(String),

    #[error("profile store error: {0}")]
    Storage(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub user_type: UserType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_commitment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binance_wallet: Option<String>,
    pub aa_wallet_address: String,
    pub owner_address: String,
    pub salt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewProfile {
    pub user_type: UserType,
    pub email_commitment: Option<String>,
    pub binance_wallet: Option<String>,
    pub aa_wallet_address: String,
    pub owner_address: String,
    pub salt: String,
}

/// Partial update; `None` leaves a field as it is.
#[derive(Clone, Debug, Default)]
pub struct ProfilePatch {
    pub email_commitment: Option<String>,
    pub binance_wallet: Option<String>,
    pub aa_wallet_address: Option<String>,
    pub owner_address: Option<String>,
    pub salt: Option<String>,
}

impl ProfilePatch {
    fn apply(self, profile: &mut UserProfile) {
        if let Some(value) = self.email_commitment {
            profile.email_commitment = Some(value);
        }
        if let Some(value) = self.binance_wallet {
            profile.binance_wallet = Some(value);
        }
        if let Some(value) = self.aa_wallet_address {
            profile.aa_wallet_address = value;
        }
        if let Some(value) = self.owner_address {
            profile.owner_address = value;
        }
        if let Some(value) = self.salt {
            profile.salt = value;
        }
    }
}

fn wallet_key(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

#[derive(Default)]
struct ProfileTable {
    profiles: HashMap<Uuid, UserProfile>,
    wallets: HashMap<String, Uuid>,
}

enum ProfileBackend {
    InMemory(RwLock<ProfileTable>),
    Persistent {
        db: Db,
        // sled gives per-key atomicity only; multi-tree writes go through here.
        writes: Mutex<()>,
    },
}

#[derive(Clone)]
pub struct ProfileStore {
    backend: Arc<ProfileBackend>,
}

impl ProfileStore {
    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(ProfileBackend::InMemory(RwLock::new(ProfileTable::default()))),
        }
    }

    pub fn persistent(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    ProfileError::Storage(format!(
                        "failed to create directory for profile db at {}: {err}",
                        path_ref.display()
                    ))
                })?;
            }
        }
        let db = sled::open(path_ref).map_err(|err| {
            ProfileError::Storage(format!(
                "failed to open profile db at {}: {err}",
                path_ref.display()
            ))
        })?;
        Ok(Self {
            backend: Arc::new(ProfileBackend::Persistent {
                db,
                writes: Mutex::new(()),
            }),
        })
    }

    pub fn create(&self, input: NewProfile) -> Result<UserProfile, ProfileError> {
        let now = Utc::now();
        let profile = UserProfile {
            id: Uuid::new_v4(),
            user_type: input.user_type,
            email_commitment: input.email_commitment,
            binance_wallet: input.binance_wallet,
            aa_wallet_address: input.aa_wallet_address,
            owner_address: input.owner_address,
            salt: input.salt,
            created_at: now,
            updated_at: now,
        };
        let key = wallet_key(&profile.aa_wallet_address);

        match &*self.backend {
            ProfileBackend::InMemory(table) => {
                let mut guard = table.write().expect("profile store poisoned");
                if guard.wallets.contains_key(&key) {
                    return Err(ProfileError::WalletTaken(profile.aa_wallet_address));
                }
                guard.wallets.insert(key, profile.id);
                guard.profiles.insert(profile.id, profile.clone());
            }
            ProfileBackend::Persistent { db, writes } => {
                let _guard = writes.lock().expect("profile store poisoned");
                Self::claim_wallet(db, &key, profile.id, &profile.aa_wallet_address)?;
                Self::write_profile(db, &profile)?;
            }
        }

        debug!(
            "Created {} profile {} for wallet {}",
            profile.user_type, profile.id, profile.aa_wallet_address
        );
        Ok(profile)
    }

    pub fn find_by_id(&self, id: &Uuid) -> Result<UserProfile, ProfileError> {
        let found = match &*self.backend {
            ProfileBackend::InMemory(table) => table
                .read()
                .expect("profile store poisoned")
                .profiles
                .get(id)
                .cloned(),
            ProfileBackend::Persistent { db, .. } => Self::read_profile(db, id)?,
        };
        found.ok_or(ProfileError::NotFound(*id))
    }

    /// Case-insensitive lookup by derived wallet address.
    pub fn find_by_wallet(&self, address: &str) -> Result<Option<UserProfile>, ProfileError> {
        let key = wallet_key(address);
        match &*self.backend {
            ProfileBackend::InMemory(table) => {
                let guard = table.read().expect("profile store poisoned");
                Ok(guard
                    .wallets
                    .get(&key)
                    .and_then(|id| guard.profiles.get(id))
                    .cloned())
            }
            ProfileBackend::Persistent { db, .. } => {
                let wallets = Self::tree(db, WALLETS_TREE)?;
                let id = wallets
                    .get(key.as_bytes())
                    .map_err(|err| ProfileError::Storage(err.to_string()))?;
                match id {
                    Some(raw) => {
                        let id = Uuid::from_slice(&raw)
                            .map_err(|err| ProfileError::Storage(err.to_string()))?;
                        Self::read_profile(db, &id)
                    }
                    None => Ok(None),
                }
            }
        }
    }

    pub fn update(&self, id: &Uuid, patch: ProfilePatch) -> Result<UserProfile, ProfileError> {
        match &*self.backend {
            ProfileBackend::InMemory(table) => {
                let mut guard = table.write().expect("profile store poisoned");
                let current = guard
                    .profiles
                    .get(id)
                    .cloned()
                    .ok_or(ProfileError::NotFound(*id))?;
                let updated = Self::patched(current.clone(), patch);

                let old_key = wallet_key(&current.aa_wallet_address);
                let new_key = wallet_key(&updated.aa_wallet_address);
                if old_key != new_key {
                    if guard.wallets.contains_key(&new_key) {
                        return Err(ProfileError::WalletTaken(updated.aa_wallet_address));
                    }
                    guard.wallets.remove(&old_key);
                    guard.wallets.insert(new_key, *id);
                }
                guard.profiles.insert(*id, updated.clone());
                Ok(updated)
            }
            ProfileBackend::Persistent { db, writes } => {
                let _guard = writes.lock().expect("profile store poisoned");
                let current = Self::read_profile(db, id)?.ok_or(ProfileError::NotFound(*id))?;
                let updated = Self::patched(current.clone(), patch);

                let old_key = wallet_key(&current.aa_wallet_address);
                let new_key = wallet_key(&updated.aa_wallet_address);
                if old_key != new_key {
                    Self::claim_wallet(db, &new_key, *id, &updated.aa_wallet_address)?;
                    Self::tree(db, WALLETS_TREE)?
                        .remove(old_key.as_bytes())
                        .map_err(|err| ProfileError::Storage(err.to_string()))?;
                }
                Self::write_profile(db, &updated)?;
                Ok(updated)
            }
        }
    }

    /// Profiles of one type, newest first.
    pub fn list_by_type(&self, user_type: UserType) -> Result<Vec<UserProfile>, ProfileError> {
        let mut profiles: Vec<UserProfile> = match &*self.backend {
            ProfileBackend::InMemory(table) => table
                .read()
                .expect("profile store poisoned")
                .profiles
                .values()
                .filter(|p| p.user_type == user_type)
                .cloned()
                .collect(),
            ProfileBackend::Persistent { db, .. } => {
                let tree = Self::tree(db, PROFILES_TREE)?;
                let mut out = Vec::new();
                for item in tree.iter() {
                    let (_, value) = item.map_err(|err| ProfileError::Storage(err.to_string()))?;
                    let profile: UserProfile = serde_json::from_slice(&value)
                        .map_err(|err| ProfileError::Storage(err.to_string()))?;
                    if profile.user_type == user_type {
                        out.push(profile);
                    }
                }
                out
            }
        };
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(profiles)
    }

    fn patched(mut profile: UserProfile, patch: ProfilePatch) -> UserProfile {
        patch.apply(&mut profile);
        profile.updated_at = Utc::now();
        profile
    }

    fn tree(db: &Db, name: &str) -> Result<sled::Tree, ProfileError> {
        db.open_tree(name)
            .map_err(|err| ProfileError::Storage(format!("open tree {name}: {err}")))
    }

    fn claim_wallet(db: &Db, key: &str, id: Uuid, display: &str) -> Result<(), ProfileError> {
        let wallets = Self::tree(db, WALLETS_TREE)?;
        wallets
            .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(id.as_bytes().as_slice()))
            .map_err(|err| ProfileError::Storage(err.to_string()))?
            .map_err(|_| ProfileError::WalletTaken(display.to_string()))
    }

    fn write_profile(db: &Db, profile: &UserProfile) -> Result<(), ProfileError> {
        let value =
            serde_json::to_vec(profile).map_err(|err| ProfileError::Storage(err.to_string()))?;
        Self::tree(db, PROFILES_TREE)?
            .insert(profile.id.as_bytes(), value)
            .map_err(|err| ProfileError::Storage(err.to_string()))?;
        Ok(())
    }

    fn read_profile(db: &Db, id: &Uuid) -> Result<Option<UserProfile>, ProfileError> {
        let raw = Self::tree(db, PROFILES_TREE)?
            .get(id.as_bytes())
            .map_err(|err| ProfileError::Storage(err.to_string()))?;
        raw.map(|value| {
            serde_json::from_slice(&value).map_err(|err| ProfileError::Storage(err.to_string()))
        })
        .transpose()
    }
}
