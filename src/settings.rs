use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;

use crate::db::{models::UserSettings, Database};

/// In-memory copy of the persisted user settings. Reads never touch the
/// database; updates write through before the cache changes.
pub struct SettingsStore {
    db: Database,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Loads the stored row, seeding it from `defaults` on first run.
    pub async fn new(db: Database, defaults: UserSettings) -> Result<Self> {
        let data = db.get_user_settings(&defaults).await?;
        Ok(Self {
            db,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> UserSettings {
        self.read().clone()
    }

    pub async fn update(&self, settings: UserSettings) -> Result<UserSettings> {
        let stored = self.db.update_user_settings(&settings).await?;
        *self.write() = stored.clone();
        Ok(stored)
    }

    pub async fn reload(&self) -> Result<UserSettings> {
        let defaults = self.get();
        let stored = self.db.get_user_settings(&defaults).await?;
        *self.write() = stored.clone();
        Ok(stored)
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
