//! Per-occurrence override storage.
//!
//! [`InstanceOverrideStore`] owns a process-local cache of every override,
//! hydrated once from an [`OverrideBackend`] and afterwards changed only
//! through [`put`](InstanceOverrideStore::put) and
//! [`remove`](InstanceOverrideStore::remove). Reads never go to the backend:
//! the backend may be eventually consistent, and the cache is the source of
//! read-after-write truth.
//!
//! When a backend write fails the cache keeps the new value, the key is
//! remembered as pending, and the caller receives
//! [`CoreError::PersistenceDeferred`]. [`retry_pending`](InstanceOverrideStore::retry_pending)
//! pushes pending records again.
//!
//! Writes reach the backend one at a time, in the order they were applied to
//! the cache, so the last stored record for a key always holds every field
//! the cache holds.

use chrono::{NaiveDate, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{InstanceOverride, OverrideFields, OverrideKey, OverrideRecord};
use crate::repository::OverrideBackend;

pub struct InstanceOverrideStore<B> {
    backend: B,
    cache: RwLock<HashMap<OverrideKey, InstanceOverride>>,
    pending: Mutex<BTreeSet<OverrideKey>>,
    write_gate: tokio::sync::Mutex<()>,
}

impl<B: OverrideBackend> InstanceOverrideStore<B> {
    /// Builds a store and fills its cache from `backend`.
    pub async fn hydrate(backend: B) -> Result<Self, CoreError> {
        let store = Self::empty(backend);
        store.load_all().await?;
        Ok(store)
    }

    /// Builds a store with an empty cache, without touching the backend.
    pub fn empty(backend: B) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
            pending: Mutex::new(BTreeSet::new()),
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Reloads the cache from the backend and returns every override.
    ///
    /// The backend may lag behind its own writes, so a cached entry wins over
    /// the stored record when it is pending, newer, or missing from the
    /// backend. Stored records with an unparseable date are skipped.
    pub async fn load_all(&self) -> Result<Vec<InstanceOverride>, CoreError> {
        let records = self.backend.load_all().await?;

        let mut loaded = HashMap::with_capacity(records.len());
        for record in records {
            let key = record.key();
            match InstanceOverride::try_from(record) {
                Ok(override_) => {
                    loaded.insert(override_.key(), override_);
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "skipping malformed override record"),
            }
        }

        let pending: BTreeSet<OverrideKey> = self.pending_set().clone();
        let mut cache = self.write_cache();
        for (key, local) in cache.drain() {
            let keep_local = pending.contains(&key)
                || loaded
                    .get(&key)
                    .map_or(true, |stored| local.updated_at > stored.updated_at);
            if keep_local {
                loaded.insert(key, local);
            }
        }
        *cache = loaded;

        tracing::debug!(count = cache.len(), "override cache hydrated");
        let mut all: Vec<InstanceOverride> = cache.values().cloned().collect();
        all.sort_by_key(InstanceOverride::key);
        Ok(all)
    }

    pub fn get(&self, template_id: Uuid, occurrence_date: NaiveDate) -> Option<InstanceOverride> {
        self.read_cache()
            .get(&OverrideKey::new(template_id, occurrence_date))
            .cloned()
    }

    /// All overrides of one template, ordered by occurrence date.
    pub fn get_all_for_template(&self, template_id: Uuid) -> Vec<InstanceOverride> {
        let mut overrides: Vec<InstanceOverride> = self
            .read_cache()
            .values()
            .filter(|o| o.template_id == template_id)
            .cloned()
            .collect();
        overrides.sort_by_key(|o| o.occurrence_date);
        overrides
    }

    /// Overrides of one template keyed by date, for batch merging.
    pub(crate) fn snapshot_for_template(&self, template_id: Uuid) -> HashMap<NaiveDate, InstanceOverride> {
        self.read_cache()
            .values()
            .filter(|o| o.template_id == template_id)
            .map(|o| (o.occurrence_date, o.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_cache().is_empty()
    }

    /// Merges `fields` into the override for this occurrence, creating it if
    /// needed, then persists the whole record.
    ///
    /// The merge is applied to the cache under its write lock before the
    /// backend is called, so the change is visible even when persistence
    /// fails.
    pub async fn put(
        &self,
        template_id: Uuid,
        occurrence_date: NaiveDate,
        fields: OverrideFields,
    ) -> Result<InstanceOverride, CoreError> {
        if fields.is_empty() {
            return Err(CoreError::InvalidInput("No override fields to apply".to_string()));
        }

        let key = OverrideKey::new(template_id, occurrence_date);
        let _gate = self.write_gate.lock().await;
        let now = Utc::now();
        let merged = {
            let mut cache = self.write_cache();
            let entry = cache.entry(key).or_insert_with(|| InstanceOverride {
                template_id,
                occurrence_date,
                fields: OverrideFields::default(),
                created_at: now,
                updated_at: now,
            });
            entry.fields.merge_from(fields);
            entry.updated_at = now;
            entry.clone()
        };

        tracing::debug!(key = %key, "override applied locally");
        self.persist(&merged).await?;
        Ok(merged)
    }

    /// Untyped entry point: sanitizes `fields` (identity keys stripped,
    /// unknown keys rejected) before [`put`](Self::put).
    pub async fn put_json(
        &self,
        template_id: Uuid,
        occurrence_date: NaiveDate,
        fields: serde_json::Value,
    ) -> Result<InstanceOverride, CoreError> {
        let fields = OverrideFields::from_json(fields)?;
        self.put(template_id, occurrence_date, fields).await
    }

    /// Deletes an override from the backend and the cache.
    pub async fn remove(
        &self,
        template_id: Uuid,
        occurrence_date: NaiveDate,
    ) -> Result<Option<InstanceOverride>, CoreError> {
        let key = OverrideKey::new(template_id, occurrence_date);
        let _gate = self.write_gate.lock().await;
        self.backend.delete(&key.to_string()).await?;

        self.pending_set().remove(&key);
        let removed = self.write_cache().remove(&key);
        if removed.is_some() {
            tracing::debug!(key = %key, "override removed");
        }
        Ok(removed)
    }

    /// Keys whose latest local value has not reached the backend.
    pub fn pending_keys(&self) -> Vec<OverrideKey> {
        self.pending_set().iter().copied().collect()
    }

    /// Writes one pending key again. Returns `false` if it was not pending.
    pub async fn retry(&self, key: OverrideKey) -> Result<bool, CoreError> {
        let _gate = self.write_gate.lock().await;
        if !self.pending_set().contains(&key) {
            return Ok(false);
        }
        let cached = self.read_cache().get(&key).cloned();
        match cached {
            Some(override_) => self.persist(&override_).await?,
            None => {
                self.pending_set().remove(&key);
            }
        }
        Ok(true)
    }

    /// Writes every pending key again, stopping at the first failure.
    /// Returns how many records reached the backend.
    pub async fn retry_pending(&self) -> Result<usize, CoreError> {
        let mut persisted = 0;
        for key in self.pending_keys() {
            if self.retry(key).await? {
                persisted += 1;
            }
        }
        Ok(persisted)
    }

    async fn persist(&self, override_: &InstanceOverride) -> Result<(), CoreError> {
        let key = override_.key();
        match self.backend.upsert(&OverrideRecord::from(override_)).await {
            Ok(()) => {
                self.pending_set().remove(&key);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "override write failed, kept locally");
                self.pending_set().insert(key);
                Err(CoreError::PersistenceDeferred {
                    key: key.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<OverrideKey, InstanceOverride>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<OverrideKey, InstanceOverride>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_set(&self) -> std::sync::MutexGuard<'_, BTreeSet<OverrideKey>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
