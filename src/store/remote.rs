//! Per-account cart storage.
//!
//! One row per account in `user_carts`, overwritten on every save. Rows are
//! untrusted on the way back in and pass through the same sanitization as the
//! local slot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, error, warn};

use super::StoreError;
use crate::domain::aggregates::{sanitize_entries, LineItem};
use crate::domain::value_objects::AccountId;

#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    /// Raw stored entries, or `None` when the account has no row yet.
    async fn fetch(&self, account: &AccountId) -> Result<Option<Vec<serde_json::Value>>, StoreError>;

    /// Insert-or-replace the account's row; the store stamps `updated_at`.
    async fn upsert(&self, account: &AccountId, items: &[LineItem]) -> Result<(), StoreError>;
}

/// Fetches and sanitizes the account's items. `Ok(None)` means no row.
pub async fn fetch_items(store: &dyn RemoteCartStore, account: &AccountId) -> Result<Option<Vec<LineItem>>, StoreError> {
    let Some(entries) = store.fetch(account).await? else { return Ok(None) };
    let sanitized = sanitize_entries(entries);
    if sanitized.dropped > 0 || sanitized.truncated > 0 {
        warn!(account_id = %account, dropped = sanitized.dropped, truncated = sanitized.truncated, "remote cart entries discarded on load");
    }
    Ok(Some(sanitized.items))
}

/// Fail-soft load: a missing row or any fetch error yields an empty cart.
pub async fn load_items(store: &dyn RemoteCartStore, account: &AccountId) -> Vec<LineItem> {
    match fetch_items(store, account).await {
        Ok(items) => items.unwrap_or_default(),
        Err(e) => {
            error!(account_id = %account, error = %e, "failed to load remote cart");
            Vec::new()
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    items: Json<serde_json::Value>,
    updated_at: DateTime<Utc>,
}

/// Postgres-backed store.
#[derive(Clone, Debug)]
pub struct PgCartStore { pool: PgPool }

impl PgCartStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl RemoteCartStore for PgCartStore {
    async fn fetch(&self, account: &AccountId) -> Result<Option<Vec<serde_json::Value>>, StoreError> {
        let row = sqlx::query_as::<_, CartRow>("SELECT items, updated_at FROM user_carts WHERE account_id = $1")
            .bind(account.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| {
            debug!(account_id = %account, updated_at = %row.updated_at, "remote cart fetched");
            match row.items.0 {
                serde_json::Value::Array(entries) => entries,
                _ => {
                    warn!(account_id = %account, "remote cart items not a sequence, treating as empty");
                    Vec::new()
                }
            }
        }))
    }

    async fn upsert(&self, account: &AccountId, items: &[LineItem]) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO user_carts (account_id, items, updated_at) VALUES ($1, $2, NOW()) ON CONFLICT (account_id) DO UPDATE SET items = EXCLUDED.items, updated_at = NOW()")
            .bind(account.as_str())
            .bind(Json(items))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-process store, used when no database is configured and in tests.
/// Clones share rows. Failures can be switched on to exercise fail-soft paths.
#[derive(Clone, Debug, Default)]
pub struct MemoryCartStore {
    rows: Arc<Mutex<HashMap<AccountId, (Vec<serde_json::Value>, DateTime<Utc>)>>>,
    fail_fetch: Arc<AtomicBool>,
    fail_upsert: Arc<AtomicBool>,
    upserts: Arc<AtomicUsize>,
}

impl MemoryCartStore {
    pub fn new() -> Self { Self::default() }

    pub fn fail_fetch(&self, fail: bool) { self.fail_fetch.store(fail, Ordering::SeqCst); }
    pub fn fail_upsert(&self, fail: bool) { self.fail_upsert.store(fail, Ordering::SeqCst); }

    /// Number of successful upserts so far.
    pub fn upsert_count(&self) -> usize { self.upserts.load(Ordering::SeqCst) }

    /// Stores raw entries as-is, bypassing validation.
    pub fn seed(&self, account: &AccountId, entries: Vec<serde_json::Value>) {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).insert(account.clone(), (entries, Utc::now()));
    }

    pub fn row(&self, account: &AccountId) -> Option<Vec<serde_json::Value>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).get(account).map(|(entries, _)| entries.clone())
    }
}

#[async_trait]
impl RemoteCartStore for MemoryCartStore {
    async fn fetch(&self, account: &AccountId) -> Result<Option<Vec<serde_json::Value>>, StoreError> {
        if self.fail_fetch.load(Ordering::SeqCst) { return Err(StoreError::Unavailable("fetch disabled".into())); }
        Ok(self.row(account))
    }

    async fn upsert(&self, account: &AccountId, items: &[LineItem]) -> Result<(), StoreError> {
        if self.fail_upsert.load(Ordering::SeqCst) { return Err(StoreError::Unavailable("upsert disabled".into())); }
        let entries = items.iter().map(serde_json::to_value).collect::<Result<Vec<_>, _>>()?;
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).insert(account.clone(), (entries, Utc::now()));
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
