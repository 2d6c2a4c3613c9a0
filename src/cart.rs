//! Cart reads for the reminder job.

use crate::store::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    pub listing_id: String,
    pub title: String,
    pub price: f64,
    pub added_at: DateTime<Utc>,
}

/// Nudge shown to a user who left books in their cart
#[derive(Debug, Clone, PartialEq)]
pub struct CartReminder {
    pub item_count: usize,
    pub total: f64,
    pub oldest_added_at: DateTime<Utc>,
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn cart_items(&self, user_id: &str) -> Result<Vec<CartItem>, StoreError>;
}

/// A reminder is due when the cart is non-empty and its oldest item has sat
/// there for at least `threshold`
pub fn cart_reminder(
    items: &[CartItem],
    now: DateTime<Utc>,
    threshold: Duration,
) -> Option<CartReminder> {
    let oldest = items.iter().map(|item| item.added_at).min()?;
    if now - oldest < threshold {
        return None;
    }
    Some(CartReminder {
        item_count: items.len(),
        total: items.iter().map(|item| item.price).sum(),
        oldest_added_at: oldest,
    })
}

/// Entry point for the scheduled reminder check
pub async fn check_cart(
    store: &dyn CartStore,
    user_id: &str,
    now: DateTime<Utc>,
    threshold: Duration,
) -> Result<Option<CartReminder>, StoreError> {
    let items = store.cart_items(user_id).await?;
    let reminder = cart_reminder(&items, now, threshold);
    debug!(user_id, items = items.len(), due = reminder.is_some(), "checked cart");
    Ok(reminder)
}

#[derive(Default)]
pub struct MemoryCartStore {
    carts: Mutex<HashMap<String, Vec<CartItem>>>,
}

impl MemoryCartStore {
    pub fn add_item(&self, user_id: &str, item: CartItem) {
        let mut carts = self.carts.lock().unwrap_or_else(PoisonError::into_inner);
        let cart = carts.entry(user_id.to_string()).or_default();
        if !cart.iter().any(|existing| existing.listing_id == item.listing_id) {
            cart.push(item);
        }
    }

    pub fn remove_item(&self, user_id: &str, listing_id: &str) {
        let mut carts = self.carts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cart) = carts.get_mut(user_id) {
            cart.retain(|item| item.listing_id != listing_id);
        }
    }

    pub fn clear(&self, user_id: &str) {
        self.carts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn cart_items(&self, user_id: &str) -> Result<Vec<CartItem>, StoreError> {
        let carts = self.carts.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(carts.get(user_id).cloned().unwrap_or_default())
    }
}
