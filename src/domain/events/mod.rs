//! Domain events
//!
//! Drained by the presentation layer for non-blocking notifications (add
//! confirmations, sync failures). Never required for correctness.

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    ItemAdded { product_id: String, name: String },
    ItemRemoved { product_id: String },
    Cleared,
    /// A persist failed after the in-memory mutation was applied. The cart is
    /// not rolled back; divergence heals on the next reload.
    SyncFailed { reason: String },
}
