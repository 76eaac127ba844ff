//! Client-side notification state
//!
//! Server records live in the [`ResultCache`], client-only read/new flags in
//! the [`MetadataStore`]. Both are owned by a [`NotificationsStore`] and only
//! mutated through the [`IngestionDispatcher`] or the read-state operations.

mod dispatcher;
mod metadata_store;
mod models;
mod result_cache;
mod store;
mod view;

pub use dispatcher::IngestionDispatcher;
pub use metadata_store::MetadataStore;
pub use models::{validate_batch, DecodeError, Notification, NotificationMetadata, User};
pub use result_cache::{FetchStatus, ResultCache};
pub use store::{NotificationsSnapshot, NotificationsStore};
pub use view::{compose_views, time_ago, NotificationView, UNKNOWN_USER};
