//! Subscription lifecycle: one push channel per active subscription.

mod controller;
mod manager;

pub use controller::{LifecycleController, LifecycleState, SyncSettings};
pub use manager::{NotificationsSubscriptions, SubscriptionHandle};
