//! Common test infrastructure
//!
//! A mock notifications server speaking the same HTTP and WebSocket protocol
//! as the real one. Tests should only import from this module.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{seed_notifications, TestServer};
//!
//! #[tokio::test]
//! async fn test_fetch() {
//!     let server = TestServer::spawn().await;
//!     server.add_notifications(seed_notifications());
//! }
//! ```

mod constants;
mod server;

// Public API - this is what tests import
pub use constants::*;
pub use server::TestServer;
