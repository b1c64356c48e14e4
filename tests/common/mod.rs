//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{McpTestClient, TestServer};
//!
//! #[tokio::test]
//! async fn test_ping() {
//!     let server = TestServer::spawn().await;
//!     let mut client = McpTestClient::connect(&server.ws_url()).await;
//!
//!     let response = client.request("ping", None).await;
//!     assert!(response["result"].is_object());
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
pub use client::{connect_error_status, McpTestClient};
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{FailingGenerator, FakeGenerator};
pub use server::{TestServer, TestServerOptions};
