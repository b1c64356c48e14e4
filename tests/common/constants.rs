//! Shared constants for end-to-end tests
//!
//! When the seeded boards change, update only this file and fixtures.rs.
#![allow(dead_code)]

// ============================================================================
// Seeded boards
// ============================================================================

/// Public board "Roadmap" with columns Todo, Doing, Done
pub const PUBLIC_BOARD_ID: u64 = 1;

/// Board "Private", visible only to `MEMBER_USER`
pub const PRIVATE_BOARD_ID: u64 = 2;

/// Card "Design login page" (feature, Todo) on the public board
pub const LOGIN_CARD_ID: u64 = 1;

/// Card "Fix crash on save" (bug, Doing) on the public board
pub const CRASH_CARD_ID: u64 = 2;

/// Card "Secret plan" on the private board
pub const SECRET_CARD_ID: u64 = 4;

/// Member of the private board
pub const MEMBER_USER: &str = "alice";

// ============================================================================
// Auth
// ============================================================================

pub const TEST_TOKEN: &str = "e2e-token-123";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval when waiting for server readiness (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Maximum time to wait for a response frame (milliseconds)
pub const RESPONSE_TIMEOUT_MS: u64 = 5000;
