//! rsrelay - session-cookie relay between a user-facing application and the
//! research storage API.

// ============================================================================
// Core Infrastructure
// ============================================================================

pub mod build_info;
pub mod config;
pub mod sync;

// ============================================================================
// Relay Core
// ============================================================================

pub mod gateway;
pub mod search;
pub mod session;

// ============================================================================
// Caller Surface
// ============================================================================

pub mod api;
pub mod handlers;
pub mod server;
pub mod service;
