//! # huddle-gateway
//!
//! Real-time chat and meeting-notification gateway for the huddle
//! meeting platform.
//!
//! Clients connect over WebSocket to exchange chat messages within
//! meeting rooms and receive live meeting notifications. Chat messages
//! are durably persisted in PostgreSQL before fan-out; meeting domain
//! events published by the sibling meeting service arrive over a
//! Postgres NOTIFY channel and are bridged into targeted pushes.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── WS Protocol Handler (ws/)
//!     ├── REST Handlers (api/)
//!     │
//!     ├── ConnectionRegistry (domain/)
//!     ├── ChatHistory cache + store blend (history/)
//!     ├── EventBridge (bridge/)
//!     │
//!     └── PostgreSQL (persistence/, NOTIFY channel)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod domain;
pub mod error;
pub mod history;
pub mod persistence;
pub mod ws;
