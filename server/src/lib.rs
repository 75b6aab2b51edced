//! TodoLists Server - Multi-list todo manager over HTTP.
//!
//! This crate provides a small server-rendered web application in which
//! every visitor keeps any number of named todo lists, responsible for:
//! - Issuing and tracking per-visitor sessions
//! - Validating list and todo names
//! - Rendering HTML pages with one-shot flash messages
//!
//! # Architecture
//!
//! All state lives in memory inside the visitor's session. There is no
//! database and no user account: a session cookie is the only identity,
//! and a session's lists disappear with it.

pub mod config;
pub mod error;
pub mod routes;
pub mod session;
pub mod types;
pub mod validation;
pub mod views;
