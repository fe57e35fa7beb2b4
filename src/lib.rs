//! Redema realtime server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod chat;
pub mod comments;
pub mod config;
pub mod contacts;
pub mod db;
pub mod directory;
pub mod error;
pub mod notifications;
pub mod routes;
pub mod state;
pub mod ws;
