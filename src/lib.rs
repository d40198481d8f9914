//! Asynchronous image editing service
//!
//! Accepts image edit requests over HTTP, answers immediately with a job id,
//! runs the edit in the background through a primary or fallback engine,
//! stores or inlines the result and reports it to the caller's webhook.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
