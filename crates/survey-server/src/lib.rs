//! Shared library surface for the survey simulation server and its tests.

pub mod api;
pub mod config;
pub mod publisher;
pub mod repository;
pub mod sim;
pub mod state;
