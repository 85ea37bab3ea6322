//! Survey CLI - Command line tools for the survey simulation system.
//!
//! Binaries:
//! - preview_path: generate and print a coverage path for an area
//! - run_headless: simulate a mission locally, faster than real time
//! - send_command: control a running survey server

pub mod client;
pub mod input;
pub mod scenarios;

pub use client::SurveyClient;
