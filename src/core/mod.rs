//! Core application module
//!
//! This module contains:
//! - Command line entry point
//! - Visitor console abstraction and terminal implementation
//! - Booth session flow

pub mod app;
pub mod console;
pub mod flow;
