//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration file (path, show, init)
//! - [`listen`] - Show guidance datagrams received from a peer
//! - [`navigate`] - Follow a route with a fix stream
//! - [`parse`] - Mine a single routing instruction
//! - [`replay`] - Cycle a route's guidance to the peer

pub mod common;
pub mod config;
pub mod listen;
pub mod navigate;
pub mod parse;
pub mod replay;
