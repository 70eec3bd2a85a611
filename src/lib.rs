//! guildline - gateway event pipeline and prefix-command framework for
//! chat-service bots.
//!
//! A [`network::Gateway`] keeps websocket connections open, turns inbound
//! frames into typed events and publishes them on an [`bus::EventBus`]. A
//! [`commands::CommandModule`] attached to the bus parses prefixed messages
//! and runs the matching handlers.

pub mod bus;
pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod network;
pub mod rest;
pub mod telemetry;

pub use guildline_proto as proto;
