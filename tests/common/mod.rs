//! Integration test common infrastructure.
//!
//! Provides a mock gateway server, frame builders, and small async
//! helpers for asserting on bus traffic.

pub mod frames;
pub mod server;

#[allow(unused_imports)]
pub use server::{MockGateway, Session, Welcome};

use std::time::Duration;

use guildline::bus::Subscription;

/// Default wait for anything that should happen promptly.
#[allow(dead_code)]
pub const WAIT: Duration = Duration::from_secs(3);

/// Receive the next item or panic after [`WAIT`].
#[allow(dead_code)]
pub async fn recv<T>(sub: &mut Subscription<T>) -> T {
    tokio::time::timeout(WAIT, sub.recv())
        .await
        .expect("timed out waiting for bus item")
        .expect("bus closed")
}

/// Assert nothing arrives within `quiet`.
#[allow(dead_code)]
pub async fn assert_quiet<T: std::fmt::Debug>(sub: &mut Subscription<T>, quiet: Duration) {
    if let Ok(Some(item)) = tokio::time::timeout(quiet, sub.recv()).await {
        panic!("unexpected bus item: {item:?}");
    }
}
