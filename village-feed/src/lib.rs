//! # village-feed: live dashboard data
//!
//! A background tokio task that periodically reads a [`DashboardSnapshot`]
//! from the village database over its own read-only connection and
//! publishes it to every subscriber.
//!
//! The feed never touches live agents and never writes. If the database is
//! missing or a read fails, subscribers simply see nothing new until the
//! next successful round.
//!
//! [`DashboardSnapshot`]: village_core::DashboardSnapshot

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod feed;

pub use feed::{sse_frame, spawn_feed, FeedHandle, FeedOptions};
