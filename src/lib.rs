//! TetherLink - position relay over an unreliable pairing link.
//!
//! This library implements the message-delivery reliability layer between a
//! battery-constrained wearable (the tracked subject) and an observer device,
//! connected by a short-range wireless pairing link that offers no delivery
//! guarantees and no persistent connection.
//!
//! # High-Level API
//!
//! For most use cases, the [`tracker`] module provides the assembled core:
//!
//! ```ignore
//! use tetherlink::config::TetherConfig;
//! use tetherlink::sample::Origin;
//! use tetherlink::tracker::Tracker;
//!
//! let (tracker, handle) =
//!     Tracker::new(Origin::Subject, transport, runtime, clock, metrics, config);
//! tracker.spawn();
//!
//! handle.start_tracking().await?;
//! handle.submit_fix(fix);
//! ```
//!
//! Data flows: positioning fixes are sequenced and encoded ([`wire`]),
//! filtered by the battery/motion-aware throttle ([`throttle`]), and relayed
//! over one of three delivery channels ([`transmit`]) gated by the link
//! session state machine ([`link`]). The receiving side decodes, dedupes and
//! reorders into a bounded history ([`receive`]) consumed by distance and
//! staleness queries ([`geo`]).

pub mod clock;
pub mod config;
pub mod fault;
pub mod geo;
pub mod link;
pub mod logging;
pub mod metrics;
pub mod receive;
pub mod sample;
pub mod throttle;
pub mod tracker;
pub mod transmit;
pub mod wire;

/// Version of the TetherLink library.
///
/// Synchronized with `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
