//! Relay metrics.
//!
//! Components never log metrics through globals. A [`MetricsClient`] is
//! constructed once at the process root, injected into the transmitter and
//! throttle controller, and forwards events over a channel that an observer
//! (dashboard, test harness) drains at its own pace.

mod client;
mod event;

use tokio::sync::mpsc;

pub use client::MetricsClient;
pub use event::MetricEvent;

/// Create a connected metrics client and the receiving end of its channel.
pub fn channel() -> (MetricsClient, mpsc::UnboundedReceiver<MetricEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MetricsClient::new(tx), rx)
}
