//! Application-level byte accounting hooks.
//!
//! Only frame payloads are counted, so the totals reflect media delivered rather than protocol overhead.
//! Transport effects such as retransmissions are ignored.

use std::sync::atomic::{AtomicU64, Ordering};

/// A sink for frame payload bytes, shared by every stream of a connection.
///
/// Called from hot paths; implementations should be fast and non-blocking (e.g., atomics).
pub trait Stats: Send + Sync + 'static {
	/// Record payload bytes read from group streams.
	fn add_rx_bytes(&self, bytes: u64);

	/// Record payload bytes written to group streams.
	fn add_tx_bytes(&self, bytes: u64);
}

/// Running totals kept in atomics.
#[derive(Default, Debug)]
pub struct CounterStats {
	rx: AtomicU64,
	tx: AtomicU64,
}

impl CounterStats {
	pub fn rx_bytes(&self) -> u64 {
		self.rx.load(Ordering::Relaxed)
	}

	pub fn tx_bytes(&self) -> u64 {
		self.tx.load(Ordering::Relaxed)
	}
}

impl Stats for CounterStats {
	fn add_rx_bytes(&self, bytes: u64) {
		self.rx.fetch_add(bytes, Ordering::Relaxed);
	}

	fn add_tx_bytes(&self, bytes: u64) {
		self.tx.fetch_add(bytes, Ordering::Relaxed);
	}
}
