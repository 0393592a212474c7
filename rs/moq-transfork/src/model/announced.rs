use tokio::time::Instant;

/// A path announced by the remote peer, or the end of that announcement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Announced {
	/// The full path: the interest prefix followed by the announced suffix.
	pub path: String,

	/// True when the track became available, false when it went away.
	pub active: bool,

	/// When the transition was received.
	pub updated: Instant,
}

impl Announced {
	pub fn active<P: Into<String>>(path: P) -> Self {
		Self {
			path: path.into(),
			active: true,
			updated: Instant::now(),
		}
	}

	pub fn closed<P: Into<String>>(path: P) -> Self {
		Self {
			path: path.into(),
			active: false,
			updated: Instant::now(),
		}
	}
}
