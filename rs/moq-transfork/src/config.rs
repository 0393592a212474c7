use crate::message::{Version, Versions};

/// Connection settings shared by the client and server side of the handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
	feature = "serde",
	derive(serde::Serialize, serde::Deserialize),
	serde(deny_unknown_fields, default)
)]
pub struct Config {
	/// Versions offered by a client, or accepted by a server, in preferred order.
	pub versions: Versions,

	/// The number of announcements buffered for each [crate::Connection::announced] call.
	pub announced_capacity: usize,

	/// The longest path, prefix or suffix accepted from the peer, in bytes.
	pub max_path: usize,

	/// The largest frame payload accepted from the peer, in bytes.
	pub max_frame: usize,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			versions: [Version::CURRENT].into(),
			announced_capacity: 32,
			max_path: 1024,
			max_frame: 16 * 1024 * 1024,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default() {
		let config = Config::default();
		assert_eq!(&config.versions[..], &[Version::FORK_00]);
		assert_eq!(config.announced_capacity, 32);
		assert_eq!(config.max_path, 1024);
		assert_eq!(config.max_frame, 16 * 1024 * 1024);
	}
}
