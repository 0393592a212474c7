use std::sync::Arc;

use crate::{
	coding::{DecodeError, EncodeError},
	message::Versions,
};

/// A list of possible errors that can occur during the session.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
	#[error("transport error: {0}")]
	Transport(TransportError),

	#[error("decode error: {0}")]
	Decode(#[from] DecodeError),

	#[error("encode error: {0}")]
	Encode(#[from] EncodeError),

	#[error("unsupported versions: client={0:?} server={1:?}")]
	Version(Versions, Versions),

	#[error("unexpected stream type")]
	UnexpectedStream,

	#[error("duplicate")]
	Duplicate,

	#[error("not found")]
	NotFound,

	#[error("protocol violation: {0}")]
	ProtocolViolation(&'static str),

	/// The remote side reset or stopped the stream with the given code.
	#[error("closed: code={0}")]
	Closed(u32),

	/// A graceful close, or nobody wants the data anymore.
	#[error("cancelled")]
	Cancel,
}

impl Error {
	/// An integer code that is sent over the wire.
	pub fn to_code(&self) -> u32 {
		match self {
			Self::Cancel => 0,
			Self::Decode(_) => 1,
			Self::Encode(_) => 2,
			Self::Version(..) => 3,
			Self::UnexpectedStream => 4,
			Self::Duplicate => 5,
			Self::NotFound => 6,
			Self::ProtocolViolation(_) => 7,
			Self::Closed(code) => *code,
			Self::Transport(err) => err.code(),
		}
	}
}

impl Error {
	/// Convert a transport error, extracting the peer's code when a stream was reset or stopped.
	pub fn transport<E: web_transport_trait::Error>(err: E) -> Self {
		match err.stream_error() {
			Some(code) => Self::Closed(code),
			None => Self::Transport(TransportError::new(err)),
		}
	}
}

/// A session level error reported by the transport.
#[derive(thiserror::Error, Debug, Clone)]
#[error("{err} (code={code})")]
pub struct TransportError {
	code: u32,
	err: Arc<dyn std::error::Error + Send + Sync>,
}

impl TransportError {
	pub fn new<E: web_transport_trait::Error>(err: E) -> Self {
		let code = err.session_error().map(|(code, _)| code).unwrap_or_default();
		Self { code, err: Arc::new(err) }
	}

	/// The application code the session was closed with, or 0 when there is none.
	pub fn code(&self) -> u32 {
		self.code
	}
}
