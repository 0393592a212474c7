//! An in-process [web_transport_trait::Session] connecting two peers with channels.
//!
//! There is no flow control: writes never block.
//! A finished stream counts as acknowledged once the receiver has read past the end of it,
//! which is the strongest guarantee a real transport could give.

use std::sync::{
	atomic::{AtomicU8, Ordering},
	Arc,
};

use bytes::Bytes;
use tokio::sync::{mpsc, watch, Mutex};

/// The largest datagram accepted by [Session::send_datagram](web_transport_trait::Session::send_datagram).
pub const MAX_DATAGRAM: usize = 1200;

/// Create a pair of sessions connected to each other.
pub fn pair() -> (Session, Session) {
	let closed = Arc::new(watch::Sender::new(None));

	let (a_bi, b_bi_rx) = mpsc::unbounded_channel();
	let (b_bi, a_bi_rx) = mpsc::unbounded_channel();
	let (a_uni, b_uni_rx) = mpsc::unbounded_channel();
	let (b_uni, a_uni_rx) = mpsc::unbounded_channel();
	let (a_datagram, b_datagram_rx) = mpsc::unbounded_channel();
	let (b_datagram, a_datagram_rx) = mpsc::unbounded_channel();

	let a = Session {
		state: Arc::new(State {
			open_bi: a_bi,
			open_uni: a_uni,
			send_datagram: a_datagram,
			accept_bi: Mutex::new(a_bi_rx),
			accept_uni: Mutex::new(a_uni_rx),
			recv_datagram: Mutex::new(a_datagram_rx),
			closed: closed.clone(),
		}),
	};

	let b = Session {
		state: Arc::new(State {
			open_bi: b_bi,
			open_uni: b_uni,
			send_datagram: b_datagram,
			accept_bi: Mutex::new(b_bi_rx),
			accept_uni: Mutex::new(b_uni_rx),
			recv_datagram: Mutex::new(b_datagram_rx),
			closed,
		}),
	};

	(a, b)
}

/// An error reported by the in-memory transport.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
	#[error("session closed: code={code} reason={reason}")]
	SessionClosed { code: u32, reason: String },

	#[error("stream reset: code={0}")]
	Reset(u32),

	#[error("stream stopped: code={0}")]
	Stopped(u32),

	#[error("stream already finished")]
	Finished,

	#[error("datagram too large: {0} > {MAX_DATAGRAM}")]
	DatagramTooLarge(usize),
}

impl web_transport_trait::Error for Error {
	fn session_error(&self) -> Option<(u32, String)> {
		match self {
			Self::SessionClosed { code, reason } => Some((*code, reason.clone())),
			_ => None,
		}
	}

	fn stream_error(&self) -> Option<u32> {
		match self {
			Self::Reset(code) | Self::Stopped(code) => Some(*code),
			_ => None,
		}
	}
}

type Closed = watch::Sender<Option<Error>>;

struct State {
	// Streams we open, delivered to the peer.
	open_bi: mpsc::UnboundedSender<(SendStream, RecvStream)>,
	open_uni: mpsc::UnboundedSender<RecvStream>,
	send_datagram: mpsc::UnboundedSender<Bytes>,

	// Opened by the peer.
	accept_bi: Mutex<mpsc::UnboundedReceiver<(SendStream, RecvStream)>>,
	accept_uni: Mutex<mpsc::UnboundedReceiver<RecvStream>>,
	recv_datagram: Mutex<mpsc::UnboundedReceiver<Bytes>>,

	// Shared by both ends; set once.
	closed: Arc<Closed>,
}

/// One end of an in-memory session.
#[derive(Clone)]
pub struct Session {
	state: Arc<State>,
}

impl Session {
	fn check(&self) -> Result<(), Error> {
		match &*self.state.closed.borrow() {
			Some(err) => Err(err.clone()),
			None => Ok(()),
		}
	}

	fn pipe(&self) -> (SendStream, RecvStream) {
		let (data, rx) = mpsc::unbounded_channel();
		let (status, status_rx) = watch::channel(Status::Open);
		let (sent, sent_rx) = watch::channel(None);
		let priority = Arc::new(AtomicU8::new(0));

		let send = SendStream {
			data,
			status: status_rx,
			sent,
			session: self.state.closed.subscribe(),
			priority: priority.clone(),
			finished: false,
		};

		let recv = RecvStream {
			data: rx,
			status,
			sent: sent_rx,
			session: self.state.closed.subscribe(),
			priority,
			chunk: Bytes::new(),
			end: None,
		};

		(send, recv)
	}
}

impl web_transport_trait::Session for Session {
	type SendStream = SendStream;
	type RecvStream = RecvStream;
	type Error = Error;

	async fn accept_uni(&self) -> Result<RecvStream, Error> {
		let mut closed = self.state.closed.subscribe();
		let mut streams = self.state.accept_uni.lock().await;

		tokio::select! {
			biased;
			err = wait_closed(&mut closed) => Err(err),
			stream = streams.recv() => stream.ok_or_else(dropped),
		}
	}

	async fn accept_bi(&self) -> Result<(SendStream, RecvStream), Error> {
		let mut closed = self.state.closed.subscribe();
		let mut streams = self.state.accept_bi.lock().await;

		tokio::select! {
			biased;
			err = wait_closed(&mut closed) => Err(err),
			stream = streams.recv() => stream.ok_or_else(dropped),
		}
	}

	async fn open_bi(&self) -> Result<(SendStream, RecvStream), Error> {
		self.check()?;

		let (send, peer_recv) = self.pipe();
		let (peer_send, recv) = self.pipe();

		self.state.open_bi.send((peer_send, peer_recv)).map_err(|_| dropped())?;

		Ok((send, recv))
	}

	async fn open_uni(&self) -> Result<SendStream, Error> {
		self.check()?;

		let (send, peer_recv) = self.pipe();
		self.state.open_uni.send(peer_recv).map_err(|_| dropped())?;

		Ok(send)
	}

	fn send_datagram(&self, payload: Bytes) -> Result<(), Error> {
		self.check()?;

		if payload.len() > MAX_DATAGRAM {
			return Err(Error::DatagramTooLarge(payload.len()));
		}

		// Datagrams are unreliable, so a departed peer isn't an error.
		self.state.send_datagram.send(payload).ok();
		Ok(())
	}

	async fn recv_datagram(&self) -> Result<Bytes, Error> {
		let mut closed = self.state.closed.subscribe();
		let mut datagrams = self.state.recv_datagram.lock().await;

		tokio::select! {
			biased;
			err = wait_closed(&mut closed) => Err(err),
			datagram = datagrams.recv() => datagram.ok_or_else(dropped),
		}
	}

	fn max_datagram_size(&self) -> usize {
		MAX_DATAGRAM
	}

	fn close(&self, code: u32, reason: &str) {
		self.state.closed.send_if_modified(|closed| match closed {
			Some(_) => false,
			None => {
				*closed = Some(Error::SessionClosed {
					code,
					reason: reason.to_string(),
				});
				true
			}
		});
	}

	async fn closed(&self) -> Error {
		wait_closed(&mut self.state.closed.subscribe()).await
	}
}

async fn wait_closed(closed: &mut watch::Receiver<Option<Error>>) -> Error {
	match closed.wait_for(Option::is_some).await {
		Ok(err) => (*err).clone().unwrap_or_else(dropped),
		Err(_) => dropped(),
	}
}

fn dropped() -> Error {
	Error::SessionClosed {
		code: 0,
		reason: "dropped".to_string(),
	}
}

enum Chunk {
	Data(Bytes),
	Fin,
	Reset(u32),
}

// Reported by the receiver back to the sender.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
	Open,
	Finished,
	Stopped(u32),
}

/// The sending half of an in-memory stream.
pub struct SendStream {
	data: mpsc::UnboundedSender<Chunk>,
	status: watch::Receiver<Status>,

	// How the stream ended from our side, observed by the receiver without reading.
	sent: watch::Sender<Option<Result<(), Error>>>,

	session: watch::Receiver<Option<Error>>,
	priority: Arc<AtomicU8>,
	finished: bool,
}

impl SendStream {
	fn check(&self) -> Result<(), Error> {
		if let Some(err) = &*self.session.borrow() {
			return Err(err.clone());
		}

		if let Status::Stopped(code) = *self.status.borrow() {
			return Err(Error::Stopped(code));
		}

		match self.finished {
			true => Err(Error::Finished),
			false => Ok(()),
		}
	}

	fn send(&mut self, chunk: Chunk) -> Result<(), Error> {
		// The receiver was dropped, which implicitly stops the stream.
		self.data.send(chunk).map_err(|_| Error::Stopped(0))
	}
}

impl web_transport_trait::SendStream for SendStream {
	type Error = Error;

	async fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
		self.check()?;

		if !buf.is_empty() {
			self.send(Chunk::Data(Bytes::copy_from_slice(buf)))?;
		}

		Ok(buf.len())
	}

	fn set_priority(&mut self, priority: u8) {
		self.priority.store(priority, Ordering::Relaxed);
	}

	fn finish(&mut self) -> Result<(), Error> {
		self.check()?;
		self.finished = true;
		self.sent.send_replace(Some(Ok(())));
		self.send(Chunk::Fin)
	}

	fn reset(&mut self, code: u32) {
		// A finished stream has already been delivered in full.
		if !self.finished {
			self.finished = true;
			self.sent.send_replace(Some(Err(Error::Reset(code))));
			self.send(Chunk::Reset(code)).ok();
		}
	}

	async fn closed(&mut self) -> Result<(), Error> {
		tokio::select! {
			biased;
			status = self.status.wait_for(|status| *status != Status::Open) => match status.map(|status| *status) {
				Ok(Status::Stopped(code)) => Err(Error::Stopped(code)),
				// Finished, or the receiver is gone.
				_ => Ok(()),
			},
			err = wait_closed(&mut self.session) => Err(err),
		}
	}
}

/// The receiving half of an in-memory stream.
pub struct RecvStream {
	data: mpsc::UnboundedReceiver<Chunk>,
	status: watch::Sender<Status>,
	sent: watch::Receiver<Option<Result<(), Error>>>,
	session: watch::Receiver<Option<Error>>,
	priority: Arc<AtomicU8>,

	// Leftover from a partially read chunk.
	chunk: Bytes,

	// Set once the stream has ended, one way or another.
	end: Option<Result<(), Error>>,
}

impl RecvStream {
	/// The priority most recently set by the sender.
	pub fn priority(&self) -> u8 {
		self.priority.load(Ordering::Relaxed)
	}

	async fn next_chunk(&mut self, max: usize) -> Result<Option<Bytes>, Error> {
		if self.chunk.is_empty() {
			if let Some(end) = &self.end {
				return end.clone().map(|_| None);
			}

			let next = tokio::select! {
				biased;
				chunk = self.data.recv() => chunk,
				err = wait_closed(&mut self.session) => return Err(err),
			};

			match next {
				Some(Chunk::Data(data)) => self.chunk = data,
				Some(Chunk::Fin) | None => {
					self.end = Some(Ok(()));
					self.status.send_replace(Status::Finished);
					return Ok(None);
				}
				Some(Chunk::Reset(code)) => {
					let err = Error::Reset(code);
					self.end = Some(Err(err.clone()));
					return Err(err);
				}
			}
		}

		let size = max.min(self.chunk.len());
		Ok(Some(self.chunk.split_to(size)))
	}
}

impl web_transport_trait::RecvStream for RecvStream {
	type Error = Error;

	async fn read(&mut self, dst: &mut [u8]) -> Result<Option<usize>, Error> {
		match self.next_chunk(dst.len()).await? {
			Some(chunk) => {
				dst[..chunk.len()].copy_from_slice(&chunk);
				Ok(Some(chunk.len()))
			}
			None => Ok(None),
		}
	}

	fn stop(&mut self, code: u32) {
		if self.end.is_none() {
			self.end = Some(Err(Error::Stopped(code)));
			self.status.send_replace(Status::Stopped(code));
			self.chunk.clear();
			self.data.close();
		}
	}

	async fn closed(&mut self) -> Result<(), Error> {
		if let Some(end) = &self.end {
			return end.clone();
		}

		tokio::select! {
			biased;
			sent = self.sent.wait_for(Option::is_some) => match sent {
				Ok(sent) => (*sent).clone().unwrap_or(Ok(())),
				// The sender was dropped without finishing.
				Err(_) => Ok(()),
			},
			err = wait_closed(&mut self.session) => Err(err),
		}
	}
}
