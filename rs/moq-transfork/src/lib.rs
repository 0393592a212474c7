//! # moq-transfork: Media over QUIC Transfork
//!
//! A publish/subscribe transport for live media over any QUIC-like session.
//! Peers announce named tracks, discover each other's tracks by prefix, and subscribe to them.
//! Each track is delivered as a sequence of groups, each group on its own unidirectional stream,
//! so a slow group never blocks a newer one.
//!
//! ## API
//!
//! The API is built around Writer/Reader pairs, with the hierarchy:
//! - [Track]: A collection of [Group]s, delivered out-of-order until closed.
//! - [Group]: A collection of frames, delivered in order until closed.
//!
//! To publish media:
//! - [Connection::connect] or [Connection::accept] to perform the handshake.
//! - [Track::produce] to get a [TrackWriter] and [TrackReader] pair.
//! - [Connection::publish] to make the [TrackReader] available to the peer.
//! - [TrackWriter::append_group] for each Group of Pictures (GOP) or batch of audio frames.
//! - [GroupWriter::write_frame] to write each encoded frame in the group.
//!
//! To consume media:
//! - [Connection::announced] to discover tracks by prefix as they come and go.
//! - [Connection::subscribe] to get a [TrackReader] for a specific track.
//! - [TrackReader::next_group] to receive the latest group.
//! - [GroupReader::read_frame] to read each frame in the group.
//!
//! Groups may arrive out of order; [TrackReader::next_group] only ever moves forward,
//! skipping groups that were superseded before they were read.
//!
//! ## Transport
//!
//! The protocol runs over any [web_transport_trait::Session], such as `web-transport-quinn`.
//! Use [transport::mem::pair] for an in-process pair.

mod config;
mod connection;
mod error;
mod model;
mod session;
mod stats;

pub mod coding;
pub mod message;
pub mod transport;
pub mod util;

pub use config::*;
pub use connection::*;
pub use error::*;
pub use model::*;
pub use stats::*;

pub use message::{GroupOrder, Version, Versions};
pub use util::{QueueReader, WatchReader};
