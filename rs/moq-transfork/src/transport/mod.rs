//! Transports underneath a [crate::Connection].
//!
//! The protocol runs over any [web_transport_trait::Session], which covers WebTransport and raw QUIC.
//! [mem] provides a connected in-process pair, used by the tests.

pub mod mem;
