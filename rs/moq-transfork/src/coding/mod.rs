//! The wire encoding: QUIC variable-length integers, strings, and buffered stream access.

mod decode;
mod encode;
mod reader;
mod stream;
mod varint;
mod writer;

pub use decode::*;
pub use encode::*;
pub use reader::*;
pub use stream::*;
pub use varint::*;
pub use writer::*;
