//! The application-facing data model: tracks made of groups made of frames.
//!
//! Both the local publisher and the remote subscriber produce into the same types,
//! so a [TrackReader] looks the same whether the track is local or remote.
mod announced;
mod group;
mod track;

pub use announced::*;
pub use group::*;
pub use track::*;
