//! Messages sent over the wire, each prefixed by the stream it belongs to.
//!
//! A session starts with the client opening a bidirectional [StreamBi::Session] stream:
//! - [SessionClient] offers the supported versions.
//! - [SessionServer] picks one of them.
//! - [SessionInfo] may then be sent by either side at any time.
//!
//! Afterwards, either side may open more bidirectional streams:
//! - [StreamBi::Announce] carries an [AnnounceInterest] followed by any number of [Announce] records.
//! - [StreamBi::Subscribe] carries a [Subscribe] answered with a [SubscribeInfo].
//!   The subscriber may follow with [SubscribeUpdate]s and the publisher with [GroupDrop]s.
//!
//! Each group is delivered on its own unidirectional [StreamUni::Group] stream,
//! containing a [Group] header and then a [Frame] per payload.
mod announce;
mod group;
mod info;
mod session;
mod stream;
mod subscribe;
mod version;

pub use announce::*;
pub use group::*;
pub use info::*;
pub use session::*;
pub use stream::*;
pub use subscribe::*;
pub use version::*;
