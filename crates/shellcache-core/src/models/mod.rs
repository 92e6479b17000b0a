//! Data models for the cache controller.
//!
//! - `CacheVersion`: name of one installed snapshot
//! - `Request`, `Response`: the intercepted fetch and its answer
//! - `ResourceEntry`: a stored response with its write time
//! - Control messages: `ClientMessage`, `MessageReply`, `ControllerEvent`

pub mod entry;
pub mod message;
pub mod request;
pub mod response;
pub mod version;

pub use entry::ResourceEntry;
pub use message::{ClientMessage, ControllerEvent, MessageReply};
pub use request::{cache_key, CacheMode, Destination, Request, RequestMode};
pub use response::{Response, OFFLINE_PAGE};
pub use version::CacheVersion;
