//! Core library for shellcache.
//!
//! Shellcache keeps a static web application available offline. It installs
//! a versioned snapshot of the application's resources, promotes it once
//! installed, answers requests from the snapshot with a network fallback, and
//! refreshes cached pages in the background.
//!
//! - `store`: versioned cache stores (disk and memory)
//! - `network`: the `Fetcher` seam and its reqwest implementation
//! - `clients`: connected client sessions and event broadcast
//! - `controller`: install, activation, routing and update checks
//! - `i18n`: the key/value translation lookup used by front ends

pub mod clients;
pub mod config;
pub mod controller;
pub mod error;
pub mod i18n;
pub mod models;
pub mod network;
pub mod store;

pub use clients::{ClientId, ClientRegistry, ClientSession};
pub use config::{ControllerConfig, Settings};
pub use controller::{
    ActivationReport, CacheController, InstallFailure, InstallReport, RefreshOutcome,
    ResponseSource, RouteOutcome, UpdateCheckReport,
};
pub use error::{CacheError, CacheResult};
pub use i18n::Translator;
pub use models::{
    CacheMode, CacheVersion, ClientMessage, ControllerEvent, Destination, MessageReply, Request,
    RequestMode, ResourceEntry, Response,
};
pub use network::{FetchError, Fetcher, HttpFetcher};
pub use store::{CacheStorage, CacheStore, DiskStorage, MemoryStorage};

pub use reqwest::header;
pub use reqwest::{Method, Url};
