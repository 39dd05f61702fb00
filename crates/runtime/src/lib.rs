//! Proxy runtime for driving an out-of-process browser engine.
//!
//! This crate holds the machinery every engine-object proxy shares,
//! independent of what the objects are:
//!
//! - [`ProxyCore`]: liveness, thread confinement and version gating for one proxy
//! - [`ProxyRegistry`]: the single live proxy per engine id
//! - [`ObserverList`]: callback lists that survive mutation during fan-out
//! - [`EngineTransport`]: the call seam, with [`Connection`] as an in-process implementation
//! - [`Error`]: the error taxonomy shared with the client crate

pub mod channel;
pub mod connection;
pub mod error;
pub mod observer;
pub mod proxy;
pub mod registry;
pub mod thread;
pub mod transport;
pub mod version;

pub use channel::Channel;
pub use connection::{Connection, ConnectionParts, EnginePeer, Request};
pub use error::{Error, Result, TransportError};
pub use observer::ObserverList;
pub use proxy::{DestroyReason, DestroyRecord, ProxyContext, ProxyCore, ProxyState, RemoteHandle};
pub use registry::ProxyRegistry;
pub use thread::ThreadChecker;
pub use transport::{EngineLoader, EngineTransport, LoadedEngine, TransportFuture};
pub use version::{Capability, VersionGate};

/// Oldest engine major version a session will accept.
pub const MIN_SUPPORTED_ENGINE_VERSION: u32 = 83;
