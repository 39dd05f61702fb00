//! Client-side capability gating by negotiated engine version.

use crate::error::{Error, Result};

/// A piece of API surface and the first engine major version that supports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability {
	pub name: &'static str,
	pub min_version: u32,
}

impl Capability {
	pub const fn new(name: &'static str, min_version: u32) -> Self {
		Self { name, min_version }
	}
}

/// Holds the engine major version negotiated once per session.
///
/// Checks never touch the transport, so an unsupported call never reaches
/// the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionGate {
	session_version: u32,
}

impl VersionGate {
	pub fn new(session_version: u32) -> Self {
		Self { session_version }
	}

	pub fn session_version(&self) -> u32 {
		self.session_version
	}

	pub fn supports(&self, capability: Capability) -> bool {
		self.session_version >= capability.min_version
	}

	/// Fails with [`Error::UnsupportedCapability`] when the session is too old.
	pub fn check(&self, capability: Capability) -> Result<()> {
		if self.supports(capability) {
			Ok(())
		} else {
			Err(Error::UnsupportedCapability {
				capability: capability.name,
				required: capability.min_version,
				actual: self.session_version,
			})
		}
	}
}
