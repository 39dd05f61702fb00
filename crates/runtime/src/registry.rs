//! Session-owned id → proxy maps.

use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::{Error, Result};

/// Maps engine ids to the single live proxy for each id.
///
/// Entries go in when the client creates an object or the engine first
/// mentions one, and come out only when the engine confirms destruction.
pub struct ProxyRegistry<K, P: ?Sized> {
	kind: &'static str,
	entries: DashMap<K, Arc<P>>,
}

impl<K, P> ProxyRegistry<K, P>
where
	K: Eq + Hash + Clone + Display,
	P: ?Sized,
{
	/// Creates an empty registry. `kind` names the proxy type in errors.
	pub fn new(kind: &'static str) -> Self {
		Self {
			kind,
			entries: DashMap::new(),
		}
	}

	/// Inserts a new mapping. Fails if `id` already has a live proxy.
	pub fn register(&self, id: K, proxy: Arc<P>) -> Result<()> {
		match self.entries.entry(id) {
			Entry::Occupied(existing) => Err(Error::AlreadyRegistered {
				id: self.describe(existing.key()),
			}),
			Entry::Vacant(slot) => {
				tracing::trace!(kind = self.kind, id = %slot.key(), "registered proxy");
				slot.insert(proxy);
				Ok(())
			}
		}
	}

	/// Removes and returns the mapping for `id`.
	pub fn unregister(&self, id: &K) -> Result<Arc<P>> {
		match self.entries.remove(id) {
			Some((_, proxy)) => {
				tracing::trace!(kind = self.kind, %id, "unregistered proxy");
				Ok(proxy)
			}
			None => Err(Error::NotRegistered {
				id: self.describe(id),
			}),
		}
	}

	pub fn lookup(&self, id: &K) -> Option<Arc<P>> {
		self.entries.get(id).map(|r| Arc::clone(r.value()))
	}

	/// Returns the existing proxy for `id`, or registers the one built by `make`.
	///
	/// The `bool` is `true` when `make` ran. `make` runs without the map locked,
	/// so it may itself consult this registry; if a proxy for `id` appeared in
	/// the meantime, that proxy wins and the freshly built one is dropped.
	pub fn get_or_register_with<F>(&self, id: K, make: F) -> Result<(Arc<P>, bool)>
	where
		F: FnOnce() -> Result<Arc<P>>,
	{
		if let Some(existing) = self.lookup(&id) {
			return Ok((existing, false));
		}
		let proxy = make()?;
		match self.entries.entry(id) {
			Entry::Occupied(existing) => Ok((Arc::clone(existing.get()), false)),
			Entry::Vacant(slot) => {
				tracing::trace!(kind = self.kind, id = %slot.key(), "registered proxy");
				slot.insert(Arc::clone(&proxy));
				Ok((proxy, true))
			}
		}
	}

	pub fn contains(&self, id: &K) -> bool {
		self.entries.contains_key(id)
	}

	/// Returns the first proxy matching `pred`, in no particular order.
	pub fn find(&self, mut pred: impl FnMut(&P) -> bool) -> Option<Arc<P>> {
		self.entries
			.iter()
			.find(|r| pred(r.value()))
			.map(|r| Arc::clone(r.value()))
	}

	/// Returns a snapshot of all live proxies.
	pub fn values(&self) -> Vec<Arc<P>> {
		self.entries.iter().map(|r| Arc::clone(r.value())).collect()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Removes and returns every entry.
	pub fn drain(&self) -> Vec<Arc<P>> {
		let keys: Vec<K> = self.entries.iter().map(|r| r.key().clone()).collect();
		keys.into_iter()
			.filter_map(|k| self.entries.remove(&k).map(|(_, p)| p))
			.collect()
	}

	fn describe(&self, id: &K) -> String {
		format!("{} {id}", self.kind)
	}
}
