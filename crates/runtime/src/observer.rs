//! Ordered observer lists that tolerate mutation during fan-out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;

/// Identifies one registration in an [`ObserverList`].
type HandlerId = u64;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

fn next_handler_id() -> HandlerId {
	NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Registration-ordered set of observers compared by pointer identity.
///
/// The internal lock is released before any observer runs, so observers may
/// add or remove themselves (or others) while being notified:
///
/// - an observer removed mid fan-out is not invoked again, even later in the
///   same fan-out
/// - an observer added mid fan-out is first invoked on the next fan-out
pub struct ObserverList<T: ?Sized> {
	entries: Mutex<IndexMap<HandlerId, Arc<T>>>,
}

impl<T: ?Sized> Default for ObserverList<T> {
	fn default() -> Self {
		Self {
			entries: Mutex::new(IndexMap::new()),
		}
	}
}

impl<T: ?Sized> ObserverList<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `observer`. Returns `false` without changing anything if it is already present.
	pub fn add(&self, observer: Arc<T>) -> bool {
		let mut entries = self.entries.lock();
		if entries.values().any(|o| Arc::ptr_eq(o, &observer)) {
			return false;
		}
		entries.insert(next_handler_id(), observer);
		true
	}

	/// Removes `observer`. Returns `false` if it was not present.
	pub fn remove(&self, observer: &Arc<T>) -> bool {
		let mut entries = self.entries.lock();
		let id = entries
			.iter()
			.find_map(|(id, o)| Arc::ptr_eq(o, observer).then_some(*id));
		match id {
			Some(id) => entries.shift_remove(&id).is_some(),
			None => false,
		}
	}

	pub fn contains(&self, observer: &Arc<T>) -> bool {
		self.entries.lock().values().any(|o| Arc::ptr_eq(o, observer))
	}

	/// Invokes `f` on every member present when the fan-out starts, in registration order.
	pub fn for_each(&self, mut f: impl FnMut(&T)) {
		let snapshot: Vec<(HandlerId, Arc<T>)> = self
			.entries
			.lock()
			.iter()
			.map(|(id, o)| (*id, Arc::clone(o)))
			.collect();

		for (id, observer) in snapshot {
			if !self.entries.lock().contains_key(&id) {
				continue;
			}
			f(&observer);
		}
	}

	/// Returns the current members in registration order.
	pub fn snapshot(&self) -> Vec<Arc<T>> {
		self.entries.lock().values().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	pub fn clear(&self) {
		self.entries.lock().clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	trait Listener: Send + Sync {
		fn fire(&self, log: &Mutex<Vec<&'static str>>);
	}

	struct Named(&'static str);

	impl Listener for Named {
		fn fire(&self, log: &Mutex<Vec<&'static str>>) {
			log.lock().push(self.0);
		}
	}

	#[test]
	fn add_is_idempotent_by_identity() {
		let list: ObserverList<dyn Listener> = ObserverList::new();
		let a: Arc<dyn Listener> = Arc::new(Named("a"));
		assert!(list.add(Arc::clone(&a)));
		assert!(!list.add(Arc::clone(&a)));
		assert_eq!(list.len(), 1);

		let log = Mutex::new(Vec::new());
		list.for_each(|o| o.fire(&log));
		assert_eq!(*log.lock(), vec!["a"]);
	}

	#[test]
	fn distinct_instances_are_distinct_members() {
		let list: ObserverList<dyn Listener> = ObserverList::new();
		assert!(list.add(Arc::new(Named("a"))));
		assert!(list.add(Arc::new(Named("a"))));
		assert_eq!(list.len(), 2);
	}

	#[test]
	fn fan_out_follows_registration_order() {
		let list: ObserverList<dyn Listener> = ObserverList::new();
		for name in ["first", "second", "third"] {
			list.add(Arc::new(Named(name)));
		}
		let log = Mutex::new(Vec::new());
		list.for_each(|o| o.fire(&log));
		assert_eq!(*log.lock(), vec!["first", "second", "third"]);
	}

	#[test]
	fn removal_during_fan_out_skips_removed_member() {
		let list: Arc<ObserverList<dyn Listener>> = Arc::new(ObserverList::new());
		let a: Arc<dyn Listener> = Arc::new(Named("a"));
		let b: Arc<dyn Listener> = Arc::new(Named("b"));
		let c: Arc<dyn Listener> = Arc::new(Named("c"));
		list.add(Arc::clone(&a));
		list.add(Arc::clone(&b));
		list.add(Arc::clone(&c));

		let log = Mutex::new(Vec::new());
		let mut seen = 0;
		list.for_each(|o| {
			o.fire(&log);
			seen += 1;
			if seen == 1 {
				assert!(list.remove(&c));
			}
		});
		assert_eq!(*log.lock(), vec!["a", "b"]);
		assert!(!list.contains(&c));
	}

	#[test]
	fn member_removed_by_an_earlier_one_never_runs_again() {
		let list: ObserverList<dyn Listener> = ObserverList::new();
		let a: Arc<dyn Listener> = Arc::new(Named("a"));
		let b: Arc<dyn Listener> = Arc::new(Named("b"));
		let c: Arc<dyn Listener> = Arc::new(Named("c"));
		list.add(Arc::clone(&a));
		list.add(Arc::clone(&b));
		list.add(Arc::clone(&c));

		let log = Mutex::new(Vec::new());
		list.for_each(|o| {
			o.fire(&log);
			if *log.lock() == ["a"] {
				assert!(list.remove(&b));
			}
		});
		assert_eq!(*log.lock(), vec!["a", "c"]);

		log.lock().clear();
		list.for_each(|o| o.fire(&log));
		assert_eq!(*log.lock(), vec!["a", "c"]);
		assert!(!list.contains(&b));
	}

	#[test]
	fn addition_during_fan_out_waits_for_next_fan_out() {
		let list: ObserverList<dyn Listener> = ObserverList::new();
		list.add(Arc::new(Named("a")));
		let late: Arc<dyn Listener> = Arc::new(Named("late"));

		let log = Mutex::new(Vec::new());
		list.for_each(|o| {
			o.fire(&log);
			list.add(Arc::clone(&late));
		});
		assert_eq!(*log.lock(), vec!["a"]);

		log.lock().clear();
		list.for_each(|o| o.fire(&log));
		assert_eq!(*log.lock(), vec!["a", "late"]);
	}

	#[test]
	fn remove_missing_returns_false() {
		let list: ObserverList<dyn Listener> = ObserverList::new();
		let a: Arc<dyn Listener> = Arc::new(Named("a"));
		assert!(!list.remove(&a));
		list.add(Arc::clone(&a));
		list.clear();
		assert!(list.is_empty());
	}
}
