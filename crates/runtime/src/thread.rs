//! Single-thread confinement.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::error::{Error, Result};

/// Remembers the thread a session was created on and rejects access from any other.
///
/// Violations are reported synchronously; nothing is queued or redirected.
#[derive(Clone)]
pub struct ThreadChecker {
	owner: ThreadId,
	label: Arc<str>,
}

impl ThreadChecker {
	/// Binds to the calling thread. `label` names the thread in diagnostics.
	pub fn current(label: impl Into<Arc<str>>) -> Self {
		Self {
			owner: thread::current().id(),
			label: label.into(),
		}
	}

	/// Returns true when called on the owning thread.
	pub fn is_current(&self) -> bool {
		thread::current().id() == self.owner
	}

	/// Fails with [`Error::ThreadViolation`] unless called on the owning thread.
	pub fn check(&self, object: &str) -> Result<()> {
		if self.is_current() {
			return Ok(());
		}
		let current = thread::current();
		let actual = match current.name() {
			Some(name) => format!("'{name}' ({:?})", current.id()),
			None => format!("{:?}", current.id()),
		};
		Err(Error::ThreadViolation {
			object: object.to_string(),
			expected: self.expected(),
			actual,
		})
	}

	fn expected(&self) -> String {
		format!("'{}' ({:?})", self.label, self.owner)
	}
}

impl fmt::Debug for ThreadChecker {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ThreadChecker")
			.field("owner", &self.owner)
			.field("label", &self.label)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn owning_thread_passes() {
		let checker = ThreadChecker::current("ui");
		assert!(checker.is_current());
		assert!(checker.check("Tab(tab:1)").is_ok());
	}

	#[test]
	fn other_thread_is_rejected_with_both_threads_named() {
		let checker = ThreadChecker::current("ui");
		let err = thread::Builder::new()
			.name("worker".to_string())
			.spawn(move || checker.check("Tab(tab:1)").unwrap_err())
			.unwrap()
			.join()
			.unwrap();

		match &err {
			Error::ThreadViolation {
				object,
				expected,
				actual,
			} => {
				assert_eq!(object, "Tab(tab:1)");
				assert!(expected.starts_with("'ui'"), "{expected}");
				assert!(actual.starts_with("'worker'"), "{actual}");
			}
			other => panic!("expected ThreadViolation, got {other:?}"),
		}
		assert!(err.is_fatal());
	}
}
