//! Profiles: named, optionally incognito, storage partitions shared by browsers.

mod cookie_manager;
mod prerender;

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::json;
use wl_protocol::{BrowsingDataType, ProfileDescriptor, ProfileId};
use wl_runtime::{DestroyReason, Error, ProxyCore, Result};

pub use cookie_manager::{CookieManager, CookieSubscription};
pub use prerender::PrerenderController;

use crate::callbacks::DataDeletedCallback;
use crate::session::{SessionCore, upgrade};

/// Registry key of a profile. A session holds at most one profile per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProfileKey {
	pub name: String,
	pub incognito: bool,
}

impl ProfileKey {
	pub fn new(name: impl Into<String>, incognito: bool) -> Self {
		Self {
			name: name.into(),
			incognito,
		}
	}
}

impl fmt::Display for ProfileKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.incognito {
			write!(f, "incognito:{}", self.name)
		} else {
			write!(f, "profile:{}", self.name)
		}
	}
}

/// Checks a profile name: `[A-Za-z0-9_]+`, or empty for the default incognito profile.
pub(crate) fn validate_profile_name(name: &str, incognito: bool) -> Result<()> {
	if name.is_empty() {
		if incognito {
			return Ok(());
		}
		return Err(Error::InvalidArgument(
			"profile name may only be empty for incognito profiles".to_string(),
		));
	}
	if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
		return Err(Error::InvalidArgument(format!(
			"profile name {name:?} may only contain letters, digits and underscores"
		)));
	}
	Ok(())
}

enum Deletion {
	Idle,
	/// Waiting for the last browser using the profile to go away.
	Deferred(Vec<DataDeletedCallback>),
	/// The engine is deleting; callbacks run when it reports completion.
	Requested(Vec<DataDeletedCallback>),
}

/// A storage partition. Browsers created with the same profile share cookies,
/// cache and site data.
pub struct Profile {
	id: ProfileId,
	key: ProfileKey,
	core: Arc<ProxyCore>,
	session: Weak<SessionCore>,
	cookie_manager: Arc<CookieManager>,
	prerender_controller: Arc<PrerenderController>,
	deletion: Mutex<Deletion>,
}

impl Profile {
	pub(crate) fn new(descriptor: &ProfileDescriptor, session: &Arc<SessionCore>) -> Arc<Self> {
		let key = ProfileKey::new(descriptor.name.clone(), descriptor.incognito);
		let core = Arc::new(ProxyCore::new(
			format!("Profile({key})"),
			descriptor.id.object_ref(),
			Arc::clone(session.context()),
		));
		Arc::new(Self {
			id: descriptor.id,
			key,
			cookie_manager: Arc::new(CookieManager::new(Arc::clone(&core))),
			prerender_controller: Arc::new(PrerenderController::new(Arc::clone(&core))),
			core,
			session: Arc::downgrade(session),
			deletion: Mutex::new(Deletion::Idle),
		})
	}

	pub fn id(&self) -> ProfileId {
		self.id
	}

	pub fn name(&self) -> &str {
		&self.key.name
	}

	pub fn is_incognito(&self) -> bool {
		self.key.incognito
	}

	pub fn key(&self) -> &ProfileKey {
		&self.key
	}

	pub fn is_destroyed(&self) -> bool {
		self.core.is_destroyed()
	}

	pub fn cookie_manager(&self) -> &Arc<CookieManager> {
		&self.cookie_manager
	}

	pub fn prerender_controller(&self) -> &Arc<PrerenderController> {
		&self.prerender_controller
	}

	/// Clears `types` of browsing data in the `[from_ms, to_ms)` window (Unix milliseconds).
	pub async fn clear_browsing_data(&self, types: &[BrowsingDataType], from_ms: i64, to_ms: i64) -> Result<()> {
		self.core.check_access()?;
		if from_ms > to_ms {
			return Err(Error::InvalidArgument(format!(
				"time range is inverted: {from_ms} > {to_ms}"
			)));
		}
		self.core
			.call_no_result(
				"clearBrowsingData",
				json!({ "types": types, "fromMillis": from_ms, "toMillis": to_ms }),
			)
			.await
	}

	pub async fn set_download_directory(&self, directory: &Path) -> Result<()> {
		self.core.check_access()?;
		let directory = directory
			.to_str()
			.ok_or_else(|| Error::InvalidArgument(format!("{} is not valid UTF-8", directory.display())))?;
		self.core
			.call_no_result("setDownloadDirectory", json!({ "directory": directory }))
			.await
	}

	/// Destroys the profile and deletes its data from disk.
	///
	/// Fails with [`Error::InvalidState`] while any browser still uses the
	/// profile. `callback` runs once the engine reports the data gone.
	pub async fn destroy_and_delete_data_from_disk(&self, callback: Option<DataDeletedCallback>) -> Result<()> {
		self.core.check_access()?;
		let session = upgrade(&self.session)?;
		let live = session.live_browsers_of(self.id).len();
		if live > 0 {
			return Err(Error::InvalidState(format!(
				"{} is still used by {live} browser(s)",
				self.core.label()
			)));
		}
		self.enqueue(callback);
		self.request_deletion().await
	}

	/// Like [`Profile::destroy_and_delete_data_from_disk`], but waits for the
	/// last browser using the profile to be destroyed instead of failing.
	pub async fn destroy_and_delete_data_from_disk_soon(&self, callback: Option<DataDeletedCallback>) -> Result<()> {
		self.core.check_access()?;
		let session = upgrade(&self.session)?;
		self.enqueue(callback);
		if session.live_browsers_of(self.id).is_empty() {
			return self.request_deletion().await;
		}
		tracing::debug!(profile = %self.key, "data deletion deferred until its browsers are gone");
		Ok(())
	}

	/// Called after a browser using this profile was destroyed.
	pub(crate) async fn handle_browser_destroyed(&self, session: &SessionCore) -> Result<()> {
		let deferred = matches!(*self.deletion.lock(), Deletion::Deferred(_));
		if deferred && session.live_browsers_of(self.id).is_empty() {
			self.request_deletion().await?;
		}
		Ok(())
	}

	/// Runs queued callbacks once the engine has deleted the data.
	pub(crate) fn handle_data_deleted(&self) {
		let callbacks = match std::mem::replace(&mut *self.deletion.lock(), Deletion::Idle) {
			Deletion::Requested(callbacks) | Deletion::Deferred(callbacks) => callbacks,
			Deletion::Idle => {
				tracing::warn!(profile = %self.key, "data deletion reported without a request");
				Vec::new()
			}
		};
		self.mark_destroyed(DestroyReason::EngineConfirmed);
		for callback in callbacks {
			callback();
		}
	}

	#[track_caller]
	pub(crate) fn mark_destroyed(&self, reason: DestroyReason) -> bool {
		let first = self.core.mark_destroyed(reason);
		if first {
			self.cookie_manager.clear();
		}
		first
	}

	/// Queues `callback`. An idle profile stays deferred until a request goes out.
	fn enqueue(&self, callback: Option<DataDeletedCallback>) {
		let mut deletion = self.deletion.lock();
		match &mut *deletion {
			Deletion::Deferred(callbacks) | Deletion::Requested(callbacks) => callbacks.extend(callback),
			Deletion::Idle => *deletion = Deletion::Deferred(callback.into_iter().collect()),
		}
	}

	/// Sends the single deletion request. A no-op while one is outstanding.
	async fn request_deletion(&self) -> Result<()> {
		let callbacks = {
			let mut deletion = self.deletion.lock();
			match std::mem::replace(&mut *deletion, Deletion::Idle) {
				Deletion::Requested(callbacks) => {
					*deletion = Deletion::Requested(callbacks);
					return Ok(());
				}
				Deletion::Deferred(callbacks) => callbacks,
				Deletion::Idle => Vec::new(),
			}
		};
		*self.deletion.lock() = Deletion::Requested(callbacks);

		let result = self
			.core
			.call_no_result("destroyAndDeleteDataFromDisk", serde_json::Value::Null)
			.await;
		if let Err(err) = &result {
			tracing::error!(profile = %self.key, error = %err, "data deletion request failed");
			let mut deletion = self.deletion.lock();
			if let Deletion::Requested(callbacks) = std::mem::replace(&mut *deletion, Deletion::Idle) {
				*deletion = Deletion::Deferred(callbacks);
			}
		}
		result
	}
}

impl fmt::Debug for Profile {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Profile")
			.field("id", &self.id)
			.field("key", &self.key)
			.field("destroyed", &self.is_destroyed())
			.finish()
	}
}
