//! Scripted engine and graph-building helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Once};

use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use wl::{
	Browser, BrowserId, EngineTransport, LoadedEngine, NavigationDescriptor, NavigationId, NavigationInfo,
	NavigationState, Notification, ObjectRef, Profile, Session, SessionConfig, Tab, TabDescriptor, TabId,
	TransportError, TransportFuture,
};

static LOGGING: Once = Once::new();

/// Installs a compact stderr subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_logging() {
	LOGGING.call_once(|| {
		let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
		let _ = tracing_subscriber::fmt()
			.with_env_filter(env_filter)
			.with_test_writer()
			.with_target(true)
			.compact()
			.try_init();
	});
}

/// One call that reached the fake engine.
#[derive(Debug, Clone)]
pub struct RecordedCall {
	pub target: ObjectRef,
	pub method: String,
	pub params: Value,
}

type Reply = Result<Value, TransportError>;

/// An [`EngineTransport`] that records every call and answers from a script.
///
/// Queued one-shot replies win over standing replies; unscripted methods
/// answer `null`.
#[derive(Default)]
pub struct FakeEngine {
	calls: Mutex<Vec<RecordedCall>>,
	queued: Mutex<HashMap<String, VecDeque<Reply>>>,
	standing: Mutex<HashMap<String, Value>>,
}

impl FakeEngine {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Answers every `method` call with `value` until replaced.
	pub fn reply(&self, method: &str, value: Value) {
		self.standing.lock().insert(method.to_string(), value);
	}

	/// Answers the next `method` call with `value`.
	pub fn reply_once(&self, method: &str, value: Value) {
		self.queued
			.lock()
			.entry(method.to_string())
			.or_default()
			.push_back(Ok(value));
	}

	/// Fails the next `method` call with an engine-reported error.
	pub fn fail_once(&self, method: &str, name: &str, message: &str) {
		self.queued
			.lock()
			.entry(method.to_string())
			.or_default()
			.push_back(Err(TransportError::Remote {
				name: name.to_string(),
				message: message.to_string(),
				stack: None,
			}));
	}

	pub fn calls(&self) -> Vec<RecordedCall> {
		self.calls.lock().clone()
	}

	pub fn methods(&self) -> Vec<String> {
		self.calls.lock().iter().map(|c| c.method.clone()).collect()
	}

	pub fn count(&self, method: &str) -> usize {
		self.calls.lock().iter().filter(|c| c.method == method).count()
	}

	pub fn total(&self) -> usize {
		self.calls.lock().len()
	}

	pub fn last(&self) -> Option<RecordedCall> {
		self.calls.lock().last().cloned()
	}

	pub fn clear(&self) {
		self.calls.lock().clear();
	}
}

impl EngineTransport for FakeEngine {
	fn call(&self, target: ObjectRef, method: &str, params: Value) -> TransportFuture<'_> {
		self.calls.lock().push(RecordedCall {
			target,
			method: method.to_string(),
			params,
		});
		let queued = self.queued.lock().get_mut(method).and_then(VecDeque::pop_front);
		let reply = match queued {
			Some(reply) => reply,
			None => Ok(self.standing.lock().get(method).cloned().unwrap_or(Value::Null)),
		};
		Box::pin(std::future::ready(reply))
	}
}

/// A session on a fake engine reporting `version`.
pub fn session(version: u32) -> (Session, Arc<FakeEngine>) {
	init_logging();
	let engine = FakeEngine::new();
	let loaded = LoadedEngine::new(engine.clone(), version);
	let session = Session::new(loaded, SessionConfig::default()).expect("session");
	(session, engine)
}

pub async fn profile(session: &Session, engine: &FakeEngine, id: u64, name: &str) -> Arc<Profile> {
	engine.reply_once("getProfile", json!({ "id": id, "name": name, "incognito": false }));
	session.profile(name, false).await.expect("profile")
}

pub async fn browser(session: &Session, engine: &FakeEngine, profile: &Arc<Profile>, id: u64) -> Arc<Browser> {
	engine.reply_once("createBrowser", json!({ "id": id }));
	session.create_browser(profile).await.expect("browser")
}

/// A session at `version` with one profile and one empty browser.
pub async fn browser_session(version: u32) -> (Session, Arc<FakeEngine>, Arc<Browser>) {
	let (session, engine) = session(version);
	let profile = profile(&session, &engine, 1, "default").await;
	let browser = browser(&session, &engine, &profile, 1).await;
	engine.clear();
	(session, engine, browser)
}

pub fn tab_descriptor(id: u64) -> TabDescriptor {
	TabDescriptor {
		id: TabId(id),
		guid: format!("guid-{id}"),
	}
}

/// Reports tab `tab` added to `browser` and returns its proxy.
pub async fn add_tab(session: &Session, browser: BrowserId, tab: u64) -> Arc<Tab> {
	session
		.dispatch(Notification::TabAdded {
			browser,
			tab: tab_descriptor(tab),
		})
		.await
		.expect("tabAdded");
	session.tab(TabId(tab)).expect("tab registered")
}

pub async fn activate(session: &Session, browser: BrowserId, tab: Option<u64>) {
	session
		.dispatch(Notification::ActiveTabChanged {
			browser,
			tab: tab.map(TabId),
		})
		.await
		.expect("activeTabChanged");
}

pub fn info(uri: &str, state: NavigationState) -> NavigationInfo {
	NavigationInfo {
		uri: uri.to_string(),
		redirect_chain: Vec::new(),
		http_status_code: 0,
		state,
		is_error_page: false,
		is_download: false,
		response_headers: Default::default(),
	}
}

pub fn started(tab: u64, navigation: u64, uri: &str) -> Notification {
	Notification::NavigationStarted {
		tab: TabId(tab),
		navigation: NavigationDescriptor {
			id: NavigationId(navigation),
			is_same_document: false,
			info: info(uri, NavigationState::WaitingResponse),
		},
	}
}

pub fn completed(navigation: u64, uri: &str, status: i32) -> Notification {
	let mut info = info(uri, NavigationState::Complete);
	info.http_status_code = status;
	Notification::NavigationCompleted {
		navigation: NavigationId(navigation),
		info,
	}
}

pub fn destroyed(object: ObjectRef) -> Notification {
	Notification::ObjectDestroyed { object }
}
