// Integration tests for destruction: engine-confirmed, cascaded and session-wide.

mod support;

use std::collections::BTreeMap;
use std::sync::Arc;

use support::{add_tab, browser_session, destroyed, started};
use wl::{DestroyReason, Error, NavigateParams, NavigationId, TabId};

fn destroy_reason(err: &Error) -> DestroyReason {
	match err {
		Error::UseAfterDestroy { record, .. } => record.reason,
		other => panic!("expected UseAfterDestroy, got {other}"),
	}
}

#[tokio::test]
async fn destroyed_tab_fails_every_call_without_touching_the_engine() {
	let (session, engine, browser) = browser_session(88).await;
	let tab = add_tab(&session, browser.id(), 3).await;

	session.dispatch(destroyed(TabId(3).object_ref())).await.unwrap();
	assert!(tab.is_destroyed());
	assert!(session.tab(TabId(3)).is_none());
	engine.clear();

	let err = tab.set_data(&BTreeMap::new()).await.unwrap_err();
	assert_eq!(destroy_reason(&err), DestroyReason::EngineConfirmed);
	let record = err.destroy_record().expect("record attached");
	assert_eq!(record.object, TabId(3).object_ref());
	assert!(record.to_string().starts_with("Tab#3 (destroyed by engine) at "), "{record}");

	assert!(tab.execute_script("1 + 1", false).await.is_err());
	assert!(tab.dismiss_transient_ui().await.is_err());
	assert!(tab.register_tab_callback(Arc::new(Noop)).is_err());
	assert!(tab.browser().is_err());

	let controller = tab.navigation_controller();
	let err = controller
		.navigate("https://example.com/", NavigateParams::new())
		.await
		.unwrap_err();
	assert!(matches!(err, Error::UseAfterDestroy { .. }), "{err}");
	assert!(controller.can_go_back().await.is_err());
	assert!(tab.find_in_page_controller().find("x", true).await.is_err());

	assert_eq!(engine.total(), 0, "no call may reach the engine: {:?}", engine.methods());
}

struct Noop;
impl wl::TabCallback for Noop {}

#[tokio::test]
async fn destroyed_tab_leaves_its_browser() {
	let (session, _engine, browser) = browser_session(88).await;
	let kept = add_tab(&session, browser.id(), 1).await;
	let gone = add_tab(&session, browser.id(), 2).await;
	support::activate(&session, browser.id(), Some(2)).await;

	session.dispatch(destroyed(gone.id().object_ref())).await.unwrap();

	let tabs = browser.tabs().unwrap();
	assert_eq!(tabs.len(), 1);
	assert!(Arc::ptr_eq(&tabs[0], &kept));
	assert!(browser.active_tab().unwrap().is_none());
}

#[tokio::test]
async fn browser_destruction_cascades_to_tabs_and_navigations() {
	let (session, engine, browser) = browser_session(88).await;
	let tab = add_tab(&session, browser.id(), 1).await;
	session.dispatch(started(1, 70, "https://slow.test/")).await.unwrap();
	let navigation = session.navigation(NavigationId(70)).unwrap();

	session
		.dispatch(wl::Notification::WillDestroyBrowserAndAllTabs { browser: browser.id() })
		.await
		.unwrap();
	session.dispatch(destroyed(browser.id().object_ref())).await.unwrap();

	assert!(browser.is_destroyed());
	assert!(session.browser(browser.id()).is_none());
	assert!(tab.is_destroyed());
	assert!(session.tab(TabId(1)).is_none());
	assert!(navigation.is_destroyed());
	assert!(session.navigation(NavigationId(70)).is_none());

	engine.clear();
	let err = tab.get_data().await.unwrap_err();
	assert_eq!(destroy_reason(&err), DestroyReason::OwnerDestroyed);
	let err = navigation.uri().unwrap_err();
	assert_eq!(destroy_reason(&err), DestroyReason::OwnerDestroyed);
	let err = browser.create_tab().await.unwrap_err();
	assert_eq!(destroy_reason(&err), DestroyReason::EngineConfirmed);
	assert_eq!(engine.total(), 0);

	// A late event for the tab is dropped quietly.
	session.dispatch(destroyed(TabId(1).object_ref())).await.unwrap();
}

#[tokio::test]
async fn closing_the_session_destroys_every_proxy() {
	let (session, engine, browser) = browser_session(88).await;
	let tab = add_tab(&session, browser.id(), 1).await;
	let profile = Arc::clone(browser.profile());

	session.close().unwrap();

	assert!(browser.is_destroyed());
	assert!(tab.is_destroyed());
	assert!(profile.is_destroyed());
	assert!(session.browsers().is_empty());
	let err = profile.cookie_manager().get_cookie("https://a.test/").await.unwrap_err();
	assert_eq!(destroy_reason(&err), DestroyReason::SessionClosed);
	assert!(session.profile("default", false).await.is_err());
	assert_eq!(engine.total(), 0);
}

#[tokio::test]
async fn dropping_the_session_destroys_outstanding_proxies() {
	let (session, _engine, browser) = browser_session(88).await;
	let tab = add_tab(&session, browser.id(), 1).await;

	drop(session);

	assert!(tab.is_destroyed());
	let err = tab.dismiss_transient_ui().await.unwrap_err();
	assert_eq!(destroy_reason(&err), DestroyReason::SessionClosed);
}

#[tokio::test]
async fn proxies_are_confined_to_the_session_thread() {
	let (session, engine, browser) = browser_session(88).await;
	let tab = add_tab(&session, browser.id(), 1).await;

	let remote = Arc::clone(&tab);
	let result = std::thread::Builder::new()
		.name("intruder".to_string())
		.spawn(move || {
			let callback: Arc<dyn wl::TabCallback> = Arc::new(Noop);
			remote.register_tab_callback(callback).map(|_| ())
		})
		.unwrap()
		.join()
		.unwrap();

	match result.unwrap_err() {
		Error::ThreadViolation { object, actual, .. } => {
			assert_eq!(object, "Tab(tab:1)");
			assert!(actual.contains("intruder"), "{actual}");
		}
		other => panic!("expected ThreadViolation, got {other}"),
	}
	assert!(!tab.is_destroyed());
	assert_eq!(engine.total(), 0);
}

#[test]
fn dispatch_off_thread_is_rejected() {
	let (session, _engine) = support::session(88);
	let session = Arc::new(session);
	let remote = Arc::clone(&session);
	let result = std::thread::spawn(move || {
		let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
		runtime.block_on(remote.dispatch(destroyed(TabId(1).object_ref())))
	})
	.join()
	.unwrap();
	assert!(matches!(result, Err(Error::ThreadViolation { .. })));
}

#[tokio::test]
async fn close_off_thread_is_rejected_and_leaves_the_graph_intact() {
	let (session, engine, browser) = browser_session(88).await;
	let tab = add_tab(&session, browser.id(), 1).await;

	let result = std::thread::scope(|s| s.spawn(|| session.close()).join().unwrap());

	assert!(matches!(result, Err(Error::ThreadViolation { .. })), "{result:?}");
	assert!(!tab.is_destroyed());
	assert!(!browser.is_destroyed());
	assert!(session.tab(TabId(1)).is_some());
	assert_eq!(session.browsers().len(), 1);
	assert_eq!(engine.total(), 0);

	session.close().unwrap();
	assert!(tab.is_destroyed());
}
