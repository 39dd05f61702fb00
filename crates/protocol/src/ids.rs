//! Engine-assigned identifiers.
//!
//! Every remote object is named by the engine with an integer id that is
//! unique per object kind. The typed newtypes keep a [`TabId`] from being
//! passed where a [`BrowserId`] is expected; [`ObjectRef`] is the untyped
//! form used on the wire when a call or notification targets "some object".

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

macro_rules! engine_id {
	($(#[$meta:meta])* $name:ident, $kind:ident, $prefix:literal) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(pub u64);

		impl $name {
			/// Returns the untyped wire reference for this id.
			pub fn object_ref(self) -> ObjectRef {
				ObjectRef::new(ObjectKind::$kind, self.0)
			}
		}

		impl Display for $name {
			fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
				write!(f, concat!($prefix, ":{}"), self.0)
			}
		}

		impl From<$name> for ObjectRef {
			fn from(id: $name) -> Self {
				id.object_ref()
			}
		}
	};
}

engine_id!(
	/// Identifies a browser (a window-like container of tabs).
	BrowserId,
	Browser,
	"browser"
);
engine_id!(
	/// Identifies a tab. Reused by the engine only after the tab is destroyed.
	TabId,
	Tab,
	"tab"
);
engine_id!(
	/// Identifies one navigation attempt.
	NavigationId,
	Navigation,
	"navigation"
);
engine_id!(ProfileId, Profile, "profile");
engine_id!(FaviconFetcherId, FaviconFetcher, "favicon-fetcher");
engine_id!(
	/// Identifies the engine half of a hosted rendering surface.
	FragmentId,
	Fragment,
	"fragment"
);

/// Kind of engine-side object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectKind {
	/// The engine root; targets session-level calls (profiles, browsers).
	Engine,
	Browser,
	Tab,
	Navigation,
	Profile,
	FaviconFetcher,
	Fragment,
}

impl ObjectKind {
	/// Human-readable type name used in diagnostics.
	pub fn as_str(self) -> &'static str {
		match self {
			ObjectKind::Engine => "Engine",
			ObjectKind::Browser => "Browser",
			ObjectKind::Tab => "Tab",
			ObjectKind::Navigation => "Navigation",
			ObjectKind::Profile => "Profile",
			ObjectKind::FaviconFetcher => "FaviconFetcher",
			ObjectKind::Fragment => "Fragment",
		}
	}
}

impl Display for ObjectKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Untyped reference to one engine-side object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
	pub kind: ObjectKind,
	pub id: u64,
}

impl ObjectRef {
	/// Reference to the engine root object.
	pub const ENGINE: ObjectRef = ObjectRef {
		kind: ObjectKind::Engine,
		id: 0,
	};

	pub const fn new(kind: ObjectKind, id: u64) -> Self {
		Self { kind, id }
	}
}

impl Display for ObjectRef {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		write!(f, "{}#{}", self.kind, self.id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn typed_ids_display_with_prefix() {
		assert_eq!(TabId(7).to_string(), "tab:7");
		assert_eq!(BrowserId(1).to_string(), "browser:1");
		assert_eq!(FaviconFetcherId(3).to_string(), "favicon-fetcher:3");
	}

	#[test]
	fn typed_ids_convert_to_object_refs() {
		let r: ObjectRef = TabId(7).into();
		assert_eq!(r, ObjectRef::new(ObjectKind::Tab, 7));
		assert_eq!(r.to_string(), "Tab#7");
		assert_ne!(TabId(7).object_ref(), BrowserId(7).object_ref());
	}

	#[test]
	fn ids_serialize_as_bare_integers() {
		assert_eq!(serde_json::to_value(TabId(42)).unwrap(), serde_json::json!(42));
		let r = serde_json::to_value(NavigationId(5).object_ref()).unwrap();
		assert_eq!(r, serde_json::json!({"kind": "navigation", "id": 5}));
	}
}
