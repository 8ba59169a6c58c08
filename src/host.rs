//! The live node tree the [`Reconciler`](`crate::reconcile::Reconciler`) mutates.
//!
//! [`web::WebHost`](`crate::web::WebHost`) drives a browser DOM, [`memory::MemoryDom`](`crate::memory::MemoryDom`)
//! an in-process tree for non-browser targets and tests.

use crate::event::Event;
use core::fmt::Debug;
use serde_json::Value;
use std::rc::Rc;

/// Receives converted native events.
pub type NativeListener = Rc<dyn Fn(Event)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ListenerOptions {
	/// Set exactly when `prevent_default` isn't.
	pub passive: bool,
	pub prevent_default: bool,
	pub stop_propagation: bool,
}

impl ListenerOptions {
	#[must_use]
	pub fn new(prevent_default: bool, stop_propagation: bool) -> Self {
		Self {
			passive: !prevent_default,
			prevent_default,
			stop_propagation,
		}
	}
}

/// What virtualization needs to know about an existing live node.
#[derive(Debug, Clone, PartialEq)]
pub enum Described {
	Element {
		namespace: String,
		tag: String,
		attributes: Vec<(String, String)>,
	},
	Text(String),
	/// Comments and anything else without a VDOM counterpart.
	Other,
}

pub trait Host: 'static {
	type Node: Clone + Debug + 'static;
	/// Keeps a bound native listener alive until it's removed.
	type Listener;

	/// `namespace` is empty for HTML.
	fn create_element(&self, namespace: &str, tag: &str) -> Self::Node;
	fn create_text(&self, content: &str) -> Self::Node;
	/// Placeholder heading the children of a fragment.
	fn create_marker(&self) -> Self::Node;
	/// A detached container whose children move out of it when it's inserted.
	fn create_fragment(&self) -> Self::Node;

	/// Inserts (or moves) `child` into `parent` before `reference`, or at the end.
	fn insert_before(&self, parent: &Self::Node, child: &Self::Node, reference: Option<&Self::Node>);
	fn remove_child(&self, parent: &Self::Node, child: &Self::Node);
	fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
	fn child_nodes(&self, node: &Self::Node) -> Vec<Self::Node>;
	fn describe(&self, node: &Self::Node) -> Described;

	fn set_text(&self, node: &Self::Node, content: &str);
	fn set_inner_html(&self, node: &Self::Node, html: &str);
	fn set_attribute(&self, node: &Self::Node, name: &str, value: &str);
	fn remove_attribute(&self, node: &Self::Node, name: &str);
	fn set_property(&self, node: &Self::Node, name: &str, value: &Value);

	fn add_listener(&self, node: &Self::Node, name: &str, options: ListenerOptions, listener: NativeListener) -> Self::Listener;
	fn remove_listener(&self, node: &Self::Node, name: &str, listener: Self::Listener);

	/// Dispatches a custom event with `data` as its detail.
	fn emit(&self, node: &Self::Node, name: &str, data: &Value);
}
