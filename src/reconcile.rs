//! Applies [`Patch`]es to a live tree and routes native events back to paths.
//!
//! The [`Reconciler`] keeps a shadow tree of metadata nodes that mirrors the VDOM's structure one to one
//! (fragments included), each pointing at its live counterpart.
//! Live nodes are never annotated; everything the reconciler needs to remember lives in the shadow tree.
//!
//! In the live tree, a fragment is a marker followed by the live nodes of its children.

use crate::{
	attribute::{Attribute, ListenerShape},
	event::Event,
	host::{Host, ListenerOptions},
	node::{Kind, Node, NodeKind},
	patch::{Change, Patch},
	path::{Hop, Path},
	platform::{Platform, TimerId},
};
use core::{
	fmt::{self, Debug, Formatter},
	slice,
};
use hashbrown::HashMap;
use serde_json::Value;
use slotmap::{new_key_type, SlotMap};
use std::rc::Rc;
use tracing::{error, instrument, trace, trace_span, warn};

new_key_type! {
	/// A node of the [`Reconciler`]'s shadow tree.
	pub struct NodeId;
}

/// Poked directly on the live node in addition to being set as attribute.
const SYNCED_NAMES: &[&str] = &["autofocus", "autoplay", "checked", "selected", "value"];

macro_rules! malformed {
	($($arg:tt)*) => {{
		error!($($arg)*);
		panic!("vdom-reconcile bug: Malformed patch: {}", format_args!($($arg)*))
	}};
}

/// Input to [`Reconciler::receive`].
#[derive(Debug, Clone)]
pub enum Signal {
	/// A native event reached the listener bound on the node.
	Native(Event),
	/// The debounce timer for the named listener elapsed.
	Debounced(String),
}

/// Where the [`Reconciler`]'s native listeners and timers send their [`Signal`]s.
///
/// Signals arrive outside of any `&mut Reconciler` borrow and should be queued for [`Reconciler::receive`].
pub type Sink = Rc<dyn Fn(NodeId, Signal)>;

/// An event that passed throttling and debouncing, addressed to its node.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
	pub path: Path,
	pub event: Event,
	pub shape: ListenerShape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaKind {
	/// The mount container.
	Root,
	Node(NodeKind),
}

struct Bound<L> {
	handle: L,
	options: ListenerOptions,
	shape: ListenerShape,
}

struct Pending {
	timer: TimerId,
	event: Event,
}

struct Throttled {
	last: f64,
	event_id: u64,
}

struct Meta<H: Host> {
	kind: MetaKind,
	key: String,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	live: H::Node,
	listeners: HashMap<String, Bound<H::Listener>>,
	debounced: HashMap<String, Pending>,
	throttled: HashMap<String, Throttled>,
}

impl<H: Host> Meta<H> {
	fn new(kind: MetaKind, key: String, parent: Option<NodeId>, live: H::Node) -> Self {
		Self {
			kind,
			key,
			parent,
			children: Vec::new(),
			live,
			listeners: HashMap::new(),
			debounced: HashMap::new(),
			throttled: HashMap::new(),
		}
	}

	fn is_fragment(&self) -> bool {
		self.kind == MetaKind::Node(NodeKind::Fragment)
	}
}

pub struct Reconciler<H: Host> {
	host: H,
	platform: Rc<dyn Platform>,
	nodes: SlotMap<NodeId, Meta<H>>,
	root: NodeId,
	sink: Sink,
}

impl<H: Host> Debug for Reconciler<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Reconciler")
			.field("root", &self.nodes[self.root].live)
			.field("nodes", &self.len())
			.finish_non_exhaustive()
	}
}

impl<H: Host> Reconciler<H> {
	/// Takes over `root` as mount container. Its existing children are left alone until [`virtualize`](`crate::load::virtualize`)d.
	pub fn new(host: H, platform: Rc<dyn Platform>, root: H::Node, sink: Sink) -> Self {
		let mut nodes = SlotMap::with_key();
		let root = nodes.insert(Meta::new(MetaKind::Root, String::new(), None, root));
		Self {
			host,
			platform,
			nodes,
			root,
			sink,
		}
	}

	#[must_use]
	pub fn host(&self) -> &H {
		&self.host
	}

	#[must_use]
	pub fn platform(&self) -> &Rc<dyn Platform> {
		&self.platform
	}

	/// The mount container.
	#[must_use]
	pub fn root(&self) -> &H::Node {
		&self.nodes[self.root].live
	}

	#[must_use]
	pub fn root_id(&self) -> NodeId {
		self.root
	}

	/// Number of shadow nodes, not counting the mount container.
	#[must_use]
	pub fn len(&self) -> usize {
		self.nodes.len() - 1
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	#[must_use]
	pub fn live(&self, node: NodeId) -> Option<&H::Node> {
		self.nodes.get(node).map(|meta| &meta.live)
	}

	#[must_use]
	pub fn children(&self, node: NodeId) -> Option<&[NodeId]> {
		self.nodes.get(node).map(|meta| meta.children.as_slice())
	}

	/// The structural address of `node`, or [`None`] if it was removed.
	#[must_use]
	pub fn path_of(&self, node: NodeId) -> Option<Path> {
		let mut hops = Vec::new();
		let mut current = node;
		let mut meta = self.nodes.get(node)?;
		while let Some(parent) = meta.parent {
			let index = self.nodes[parent].children.iter().position(|c| *c == current)?;
			hops.push(if meta.key.is_empty() {
				#[allow(clippy::cast_possible_truncation)]
				Hop::Index(index as u32)
			} else {
				Hop::Key(meta.key.clone())
			});
			current = parent;
			meta = &self.nodes[parent];
		}
		hops.reverse();
		Some(Path::from_hops(hops))
	}

	/// Appends a shadow node for an already existing live node.
	pub(crate) fn adopt(&mut self, parent: NodeId, kind: NodeKind, live: H::Node) -> NodeId {
		let id = self.allocate(parent, kind, "", live);
		self.nodes[parent].children.push(id);
		id
	}

	fn allocate(&mut self, parent: NodeId, kind: NodeKind, key: &str, live: H::Node) -> NodeId {
		self.nodes.insert(Meta::new(MetaKind::Node(kind), key.to_owned(), Some(parent), live))
	}

	/// Applies `patch` to the live tree.
	///
	/// # Panics
	///
	/// Iff `patch` doesn't fit the current shadow tree, i.e. wasn't diffed against the last applied state.
	#[instrument(skip_all, fields(changes = patch.change_count()))]
	pub fn apply<Msg>(&mut self, patch: &Patch<Msg>) {
		// Worklist instead of recursion, as patches can be arbitrarily deep.
		let mut work = vec![(self.root, patch)];
		while let Some((id, patch)) = work.pop() {
			for change in &patch.changes {
				let span = trace_span!("change", kind = change.kind());
				let _enter = span.enter();
				self.apply_change(id, change);
			}
			for _ in 0..patch.removed {
				let last = match self.nodes[id].children.len().checked_sub(1) {
					Some(last) => last,
					None => malformed!("Can't remove {} trailing children of an empty node.", patch.removed),
				};
				self.remove(id, last);
			}
			for child in &patch.children {
				work.push((self.child_at(id, child.index), child));
			}
		}
	}

	fn child_at(&self, parent: NodeId, index: usize) -> NodeId {
		match self.nodes[parent].children.get(index) {
			Some(&child) => child,
			None => malformed!(
				"Child index {} out of range ({} children).",
				index,
				self.nodes[parent].children.len()
			),
		}
	}

	fn apply_change<Msg>(&mut self, id: NodeId, change: &Change<Msg>) {
		match change {
			Change::ReplaceText { content } => {
				if cfg!(feature = "dangerous-logging") {
					trace!(content = content.as_str(), "Replacing text.");
				}
				self.host.set_text(&self.nodes[id].live, content);
			}
			Change::ReplaceInnerHtml { html } => self.host.set_inner_html(&self.nodes[id].live, html),
			Change::UpdateAttrs { added, removed } => {
				for attribute in removed {
					self.unset(id, attribute);
				}
				for attribute in added {
					self.set(id, attribute);
				}
			}
			Change::Move { key, before } => self.relocate(id, key, *before),
			Change::Replace { index, with } => {
				self.remove(id, *index);
				self.insert(id, slice::from_ref(with), *index);
			}
			Change::Remove { index } => self.remove(id, *index),
			Change::Insert { nodes, before } => self.insert(id, nodes, *before),
		}
	}

	fn set<Msg>(&mut self, id: NodeId, attribute: &Attribute<Msg>) {
		let live = &self.nodes[id].live;
		match attribute {
			Attribute::Attribute { name, value } => {
				if cfg!(feature = "dangerous-logging") {
					trace!(name = name.as_str(), value = value.as_str(), "Setting attribute.");
				}
				self.host.set_attribute(live, name, value);
				if let Some(synced) = synced(name, Some(value)) {
					self.host.set_property(live, name, &synced);
				}
			}
			Attribute::Property { name, value } => self.host.set_property(live, name, value),
			Attribute::Event(listener) => self.bind(id, &listener.name, listener.shape()),
		}
	}

	fn unset<Msg>(&mut self, id: NodeId, attribute: &Attribute<Msg>) {
		let live = &self.nodes[id].live;
		match attribute {
			Attribute::Attribute { name, .. } => {
				self.host.remove_attribute(live, name);
				if let Some(synced) = synced(name, None) {
					self.host.set_property(live, name, &synced);
				}
			}
			Attribute::Property { name, .. } => self.host.set_property(live, name, &Value::Null),
			Attribute::Event(listener) => self.unbind(id, &listener.name),
		}
	}

	/// Keeps exactly one native listener per event name, rebinding it only if its options changed.
	fn bind(&mut self, id: NodeId, name: &str, shape: ListenerShape) {
		let meta = &mut self.nodes[id];
		let options = ListenerOptions::new(shape.prevent_default, shape.stop_propagation);

		if let Some(bound) = meta.listeners.get_mut(name) {
			if bound.shape == shape {
				return;
			}
			if let Some(pending) = meta.debounced.remove(name) {
				self.platform.clear_timeout(pending.timer);
			}
			meta.throttled.remove(name);
			if bound.options == options {
				bound.shape = shape;
				return;
			}
		}

		if let Some(old) = meta.listeners.remove(name) {
			trace!(name, "Rebinding native listener.");
			self.host.remove_listener(&meta.live, name, old.handle);
		}
		let sink = Rc::clone(&self.sink);
		let handle = self
			.host
			.add_listener(&meta.live, name, options, Rc::new(move |event| sink(id, Signal::Native(event))));
		meta.listeners.insert(name.to_owned(), Bound { handle, options, shape });
	}

	fn unbind(&mut self, id: NodeId, name: &str) {
		let meta = &mut self.nodes[id];
		match meta.listeners.remove(name) {
			Some(bound) => self.host.remove_listener(&meta.live, name, bound.handle),
			None => warn!(name, "Unbinding a listener that wasn't bound."),
		}
		if let Some(pending) = meta.debounced.remove(name) {
			self.platform.clear_timeout(pending.timer);
		}
		meta.throttled.remove(name);
	}

	/// The live node that holds `id`'s live children.
	fn container(&self, mut id: NodeId) -> H::Node {
		loop {
			let meta = &self.nodes[id];
			if !meta.is_fragment() {
				return meta.live.clone();
			}
			id = match meta.parent {
				Some(parent) => parent,
				None => malformed!("Fragment without parent."),
			};
		}
	}

	fn last_live(&self, mut id: NodeId) -> H::Node {
		loop {
			let meta = &self.nodes[id];
			match meta.children.last() {
				Some(&last) if meta.is_fragment() => id = last,
				_ => return meta.live.clone(),
			}
		}
	}

	/// `id`'s live node, followed by those of its descendants if it's a fragment.
	fn live_nodes(&self, id: NodeId, out: &mut Vec<H::Node>) {
		let meta = &self.nodes[id];
		out.push(meta.live.clone());
		if meta.is_fragment() {
			for &child in &meta.children {
				self.live_nodes(child, out);
			}
		}
	}

	/// The live node to insert before so that new nodes land at child position `index` of `parent`.
	fn reference(&self, parent: NodeId, index: usize) -> Option<H::Node> {
		let meta = &self.nodes[parent];
		if let Some(&child) = meta.children.get(index) {
			return Some(self.nodes[child].live.clone());
		}
		if meta.is_fragment() {
			self.host.next_sibling(&self.last_live(parent))
		} else {
			None
		}
	}

	fn insert<Msg>(&mut self, parent: NodeId, nodes: &[Node<Msg>], before: usize) {
		let len = self.nodes[parent].children.len();
		if before > len {
			malformed!("Insert before {} past the end ({} children).", before, len);
		}
		let reference = self.reference(parent, before);
		let container = self.container(parent);

		// Batch into a detached fragment so the live parent changes once.
		let fragment = self.host.create_fragment();
		let mut ids = Vec::with_capacity(nodes.len());
		let mut lives = Vec::new();
		for node in nodes {
			let id = self.create(parent, node);
			self.live_nodes(id, &mut lives);
			ids.push(id);
		}
		for live in &lives {
			self.host.insert_before(&fragment, live, None);
		}
		self.host.insert_before(&container, &fragment, reference.as_ref());
		self.nodes[parent].children.splice(before..before, ids);
	}

	fn create<Msg>(&mut self, parent: NodeId, node: &Node<Msg>) -> NodeId {
		match &node.kind {
			Kind::Text(content) => {
				let live = self.host.create_text(content);
				self.allocate(parent, NodeKind::Text, &node.key, live)
			}
			Kind::RawHtml(raw) => {
				let live = self.host.create_element(&raw.namespace, &raw.tag);
				let id = self.allocate(parent, NodeKind::RawHtml, &node.key, live.clone());
				for attribute in &raw.attributes {
					self.set(id, attribute);
				}
				self.host.set_inner_html(&live, &raw.html);
				id
			}
			Kind::Element(element) => {
				let live = self.host.create_element(&element.namespace, &element.tag);
				let id = self.allocate(parent, NodeKind::Element, &node.key, live.clone());
				let mut lives = Vec::new();
				for child in element.children.as_slice() {
					let child = self.create(id, child);
					self.nodes[id].children.push(child);
					self.live_nodes(child, &mut lives);
				}
				for child in &lives {
					self.host.insert_before(&live, child, None);
				}
				// A `select`'s `value` only sticks once its options exist.
				for attribute in &element.attributes {
					self.set(id, attribute);
				}
				id
			}
			Kind::Fragment(children) => {
				let live = self.host.create_marker();
				let id = self.allocate(parent, NodeKind::Fragment, &node.key, live);
				for child in children.as_slice() {
					let child = self.create(id, child);
					self.nodes[id].children.push(child);
				}
				id
			}
		}
	}

	fn remove(&mut self, parent: NodeId, index: usize) {
		let id = self.child_at(parent, index);
		self.nodes[parent].children.remove(index);
		let container = self.container(parent);
		let mut lives = Vec::new();
		self.live_nodes(id, &mut lives);
		for live in &lives {
			self.host.remove_child(&container, live);
		}
		self.destroy(id);
	}

	/// Drops the shadow subtree at `id`, releasing its listeners and timers.
	fn destroy(&mut self, id: NodeId) {
		let mut stack = vec![id];
		while let Some(id) = stack.pop() {
			let meta = match self.nodes.remove(id) {
				Some(meta) => meta,
				None => continue,
			};
			for (name, bound) in meta.listeners {
				self.host.remove_listener(&meta.live, &name, bound.handle);
			}
			for pending in meta.debounced.values() {
				self.platform.clear_timeout(pending.timer);
			}
			stack.extend(meta.children);
		}
	}

	fn relocate(&mut self, parent: NodeId, key: &str, before: usize) {
		let children = &self.nodes[parent].children;
		let position = match children.iter().position(|c| self.nodes[*c].key == key) {
			Some(position) => position,
			None => malformed!("No child keyed {:?} to move.", key),
		};
		if before > children.len() {
			malformed!("Move before {} past the end ({} children).", before, children.len());
		}
		let moved = children[position];
		let anchor = children.get(before).copied();
		if anchor == Some(moved) {
			return;
		}

		let reference = match anchor {
			Some(anchor) => Some(self.nodes[anchor].live.clone()),
			None => self.reference(parent, children.len()),
		};
		let container = self.container(parent);
		let mut lives = Vec::new();
		self.live_nodes(moved, &mut lives);
		for live in &lives {
			self.host.insert_before(&container, live, reference.as_ref());
		}

		let children = &mut self.nodes[parent].children;
		children.remove(position);
		let target = anchor.and_then(|anchor| children.iter().position(|c| *c == anchor)).unwrap_or(children.len());
		children.insert(target, moved);
	}

	/// Runs a [`Signal`] through the listener's throttle and debounce gates.
	///
	/// Returns the event to dispatch, if any.
	/// Throttling is leading-edge on wall-clock time. Debouncing is trailing-edge, and a debounced event is dropped
	/// if throttling already delivered it or a later one.
	#[instrument(skip(self))]
	pub fn receive(&mut self, node: NodeId, signal: Signal) -> Option<Routed> {
		let meta = match self.nodes.get_mut(node) {
			Some(meta) => meta,
			None => {
				trace!("Signal for a removed node.");
				return None;
			}
		};

		let (event, shape) = match signal {
			Signal::Native(event) => {
				let shape = meta.listeners.get(&event.name)?.shape.clone();
				let mut deliver = shape.debounce == 0 && shape.throttle == 0;

				if shape.throttle > 0 {
					let now = self.platform.now();
					let open = meta
						.throttled
						.get(&event.name)
						.map_or(true, |throttled| now - throttled.last >= f64::from(shape.throttle));
					if open {
						meta.throttled.insert(
							event.name.clone(),
							Throttled {
								last: now,
								event_id: event.id,
							},
						);
						deliver = true;
					}
				}

				if shape.debounce > 0 {
					if let Some(pending) = meta.debounced.remove(&event.name) {
						self.platform.clear_timeout(pending.timer);
					}
					let sink = Rc::clone(&self.sink);
					let name = event.name.clone();
					let timer = self
						.platform
						.set_timeout(shape.debounce, Box::new(move || sink(node, Signal::Debounced(name))));
					meta.debounced.insert(
						event.name.clone(),
						Pending {
							timer,
							event: event.clone(),
						},
					);
				}

				if !deliver {
					return None;
				}
				(event, shape)
			}
			Signal::Debounced(name) => {
				let pending = match meta.debounced.remove(&name) {
					Some(pending) => pending,
					None => {
						warn!(name = name.as_str(), "Stale debounce timer fired.");
						return None;
					}
				};
				let shape = meta.listeners.get(&name)?.shape.clone();
				if let Some(throttled) = meta.throttled.get(&name) {
					if throttled.event_id >= pending.event.id {
						trace!(name = name.as_str(), "Debounced event already delivered by throttle.");
						return None;
					}
				}
				(pending.event, shape)
			}
		};

		let path = self.path_of(node)?;
		Some(Routed { path, event, shape })
	}

	/// Unbinds all listeners and cancels all timers. The live tree is left as is.
	#[instrument(skip(self))]
	pub fn teardown(&mut self) {
		let children = std::mem::take(&mut self.nodes[self.root].children);
		for child in children {
			self.destroy(child);
		}
		let root = &mut self.nodes[self.root];
		for (name, bound) in root.listeners.drain() {
			self.host.remove_listener(&root.live, &name, bound.handle);
		}
	}
}

fn synced(name: &str, value: Option<&str>) -> Option<Value> {
	if !SYNCED_NAMES.contains(&name) {
		return None;
	}
	Some(match name {
		"value" => Value::String(value.unwrap_or_default().to_owned()),
		_ => Value::Bool(value.is_some()),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		attribute::{attribute, on, EventListener},
		diff::diff,
		events::Events,
		memory::{MemoryDom, MemoryNode},
		node::{element, fragment, keyed, text},
		platform::ManualPlatform,
	};
	use core::cell::RefCell;
	use serde_json::json;

	struct Fixture {
		dom: MemoryDom,
		platform: Rc<ManualPlatform>,
		root: MemoryNode,
		reconciler: Reconciler<MemoryDom>,
		signals: Rc<RefCell<Vec<(NodeId, Signal)>>>,
		events: Events<u32>,
		tree: Node<u32>,
	}

	impl Fixture {
		fn new() -> Self {
			let dom = MemoryDom::new();
			let platform = Rc::new(ManualPlatform::new());
			let root = dom.create_element("", "main");
			let signals = Rc::new(RefCell::new(Vec::new()));
			let sink_signals = Rc::clone(&signals);
			let sink: Sink = Rc::new(move |node, signal| sink_signals.borrow_mut().push((node, signal)));
			let reconciler = Reconciler::new(dom.clone(), Rc::clone(&platform) as Rc<dyn Platform>, root, sink);
			Self {
				dom,
				platform,
				root,
				reconciler,
				signals,
				events: Events::new(),
				tree: fragment(vec![]),
			}
		}

		fn render(&mut self, tree: Node<u32>) {
			let (patch, events) = diff(std::mem::take(&mut self.events), &self.tree, &tree);
			self.events = events;
			self.reconciler.apply(&patch);
			assert_eq!(self.dom.inner_html(self.root), tree.to_string());
			self.tree = tree;
		}

		fn routed(&mut self) -> Vec<Routed> {
			let signals: Vec<_> = self.signals.borrow_mut().drain(..).collect();
			signals.into_iter().filter_map(|(node, signal)| self.reconciler.receive(node, signal)).collect()
		}
	}

	fn list(keys: &[&str]) -> Node<u32> {
		keyed(
			"ul",
			vec![],
			keys.iter().map(|key| ((*key).to_owned(), element("li", vec![], vec![text(*key)]))).collect(),
		)
	}

	#[test]
	fn converges_through_edits() {
		let mut fixture = Fixture::new();
		fixture.render(fragment(vec![text("a"), element("p", vec![attribute("id", "x")], vec![text("b")])]));
		fixture.render(fragment(vec![
			element("p", vec![attribute("id", "y")], vec![fragment(vec![text("c"), text("d")]), text("b")]),
			text("a"),
		]));
		fixture.render(element("section", vec![], vec![fragment(vec![]), text("e")]));
		fixture.render(fragment(vec![]));
		assert!(fixture.reconciler.is_empty());
	}

	#[test]
	fn keyed_moves_keep_live_nodes() {
		let mut fixture = Fixture::new();
		fixture.render(list(&["a", "b", "c", "d"]));
		let ul = fixture.dom.query(fixture.root, "ul").unwrap();
		let before = fixture.dom.children(ul);

		fixture.render(list(&["d", "b", "a", "c"]));
		let after = fixture.dom.children(ul);
		assert_eq!(after, vec![before[3], before[1], before[0], before[2]]);
	}

	#[test]
	fn fragments_move_with_their_children() {
		let mut fixture = Fixture::new();
		let tree = |order: &[&str]| {
			element::<u32>(
				"div",
				vec![],
				order
					.iter()
					.map(|key| fragment(vec![text(format!("{}1", key)), text(format!("{}2", key))]).with_key(*key))
					.collect(),
			)
		};
		fixture.render(tree(&["a", "b", "c"]));
		fixture.render(tree(&["c", "a", "b"]));
		fixture.render(tree(&["b", "c"]));
		fixture.render(tree(&["b", "x", "c", "a"]));
	}

	#[test]
	fn one_native_listener_per_name() {
		let mut fixture = Fixture::new();
		let button = |listener: EventListener<u32>| element("button", vec![Attribute::Event(listener)], vec![]);
		fixture.render(button(EventListener::new("click", |_| Some(1))));
		let live = fixture.dom.query(fixture.root, "button").unwrap();
		assert_eq!(fixture.dom.listeners(live), vec![("click".to_owned(), ListenerOptions::new(false, false))]);

		fixture.render(button(EventListener::new("click", |_| Some(2)).prevent_default()));
		assert_eq!(fixture.dom.listeners(live), vec![("click".to_owned(), ListenerOptions::new(true, false))]);
		assert!(!fixture.dom.listeners(live)[0].1.passive);

		fixture.render(element("button", vec![], vec![]));
		assert_eq!(fixture.dom.listener_count(), 0);
	}

	#[test]
	fn events_route_to_paths() {
		let mut fixture = Fixture::new();
		fixture.render(fragment(vec![
			text("x"),
			keyed("ul", vec![], vec![("k".to_owned(), element("li", vec![on("click", |_| Some(7))], vec![]))]),
		]));
		let li = fixture.dom.query(fixture.root, "li").unwrap();
		fixture.dom.dispatch(li, "click", json!({}));

		let routed = fixture.routed();
		assert_eq!(routed.len(), 1);
		assert_eq!(routed[0].path, Path::root().child(1, "").child(0, "k"));
		assert_eq!(fixture.events.handle(&routed[0].path, "click", &routed[0].event), Some(7));
	}

	#[test]
	fn throttle_and_debounce() {
		let mut fixture = Fixture::new();
		fixture.render(element(
			"input",
			vec![Attribute::Event(EventListener::new("input", |_| Some(0)).throttle(100).debounce(50))],
			vec![],
		));
		let input = fixture.dom.query(fixture.root, "input").unwrap();

		// A single event is delivered once, by the throttle.
		fixture.dom.dispatch(input, "input", json!({}));
		assert_eq!(fixture.routed().len(), 1);
		fixture.platform.advance(60.0);
		assert!(fixture.routed().is_empty());

		// Within the throttle window only the trailing debounce delivers.
		fixture.dom.dispatch(input, "input", json!({ "n": 1 }));
		fixture.platform.advance(10.0);
		fixture.dom.dispatch(input, "input", json!({ "n": 2 }));
		assert!(fixture.routed().is_empty());
		fixture.platform.advance(50.0);
		let routed = fixture.routed();
		assert_eq!(routed.len(), 1);
		assert_eq!(routed[0].event.data, json!({ "n": 2 }));
	}

	#[test]
	fn removal_cancels_timers() {
		let mut fixture = Fixture::new();
		fixture.render(element(
			"input",
			vec![Attribute::Event(EventListener::new("input", |_| Some(0)).debounce(50))],
			vec![],
		));
		let input = fixture.dom.query(fixture.root, "input").unwrap();
		fixture.dom.dispatch(input, "input", json!({}));
		assert!(fixture.routed().is_empty());
		assert_eq!(fixture.platform.pending_timers(), 1);

		fixture.render(fragment(vec![]));
		assert_eq!(fixture.platform.pending_timers(), 0);
	}

	#[test]
	fn synced_attributes_poke_properties() {
		let mut fixture = Fixture::new();
		fixture.render(element("input", vec![attribute("value", "a"), attribute("checked", "")], vec![]));
		let input = fixture.dom.query(fixture.root, "input").unwrap();
		assert_eq!(fixture.dom.property(input, "value"), Some(json!("a")));
		assert_eq!(fixture.dom.property(input, "checked"), Some(json!(true)));

		fixture.render(element("input", vec![attribute("value", "a")], vec![]));
		assert_eq!(fixture.dom.property(input, "checked"), Some(json!(false)));
	}

	#[test]
	#[should_panic(expected = "vdom-reconcile bug")]
	fn malformed_patches_fail_loudly() {
		let mut fixture = Fixture::new();
		fixture.reconciler.apply(&Patch::<u32>::new(0, 0, vec![Change::Remove { index: 3 }], vec![]));
	}
}
