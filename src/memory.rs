//! An in-process [`Host`] for non-browser targets and tests.
//!
//! [`MemoryDom`] is a cheaply cloneable handle to a shared node arena.
//! It follows DOM semantics where they matter to reconciliation:
//! Inserting a node moves it, inserting a fragment moves its children and events bubble unless stopped.

use crate::{
	event::Event,
	host::{Described, Host, ListenerOptions, NativeListener},
	node::{escape, is_void},
};
use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter, Write as _},
};
use serde_json::{json, Value};
use std::{collections::BTreeMap, rc::Rc};
use tracing::{instrument, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryNode(usize);

#[derive(Debug)]
pub struct MemoryListener(u64);

/// A custom event raised through [`Host::emit`].
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
	pub node: MemoryNode,
	pub name: String,
	pub data: Value,
}

/// Outcome of [`MemoryDom::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dispatched {
	/// Number of listeners that ran.
	pub delivered: usize,
	pub default_prevented: bool,
}

enum Data {
	Element {
		namespace: String,
		tag: String,
		attributes: BTreeMap<String, String>,
		properties: BTreeMap<String, Value>,
		inner_html: Option<String>,
	},
	Text(String),
	Comment,
	Fragment,
}

struct Bound {
	id: u64,
	name: String,
	options: ListenerOptions,
	listener: NativeListener,
}

struct Slot {
	data: Data,
	parent: Option<usize>,
	children: Vec<usize>,
	listeners: Vec<Bound>,
}

#[derive(Default)]
struct Document {
	slots: Vec<Slot>,
	next_listener: u64,
	next_event: u64,
	now: f64,
	emitted: Vec<Emitted>,
}

#[derive(Clone, Default)]
pub struct MemoryDom {
	document: Rc<RefCell<Document>>,
}

impl Debug for MemoryDom {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let document = self.document.borrow();
		f.debug_struct("MemoryDom")
			.field("nodes", &document.slots.len())
			.field("emitted", &document.emitted.len())
			.finish()
	}
}

impl Document {
	fn push(&mut self, data: Data) -> MemoryNode {
		self.slots.push(Slot {
			data,
			parent: None,
			children: Vec::new(),
			listeners: Vec::new(),
		});
		MemoryNode(self.slots.len() - 1)
	}

	fn detach(&mut self, child: usize) {
		if let Some(parent) = self.slots[child].parent.take() {
			self.slots[parent].children.retain(|c| *c != child);
		}
	}

	fn insert(&mut self, parent: usize, child: usize, reference: Option<usize>) {
		self.detach(child);
		let position = match reference {
			None => self.slots[parent].children.len(),
			Some(reference) => self.slots[parent]
				.children
				.iter()
				.position(|c| *c == reference)
				.unwrap_or_else(|| panic!("MemoryDom: {:?} is not a child of {:?}", MemoryNode(reference), MemoryNode(parent))),
		};
		self.slots[parent].children.insert(position, child);
		self.slots[child].parent = Some(parent);
	}

	fn write_html(&self, out: &mut String, node: usize) -> fmt::Result {
		let slot = &self.slots[node];
		match &slot.data {
			Data::Text(text) => escape(out, text, false),
			Data::Comment => Ok(()),
			Data::Fragment => self.write_children(out, node),
			Data::Element {
				namespace,
				tag,
				attributes,
				inner_html,
				..
			} => {
				write!(out, "<{}", tag)?;
				for (name, value) in attributes {
					write!(out, " {}=\"", name)?;
					escape(out, value, true)?;
					out.write_char('"')?;
				}
				if is_void(namespace, tag) {
					return out.write_char('>');
				}
				if let Some(html) = inner_html {
					return write!(out, ">{}</{}>", html, tag);
				}
				if !namespace.is_empty() && slot.children.is_empty() {
					return out.write_str("/>");
				}
				out.write_char('>')?;
				self.write_children(out, node)?;
				write!(out, "</{}>", tag)
			}
		}
	}

	fn write_children(&self, out: &mut String, node: usize) -> fmt::Result {
		self.slots[node].children.iter().try_for_each(|child| self.write_html(out, *child))
	}
}

impl MemoryDom {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the timestamp of subsequently dispatched events.
	pub fn set_time(&self, milliseconds: f64) {
		self.document.borrow_mut().now = milliseconds;
	}

	/// Markup of `node`'s children. Comments (including fragment markers) are omitted,
	/// so this matches the [`Display`](`core::fmt::Display`) rendering of the VDOM that produced it.
	#[must_use]
	pub fn inner_html(&self, node: MemoryNode) -> String {
		let mut html = String::new();
		self.document
			.borrow()
			.write_children(&mut html, node.0)
			.unwrap_or_else(|_| unreachable!("writing to a String can't fail"));
		html
	}

	#[must_use]
	pub fn outer_html(&self, node: MemoryNode) -> String {
		let mut html = String::new();
		self.document
			.borrow()
			.write_html(&mut html, node.0)
			.unwrap_or_else(|_| unreachable!("writing to a String can't fail"));
		html
	}

	#[must_use]
	pub fn children(&self, node: MemoryNode) -> Vec<MemoryNode> {
		self.document.borrow().slots[node.0].children.iter().copied().map(MemoryNode).collect()
	}

	#[must_use]
	pub fn parent(&self, node: MemoryNode) -> Option<MemoryNode> {
		self.document.borrow().slots[node.0].parent.map(MemoryNode)
	}

	#[must_use]
	pub fn tag(&self, node: MemoryNode) -> Option<String> {
		match &self.document.borrow().slots[node.0].data {
			Data::Element { tag, .. } => Some(tag.clone()),
			_ => None,
		}
	}

	#[must_use]
	pub fn attribute(&self, node: MemoryNode, name: &str) -> Option<String> {
		match &self.document.borrow().slots[node.0].data {
			Data::Element { attributes, .. } => attributes.get(name).cloned(),
			_ => None,
		}
	}

	#[must_use]
	pub fn property(&self, node: MemoryNode, name: &str) -> Option<Value> {
		match &self.document.borrow().slots[node.0].data {
			Data::Element { properties, .. } => properties.get(name).cloned(),
			_ => None,
		}
	}

	/// Names of the native listeners bound on `node`, in binding order.
	#[must_use]
	pub fn listeners(&self, node: MemoryNode) -> Vec<(String, ListenerOptions)> {
		self.document.borrow().slots[node.0]
			.listeners
			.iter()
			.map(|bound| (bound.name.clone(), bound.options))
			.collect()
	}

	/// Total number of native listeners bound anywhere.
	#[must_use]
	pub fn listener_count(&self) -> usize {
		self.document.borrow().slots.iter().map(|slot| slot.listeners.len()).sum()
	}

	/// The first element below `root` (depth-first, in document order) with the given tag.
	#[must_use]
	pub fn query(&self, root: MemoryNode, tag: &str) -> Option<MemoryNode> {
		self.query_all(root, tag).into_iter().next()
	}

	#[must_use]
	pub fn query_all(&self, root: MemoryNode, tag: &str) -> Vec<MemoryNode> {
		let document = self.document.borrow();
		let mut found = Vec::new();
		let mut stack: Vec<usize> = document.slots[root.0].children.iter().rev().copied().collect();
		while let Some(node) = stack.pop() {
			if matches!(&document.slots[node].data, Data::Element { tag: t, .. } if t == tag) {
				found.push(MemoryNode(node));
			}
			stack.extend(document.slots[node].children.iter().rev());
		}
		found
	}

	#[must_use]
	pub fn emitted(&self) -> Vec<Emitted> {
		self.document.borrow().emitted.clone()
	}

	/// Fires a native event at `target` that bubbles up through its ancestors.
	#[instrument(skip(self, data))]
	pub fn dispatch(&self, target: MemoryNode, name: &str, data: Value) -> Dispatched {
		let (event, route) = {
			let mut document = self.document.borrow_mut();
			document.next_event += 1;
			let event = Event::new(document.next_event, name, document.now, data);
			let mut route = Vec::new();
			let mut current = Some(target.0);
			while let Some(node) = current {
				let listeners: Vec<_> = document.slots[node]
					.listeners
					.iter()
					.filter(|bound| bound.name == name)
					.map(|bound| (bound.options, Rc::clone(&bound.listener)))
					.collect();
				route.push(listeners);
				current = document.slots[node].parent;
			}
			(event, route)
		};

		let mut dispatched = Dispatched::default();
		for listeners in route {
			let mut stopped = false;
			for (options, listener) in listeners {
				dispatched.delivered += 1;
				dispatched.default_prevented |= options.prevent_default;
				stopped |= options.stop_propagation;
				listener(event.clone());
			}
			if stopped {
				trace!("Propagation stopped.");
				break;
			}
		}
		dispatched
	}
}

impl Host for MemoryDom {
	type Node = MemoryNode;
	type Listener = MemoryListener;

	fn create_element(&self, namespace: &str, tag: &str) -> MemoryNode {
		self.document.borrow_mut().push(Data::Element {
			namespace: namespace.to_owned(),
			tag: tag.to_owned(),
			attributes: BTreeMap::new(),
			properties: BTreeMap::new(),
			inner_html: None,
		})
	}

	fn create_text(&self, content: &str) -> MemoryNode {
		self.document.borrow_mut().push(Data::Text(content.to_owned()))
	}

	fn create_marker(&self) -> MemoryNode {
		self.document.borrow_mut().push(Data::Comment)
	}

	fn create_fragment(&self) -> MemoryNode {
		self.document.borrow_mut().push(Data::Fragment)
	}

	fn insert_before(&self, parent: &MemoryNode, child: &MemoryNode, reference: Option<&MemoryNode>) {
		let mut document = self.document.borrow_mut();
		if let Data::Fragment = document.slots[child.0].data {
			for moved in document.slots[child.0].children.clone() {
				document.insert(parent.0, moved, reference.map(|r| r.0));
			}
		} else {
			document.insert(parent.0, child.0, reference.map(|r| r.0));
		}
	}

	fn remove_child(&self, parent: &MemoryNode, child: &MemoryNode) {
		let mut document = self.document.borrow_mut();
		assert_eq!(
			document.slots[child.0].parent,
			Some(parent.0),
			"MemoryDom: {:?} is not a child of {:?}",
			child,
			parent
		);
		document.detach(child.0);
	}

	fn next_sibling(&self, node: &MemoryNode) -> Option<MemoryNode> {
		let document = self.document.borrow();
		let parent = document.slots[node.0].parent?;
		let siblings = &document.slots[parent].children;
		let position = siblings.iter().position(|c| *c == node.0)?;
		siblings.get(position + 1).copied().map(MemoryNode)
	}

	fn child_nodes(&self, node: &MemoryNode) -> Vec<MemoryNode> {
		self.children(*node)
	}

	fn describe(&self, node: &MemoryNode) -> Described {
		match &self.document.borrow().slots[node.0].data {
			Data::Element {
				namespace,
				tag,
				attributes,
				..
			} => Described::Element {
				namespace: namespace.clone(),
				tag: tag.clone(),
				attributes: attributes.iter().map(|(n, v)| (n.clone(), v.clone())).collect(),
			},
			Data::Text(text) => Described::Text(text.clone()),
			Data::Comment | Data::Fragment => Described::Other,
		}
	}

	fn set_text(&self, node: &MemoryNode, content: &str) {
		let mut document = self.document.borrow_mut();
		if let Data::Text(text) = &mut document.slots[node.0].data {
			*text = content.to_owned();
			return;
		}
		for child in document.slots[node.0].children.clone() {
			document.detach(child);
		}
		let text = document.push(Data::Text(content.to_owned()));
		document.insert(node.0, text.0, None);
	}

	fn set_inner_html(&self, node: &MemoryNode, html: &str) {
		let mut document = self.document.borrow_mut();
		for child in document.slots[node.0].children.clone() {
			document.detach(child);
		}
		if let Data::Element { inner_html, .. } = &mut document.slots[node.0].data {
			*inner_html = Some(html.to_owned());
		}
	}

	fn set_attribute(&self, node: &MemoryNode, name: &str, value: &str) {
		if let Data::Element { attributes, .. } = &mut self.document.borrow_mut().slots[node.0].data {
			attributes.insert(name.to_owned(), value.to_owned());
		}
	}

	fn remove_attribute(&self, node: &MemoryNode, name: &str) {
		if let Data::Element { attributes, .. } = &mut self.document.borrow_mut().slots[node.0].data {
			attributes.remove(name);
		}
	}

	fn set_property(&self, node: &MemoryNode, name: &str, value: &Value) {
		if let Data::Element { properties, .. } = &mut self.document.borrow_mut().slots[node.0].data {
			if value.is_null() {
				properties.remove(name);
			} else {
				properties.insert(name.to_owned(), value.clone());
			}
		}
	}

	fn add_listener(&self, node: &MemoryNode, name: &str, options: ListenerOptions, listener: NativeListener) -> MemoryListener {
		let mut document = self.document.borrow_mut();
		document.next_listener += 1;
		let id = document.next_listener;
		document.slots[node.0].listeners.push(Bound {
			id,
			name: name.to_owned(),
			options,
			listener,
		});
		MemoryListener(id)
	}

	fn remove_listener(&self, node: &MemoryNode, _name: &str, listener: MemoryListener) {
		self.document.borrow_mut().slots[node.0].listeners.retain(|bound| bound.id != listener.0);
	}

	fn emit(&self, node: &MemoryNode, name: &str, data: &Value) {
		self.document.borrow_mut().emitted.push(Emitted {
			node: *node,
			name: name.to_owned(),
			data: data.clone(),
		});
		self.dispatch(*node, name, json!({ "detail": data }));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use core::cell::Cell;

	#[test]
	fn fragments_move_their_children() {
		let dom = MemoryDom::new();
		let root = dom.create_element("", "main");
		let b = dom.create_text("b");
		dom.insert_before(&root, &b, None);

		let fragment = dom.create_fragment();
		let a = dom.create_element("", "p");
		dom.insert_before(&fragment, &a, None);
		dom.insert_before(&fragment, &dom.create_marker(), None);
		dom.insert_before(&root, &fragment, Some(&b));

		assert_eq!(dom.inner_html(root), "<p></p>b");
		assert!(dom.children(fragment).is_empty());
		assert_eq!(dom.next_sibling(&a).map(|n| dom.describe(&n)), Some(Described::Other));

		dom.insert_before(&root, &a, None);
		assert_eq!(dom.inner_html(root), "b<p></p>");
	}

	#[test]
	fn events_bubble_until_stopped() {
		let dom = MemoryDom::new();
		let outer = dom.create_element("", "div");
		let inner = dom.create_element("", "button");
		dom.insert_before(&outer, &inner, None);

		let hits = Rc::new(Cell::new(0));
		for node in &[outer, inner] {
			let hits = Rc::clone(&hits);
			dom.add_listener(node, "click", ListenerOptions::new(false, false), Rc::new(move |_| hits.set(hits.get() + 1)));
		}
		assert_eq!(dom.dispatch(inner, "click", Value::Null).delivered, 2);

		let stopper = dom.add_listener(&inner, "click", ListenerOptions::new(true, true), Rc::new(|_| ()));
		let dispatched = dom.dispatch(inner, "click", Value::Null);
		assert_eq!(dispatched.delivered, 2);
		assert!(dispatched.default_prevented);
		assert_eq!(hits.get(), 3);

		dom.remove_listener(&inner, "click", stopper);
		assert_eq!(dom.listener_count(), 2);
	}

	#[test]
	fn descriptions_carry_markup_only() {
		let dom = MemoryDom::new();
		let input = dom.create_element("", "input");
		dom.set_attribute(&input, "value", "initial");
		dom.set_property(&input, "value", &Value::from("typed"));
		assert_eq!(
			dom.describe(&input),
			Described::Element {
				namespace: String::new(),
				tag: "input".to_owned(),
				attributes: vec![("value".to_owned(), "initial".to_owned())],
			}
		);
		assert_eq!(dom.property(input, "value"), Some(Value::from("typed")));
	}
}
