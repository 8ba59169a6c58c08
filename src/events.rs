//! Path-addressed event delegation.

use crate::{
	attribute::{Attribute, Handler},
	event::Event,
	node::{Kind, Mapper, Node},
	path::Path,
};
use core::fmt::{self, Debug, Formatter};
use hashbrown::{HashMap, HashSet};
use std::rc::Rc;
use tracing::trace;

struct Entry<Msg> {
	handler: Handler<Msg>,
	mapper: Option<Mapper<Msg>>,
	/// Tag of the owning element, for controlled field inference.
	tag: String,
}

/// Flat `(path, event name) → handler` registry for one mounted tree.
///
/// Messages produced by a handler are passed through the [`Mapper`]s of all ancestors at registration time,
/// so one map serves arbitrarily nested components.
pub struct Events<Msg> {
	handlers: HashMap<(Path, String), Entry<Msg>>,
	/// Paths whose listeners fired before the current render.
	dispatched_paths: HashSet<Path>,
	/// Paths whose listeners fired since the last [`tick`](`Events::tick`).
	next_dispatched_paths: HashSet<Path>,
}

impl<Msg> Default for Events<Msg> {
	fn default() -> Self {
		Self::new()
	}
}

impl<Msg> Debug for Events<Msg> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Events")
			.field("handlers", &self.handlers.keys().collect::<Vec<_>>())
			.field("dispatched_paths", &self.dispatched_paths)
			.field("next_dispatched_paths", &self.next_dispatched_paths)
			.finish()
	}
}

fn compose<Msg: 'static>(outer: Option<&Mapper<Msg>>, inner: Option<&Mapper<Msg>>) -> Option<Mapper<Msg>> {
	match (outer, inner) {
		(None, None) => None,
		(Some(only), None) | (None, Some(only)) => Some(Rc::clone(only)),
		(Some(outer), Some(inner)) => {
			let (outer, inner) = (Rc::clone(outer), Rc::clone(inner));
			Some(Rc::new(move |msg| outer(inner(msg))))
		}
	}
}

fn same_handler<Msg>(a: &Handler<Msg>, b: &Handler<Msg>) -> bool {
	Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
}

fn is_form_field(tag: &str) -> bool {
	tag.eq_ignore_ascii_case("input") || tag.eq_ignore_ascii_case("select") || tag.eq_ignore_ascii_case("textarea")
}

impl<Msg> Events<Msg> {
	#[must_use]
	pub fn new() -> Self {
		Self {
			handlers: HashMap::new(),
			dispatched_paths: HashSet::new(),
			next_dispatched_paths: HashSet::new(),
		}
	}

	/// Starts a new diff: paths dispatched since the last tick now count as controlled.
	pub fn tick(&mut self) {
		self.dispatched_paths.extend(self.next_dispatched_paths.drain());
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.handlers.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.handlers.is_empty()
	}

	#[must_use]
	pub fn contains(&self, path: &Path, name: &str) -> bool {
		self.handlers.contains_key(&(path.clone(), name.to_owned()))
	}

	pub fn add_event(&mut self, mapper: Option<&Mapper<Msg>>, path: &Path, tag: &str, name: &str, handler: &Handler<Msg>) {
		trace!(%path, name, "Registering handler.");
		self.handlers.insert(
			(path.clone(), name.to_owned()),
			Entry {
				handler: Rc::clone(handler),
				mapper: mapper.cloned(),
				tag: tag.to_owned(),
			},
		);
	}

	pub fn remove_event(&mut self, path: &Path, name: &str) {
		trace!(%path, name, "Deregistering handler.");
		self.handlers.remove(&(path.clone(), name.to_owned()));
	}

	/// Deregisters `(path, name)` only while it still holds `handler`.
	///
	/// During a diff, another node may already have registered at a path a shifted or removed node leaves behind.
	pub(crate) fn release_event(&mut self, path: &Path, name: &str, handler: &Handler<Msg>) {
		let key = (path.clone(), name.to_owned());
		if self.handlers.get(&key).map_or(false, |entry| same_handler(&entry.handler, handler)) {
			trace!(%path, name, "Deregistering handler.");
			self.handlers.remove(&key);
		}
	}

	/// Deregisters the listeners of `node` itself, leaving its descendants alone.
	pub(crate) fn release_listeners(&mut self, path: &Path, node: &Node<Msg>) {
		for attribute in node.attributes() {
			if let Attribute::Event(listener) = attribute {
				self.release_event(path, &listener.name, &listener.handler);
			}
		}
	}

	pub(crate) fn has_dispatched(&self, path: &Path) -> bool {
		self.dispatched_paths.contains(path) || self.next_dispatched_paths.contains(path)
	}

	/// Moves dispatched state of kept nodes whose paths changed. All old paths are cleared before any new one is set,
	/// as a node's new path may be another's old one.
	pub(crate) fn carry_dispatched(&mut self, moves: Vec<(Path, Path)>) {
		for (old, _) in &moves {
			self.dispatched_paths.remove(old);
			self.next_dispatched_paths.remove(old);
		}
		for (old, new) in moves {
			trace!(from = %old, to = %new, "Carrying controlled state.");
			self.dispatched_paths.insert(new);
		}
	}

	/// Whether the form field at `path` has dispatched any event, so its live value may have drifted from the VDOM.
	#[must_use]
	pub fn is_controlled(&self, path: &Path, tag: &str) -> bool {
		is_form_field(tag) && self.has_dispatched(path)
	}

	/// Resolves a fired listener to a message.
	///
	/// Returns [`None`] for handlers that reject the event and for missing entries,
	/// which happen when events race a render that removed their listener.
	pub fn handle(&mut self, path: &Path, name: &str, event: &Event) -> Option<Msg> {
		let entry = match self.handlers.get(&(path.clone(), name.to_owned())) {
			Some(entry) => entry,
			None => {
				trace!(%path, name, "No handler registered. Ignoring stale event.");
				return None;
			}
		};
		if is_form_field(&entry.tag) {
			self.next_dispatched_paths.insert(path.clone());
		}
		let msg = (entry.handler)(event)?;
		Some(match &entry.mapper {
			Some(mapper) => mapper(msg),
			None => msg,
		})
	}
}

impl<Msg: 'static> Events<Msg> {
	/// Registers all listeners of `node` (addressed by `path`) and its descendants.
	pub fn add_subtree(&mut self, mapper: Option<&Mapper<Msg>>, path: &Path, node: &Node<Msg>) {
		let mapper = compose(mapper, node.mapper.as_ref());
		let tag = match &node.kind {
			Kind::Element(element) => element.tag.as_str(),
			Kind::RawHtml(raw) => raw.tag.as_str(),
			Kind::Fragment(_) | Kind::Text(_) => "",
		};
		for attribute in node.attributes() {
			if let Attribute::Event(listener) = attribute {
				self.add_event(mapper.as_ref(), path, tag, &listener.name, &listener.handler);
			}
		}
		if let Some(children) = node.children() {
			self.add_children(mapper.as_ref(), path, 0, children.as_slice());
		}
	}

	/// Registers `children`, the first of which sits at `first_index` below `parent`.
	pub fn add_children(&mut self, mapper: Option<&Mapper<Msg>>, parent: &Path, first_index: usize, children: &[Node<Msg>]) {
		for (offset, child) in children.iter().enumerate() {
			self.add_subtree(mapper, &parent.child(first_index + offset, &child.key), child);
		}
	}

	/// Deregisters all listeners of `node` and its descendants, and forgets their controlled state.
	///
	/// Entries that were meanwhile registered for other nodes at the same paths are kept.
	pub fn remove_subtree(&mut self, path: &Path, node: &Node<Msg>) {
		self.release_listeners(path, node);
		self.dispatched_paths.remove(path);
		self.next_dispatched_paths.remove(path);
		if let Some(children) = node.children() {
			for (index, child) in children.as_slice().iter().enumerate() {
				self.remove_subtree(&path.child(index, &child.key), child);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		attribute::on,
		node::{element, fragment, text},
	};
	use serde_json::json;

	fn input_event(value: &str) -> Event {
		Event::new(1, "input", 0.0, json!({ "target": { "value": value } }))
	}

	#[test]
	fn mappers_compose_along_the_path() {
		let tree = element(
			"div",
			vec![],
			vec![fragment(vec![element(
				"input",
				vec![on("input", |event: &Event| event.get("target.value").and_then(|v| v.as_str()).map(str::to_owned))],
				vec![],
			)])
			.with_mapper(|msg: String| format!("inner({})", msg))],
		)
		.with_mapper(|msg| format!("outer({})", msg));

		let mut events = Events::new();
		let root = Path::root().child(0, "");
		events.add_subtree(None, &root, &tree);
		let input = root.child(0, "").child(0, "");
		assert_eq!(events.len(), 1);
		assert_eq!(events.handle(&input, "input", &input_event("x")), Some("outer(inner(x))".to_owned()));
	}

	#[test]
	fn misses_are_ignored() {
		let mut events = Events::<()>::new();
		assert_eq!(events.handle(&Path::root(), "click", &input_event("")), None);
	}

	#[test]
	fn form_fields_become_controlled() {
		let field = element::<()>("textarea", vec![on("input", |_| Some(()))], vec![text("x")]);
		let other = element::<()>("div", vec![on("input", |_| Some(()))], vec![]);
		let mut events = Events::new();
		let (field_path, other_path) = (Path::root().child(0, ""), Path::root().child(1, ""));
		events.add_subtree(None, &field_path, &field);
		events.add_subtree(None, &other_path, &other);

		assert!(!events.is_controlled(&field_path, "textarea"));
		events.handle(&field_path, "input", &input_event("a"));
		events.handle(&other_path, "input", &input_event("a"));
		events.tick();
		assert!(events.is_controlled(&field_path, "textarea"));
		assert!(!events.is_controlled(&other_path, "div"));

		events.tick();
		assert!(events.is_controlled(&field_path, "textarea"), "Controlled state must persist across renders.");

		events.remove_subtree(&field_path, &field);
		assert!(!events.is_controlled(&field_path, "textarea"));
		assert!(!events.contains(&field_path, "input"));
	}
}
