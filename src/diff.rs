//! Minimal-mutation tree diffing with keyed list reconciliation.
//!
//! Each sibling list is walked with three cursors: one into the old list, one into the new list,
//! and the live position all emitted [`Change`]s are addressed at.
//! Everything before the live position already matches the new list,
//! everything after it is the not yet visited rest of the old list (minus nodes that were moved away).

use crate::{
	attribute::Attribute,
	events::Events,
	node::{Children, Kind, Mapper, Node},
	patch::{Change, Patch},
	path::Path,
};
use core::{cmp::Ordering, slice};
use hashbrown::{HashMap, HashSet};
use std::{borrow::Cow, rc::Rc};
use tracing::{instrument, trace, trace_span};

/// Names whose live value may drift from the VDOM through user input.
const CONTROLLED_NAMES: &[&str] = &["value", "checked", "selected", "scrollLeft", "scrollRight"];

/// Computes the [`Patch`] turning `old`'s live representation into `new`'s, updating `events` along the way.
///
/// A [`Kind::Fragment`] root stands for the mount root's child list, any other root for a single child.
#[instrument(skip_all)]
pub fn diff<Msg: 'static>(mut events: Events<Msg>, old: &Node<Msg>, new: &Node<Msg>) -> (Patch<Msg>, Events<Msg>) {
	events.tick();
	let mapper = match &new.kind {
		Kind::Fragment(_) => new.mapper.clone(),
		_ => None,
	};
	let mut differ = Differ {
		events: &mut events,
		carried: Vec::new(),
	};
	let patch = differ.diff_list(&root_list(old), &root_list(new), &Path::root(), &Path::root(), mapper.as_ref(), 0);
	let carried = differ.carried;
	events.carry_dispatched(carried);
	trace!(changes = patch.change_count(), removed = patch.removed, "Diffed root.");
	(patch, events)
}

struct List<'a, Msg> {
	nodes: &'a [Node<Msg>],
	keyed: Cow<'a, HashMap<String, usize>>,
}

impl<'a, Msg> List<'a, Msg> {
	fn get_keyed(&self, key: &str) -> Option<&'a Node<Msg>> {
		if key.is_empty() {
			return None;
		}
		self.keyed.get(key).map(|&index| &self.nodes[index])
	}
}

fn root_list<Msg>(root: &Node<Msg>) -> List<'_, Msg> {
	match &root.kind {
		Kind::Fragment(children) => list(children.as_slice()),
		_ => list(slice::from_ref(root)),
	}
}

fn list<Msg>(nodes: &[Node<Msg>]) -> List<'_, Msg> {
	List {
		nodes,
		keyed: Cow::Owned(
			nodes
				.iter()
				.enumerate()
				.filter(|(_, node)| !node.key.is_empty())
				.map(|(index, node)| (node.key.clone(), index))
				.collect(),
		),
	}
}

fn children_list<Msg>(children: &Children<Msg>) -> List<'_, Msg> {
	List {
		nodes: children.as_slice(),
		keyed: Cow::Borrowed(children.keyed_index()),
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

struct Differ<'e, Msg> {
	events: &'e mut Events<Msg>,
	/// Old and new paths of kept nodes with dispatched state, applied once the whole tree is diffed.
	carried: Vec<(Path, Path)>,
}

impl<'e, Msg: 'static> Differ<'e, Msg> {
	/// Diffs two sibling lists, returning the patch for their parent at `index`.
	///
	/// The parent's registry address was `old_parent` before this diff and is `path` after it.
	/// Old nodes are deregistered below the former, new ones registered below the latter.
	#[allow(clippy::too_many_lines, clippy::too_many_arguments)]
	fn diff_list(
		&mut self,
		old: &List<'_, Msg>,
		new: &List<'_, Msg>,
		old_parent: &Path,
		path: &Path,
		mapper: Option<&Mapper<Msg>>,
		index: usize,
	) -> Patch<Msg> {
		let span = trace_span!("Diffing children", %path, old = old.nodes.len(), new = new.nodes.len());
		let _enter = span.enter();

		let mut changes = Vec::new();
		let mut children = Vec::new();
		let mut removed = 0;

		let mut old_index = 0;
		let mut new_index = 0;
		let mut live = 0;
		// A moved node, diffed against the new list before the rest of the old list.
		let mut spliced: Option<&Node<Msg>> = None;
		let mut moved = HashSet::<&str>::new();

		loop {
			let prev = spliced.or_else(|| old.nodes.get(old_index));
			let next = new.nodes.get(new_index);

			match (prev, next) {
				(None, None) => break,

				(None, Some(_)) => {
					let rest = &new.nodes[new_index..];
					trace!(count = rest.len(), before = live, "Inserting remaining nodes.");
					self.events.add_children(mapper, path, new_index, rest);
					changes.push(Change::Insert {
						nodes: rest.to_vec(),
						before: live,
					});
					break;
				}

				(Some(_), None) => {
					for (offset, prev) in old.nodes[old_index..].iter().enumerate() {
						if !prev.key.is_empty() && moved.contains(prev.key.as_str()) {
							continue;
						}
						removed += 1;
						self.events.remove_subtree(&old_parent.child(old_index + offset, &prev.key), prev);
					}
					trace!(removed, "Removing remaining nodes.");
					break;
				}

				(Some(prev), Some(next)) if prev.key != next.key => {
					let prev_does_exist = new.get_keyed(&prev.key).is_some();
					let next_did_exist = old.get_keyed(&next.key);

					match (prev_does_exist, next_did_exist) {
						(true, Some(_)) if moved.contains(prev.key.as_str()) => {
							trace!(key = %prev.key, "Skipping moved node.");
							old_index += 1;
						}

						(true, Some(matched)) => {
							trace!(key = %next.key, before = live, "Moving.");
							changes.push(Change::Move {
								key: next.key.clone(),
								before: live,
							});
							moved.insert(&next.key);
							spliced = Some(matched);
						}

						(false, Some(_)) => {
							trace!(key = %prev.key, index = live, "Removing.");
							changes.push(Change::Remove { index: live });
							self.events.remove_subtree(&old_parent.child(old_index, &prev.key), prev);
							old_index += 1;
						}

						(true, None) => {
							trace!(key = %next.key, before = live, "Inserting.");
							self.events.add_subtree(mapper, &path.child(new_index, &next.key), next);
							changes.push(Change::Insert {
								nodes: vec![next.clone()],
								before: live,
							});
							new_index += 1;
							live += 1;
						}

						(false, None) => {
							trace!(index = live, "Replacing.");
							self.events.remove_subtree(&old_parent.child(old_index, &prev.key), prev);
							self.events.add_subtree(mapper, &path.child(new_index, &next.key), next);
							changes.push(Change::Replace {
								index: live,
								with: next.clone(),
							});
							old_index += 1;
							new_index += 1;
							live += 1;
						}
					}
				}

				(Some(prev), Some(next)) => {
					let old_path = old_parent.child(old_index, &prev.key);
					let new_path = path.child(new_index, &next.key);
					match self.diff_node(prev, next, &old_path, &new_path, mapper, live) {
						Pair::Unchanged => (),
						Pair::Patched(patch) => children.push(patch),
						Pair::Replaced => changes.push(Change::Replace {
							index: live,
							with: next.clone(),
						}),
					}

					if spliced.take().is_none() {
						old_index += 1;
					}
					new_index += 1;
					live += 1;
				}
			}
		}

		Patch::new(index, removed, changes, children)
	}

	/// Diffs two nodes with matching keys.
	fn diff_node(&mut self, prev: &Node<Msg>, next: &Node<Msg>, old_path: &Path, path: &Path, mapper: Option<&Mapper<Msg>>, index: usize) -> Pair<Msg> {
		let inner_mapper = compose(mapper, next.mapper.as_ref());
		let inner_mapper = inner_mapper.as_ref();

		if old_path != path {
			// Shifted by removals or insertions before it. Listeners still present are registered anew below.
			self.events.release_listeners(old_path, prev);
			if self.events.has_dispatched(old_path) {
				self.carried.push((old_path.clone(), path.clone()));
			}
		}

		let patch = match (&prev.kind, &next.kind) {
			(Kind::Fragment(old), Kind::Fragment(new)) => self.diff_list(&children_list(old), &children_list(new), old_path, path, inner_mapper, index),

			(Kind::Element(old), Kind::Element(new)) if old.namespace == new.namespace && old.tag == new.tag => {
				let controlled = self.events.is_controlled(old_path, &new.tag);
				let update = self.diff_attributes(&old.attributes, &new.attributes, old_path, path, &new.tag, inner_mapper, controlled);
				let mut patch = self.diff_list(&children_list(&old.children), &children_list(&new.children), old_path, path, inner_mapper, index);
				if let Some(update) = update {
					patch.changes.insert(0, update);
				}
				patch
			}

			(Kind::Text(old), Kind::Text(new)) => {
				if old == new {
					return Pair::Unchanged;
				}
				Patch::new(index, 0, vec![Change::ReplaceText { content: new.clone() }], Vec::new())
			}

			(Kind::RawHtml(old), Kind::RawHtml(new)) if old.namespace == new.namespace && old.tag == new.tag => {
				let mut changes = Vec::new();
				if old.html != new.html {
					changes.push(Change::ReplaceInnerHtml { html: new.html.clone() });
				}
				let controlled = self.events.is_controlled(old_path, &new.tag);
				if let Some(update) = self.diff_attributes(&old.attributes, &new.attributes, old_path, path, &new.tag, inner_mapper, controlled) {
					changes.push(update);
				}
				Patch::new(index, 0, changes, Vec::new())
			}

			_ => {
				trace!(from = ?prev.node_kind(), to = ?next.node_kind(), "Replacing mismatching node.");
				self.events.remove_subtree(old_path, prev);
				self.events.add_subtree(mapper, path, next);
				return Pair::Replaced;
			}
		};

		if patch.is_empty() {
			Pair::Unchanged
		} else {
			Pair::Patched(patch)
		}
	}

	/// Walks two name-sorted attribute lists, returning an [`Change::UpdateAttrs`] if anything changed.
	#[allow(clippy::too_many_arguments)]
	fn diff_attributes(
		&mut self,
		old: &[Attribute<Msg>],
		new: &[Attribute<Msg>],
		old_path: &Path,
		path: &Path,
		tag: &str,
		mapper: Option<&Mapper<Msg>>,
		controlled: bool,
	) -> Option<Change<Msg>> {
		let mut added = Vec::new();
		let mut removed = Vec::new();
		let (mut old, mut new) = (old.iter().peekable(), new.iter().peekable());

		loop {
			let ordering = match (old.peek(), new.peek()) {
				(None, None) => break,
				(Some(_), None) => Ordering::Less,
				(None, Some(_)) => Ordering::Greater,
				(Some(prev), Some(next)) => prev.name().cmp(next.name()),
			};

			match ordering {
				Ordering::Less => {
					let prev = old.next().unwrap_or_else(|| unreachable!());
					self.remove_attribute(prev, old_path, &mut removed);
				}
				Ordering::Greater => {
					let next = new.next().unwrap_or_else(|| unreachable!());
					self.add_attribute(next, path, tag, mapper, &mut added);
				}
				Ordering::Equal => {
					let (prev, next) = (old.next().unwrap_or_else(|| unreachable!()), new.next().unwrap_or_else(|| unreachable!()));
					let forced = controlled && CONTROLLED_NAMES.contains(&next.name());
					match (prev, next) {
						(Attribute::Event(prev_listener), Attribute::Event(next_listener)) => {
							// Handlers are fresh closures each render, so they are always replaced.
							self.events.add_event(mapper, path, tag, &next_listener.name, &next_listener.handler);
							if !prev_listener.same_shape(next_listener) {
								added.push(next.clone());
							}
						}
						(Attribute::Attribute { value: prev_value, .. }, Attribute::Attribute { value: next_value, .. }) => {
							if forced || prev_value != next_value {
								added.push(next.clone());
							}
						}
						(Attribute::Property { value: prev_value, .. }, Attribute::Property { value: next_value, .. }) => {
							if forced || prev_value != next_value {
								added.push(next.clone());
							}
						}
						_ => {
							self.remove_attribute(prev, old_path, &mut removed);
							self.add_attribute(next, path, tag, mapper, &mut added);
						}
					}
				}
			}
		}

		if added.is_empty() && removed.is_empty() {
			None
		} else {
			Some(Change::UpdateAttrs { added, removed })
		}
	}

	fn remove_attribute(&mut self, attribute: &Attribute<Msg>, path: &Path, removed: &mut Vec<Attribute<Msg>>) {
		if let Attribute::Event(listener) = attribute {
			self.events.release_event(path, &listener.name, &listener.handler);
		}
		removed.push(attribute.clone());
	}

	fn add_attribute(&mut self, attribute: &Attribute<Msg>, path: &Path, tag: &str, mapper: Option<&Mapper<Msg>>, added: &mut Vec<Attribute<Msg>>) {
		if let Attribute::Event(listener) = attribute {
			self.events.add_event(mapper, path, tag, &listener.name, &listener.handler);
		}
		added.push(attribute.clone());
	}
}

enum Pair<Msg> {
	Unchanged,
	Patched(Patch<Msg>),
	Replaced,
}
