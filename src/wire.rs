//! JSON wire format for [`Patch`]es, for diffs computed in one place and applied in another.
//!
//! Handlers don't cross the wire: listeners are sent as their shape only, and the receiving side reports fired
//! listeners back as [`ClientMessage`]s, addressed by [`Path`], for [`Events::handle`](`crate::events::Events::handle`).

use crate::{
	attribute::{Attribute, EventListener},
	event::Event,
	node::{is_void, Children, Element, Kind, Node, RawHtml},
	patch::{Change, Patch},
	path::Path,
	reconcile::Routed,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &usize) -> bool {
	*value == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero_u32(value: &u32) -> bool {
	*value == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
	!*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePatch {
	pub index: usize,
	#[serde(default, skip_serializing_if = "is_zero")]
	pub removed: usize,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub changes: Vec<WireChange>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub children: Vec<WirePatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WireChange {
	ReplaceText {
		content: String,
	},
	ReplaceInnerHtml {
		html: String,
	},
	Update {
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		added: Vec<WireAttribute>,
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		removed: Vec<WireAttribute>,
	},
	Move {
		key: String,
		before: usize,
	},
	Replace {
		index: usize,
		with: WireNode,
	},
	Remove {
		index: usize,
	},
	Insert {
		nodes: Vec<WireNode>,
		before: usize,
	},
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WireNode {
	Fragment {
		#[serde(default, skip_serializing_if = "String::is_empty")]
		key: String,
		#[serde(default)]
		children: Vec<WireNode>,
	},
	Element {
		#[serde(default, skip_serializing_if = "String::is_empty")]
		key: String,
		#[serde(default, skip_serializing_if = "String::is_empty")]
		namespace: String,
		tag: String,
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		attributes: Vec<WireAttribute>,
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		children: Vec<WireNode>,
	},
	Text {
		#[serde(default, skip_serializing_if = "String::is_empty")]
		key: String,
		content: String,
	},
	RawHtml {
		#[serde(default, skip_serializing_if = "String::is_empty")]
		key: String,
		#[serde(default, skip_serializing_if = "String::is_empty")]
		namespace: String,
		tag: String,
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		attributes: Vec<WireAttribute>,
		html: String,
	},
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WireAttribute {
	Attribute {
		name: String,
		value: String,
	},
	Property {
		name: String,
		value: Value,
	},
	Event {
		name: String,
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		include: Vec<String>,
		#[serde(default, skip_serializing_if = "is_false")]
		prevent_default: bool,
		#[serde(default, skip_serializing_if = "is_false")]
		stop_propagation: bool,
		#[serde(default, skip_serializing_if = "is_false")]
		immediate: bool,
		#[serde(default, skip_serializing_if = "is_zero_u32")]
		debounce: u32,
		#[serde(default, skip_serializing_if = "is_zero_u32")]
		throttle: u32,
	},
}

/// A fired listener, reported by the applying side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
	pub path: Path,
	pub name: String,
	/// The event payload, [projected](`Event::project`) onto the listener's `include` paths.
	pub data: Value,
}

impl ClientMessage {
	#[must_use]
	pub fn from_routed(routed: &Routed) -> Self {
		Self {
			path: routed.path.clone(),
			name: routed.event.name.clone(),
			data: routed.event.project(&routed.shape.include),
		}
	}

	/// Rebuilds an [`Event`] to pass to [`Events::handle`](`crate::events::Events::handle`) together with [`Self::path`].
	#[must_use]
	pub fn to_event(&self, id: u64, timestamp: f64) -> Event {
		Event::new(id, self.name.clone(), timestamp, self.data.clone())
	}
}

pub fn encode<Msg>(patch: &Patch<Msg>) -> Result<String, serde_json::Error> {
	serde_json::to_string(&WirePatch::from(patch))
}

/// Decodes a patch whose listeners produce no messages, as only their shape matters when applying it.
pub fn decode<Msg>(json: &str) -> Result<Patch<Msg>, serde_json::Error> {
	serde_json::from_str::<WirePatch>(json).map(WirePatch::into_patch)
}

impl<Msg> From<&Patch<Msg>> for WirePatch {
	fn from(patch: &Patch<Msg>) -> Self {
		Self {
			index: patch.index,
			removed: patch.removed,
			changes: patch.changes.iter().map(WireChange::from).collect(),
			children: patch.children.iter().map(Self::from).collect(),
		}
	}
}

impl<Msg> From<&Change<Msg>> for WireChange {
	fn from(change: &Change<Msg>) -> Self {
		match change {
			Change::ReplaceText { content } => Self::ReplaceText { content: content.clone() },
			Change::ReplaceInnerHtml { html } => Self::ReplaceInnerHtml { html: html.clone() },
			Change::UpdateAttrs { added, removed } => Self::Update {
				added: added.iter().map(WireAttribute::from).collect(),
				removed: removed.iter().map(WireAttribute::from).collect(),
			},
			Change::Move { key, before } => Self::Move {
				key: key.clone(),
				before: *before,
			},
			Change::Replace { index, with } => Self::Replace {
				index: *index,
				with: with.into(),
			},
			Change::Remove { index } => Self::Remove { index: *index },
			Change::Insert { nodes, before } => Self::Insert {
				nodes: nodes.iter().map(WireNode::from).collect(),
				before: *before,
			},
		}
	}
}

impl<Msg> From<&Node<Msg>> for WireNode {
	fn from(node: &Node<Msg>) -> Self {
		let key = node.key.clone();
		match &node.kind {
			Kind::Fragment(children) => Self::Fragment {
				key,
				children: children.as_slice().iter().map(Self::from).collect(),
			},
			Kind::Element(element) => Self::Element {
				key,
				namespace: element.namespace.clone(),
				tag: element.tag.clone(),
				attributes: element.attributes.iter().map(WireAttribute::from).collect(),
				children: element.children.as_slice().iter().map(Self::from).collect(),
			},
			Kind::Text(content) => Self::Text {
				key,
				content: content.clone(),
			},
			Kind::RawHtml(raw) => Self::RawHtml {
				key,
				namespace: raw.namespace.clone(),
				tag: raw.tag.clone(),
				attributes: raw.attributes.iter().map(WireAttribute::from).collect(),
				html: raw.html.clone(),
			},
		}
	}
}

impl<Msg> From<&Attribute<Msg>> for WireAttribute {
	fn from(attribute: &Attribute<Msg>) -> Self {
		match attribute {
			Attribute::Attribute { name, value } => Self::Attribute {
				name: name.clone(),
				value: value.clone(),
			},
			Attribute::Property { name, value } => Self::Property {
				name: name.clone(),
				value: value.clone(),
			},
			Attribute::Event(listener) => Self::Event {
				name: listener.name.clone(),
				include: listener.include.clone(),
				prevent_default: listener.prevent_default,
				stop_propagation: listener.stop_propagation,
				immediate: listener.immediate,
				debounce: listener.debounce,
				throttle: listener.throttle,
			},
		}
	}
}

impl WirePatch {
	#[must_use]
	pub fn into_patch<Msg>(self) -> Patch<Msg> {
		Patch::new(
			self.index,
			self.removed,
			self.changes.into_iter().map(WireChange::into_change).collect(),
			self.children.into_iter().map(Self::into_patch).collect(),
		)
	}
}

impl WireChange {
	#[must_use]
	pub fn into_change<Msg>(self) -> Change<Msg> {
		match self {
			Self::ReplaceText { content } => Change::ReplaceText { content },
			Self::ReplaceInnerHtml { html } => Change::ReplaceInnerHtml { html },
			Self::Update { added, removed } => Change::UpdateAttrs {
				added: added.into_iter().map(WireAttribute::into_attribute).collect(),
				removed: removed.into_iter().map(WireAttribute::into_attribute).collect(),
			},
			Self::Move { key, before } => Change::Move { key, before },
			Self::Replace { index, with } => Change::Replace {
				index,
				with: with.into_node(),
			},
			Self::Remove { index } => Change::Remove { index },
			Self::Insert { nodes, before } => Change::Insert {
				nodes: nodes.into_iter().map(WireNode::into_node).collect(),
				before,
			},
		}
	}
}

impl WireNode {
	/// Attributes arrive in canonical order already and aren't normalized again.
	#[must_use]
	pub fn into_node<Msg>(self) -> Node<Msg> {
		let (key, kind) = match self {
			Self::Fragment { key, children } => (key, Kind::Fragment(Children::new(children.into_iter().map(Self::into_node).collect()))),
			Self::Element {
				key,
				namespace,
				tag,
				attributes,
				children,
			} => (
				key,
				Kind::Element(Element {
					void: is_void(&namespace, &tag),
					self_closing: !namespace.is_empty(),
					namespace,
					tag,
					attributes: attributes.into_iter().map(WireAttribute::into_attribute).collect(),
					children: Children::new(children.into_iter().map(Self::into_node).collect()),
				}),
			),
			Self::Text { key, content } => (key, Kind::Text(content)),
			Self::RawHtml {
				key,
				namespace,
				tag,
				attributes,
				html,
			} => (
				key,
				Kind::RawHtml(RawHtml {
					namespace,
					tag,
					attributes: attributes.into_iter().map(WireAttribute::into_attribute).collect(),
					html,
				}),
			),
		};
		Node { key, mapper: None, kind }
	}
}

impl WireAttribute {
	#[must_use]
	pub fn into_attribute<Msg>(self) -> Attribute<Msg> {
		match self {
			Self::Attribute { name, value } => Attribute::Attribute { name, value },
			Self::Property { name, value } => Attribute::Property { name, value },
			Self::Event {
				name,
				include,
				prevent_default,
				stop_propagation,
				immediate,
				debounce,
				throttle,
			} => Attribute::Event(EventListener {
				include,
				prevent_default,
				stop_propagation,
				immediate,
				debounce,
				throttle,
				..EventListener::new(name, |_| None)
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		attribute::class,
		diff::diff,
		events::Events,
		node::{element, fragment},
	};
	use serde_json::json;

	#[test]
	fn wire_shape() {
		let listener = EventListener::new("input", |_| Some(())).include(vec!["target.value"]).debounce(200);
		let view = element("input", vec![class("field"), Attribute::Event(listener)], vec![]);
		let (patch, _) = diff(Events::new(), &fragment(vec![]), &view);

		let encoded: Value = serde_json::from_str(&encode(&patch).unwrap()).unwrap();
		assert_eq!(
			encoded,
			json!({
				"index": 0,
				"changes": [{
					"kind": "insert",
					"before": 0,
					"nodes": [{
						"kind": "element",
						"tag": "input",
						"attributes": [
							{ "kind": "attribute", "name": "class", "value": "field" },
							{ "kind": "event", "name": "input", "include": ["target.value"], "debounce": 200 },
						],
					}],
				}],
			})
		);
	}

	#[test]
	fn decoded_listeners_keep_their_shape() {
		let json = r#"{"index":0,"changes":[{"kind":"update","added":[{"kind":"event","name":"click","prevent_default":true}]}]}"#;
		let patch = decode::<()>(json).unwrap();
		match patch.changes.as_slice() {
			[Change::UpdateAttrs { added, removed }] => {
				assert!(removed.is_empty());
				match added.as_slice() {
					[Attribute::Event(listener)] => {
						assert_eq!(listener.name, "click");
						assert!(listener.prevent_default);
						assert!(!listener.stop_propagation);
					}
					other => panic!("unexpected {:?}", other),
				}
			}
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn client_messages_carry_projected_payloads() {
		let routed = Routed {
			path: Path::root().child(0, "").child(2, "row"),
			event: Event::new(1, "input", 0.0, json!({ "target": { "value": "x", "checked": false }, "key": "Enter" })),
			shape: EventListener::<()>::new("input", |_| None).include(vec!["target.value"]).shape(),
		};
		let message = ClientMessage::from_routed(&routed);
		assert_eq!(
			serde_json::to_value(&message).unwrap(),
			json!({ "path": [0, "row"], "name": "input", "data": { "target": { "value": "x" } } })
		);
		assert_eq!(
			serde_json::from_value::<ClientMessage>(json!({ "path": [0, "row"], "name": "input", "data": null }))
				.unwrap()
				.path,
			routed.path
		);
	}
}
