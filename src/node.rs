//! Immutable descriptions of one render's UI tree.

use crate::attribute::{normalize, Attribute};
use core::fmt::{self, Debug, Display, Formatter, Write as _};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::warn;

pub const HTML_NAMESPACE: &str = "";
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
pub const MATHML_NAMESPACE: &str = "http://www.w3.org/1998/Math/MathML";

/// Transforms messages produced below a node before they reach the application.
pub type Mapper<Msg> = Rc<dyn Fn(Msg) -> Msg>;

pub struct Node<Msg> {
	/// Identity among siblings. Empty for positional children.
	pub key: String,
	pub mapper: Option<Mapper<Msg>>,
	pub kind: Kind<Msg>,
}

pub enum Kind<Msg> {
	/// Children spliced into the parent, without an element of their own.
	Fragment(Children<Msg>),
	Element(Element<Msg>),
	Text(String),
	/// An element whose content is raw markup instead of child nodes.
	RawHtml(RawHtml<Msg>),
}

/// An ordered child list with an index of its keyed members.
pub struct Children<Msg> {
	nodes: Vec<Node<Msg>>,
	keyed: HashMap<String, usize>,
}

pub struct Element<Msg> {
	pub namespace: String,
	pub tag: String,
	/// Always [normalized](`normalize`).
	pub attributes: Vec<Attribute<Msg>>,
	pub children: Children<Msg>,
	/// Serialized as `<tag/>` when empty (foreign content).
	pub self_closing: bool,
	/// HTML void element, never has children.
	pub void: bool,
}

pub struct RawHtml<Msg> {
	pub namespace: String,
	pub tag: String,
	pub attributes: Vec<Attribute<Msg>>,
	pub html: String,
}

/// Discriminant of [`Kind`], shared with the reconciler's shadow tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
	Fragment,
	Element,
	Text,
	RawHtml,
}

const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

pub(crate) fn is_void(namespace: &str, tag: &str) -> bool {
	namespace.is_empty() && VOID_ELEMENTS.contains(&tag)
}

impl<Msg> Children<Msg> {
	#[must_use]
	pub fn new(nodes: Vec<Node<Msg>>) -> Self {
		let mut keyed = HashMap::new();
		for (index, node) in nodes.iter().enumerate() {
			if node.key.is_empty() {
				continue;
			}
			if keyed.insert(node.key.clone(), index).is_some() && cfg!(debug_assertions) {
				warn!("Duplicate sibling key {:?}. Reconciliation of this list is unspecified.", node.key);
			}
		}
		Self { nodes, keyed }
	}

	#[must_use]
	pub fn as_slice(&self) -> &[Node<Msg>] {
		&self.nodes
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	#[must_use]
	pub fn get_keyed(&self, key: &str) -> Option<&Node<Msg>> {
		self.keyed.get(key).map(|&index| &self.nodes[index])
	}

	/// Positions of all keyed children.
	#[must_use]
	pub fn keyed_index(&self) -> &HashMap<String, usize> {
		&self.keyed
	}

	#[must_use]
	pub fn contains_key(&self, key: &str) -> bool {
		self.keyed.contains_key(key)
	}

	#[must_use]
	pub fn into_vec(self) -> Vec<Node<Msg>> {
		self.nodes
	}
}

impl<Msg> Default for Children<Msg> {
	fn default() -> Self {
		Self::new(Vec::new())
	}
}

impl<Msg> Clone for Children<Msg> {
	fn clone(&self) -> Self {
		Self {
			nodes: self.nodes.clone(),
			keyed: self.keyed.clone(),
		}
	}
}

impl<Msg> Clone for Node<Msg> {
	fn clone(&self) -> Self {
		Self {
			key: self.key.clone(),
			mapper: self.mapper.clone(),
			kind: match &self.kind {
				Kind::Fragment(children) => Kind::Fragment(children.clone()),
				Kind::Element(element) => Kind::Element(Element {
					namespace: element.namespace.clone(),
					tag: element.tag.clone(),
					attributes: element.attributes.clone(),
					children: element.children.clone(),
					self_closing: element.self_closing,
					void: element.void,
				}),
				Kind::Text(text) => Kind::Text(text.clone()),
				Kind::RawHtml(raw) => Kind::RawHtml(RawHtml {
					namespace: raw.namespace.clone(),
					tag: raw.tag.clone(),
					attributes: raw.attributes.clone(),
					html: raw.html.clone(),
				}),
			},
		}
	}
}

impl<Msg> Node<Msg> {
	#[must_use]
	pub fn node_kind(&self) -> NodeKind {
		match self.kind {
			Kind::Fragment(_) => NodeKind::Fragment,
			Kind::Element(_) => NodeKind::Element,
			Kind::Text(_) => NodeKind::Text,
			Kind::RawHtml(_) => NodeKind::RawHtml,
		}
	}

	#[must_use]
	pub fn with_key(mut self, key: impl Into<String>) -> Self {
		self.key = key.into();
		self
	}

	/// Composes `mapper` after any mapper already set on this node.
	#[must_use]
	pub fn with_mapper(mut self, mapper: impl 'static + Fn(Msg) -> Msg) -> Self
	where
		Msg: 'static,
	{
		self.mapper = Some(match self.mapper.take() {
			None => Rc::new(mapper),
			Some(inner) => Rc::new(move |msg| mapper(inner(msg))),
		});
		self
	}

	/// Children for the kinds that have them.
	#[must_use]
	pub fn children(&self) -> Option<&Children<Msg>> {
		match &self.kind {
			Kind::Fragment(children) => Some(children),
			Kind::Element(element) => Some(&element.children),
			Kind::Text(_) | Kind::RawHtml(_) => None,
		}
	}

	#[must_use]
	pub fn attributes(&self) -> &[Attribute<Msg>] {
		match &self.kind {
			Kind::Element(element) => &element.attributes,
			Kind::RawHtml(raw) => &raw.attributes,
			Kind::Fragment(_) | Kind::Text(_) => &[],
		}
	}

	/// Converts the message type of this whole subtree.
	pub fn map<Out: 'static>(self, mapper: impl 'static + Fn(Msg) -> Out) -> Node<Out>
	where
		Msg: 'static,
	{
		let inner = self.mapper;
		let mapper: Rc<dyn Fn(Msg) -> Out> = match inner {
			None => Rc::new(mapper),
			Some(inner) => Rc::new(move |msg| mapper(inner(msg))),
		};
		self.kind.map_with(&mapper).with_key_into(self.key)
	}
}

impl<Msg: 'static> Kind<Msg> {
	fn map_with<Out: 'static>(self, mapper: &Rc<dyn Fn(Msg) -> Out>) -> Node<Out> {
		let map_attributes = |attributes: Vec<Attribute<Msg>>| -> Vec<Attribute<Out>> {
			attributes
				.into_iter()
				.map(|attribute| {
					let mapper = Rc::clone(mapper);
					attribute.map(move |msg| mapper(msg))
				})
				.collect()
		};
		let map_children = |children: Children<Msg>| -> Vec<Node<Out>> {
			children
				.into_vec()
				.into_iter()
				.map(|child| {
					let mapper = Rc::clone(mapper);
					child.map(move |msg| mapper(msg))
				})
				.collect()
		};

		let kind = match self {
			Self::Fragment(children) => Kind::Fragment(Children::new(map_children(children))),
			Self::Element(element) => Kind::Element(Element {
				namespace: element.namespace,
				tag: element.tag,
				attributes: map_attributes(element.attributes),
				children: Children::new(map_children(element.children)),
				self_closing: element.self_closing,
				void: element.void,
			}),
			Self::Text(text) => Kind::Text(text),
			Self::RawHtml(raw) => Kind::RawHtml(RawHtml {
				namespace: raw.namespace,
				tag: raw.tag,
				attributes: map_attributes(raw.attributes),
				html: raw.html,
			}),
		};
		Node {
			key: String::new(),
			mapper: None,
			kind,
		}
	}
}

impl<Msg> Node<Msg> {
	fn with_key_into(mut self, key: String) -> Self {
		self.key = key;
		self
	}
}

pub fn text<Msg>(content: impl Into<String>) -> Node<Msg> {
	Node {
		key: String::new(),
		mapper: None,
		kind: Kind::Text(content.into()),
	}
}

pub fn fragment<Msg>(children: Vec<Node<Msg>>) -> Node<Msg> {
	Node {
		key: String::new(),
		mapper: None,
		kind: Kind::Fragment(Children::new(children)),
	}
}

pub fn element<Msg>(tag: impl Into<String>, attributes: Vec<Attribute<Msg>>, children: Vec<Node<Msg>>) -> Node<Msg> {
	namespaced(HTML_NAMESPACE, tag, attributes, children)
}

pub fn namespaced<Msg>(
	namespace: impl Into<String>,
	tag: impl Into<String>,
	attributes: Vec<Attribute<Msg>>,
	children: Vec<Node<Msg>>,
) -> Node<Msg> {
	let namespace = namespace.into();
	let tag = tag.into();
	let void = is_void(&namespace, &tag);
	let self_closing = !namespace.is_empty();
	Node {
		key: String::new(),
		mapper: None,
		kind: Kind::Element(Element {
			namespace,
			tag,
			attributes: normalize(attributes),
			children: Children::new(if void { Vec::new() } else { children }),
			self_closing,
			void,
		}),
	}
}

/// An element whose children are keyed by the paired strings.
pub fn keyed<Msg>(tag: impl Into<String>, attributes: Vec<Attribute<Msg>>, children: Vec<(String, Node<Msg>)>) -> Node<Msg> {
	element(tag, attributes, children.into_iter().map(|(key, child)| child.with_key(key)).collect())
}

pub fn raw_html<Msg>(tag: impl Into<String>, attributes: Vec<Attribute<Msg>>, html: impl Into<String>) -> Node<Msg> {
	Node {
		key: String::new(),
		mapper: None,
		kind: Kind::RawHtml(RawHtml {
			namespace: HTML_NAMESPACE.to_owned(),
			tag: tag.into(),
			attributes: normalize(attributes),
			html: html.into(),
		}),
	}
}

impl<Msg> Debug for Node<Msg> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut debug = f.debug_struct("Node");
		if !self.key.is_empty() {
			debug.field("key", &self.key);
		}
		match &self.kind {
			Kind::Fragment(children) => debug.field("fragment", &children.nodes),
			Kind::Element(element) => debug
				.field("namespace", &element.namespace)
				.field("tag", &element.tag)
				.field("attributes", &element.attributes)
				.field("children", &element.children.nodes),
			Kind::Text(text) => debug.field("text", text),
			Kind::RawHtml(raw) => debug.field("tag", &raw.tag).field("attributes", &raw.attributes).field("html", &raw.html),
		};
		debug.finish()
	}
}

pub(crate) fn escape(f: &mut impl fmt::Write, text: &str, attribute: bool) -> fmt::Result {
	for c in text.chars() {
		match c {
			'&' => f.write_str("&amp;")?,
			'<' => f.write_str("&lt;")?,
			'>' => f.write_str("&gt;")?,
			'"' if attribute => f.write_str("&quot;")?,
			c => f.write_char(c)?,
		}
	}
	Ok(())
}

fn write_attributes<Msg>(f: &mut Formatter<'_>, attributes: &[Attribute<Msg>]) -> fmt::Result {
	for attribute in attributes {
		if let Attribute::Attribute { name, value } = attribute {
			write!(f, " {}=\"", name)?;
			escape(f, value, true)?;
			f.write_char('"')?;
		}
	}
	Ok(())
}

/// Plain markup rendering. Properties and listeners aren't represented.
impl<Msg> Display for Node<Msg> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match &self.kind {
			Kind::Fragment(children) => children.nodes.iter().try_for_each(|child| Display::fmt(child, f)),
			Kind::Text(text) => escape(f, text, false),
			Kind::RawHtml(raw) => {
				write!(f, "<{}", raw.tag)?;
				write_attributes(f, &raw.attributes)?;
				write!(f, ">{}</{}>", raw.html, raw.tag)
			}
			Kind::Element(element) => {
				write!(f, "<{}", element.tag)?;
				write_attributes(f, &element.attributes)?;
				if element.void {
					return f.write_char('>');
				}
				if element.self_closing && element.children.is_empty() {
					return f.write_str("/>");
				}
				f.write_char('>')?;
				for child in &element.children.nodes {
					Display::fmt(child, f)?;
				}
				write!(f, "</{}>", element.tag)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::attribute::{attribute, class, on};

	#[test]
	fn keyed_lookup() {
		let list = keyed::<()>(
			"ul",
			vec![],
			vec![("a".to_owned(), text("A")), ("b".to_owned(), text("B"))],
		);
		let children = list.children().unwrap();
		assert!(children.contains_key("b"));
		assert!(!children.contains_key(""));
		assert!(matches!(&children.get_keyed("a").unwrap().kind, Kind::Text(t) if t == "A"));
	}

	#[test]
	fn markup() {
		let tree = element::<()>(
			"div",
			vec![class("b"), attribute("id", "x"), class("a")],
			vec![
				element("p", vec![], vec![text("1 < 2")]),
				element("input", vec![attribute("value", "\"q\"")], vec![text("ignored")]),
				fragment(vec![text("x"), text("y")]),
				namespaced(SVG_NAMESPACE, "svg", vec![], vec![]),
			],
		);
		assert_eq!(
			tree.to_string(),
			r#"<div class="a b" id="x"><p>1 &lt; 2</p><input value="&quot;q&quot;">xy<svg/></div>"#
		);
	}

	#[test]
	fn map_converts_listeners() {
		let node = element("button", vec![on("click", |_| Some(1_u8))], vec![]).with_key("k");
		let mapped: Node<String> = node.map(|n| format!("got {}", n));
		assert_eq!(mapped.key, "k");
		match &mapped.attributes()[0] {
			Attribute::Event(listener) => {
				let event = crate::event::Event::new(0, "click", 0.0, serde_json::Value::Null);
				assert_eq!((listener.handler)(&event), Some("got 1".to_owned()));
			}
			other => panic!("Unexpected {:?}", other),
		}
	}
}
