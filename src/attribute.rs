//! Attributes, properties and event listeners, plus their canonical ordering.

use crate::event::Event;
use core::{
	cmp::Ordering,
	fmt::{self, Debug, Formatter},
};
use serde_json::Value;
use std::rc::Rc;

/// Turns a native event into an application message, or rejects it.
pub type Handler<Msg> = Rc<dyn Fn(&Event) -> Option<Msg>>;

pub enum Attribute<Msg> {
	/// Reflected through `setAttribute`.
	Attribute { name: String, value: String },
	/// Assigned directly on the live node.
	Property { name: String, value: Value },
	Event(EventListener<Msg>),
}

pub struct EventListener<Msg> {
	pub name: String,
	pub handler: Handler<Msg>,
	/// Dotted payload paths forwarded to remote handlers, see [`Event::project`].
	pub include: Vec<String>,
	pub prevent_default: bool,
	pub stop_propagation: bool,
	/// Messages from this listener render synchronously instead of on the next frame.
	pub immediate: bool,
	/// Trailing-edge quiet period in milliseconds. `0` disables debouncing.
	pub debounce: u32,
	/// Leading-edge minimum interval in milliseconds. `0` disables throttling.
	pub throttle: u32,
}

/// The parts of an [`EventListener`] the reconciler needs once the handler itself lives in the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ListenerShape {
	pub include: Vec<String>,
	pub prevent_default: bool,
	pub stop_propagation: bool,
	pub immediate: bool,
	pub debounce: u32,
	pub throttle: u32,
}

impl<Msg> Clone for Attribute<Msg> {
	fn clone(&self) -> Self {
		match self {
			Self::Attribute { name, value } => Self::Attribute {
				name: name.clone(),
				value: value.clone(),
			},
			Self::Property { name, value } => Self::Property {
				name: name.clone(),
				value: value.clone(),
			},
			Self::Event(listener) => Self::Event(listener.clone()),
		}
	}
}

impl<Msg> Clone for EventListener<Msg> {
	fn clone(&self) -> Self {
		Self {
			name: self.name.clone(),
			handler: Rc::clone(&self.handler),
			include: self.include.clone(),
			prevent_default: self.prevent_default,
			stop_propagation: self.stop_propagation,
			immediate: self.immediate,
			debounce: self.debounce,
			throttle: self.throttle,
		}
	}
}

impl<Msg> Debug for Attribute<Msg> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Attribute { name, value } => f.debug_struct("Attribute").field("name", name).field("value", value).finish(),
			Self::Property { name, value } => f.debug_struct("Property").field("name", name).field("value", value).finish(),
			Self::Event(listener) => listener.fmt(f),
		}
	}
}

impl<Msg> Debug for EventListener<Msg> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("EventListener")
			.field("name", &self.name)
			.field("shape", &self.shape())
			.finish_non_exhaustive()
	}
}

impl<Msg> EventListener<Msg> {
	pub fn new(name: impl Into<String>, handler: impl 'static + Fn(&Event) -> Option<Msg>) -> Self {
		Self {
			name: name.into(),
			handler: Rc::new(handler),
			include: Vec::new(),
			prevent_default: false,
			stop_propagation: false,
			immediate: false,
			debounce: 0,
			throttle: 0,
		}
	}

	#[must_use]
	pub fn shape(&self) -> ListenerShape {
		ListenerShape {
			include: self.include.clone(),
			prevent_default: self.prevent_default,
			stop_propagation: self.stop_propagation,
			immediate: self.immediate,
			debounce: self.debounce,
			throttle: self.throttle,
		}
	}

	/// Whether the native listener has to be rebound, ignoring the handler.
	#[must_use]
	pub fn same_shape(&self, other: &Self) -> bool {
		self.prevent_default == other.prevent_default
			&& self.stop_propagation == other.stop_propagation
			&& self.immediate == other.immediate
			&& self.debounce == other.debounce
			&& self.throttle == other.throttle
			&& self.include == other.include
	}

	#[must_use]
	pub fn include(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.include.extend(paths.into_iter().map(Into::into));
		self
	}

	#[must_use]
	pub fn prevent_default(mut self) -> Self {
		self.prevent_default = true;
		self
	}

	#[must_use]
	pub fn stop_propagation(mut self) -> Self {
		self.stop_propagation = true;
		self
	}

	#[must_use]
	pub fn immediate(mut self) -> Self {
		self.immediate = true;
		self
	}

	#[must_use]
	pub fn debounce(mut self, milliseconds: u32) -> Self {
		self.debounce = milliseconds;
		self
	}

	#[must_use]
	pub fn throttle(mut self, milliseconds: u32) -> Self {
		self.throttle = milliseconds;
		self
	}

	/// Wraps the handler so that produced messages pass through `mapper`.
	pub fn map<Out: 'static>(self, mapper: impl 'static + Fn(Msg) -> Out) -> EventListener<Out>
	where
		Msg: 'static,
	{
		let handler = self.handler;
		EventListener {
			name: self.name,
			handler: Rc::new(move |event| handler(event).map(&mapper)),
			include: self.include,
			prevent_default: self.prevent_default,
			stop_propagation: self.stop_propagation,
			immediate: self.immediate,
			debounce: self.debounce,
			throttle: self.throttle,
		}
	}
}

impl<Msg> Attribute<Msg> {
	#[must_use]
	pub fn name(&self) -> &str {
		match self {
			Self::Attribute { name, .. } | Self::Property { name, .. } => name,
			Self::Event(listener) => &listener.name,
		}
	}

	pub fn map<Out: 'static>(self, mapper: impl 'static + Fn(Msg) -> Out) -> Attribute<Out>
	where
		Msg: 'static,
	{
		match self {
			Self::Attribute { name, value } => Attribute::Attribute { name, value },
			Self::Property { name, value } => Attribute::Property { name, value },
			Self::Event(listener) => Attribute::Event(listener.map(mapper)),
		}
	}
}

pub fn attribute<Msg>(name: impl Into<String>, value: impl Into<String>) -> Attribute<Msg> {
	Attribute::Attribute {
		name: name.into(),
		value: value.into(),
	}
}

pub fn property<Msg>(name: impl Into<String>, value: impl Into<Value>) -> Attribute<Msg> {
	Attribute::Property {
		name: name.into(),
		value: value.into(),
	}
}

pub fn on<Msg>(name: impl Into<String>, handler: impl 'static + Fn(&Event) -> Option<Msg>) -> Attribute<Msg> {
	Attribute::Event(EventListener::new(name, handler))
}

pub fn class<Msg>(value: impl Into<String>) -> Attribute<Msg> {
	attribute("class", value)
}

pub fn style<Msg>(value: impl Into<String>) -> Attribute<Msg> {
	attribute("style", value)
}

/// Brings `attributes` into the canonical form the differ walks.
///
/// The result is sorted ascending by name.
/// Adjacent `class` attributes are joined with spaces (values ordered ascending, so the result doesn't depend on
/// input order), adjacent `style` attributes with `;` (in input order).
/// Attributes without name, and `class`/`style` attributes without value, are dropped.
/// Other duplicates are kept as separate entries.
#[must_use]
pub fn normalize<Msg>(mut attributes: Vec<Attribute<Msg>>) -> Vec<Attribute<Msg>> {
	// Stable, so equal names keep their input order.
	attributes.sort_by(|a, b| match b.name().cmp(a.name()) {
		Ordering::Equal => match (a, b) {
			(Attribute::Attribute { name, value: a }, Attribute::Attribute { value: b, .. }) if name == "class" => a.cmp(b),
			_ => Ordering::Equal,
		},
		ordering => ordering,
	});

	let mut merged: Vec<Attribute<Msg>> = Vec::with_capacity(attributes.len());
	for attribute in attributes {
		if let Attribute::Attribute { name, value } = &attribute {
			if name.is_empty() || ((name == "class" || name == "style") && value.is_empty()) {
				continue;
			}
			if let Some(Attribute::Attribute {
				name: previous_name,
				value: previous_value,
			}) = merged.last_mut()
			{
				if previous_name == name && (name == "class" || name == "style") {
					previous_value.push(if name == "class" { ' ' } else { ';' });
					previous_value.push_str(value);
					continue;
				}
			}
		} else if attribute.name().is_empty() {
			continue;
		}
		merged.push(attribute);
	}

	merged.reverse();
	merged
}
