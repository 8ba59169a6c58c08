//! Browser [`Host`] and [`Platform`] on top of [`web_sys`].

use crate::{
	event::Event,
	host::{Described, Host, ListenerOptions, NativeListener},
	platform::{FrameId, Platform, Task, TimerId},
};
use core::cell::Cell;
use js_sys::{Reflect, JSON};
use serde_json::{Map, Number, Value};
use std::rc::Rc;
use tracing::{error, trace};
use wasm_bindgen::{prelude::*, throw_str, throw_val};
use web_sys::{AddEventListenerOptions, CustomEvent, CustomEventInit, Document, Element, Node};

const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Event payload fields copied from native events, in addition to `type` and the target's form state.
const EVENT_FIELDS: &[&str] = &[
	"altKey", "button", "clientX", "clientY", "code", "ctrlKey", "deltaX", "deltaY", "detail", "key", "metaKey", "shiftKey",
];

/// Stamped on native event objects so every listener sees the same [`Event::id`].
const EVENT_ID_PROPERTY: &str = "__vdomReconcileEventId";

#[wasm_bindgen]
extern "C" {
	#[wasm_bindgen(js_namespace = performance, js_name = "now")]
	fn performance_now() -> f64;

	#[wasm_bindgen(js_name = "queueMicrotask")]
	fn queue_microtask(callback: &JsValue);

	#[wasm_bindgen(js_name = "requestAnimationFrame")]
	fn request_animation_frame(callback: &JsValue) -> i32;

	#[wasm_bindgen(js_name = "cancelAnimationFrame")]
	fn cancel_animation_frame(id: i32);

	#[wasm_bindgen(js_name = "setTimeout")]
	fn set_timeout(callback: &JsValue, delay: i32) -> i32;

	#[wasm_bindgen(js_name = "clearTimeout")]
	fn clear_timeout(id: i32);
}

#[derive(Debug, Clone)]
pub struct WebHost {
	document: Document,
	next_event: Rc<Cell<u64>>,
}

impl WebHost {
	/// Uses the current window's document.
	#[must_use]
	pub fn new() -> Self {
		let document = web_sys::window()
			.expect_throw("vdom-reconcile: No window.")
			.document()
			.expect_throw("vdom-reconcile: No document.");
		Self::with_document(document)
	}

	#[must_use]
	pub fn with_document(document: Document) -> Self {
		Self {
			document,
			next_event: Rc::default(),
		}
	}

	fn convert(next_event: &Cell<u64>, event: &web_sys::Event) -> Event {
		let key = JsValue::from_str(EVENT_ID_PROPERTY);
		#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
		let id = match Reflect::get(event, &key).ok().and_then(|id| id.as_f64()) {
			Some(id) => id as u64,
			None => {
				let id = next_event.get() + 1;
				next_event.set(id);
				#[allow(clippy::cast_precision_loss)]
				let stamped = Reflect::set(event, &key, &JsValue::from_f64(id as f64));
				if stamped.is_err() {
					trace!("Couldn't stamp event id.");
				}
				id
			}
		};

		let mut data = Map::new();
		data.insert("type".to_owned(), Value::String(event.type_()));
		for field in EVENT_FIELDS {
			if let Ok(value) = Reflect::get(event, &JsValue::from_str(field)) {
				if !value.is_undefined() {
					data.insert((*field).to_owned(), to_value(&value));
				}
			}
		}
		if let Some(target) = event.target() {
			let mut form = Map::new();
			for field in &["value", "checked", "id", "name"] {
				if let Ok(value) = Reflect::get(&target, &JsValue::from_str(field)) {
					if !value.is_undefined() {
						form.insert((*field).to_owned(), to_value(&value));
					}
				}
			}
			data.insert("target".to_owned(), Value::Object(form));
		}

		Event::new(id, event.type_(), event.time_stamp(), Value::Object(data))
	}
}

impl Default for WebHost {
	fn default() -> Self {
		Self::new()
	}
}

fn to_value(value: &JsValue) -> Value {
	if let Some(boolean) = value.as_bool() {
		Value::Bool(boolean)
	} else if let Some(number) = value.as_f64() {
		Number::from_f64(number).map_or(Value::Null, Value::Number)
	} else if let Some(string) = value.as_string() {
		Value::String(string)
	} else if value.is_null() || value.is_undefined() {
		Value::Null
	} else {
		JSON::stringify(value)
			.ok()
			.and_then(|json| json.as_string())
			.and_then(|json| serde_json::from_str(&json).ok())
			.unwrap_or(Value::Null)
	}
}

fn to_js(value: &Value) -> JsValue {
	match value {
		Value::Null => JsValue::NULL,
		Value::Bool(boolean) => JsValue::from_bool(*boolean),
		Value::Number(number) => JsValue::from_f64(number.as_f64().unwrap_or(f64::NAN)),
		Value::String(string) => JsValue::from_str(string),
		Value::Array(_) | Value::Object(_) => JSON::parse(&value.to_string()).unwrap_throw(),
	}
}

fn element(node: &Node) -> &Element {
	node.dyn_ref::<Element>()
		.unwrap_or_else(|| throw_str("vdom-reconcile bug: Expected an element."))
}

impl Host for WebHost {
	type Node = Node;
	type Listener = Closure<dyn Fn(web_sys::Event)>;

	fn create_element(&self, namespace: &str, tag: &str) -> Node {
		let element = if namespace.is_empty() {
			self.document.create_element(tag)
		} else {
			self.document.create_element_ns(Some(namespace), tag)
		};
		element.unwrap_throw().into()
	}

	fn create_text(&self, content: &str) -> Node {
		self.document.create_text_node(content).into()
	}

	fn create_marker(&self) -> Node {
		self.document.create_comment("").into()
	}

	fn create_fragment(&self) -> Node {
		self.document.create_document_fragment().into()
	}

	fn insert_before(&self, parent: &Node, child: &Node, reference: Option<&Node>) {
		parent.insert_before(child, reference).unwrap_throw();
	}

	fn remove_child(&self, parent: &Node, child: &Node) {
		if let Err(error) = parent.remove_child(child) {
			error!(?error, "Failed to remove child node.");
			throw_val(error);
		}
	}

	fn next_sibling(&self, node: &Node) -> Option<Node> {
		node.next_sibling()
	}

	fn child_nodes(&self, node: &Node) -> Vec<Node> {
		let child_nodes = node.child_nodes();
		(0..child_nodes.length()).filter_map(|i| child_nodes.item(i)).collect()
	}

	fn describe(&self, node: &Node) -> Described {
		match node.node_type() {
			Node::ELEMENT_NODE => {
				let element = element(node);
				let namespace = element
					.namespace_uri()
					.filter(|namespace| namespace != XHTML_NAMESPACE)
					.unwrap_or_default();
				let attributes = element.attributes();
				Described::Element {
					namespace,
					tag: element.local_name(),
					attributes: (0..attributes.length())
						.filter_map(|i| attributes.item(i))
						.map(|attribute| (attribute.name(), attribute.value()))
						.collect(),
				}
			}
			Node::TEXT_NODE => Described::Text(node.text_content().unwrap_or_default()),
			_ => Described::Other,
		}
	}

	fn set_text(&self, node: &Node, content: &str) {
		node.set_text_content(Some(content));
	}

	fn set_inner_html(&self, node: &Node, html: &str) {
		element(node).set_inner_html(html);
	}

	fn set_attribute(&self, node: &Node, name: &str, value: &str) {
		if let Err(error) = element(node).set_attribute(name, value) {
			error!(?error, name, "Failed to set attribute.");
		}
	}

	fn remove_attribute(&self, node: &Node, name: &str) {
		if let Err(error) = element(node).remove_attribute(name) {
			error!(?error, name, "Failed to remove attribute.");
		}
	}

	fn set_property(&self, node: &Node, name: &str, value: &Value) {
		if let Err(error) = Reflect::set(node, &JsValue::from_str(name), &to_js(value)) {
			error!(?error, name, "Failed to set property.");
		}
	}

	fn add_listener(&self, node: &Node, name: &str, options: ListenerOptions, listener: NativeListener) -> Self::Listener {
		let next_event = Rc::clone(&self.next_event);
		let closure = Closure::wrap(Box::new(move |event: web_sys::Event| {
			if options.prevent_default {
				event.prevent_default();
			}
			if options.stop_propagation {
				event.stop_propagation();
			}
			listener(Self::convert(&next_event, &event));
		}) as Box<dyn Fn(web_sys::Event)>);

		let mut native_options = AddEventListenerOptions::new();
		native_options.passive(options.passive);
		node.add_event_listener_with_callback_and_add_event_listener_options(name, closure.as_ref().unchecked_ref(), &native_options)
			.unwrap_throw();
		trace!(name, "Bound native listener.");
		closure
	}

	fn remove_listener(&self, node: &Node, name: &str, listener: Self::Listener) {
		node.remove_event_listener_with_callback(name, listener.as_ref().unchecked_ref())
			.unwrap_throw();
		trace!(name, "Unbound native listener.");
	}

	fn emit(&self, node: &Node, name: &str, data: &Value) {
		let mut init = CustomEventInit::new();
		init.detail(&to_js(data));
		let event = CustomEvent::new_with_event_init_dict(name, &init).unwrap_throw();
		node.dispatch_event(&event).unwrap_throw();
	}
}

/// The browser's microtask queue, animation frames and timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebPlatform;

impl Platform for WebPlatform {
	fn now(&self) -> f64 {
		performance_now()
	}

	fn queue_microtask(&self, task: Task) {
		queue_microtask(&Closure::once_into_js(move || task()));
	}

	fn request_frame(&self, task: Task) -> FrameId {
		// Cancelled callbacks are never freed, which is acceptable at one per coalesced render.
		let id = request_animation_frame(&Closure::once_into_js(move |_: f64| task()));
		#[allow(clippy::cast_sign_loss)]
		let id = id as u64;
		FrameId(id)
	}

	fn cancel_frame(&self, frame: FrameId) {
		#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
		let id = frame.0 as i32;
		cancel_animation_frame(id);
	}

	fn set_timeout(&self, delay: u32, task: Task) -> TimerId {
		#[allow(clippy::cast_possible_wrap)]
		let id = set_timeout(&Closure::once_into_js(move || task()), delay as i32);
		#[allow(clippy::cast_sign_loss)]
		let id = id as u64;
		TimerId(id)
	}

	fn clear_timeout(&self, timer: TimerId) {
		#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
		let id = timer.0 as i32;
		clear_timeout(id);
	}
}
