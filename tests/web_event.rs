#![cfg(target_arch = "wasm32")]

use std::{cell::RefCell, rc::Rc};
use vdom_reconcile::{
	attribute::{attribute, Attribute, EventListener},
	effect::Effects,
	node::{element, text, Node},
	platform::Platform,
	runtime::{Application, Runtime, RuntimeConfig},
	web::{WebHost, WebPlatform},
};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, Element, EventInit};

wasm_bindgen_test_configure!(run_in_browser);

static mut LOG_INITIALIZED: bool = false;

struct Clicker {
	seen: Rc<RefCell<Vec<String>>>,
}

impl Application for Clicker {
	type Model = u32;
	type Msg = String;

	fn view(&self, model: &u32) -> Node<String> {
		element(
			"button",
			vec![
				attribute("id", "test-button"),
				Attribute::Event(
					EventListener::new("click", |event| event.get("type").and_then(|t| t.as_str()).map(str::to_owned))
						.prevent_default()
						.immediate(),
				),
			],
			vec![text(model.to_string())],
		)
	}

	fn update(&self, model: u32, msg: String) -> (u32, Effects<String>) {
		self.seen.borrow_mut().push(msg);
		(model + 1, Effects::none())
	}
}

#[wasm_bindgen_test]
fn click() {
	unsafe {
		if !LOG_INITIALIZED {
			tracing_wasm::set_as_global_default();
			LOG_INITIALIZED = true;
		}
	}

	let document = window().unwrap().document().unwrap();
	let container = document.create_element("div").unwrap();
	document.body().unwrap().append_child(&container).unwrap();

	let seen = Rc::new(RefCell::new(Vec::new()));
	let runtime = Runtime::mount(
		Clicker { seen: Rc::clone(&seen) },
		WebHost::new(),
		Rc::new(WebPlatform) as Rc<dyn Platform>,
		container.clone().into(),
		(0, Effects::none()),
		RuntimeConfig::default(),
	);
	assert_eq!(container.inner_html(), r#"<button id="test-button">0</button>"#);

	let button: Element = container.first_element_child().unwrap();
	let mut init = EventInit::new();
	init.cancelable(true);
	let event = web_sys::Event::new_with_event_init_dict("click", &init).unwrap();
	button.dispatch_event(&event).unwrap();

	assert!(event.default_prevented());
	assert_eq!(*seen.borrow(), vec!["click".to_owned()]);
	assert_eq!(container.inner_html(), r#"<button id="test-button">1</button>"#);

	runtime.unmount();
	button.dispatch_event(&web_sys::Event::new("click").unwrap()).unwrap();
	assert_eq!(seen.borrow().len(), 1);
}
