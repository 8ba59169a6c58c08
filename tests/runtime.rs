use serde_json::{json, Value};
use std::{cell::RefCell, rc::Rc};
use vdom_reconcile::{
	attribute::{attribute, on, Attribute, EventListener},
	effect::Effects,
	host::Host,
	memory::{Emitted, MemoryDom, MemoryNode},
	node::{element, text, Node},
	platform::{ManualPlatform, Platform},
	runtime::{Application, Phase, Runtime, RuntimeConfig},
};

type Log = Rc<RefCell<Vec<String>>>;

#[derive(Debug, Clone, PartialEq)]
enum Msg {
	Add(i32),
	Type(String),
	Fan,
	Note(&'static str),
	Paint,
}

#[derive(Debug, Default)]
struct Model {
	count: i32,
	typed: String,
}

struct Counter {
	dom: MemoryDom,
	root: MemoryNode,
	log: Log,
	views: Rc<RefCell<usize>>,
}

impl Application for Counter {
	type Model = Model;
	type Msg = Msg;

	fn view(&self, model: &Model) -> Node<Msg> {
		*self.views.borrow_mut() += 1;
		element(
			"div",
			vec![],
			vec![
				element("p", vec![], vec![text(model.count.to_string())]),
				element("button", vec![attribute("id", "add"), on("click", |_| Some(Msg::Add(1)))], vec![]),
				element(
					"button",
					vec![
						attribute("id", "now"),
						Attribute::Event(EventListener::new("click", |_| Some(Msg::Add(10))).immediate()),
					],
					vec![],
				),
				element(
					"input",
					vec![Attribute::Event(
						EventListener::new("input", |event| event.get("value").and_then(Value::as_str).map(|value| Msg::Type(value.to_owned())))
							.debounce(50),
					)],
					vec![],
				),
			],
		)
	}

	fn update(&self, mut model: Model, msg: Msg) -> (Model, Effects<Msg>) {
		self.log.borrow_mut().push(format!("update {:?}", msg));
		let effects = match msg {
			Msg::Add(amount) => {
				model.count += amount;
				Effects::none()
			}
			Msg::Type(typed) => {
				model.typed = typed;
				Effects::none()
			}
			Msg::Fan => Effects::batch(vec![Effects::message(Msg::Note("a")), Effects::message(Msg::Note("b"))]),
			Msg::Note("a") => Effects::message(Msg::Note("c")),
			Msg::Note(_) => Effects::none(),
			Msg::Paint => {
				let (dom, root) = (self.dom.clone(), self.root);
				let before = Rc::clone(&self.log);
				let after = Rc::clone(&self.log);
				let synchronous = Rc::clone(&self.log);
				model.count += 1;
				Effects::synchronous(move |_| synchronous.borrow_mut().push("synchronous".to_owned()))
					.and(Effects::before_paint(move |_| before.borrow_mut().push(format!("before paint {}", dom.inner_html(root)))))
					.and(Effects::after_paint(move |_| after.borrow_mut().push("after paint".to_owned())))
			}
		};
		(model, effects)
	}
}

struct Fixture {
	dom: MemoryDom,
	platform: Rc<ManualPlatform>,
	root: MemoryNode,
	log: Log,
	views: Rc<RefCell<usize>>,
	runtime: Runtime<Counter, MemoryDom>,
}

impl Fixture {
	fn mount(init: Effects<Msg>, config: RuntimeConfig) -> Self {
		let dom = MemoryDom::new();
		let platform = Rc::new(ManualPlatform::new());
		let root = dom.create_element("", "main");
		let log = Log::default();
		let views = Rc::new(RefCell::new(0));
		let app = Counter {
			dom: dom.clone(),
			root,
			log: Rc::clone(&log),
			views: Rc::clone(&views),
		};
		let runtime = Runtime::mount(
			app,
			dom.clone(),
			Rc::clone(&platform) as Rc<dyn Platform>,
			root,
			(Model::default(), init),
			config,
		);
		Self {
			dom,
			platform,
			root,
			log,
			views,
			runtime,
		}
	}

	fn new() -> Self {
		Self::mount(Effects::none(), RuntimeConfig::default())
	}

	fn count(&self) -> String {
		let p = self.dom.query(self.root, "p").unwrap();
		self.dom.inner_html(p)
	}

	fn button(&self, id: &str) -> MemoryNode {
		self.dom
			.query_all(self.root, "button")
			.into_iter()
			.find(|button| self.dom.attribute(*button, "id").as_deref() == Some(id))
			.unwrap()
	}

	fn take_log(&self) -> Vec<String> {
		self.log.borrow_mut().drain(..).collect()
	}
}

#[test]
fn renders_on_mount() {
	let fixture = Fixture::new();
	assert_eq!(fixture.count(), "0");
	assert_eq!(fixture.runtime.phase(), Phase::Idle);
	assert_eq!(fixture.platform.pending_frames(), 0);
	fixture.runtime.with_tree(|tree| assert_eq!(fixture.dom.inner_html(fixture.root), tree.to_string()));
}

#[test]
fn deferred_mount_renders_on_the_next_frame() {
	let fixture = Fixture::mount(
		Effects::none(),
		RuntimeConfig {
			render_on_mount: false,
			..RuntimeConfig::default()
		},
	);
	assert_eq!(fixture.dom.inner_html(fixture.root), "");
	assert_eq!(fixture.runtime.phase(), Phase::RenderScheduled);

	fixture.platform.run_frame();
	assert_eq!(fixture.count(), "0");
}

#[test]
fn renders_are_coalesced_into_frames() {
	let fixture = Fixture::new();
	fixture.runtime.dispatch(Msg::Add(1), false);
	fixture.runtime.dispatch(Msg::Add(2), false);
	assert_eq!(fixture.count(), "0");
	assert_eq!(fixture.runtime.phase(), Phase::RenderScheduled);
	assert_eq!(fixture.platform.pending_frames(), 1);
	fixture.runtime.with_model(|model| assert_eq!(model.count, 3));

	let views = *fixture.views.borrow();
	fixture.platform.run_frame();
	assert_eq!(fixture.count(), "3");
	assert_eq!(*fixture.views.borrow(), views + 1);
	assert_eq!(fixture.runtime.phase(), Phase::Idle);
}

#[test]
fn immediate_messages_render_synchronously() {
	let fixture = Fixture::new();
	fixture.runtime.dispatch(Msg::Add(1), false);
	assert_eq!(fixture.platform.pending_frames(), 1);

	fixture.runtime.dispatch(Msg::Add(1), true);
	assert_eq!(fixture.count(), "2");
	assert_eq!(fixture.platform.pending_frames(), 0);
	assert_eq!(fixture.runtime.phase(), Phase::Idle);
}

#[test]
fn flush_renders_pending_changes() {
	let fixture = Fixture::new();
	fixture.runtime.dispatch(Msg::Add(5), false);
	fixture.runtime.flush();
	assert_eq!(fixture.count(), "5");
	assert_eq!(fixture.platform.pending_frames(), 0);

	let views = *fixture.views.borrow();
	fixture.runtime.flush();
	assert_eq!(*fixture.views.borrow(), views);
}

#[test]
fn paint_effects_run_around_the_render() {
	let fixture = Fixture::new();
	fixture.runtime.dispatch(Msg::Paint, false);
	assert_eq!(fixture.take_log(), vec!["update Paint", "synchronous"]);

	// The frame renders, then the before-paint microtask sees the result.
	fixture.platform.run_frame();
	let log = fixture.take_log();
	assert_eq!(log.len(), 1);
	assert!(log[0].starts_with("before paint <div><p>1</p>"), "{}", log[0]);

	fixture.platform.run_frame();
	assert_eq!(fixture.take_log(), vec!["after paint"]);
	assert_eq!(fixture.platform.pending_frames(), 0);
}

#[test]
fn cascades_are_processed_in_arrival_order() {
	let fixture = Fixture::new();
	fixture.runtime.dispatch(Msg::Fan, true);
	assert_eq!(
		fixture.take_log(),
		vec!["update Fan", "update Note(\"a\")", "update Note(\"b\")", "update Note(\"c\")"]
	);
}

#[test]
fn native_events_dispatch_messages() {
	let fixture = Fixture::new();
	fixture.dom.dispatch(fixture.button("add"), "click", json!({}));
	assert_eq!(fixture.take_log(), vec!["update Add(1)"]);
	assert_eq!(fixture.count(), "0");
	fixture.platform.run_frame();
	assert_eq!(fixture.count(), "1");

	fixture.dom.dispatch(fixture.button("now"), "click", json!({}));
	assert_eq!(fixture.count(), "11");
	assert_eq!(fixture.platform.pending_frames(), 0);
}

#[test]
fn debounced_input_dispatches_the_last_value_once() {
	let fixture = Fixture::new();
	let input = fixture.dom.query(fixture.root, "input").unwrap();
	for value in &["a", "ab", "abc"] {
		fixture.dom.dispatch(input, "input", json!({ "value": value }));
		fixture.platform.advance(10.0);
	}
	assert!(fixture.take_log().is_empty());

	fixture.platform.advance(50.0);
	assert_eq!(fixture.take_log(), vec!["update Type(\"abc\")"]);
	fixture.runtime.with_model(|model| assert_eq!(model.typed, "abc"));
}

#[test]
fn effects_provide_and_emit() {
	let fixture = Fixture::mount(
		Effects::synchronous(|actions| {
			actions.provide("answer", json!(42));
			actions.emit("ready", json!({ "ok": true }));
		}),
		RuntimeConfig::default(),
	);
	assert_eq!(fixture.runtime.provided("answer"), Some(json!(42)));
	assert_eq!(fixture.runtime.provided("question"), None);
	assert_eq!(
		fixture.dom.emitted(),
		vec![Emitted {
			node: fixture.root,
			name: "ready".to_owned(),
			data: json!({ "ok": true }),
		}]
	);
}

#[test]
fn unmount_releases_listeners_and_timers() {
	let fixture = Fixture::new();
	let input = fixture.dom.query(fixture.root, "input").unwrap();
	fixture.dom.dispatch(input, "input", json!({ "value": "x" }));
	fixture.runtime.dispatch(Msg::Add(1), false);
	assert_eq!(fixture.platform.pending_timers(), 1);
	assert_eq!(fixture.platform.pending_frames(), 1);
	assert!(fixture.dom.listener_count() > 0);

	fixture.runtime.unmount();
	assert_eq!(fixture.runtime.phase(), Phase::Unmounted);
	assert_eq!(fixture.platform.pending_timers(), 0);
	assert_eq!(fixture.platform.pending_frames(), 0);
	assert_eq!(fixture.dom.listener_count(), 0);

	fixture.take_log();
	fixture.runtime.dispatch(Msg::Add(1), true);
	assert!(fixture.take_log().is_empty());
	assert_eq!(fixture.count(), "0");
}

#[test]
fn mounting_adopts_existing_markup() {
	let dom = MemoryDom::new();
	let root = dom.create_element("", "main");
	let div = dom.create_element("", "div");
	let p = dom.create_element("", "p");
	dom.insert_before(&root, &div, None);
	dom.insert_before(&div, &p, None);
	dom.insert_before(&p, &dom.create_text("7"), None);

	let platform = Rc::new(ManualPlatform::new());
	let app = Counter {
		dom: dom.clone(),
		root,
		log: Log::default(),
		views: Rc::default(),
	};
	let runtime = Runtime::mount(app, dom.clone(), platform as Rc<dyn Platform>, root, (Model::default(), Effects::none()), RuntimeConfig::default());

	assert_eq!(dom.query(root, "p"), Some(p));
	assert_eq!(dom.inner_html(p), "0");
	runtime.with_tree(|tree| assert_eq!(dom.inner_html(root), tree.to_string()));
}

#[test]
fn mounting_keeps_typed_form_values() {
	let dom = MemoryDom::new();
	let root = dom.create_element("", "main");
	let div = dom.create_element("", "div");
	dom.insert_before(&root, &div, None);
	let p = dom.create_element("", "p");
	dom.insert_before(&p, &dom.create_text("0"), None);
	dom.insert_before(&div, &p, None);
	for id in &["add", "now"] {
		let button = dom.create_element("", "button");
		dom.set_attribute(&button, "id", id);
		dom.insert_before(&div, &button, None);
	}
	let input = dom.create_element("", "input");
	dom.set_property(&input, "value", &json!("typed before mount"));
	dom.insert_before(&div, &input, None);

	let app = Counter {
		dom: dom.clone(),
		root,
		log: Log::default(),
		views: Rc::default(),
	};
	let platform = Rc::new(ManualPlatform::new());
	let _runtime = Runtime::mount(app, dom.clone(), platform as Rc<dyn Platform>, root, (Model::default(), Effects::none()), RuntimeConfig::default());

	assert_eq!(dom.query(root, "input"), Some(input));
	assert_eq!(dom.property(input, "value"), Some(json!("typed before mount")));
}
