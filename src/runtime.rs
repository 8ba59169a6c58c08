//! The update/render loop of one mounted application.
//!
//! Messages are processed in strict arrival order. A [`Runtime::dispatch`] that arrives while a cascade is draining
//! (from an effect, or from a native event fired by a DOM mutation) is queued and processed by the running cascade,
//! never interleaved with it.
//!
//! Rendering is coalesced into the next animation frame unless a processed message asked for an immediate render.
//! Before-paint effects run in a microtask after the render that follows their update,
//! after-paint effects in the animation frame after that.

use crate::{
	diff::diff,
	effect::{Actions, Effect, Effects},
	events::Events,
	host::Host,
	load::virtualize,
	node::{fragment, Node},
	platform::{FrameId, Platform},
	reconcile::{NodeId, Reconciler, Signal, Sink},
};
use core::{
	any::Any,
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	mem,
};
use hashbrown::HashMap;
use serde_json::Value;
use std::{
	collections::VecDeque,
	rc::{Rc, Weak},
};
use tracing::{instrument, trace, trace_span, warn};

/// The application logic driven by a [`Runtime`].
pub trait Application: 'static {
	type Model: 'static;
	type Msg: 'static;

	/// Pure and deterministic.
	fn view(&self, model: &Self::Model) -> Node<Self::Msg>;
	fn update(&self, model: Self::Model, msg: Self::Msg) -> (Self::Model, Effects<Self::Msg>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
	/// Adopt the mount container's existing children as the initial tree, so the first render only patches differences.
	/// Otherwise they are removed.
	pub virtualize: bool,
	/// Render synchronously while mounting instead of on the next animation frame.
	pub render_on_mount: bool,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		Self {
			virtualize: true,
			render_on_mount: true,
		}
	}
}

/// Where a [`Runtime`] is in its cycle, as observed between host callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Idle,
	/// Messages are being processed.
	Draining,
	/// A render is queued for the next animation frame.
	RenderScheduled,
	Unmounted,
}

struct Core<A: Application, H: Host> {
	model: Option<A::Model>,
	tree: Node<A::Msg>,
	events: Events<A::Msg>,
	reconciler: Reconciler<H>,
}

struct Pending<Msg> {
	before_paint: Vec<Effect<Msg>>,
	after_paint: Vec<Effect<Msg>>,
}

impl<Msg> Default for Pending<Msg> {
	fn default() -> Self {
		Self {
			before_paint: Vec::new(),
			after_paint: Vec::new(),
		}
	}
}

struct Shared<A: Application, H: Host> {
	this: Weak<Self>,
	app: A,
	platform: Rc<dyn Platform>,
	root: H::Node,
	core: RefCell<Core<A, H>>,
	messages: RefCell<VecDeque<(A::Msg, bool)>>,
	signals: RefCell<VecDeque<(NodeId, Signal)>>,
	pending: RefCell<Pending<A::Msg>>,
	provided: RefCell<HashMap<String, Value>>,
	draining: Cell<bool>,
	dirty: Cell<bool>,
	immediate: Cell<bool>,
	frame: Cell<Option<FrameId>>,
	mounted: Cell<bool>,
}

/// A mounted application. Dropping the last handle doesn't unmount; call [`Runtime::unmount`] for that.
///
/// Several runtimes can be mounted side by side; they share no state.
pub struct Runtime<A: Application, H: Host> {
	shared: Rc<Shared<A, H>>,
}

impl<A: Application, H: Host> Clone for Runtime<A, H> {
	fn clone(&self) -> Self {
		Self {
			shared: Rc::clone(&self.shared),
		}
	}
}

impl<A: Application, H: Host> Debug for Runtime<A, H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Runtime")
			.field("root", &self.shared.root)
			.field("phase", &self.phase())
			.field("queued", &self.shared.messages.borrow().len())
			.finish_non_exhaustive()
	}
}

impl<A: Application, H: Host> Runtime<A, H> {
	/// Takes over `root`, runs the `init`ial effects and renders the initial model.
	#[instrument(skip_all)]
	pub fn mount(app: A, host: H, platform: Rc<dyn Platform>, root: H::Node, init: (A::Model, Effects<A::Msg>), config: RuntimeConfig) -> Self {
		let (model, effects) = init;
		let shared = Rc::new_cyclic(|this: &Weak<Shared<A, H>>| {
			let sink_target = this.clone();
			let sink: Sink = Rc::new(move |node, signal| {
				if let Some(shared) = sink_target.upgrade() {
					shared.signals.borrow_mut().push_back((node, signal));
					shared.process_signals();
				}
			});

			let mut reconciler = Reconciler::new(host, Rc::clone(&platform), root.clone(), sink);
			let tree = if config.virtualize {
				virtualize(&mut reconciler)
			} else {
				for child in reconciler.host().child_nodes(&root) {
					reconciler.host().remove_child(&root, &child);
				}
				fragment(Vec::new())
			};

			Shared {
				this: this.clone(),
				app,
				platform,
				root,
				core: RefCell::new(Core {
					model: Some(model),
					tree,
					events: Events::new(),
					reconciler,
				}),
				messages: RefCell::new(VecDeque::new()),
				signals: RefCell::new(VecDeque::new()),
				pending: RefCell::new(Pending::default()),
				provided: RefCell::new(HashMap::new()),
				draining: Cell::new(false),
				dirty: Cell::new(true),
				immediate: Cell::new(config.render_on_mount),
				frame: Cell::new(None),
				mounted: Cell::new(true),
			}
		});
		shared.tick(effects);
		Self { shared }
	}

	/// Queues `msg`. Outside of a running cascade, it's processed right away.
	pub fn dispatch(&self, msg: A::Msg, immediate: bool) {
		self.shared.dispatch(msg, immediate);
	}

	/// Renders now if a render is pending, cancelling the scheduled frame.
	pub fn flush(&self) {
		if self.shared.dirty.get() && !self.shared.draining.get() {
			self.shared.immediate.set(true);
			self.shared.settle();
		}
	}

	#[must_use]
	pub fn phase(&self) -> Phase {
		if !self.shared.mounted.get() {
			Phase::Unmounted
		} else if self.shared.draining.get() {
			Phase::Draining
		} else if self.shared.frame.get().is_some() {
			Phase::RenderScheduled
		} else {
			Phase::Idle
		}
	}

	/// Runs `f` against the current model.
	///
	/// # Panics
	///
	/// Iff called from within [`Application::update`] or [`Application::view`].
	pub fn with_model<R>(&self, f: impl FnOnce(&A::Model) -> R) -> R {
		let core = self.shared.core.borrow();
		f(core.model.as_ref().unwrap_or_else(|| unreachable!("vdom-reconcile bug: Model is missing outside of update.")))
	}

	/// The most recently rendered tree.
	pub fn with_tree<R>(&self, f: impl FnOnce(&Node<A::Msg>) -> R) -> R {
		f(&self.shared.core.borrow().tree)
	}

	/// A value published by an effect through [`Actions::provide`].
	#[must_use]
	pub fn provided(&self, key: &str) -> Option<Value> {
		self.shared.provided.borrow().get(key).cloned()
	}

	#[must_use]
	pub fn root(&self) -> &H::Node {
		&self.shared.root
	}

	/// Stops processing, cancels the pending frame and debounce timers and unbinds all native listeners.
	///
	/// The live tree is left in place.
	#[instrument(skip(self))]
	pub fn unmount(&self) {
		let shared = &self.shared;
		if !shared.mounted.replace(false) {
			warn!("Runtime was already unmounted.");
			return;
		}
		if let Some(frame) = shared.frame.take() {
			shared.platform.cancel_frame(frame);
		}
		shared.messages.borrow_mut().clear();
		shared.signals.borrow_mut().clear();
		*shared.pending.borrow_mut() = Pending::default();
		shared.core.borrow_mut().reconciler.teardown();
	}
}

impl<A: Application, H: Host> Shared<A, H> {
	fn dispatch(&self, msg: A::Msg, immediate: bool) {
		if !self.mounted.get() {
			trace!("Ignoring message after unmount.");
			return;
		}
		self.messages.borrow_mut().push_back((msg, immediate));
		if self.draining.get() {
			return;
		}
		self.drain();
		self.settle();
	}

	/// Runs `effects`, then processes whatever they dispatched.
	fn tick(&self, effects: Effects<A::Msg>) {
		if !self.mounted.get() {
			return;
		}
		let was_draining = self.draining.replace(true);
		self.run(effects);
		self.draining.set(was_draining);
		if !was_draining {
			self.drain();
			self.settle();
		}
	}

	fn run(&self, effects: Effects<A::Msg>) {
		let Effects {
			synchronous,
			before_paint,
			after_paint,
		} = effects;
		{
			let mut pending = self.pending.borrow_mut();
			pending.before_paint.extend(before_paint);
			pending.after_paint.extend(after_paint);
		}
		for effect in synchronous {
			effect(self);
		}
	}

	/// Updates the model until the message queue is empty.
	fn drain(&self) {
		let span = trace_span!("drain");
		let _enter = span.enter();

		self.draining.set(true);
		loop {
			let next = self.messages.borrow_mut().pop_front();
			let (msg, immediate) = match next {
				Some(next) => next,
				None => break,
			};
			if !self.mounted.get() {
				break;
			}
			if immediate {
				self.immediate.set(true);
			}
			let effects = {
				let mut core = self.core.borrow_mut();
				let model = core.model.take().unwrap_or_else(|| unreachable!("vdom-reconcile bug: Model is missing during drain."));
				let (model, effects) = self.app.update(model, msg);
				core.model = Some(model);
				effects
			};
			self.dirty.set(true);
			self.run(effects);
		}
		self.draining.set(false);
		trace!("Cascade settled.");
	}

	/// Renders now or schedules a render, depending on whether an immediate render was requested.
	fn settle(&self) {
		if !self.mounted.get() || !self.dirty.get() {
			return;
		}
		if self.immediate.replace(false) {
			if let Some(frame) = self.frame.take() {
				trace!("Cancelling scheduled render.");
				self.platform.cancel_frame(frame);
			}
			self.render();
		} else if self.frame.get().is_none() {
			let this = self.this.clone();
			let frame = self.platform.request_frame(Box::new(move || {
				if let Some(shared) = this.upgrade() {
					shared.frame.set(None);
					shared.render();
				}
			}));
			self.frame.set(Some(frame));
		}
	}

	#[instrument(skip(self))]
	fn render(&self) {
		if !self.mounted.get() {
			return;
		}
		self.dirty.set(false);
		{
			let mut core = self.core.borrow_mut();
			let core = &mut *core;
			let model = core.model.as_ref().unwrap_or_else(|| unreachable!("vdom-reconcile bug: Model is missing during render."));
			let tree = self.app.view(model);
			let (patch, events) = diff(mem::take(&mut core.events), &core.tree, &tree);
			core.events = events;
			if !patch.is_empty() {
				core.reconciler.apply(&patch);
			}
			core.tree = tree;
		}
		// Events fired synchronously by the mutations were queued meanwhile.
		self.process_signals();

		let Pending { before_paint, after_paint } = mem::take(&mut *self.pending.borrow_mut());
		if !before_paint.is_empty() {
			let this = self.this.clone();
			self.platform.queue_microtask(Box::new(move || {
				if let Some(shared) = this.upgrade() {
					shared.tick(Effects {
						synchronous: before_paint,
						..Effects::none()
					});
				}
			}));
		}
		if !after_paint.is_empty() {
			let this = self.this.clone();
			self.platform.request_frame(Box::new(move || {
				if let Some(shared) = this.upgrade() {
					shared.tick(Effects {
						synchronous: after_paint,
						..Effects::none()
					});
				}
			}));
		}
	}

	/// Routes queued [`Signal`]s through the reconciler and registry. Postponed while the core is borrowed.
	fn process_signals(&self) {
		loop {
			let routed = {
				let mut core = match self.core.try_borrow_mut() {
					Ok(core) => core,
					Err(_) => return,
				};
				let (node, signal) = match self.signals.borrow_mut().pop_front() {
					Some(next) => next,
					None => return,
				};
				let core = &mut *core;
				core.reconciler.receive(node, signal).and_then(|routed| {
					let immediate = routed.shape.immediate;
					core.events
						.handle(&routed.path, &routed.event.name, &routed.event)
						.map(|msg| (msg, immediate))
				})
			};
			if let Some((msg, immediate)) = routed {
				self.dispatch(msg, immediate);
			}
		}
	}
}

impl<A: Application, H: Host> Actions<A::Msg> for Shared<A, H> {
	fn dispatch(&self, msg: A::Msg, immediate: bool) {
		Shared::dispatch(self, msg, immediate);
	}

	fn emit(&self, name: &str, data: Value) {
		match self.core.try_borrow() {
			Ok(core) => core.reconciler.host().emit(&self.root, name, &data),
			Err(_) => warn!(name, "Can't emit while rendering."),
		}
		// Listeners on the mount container may have fired.
		self.process_signals();
	}

	fn root(&self) -> &dyn Any {
		&self.root
	}

	fn provide(&self, key: &str, value: Value) {
		self.provided.borrow_mut().insert(key.to_owned(), value);
	}
}
