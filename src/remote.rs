//! The applying side of remote rendering: a [`Reconciler`] fed with [`wire`](`crate::wire`) patches.
//!
//! The application runs elsewhere (with its own [`Events`](`crate::events::Events`)) and only sends patches.
//! Fired listeners are reported back as [`ClientMessage`]s.

use crate::{
	host::Host,
	platform::Platform,
	reconcile::{NodeId, Reconciler, Signal, Sink},
	wire::{ClientMessage, WirePatch},
};
use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use std::{
	collections::VecDeque,
	rc::{Rc, Weak},
};
use tracing::{instrument, trace};

struct Inner<H: Host> {
	reconciler: RefCell<Reconciler<H>>,
	signals: RefCell<VecDeque<(NodeId, Signal)>>,
	send: Box<dyn Fn(ClientMessage)>,
}

pub struct RemoteClient<H: Host> {
	inner: Rc<Inner<H>>,
}

impl<H: Host> Debug for RemoteClient<H> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("RemoteClient")
			.field("reconciler", &self.inner.reconciler)
			.finish_non_exhaustive()
	}
}

impl<H: Host> RemoteClient<H> {
	/// Takes over `root`, removing its current children: the first patch is expected to be diffed against an empty tree.
	pub fn new(host: H, platform: Rc<dyn Platform>, root: H::Node, send: impl 'static + Fn(ClientMessage)) -> Self {
		let inner = Rc::new_cyclic(|this: &Weak<Inner<H>>| {
			let target = this.clone();
			let sink: Sink = Rc::new(move |node, signal| {
				if let Some(inner) = target.upgrade() {
					inner.signals.borrow_mut().push_back((node, signal));
					inner.process_signals();
				}
			});
			for child in host.child_nodes(&root) {
				host.remove_child(&root, &child);
			}
			Inner {
				reconciler: RefCell::new(Reconciler::new(host, platform, root, sink)),
				signals: RefCell::new(VecDeque::new()),
				send: Box::new(send),
			}
		});
		Self { inner }
	}

	#[instrument(skip_all)]
	pub fn apply(&self, patch: WirePatch) {
		self.inner.reconciler.borrow_mut().apply(&patch.into_patch::<()>());
		self.inner.process_signals();
	}

	pub fn apply_json(&self, json: &str) -> Result<(), serde_json::Error> {
		self.apply(serde_json::from_str(json)?);
		Ok(())
	}

	pub fn with_reconciler<R>(&self, f: impl FnOnce(&Reconciler<H>) -> R) -> R {
		f(&self.inner.reconciler.borrow())
	}

	/// Unbinds all listeners and cancels pending debounce timers.
	pub fn teardown(&self) {
		self.inner.signals.borrow_mut().clear();
		self.inner.reconciler.borrow_mut().teardown();
	}
}

impl<H: Host> Inner<H> {
	fn process_signals(&self) {
		loop {
			let message = {
				let mut reconciler = match self.reconciler.try_borrow_mut() {
					Ok(reconciler) => reconciler,
					Err(_) => return,
				};
				let (node, signal) = match self.signals.borrow_mut().pop_front() {
					Some(next) => next,
					None => return,
				};
				reconciler.receive(node, signal).map(|routed| ClientMessage::from_routed(&routed))
			};
			if let Some(message) = message {
				trace!(path = %message.path, name = message.name.as_str(), "Sending client message.");
				(self.send)(message);
			}
		}
	}
}
