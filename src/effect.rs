//! Side effects returned from updates, sorted into the three scheduling lanes.

use core::{
	any::Any,
	fmt::{self, Debug, Formatter},
};
use serde_json::Value;

/// What an [`Effect`] may do to the running application.
pub trait Actions<Msg> {
	/// Queues `msg`. With `immediate`, the resulting state renders synchronously instead of on the next frame.
	fn dispatch(&self, msg: Msg, immediate: bool);
	/// Raises a custom event on the mount container.
	fn emit(&self, name: &str, data: Value);
	/// The mount container, as the host's node type.
	fn root(&self) -> &dyn Any;
	/// Publishes `value` for the embedding environment, see [`Runtime::provided`](`crate::runtime::Runtime::provided`).
	fn provide(&self, key: &str, value: Value);
}

pub type Effect<Msg> = Box<dyn FnOnce(&dyn Actions<Msg>)>;

/// Effects to run at three points relative to a state change:
///
/// - `synchronous` right after the update, before rendering,
/// - `before_paint` after the DOM was patched but before the browser paints,
/// - `after_paint` in the animation frame after the patched DOM was painted.
pub struct Effects<Msg> {
	pub synchronous: Vec<Effect<Msg>>,
	pub before_paint: Vec<Effect<Msg>>,
	pub after_paint: Vec<Effect<Msg>>,
}

impl<Msg: 'static> Default for Effects<Msg> {
	fn default() -> Self {
		Self::none()
	}
}

impl<Msg> Debug for Effects<Msg> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Effects")
			.field("synchronous", &self.synchronous.len())
			.field("before_paint", &self.before_paint.len())
			.field("after_paint", &self.after_paint.len())
			.finish()
	}
}

impl<Msg: 'static> Effects<Msg> {
	#[must_use]
	pub fn none() -> Self {
		Self {
			synchronous: Vec::new(),
			before_paint: Vec::new(),
			after_paint: Vec::new(),
		}
	}

	#[must_use]
	pub fn synchronous(effect: impl 'static + FnOnce(&dyn Actions<Msg>)) -> Self {
		Self {
			synchronous: vec![Box::new(effect)],
			..Self::none()
		}
	}

	#[must_use]
	pub fn before_paint(effect: impl 'static + FnOnce(&dyn Actions<Msg>)) -> Self {
		Self {
			before_paint: vec![Box::new(effect)],
			..Self::none()
		}
	}

	#[must_use]
	pub fn after_paint(effect: impl 'static + FnOnce(&dyn Actions<Msg>)) -> Self {
		Self {
			after_paint: vec![Box::new(effect)],
			..Self::none()
		}
	}

	/// Dispatches `msg` as soon as the current update finished.
	#[must_use]
	pub fn message(msg: Msg) -> Self {
		Self::synchronous(move |actions| actions.dispatch(msg, false))
	}

	#[must_use]
	pub fn batch(effects: impl IntoIterator<Item = Self>) -> Self {
		effects.into_iter().fold(Self::none(), Self::and)
	}

	/// Appends `other`'s effects, lane by lane.
	#[must_use]
	pub fn and(mut self, other: Self) -> Self {
		self.synchronous.extend(other.synchronous);
		self.before_paint.extend(other.before_paint);
		self.after_paint.extend(other.after_paint);
		self
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.synchronous.is_empty() && self.before_paint.is_empty() && self.after_paint.is_empty()
	}

	/// Converts the message type, e.g. to embed a component's effects in its parent's.
	pub fn map<Out: 'static>(self, mapper: impl 'static + Fn(Msg) -> Out) -> Effects<Out> {
		let mapper = std::rc::Rc::new(mapper);
		let lane = |effects: Vec<Effect<Msg>>| -> Vec<Effect<Out>> {
			effects
				.into_iter()
				.map(|effect| {
					let mapper = std::rc::Rc::clone(&mapper);
					Box::new(move |actions: &dyn Actions<Out>| effect(&Mapped { actions, mapper: &*mapper })) as Effect<Out>
				})
				.collect()
		};
		Effects {
			synchronous: lane(self.synchronous),
			before_paint: lane(self.before_paint),
			after_paint: lane(self.after_paint),
		}
	}
}

struct Mapped<'a, Out, F> {
	actions: &'a dyn Actions<Out>,
	mapper: &'a F,
}

impl<'a, Msg, Out, F: Fn(Msg) -> Out> Actions<Msg> for Mapped<'a, Out, F> {
	fn dispatch(&self, msg: Msg, immediate: bool) {
		self.actions.dispatch((self.mapper)(msg), immediate);
	}

	fn emit(&self, name: &str, data: Value) {
		self.actions.emit(name, data);
	}

	fn root(&self) -> &dyn Any {
		self.actions.root()
	}

	fn provide(&self, key: &str, value: Value) {
		self.actions.provide(key, value);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use core::cell::RefCell;

	#[derive(Default)]
	struct Recorder {
		dispatched: RefCell<Vec<(u32, bool)>>,
	}

	impl Actions<u32> for Recorder {
		fn dispatch(&self, msg: u32, immediate: bool) {
			self.dispatched.borrow_mut().push((msg, immediate));
		}
		fn emit(&self, _: &str, _: Value) {}
		fn root(&self) -> &dyn Any {
			&()
		}
		fn provide(&self, _: &str, _: Value) {}
	}

	#[test]
	fn mapped_effects_convert_messages() {
		let effects = Effects::batch(vec![Effects::message(1_u8), Effects::after_paint(|actions| actions.dispatch(2, true))]).map(|msg| u32::from(msg) * 10);
		assert_eq!(effects.synchronous.len(), 1);
		assert_eq!(effects.after_paint.len(), 1);

		let recorder = Recorder::default();
		for effect in effects.synchronous.into_iter().chain(effects.after_paint) {
			effect(&recorder);
		}
		assert_eq!(*recorder.dispatched.borrow(), vec![(10, false), (20, true)]);
	}

	#[test]
	fn default_has_no_effects() {
		let effects = Effects::<u32>::default();
		assert!(effects.synchronous.is_empty() && effects.before_paint.is_empty() && effects.after_paint.is_empty());
	}
}
