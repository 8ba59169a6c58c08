//! The three scheduling lanes: microtasks (before paint), animation frames (after paint) and timers.
//!
//! Browsers provide these natively ([`web::WebPlatform`](`crate::web::WebPlatform`)).
//! Other targets inject their own draining strategy, for example by driving a [`ManualPlatform`] from their event loop.

use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use std::collections::VecDeque;
use tracing::trace;

pub type Task = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

pub trait Platform {
	/// Wall-clock milliseconds.
	fn now(&self) -> f64;
	/// Runs `task` once the current task completes, before the next paint.
	fn queue_microtask(&self, task: Task);
	/// Runs `task` in the next animation frame.
	fn request_frame(&self, task: Task) -> FrameId;
	fn cancel_frame(&self, frame: FrameId);
	fn set_timeout(&self, delay: u32, task: Task) -> TimerId;
	/// Best-effort. Unknown or already fired timers are ignored.
	fn clear_timeout(&self, timer: TimerId);
}

struct Timer {
	id: TimerId,
	due: f64,
	task: Task,
}

#[derive(Default)]
struct Lanes {
	now: f64,
	next_id: u64,
	microtasks: VecDeque<Task>,
	frames: Vec<(FrameId, Task)>,
	timers: Vec<Timer>,
}

/// A [`Platform`] that only makes progress when told to.
///
/// Like in browsers, microtasks drain after every frame callback and timer.
#[derive(Default)]
pub struct ManualPlatform {
	lanes: RefCell<Lanes>,
}

impl Debug for ManualPlatform {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let lanes = self.lanes.borrow();
		f.debug_struct("ManualPlatform")
			.field("now", &lanes.now)
			.field("microtasks", &lanes.microtasks.len())
			.field("frames", &lanes.frames.len())
			.field("timers", &lanes.timers.len())
			.finish()
	}
}

impl ManualPlatform {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	fn next_id(&self) -> u64 {
		let mut lanes = self.lanes.borrow_mut();
		lanes.next_id += 1;
		lanes.next_id
	}

	#[must_use]
	pub fn pending_microtasks(&self) -> usize {
		self.lanes.borrow().microtasks.len()
	}

	#[must_use]
	pub fn pending_frames(&self) -> usize {
		self.lanes.borrow().frames.len()
	}

	#[must_use]
	pub fn pending_timers(&self) -> usize {
		self.lanes.borrow().timers.len()
	}

	/// Runs microtasks until none are left, including ones queued meanwhile.
	pub fn run_microtasks(&self) -> usize {
		let mut count = 0;
		loop {
			let task = self.lanes.borrow_mut().microtasks.pop_front();
			match task {
				Some(task) => task(),
				None => return count,
			}
			count += 1;
		}
	}

	/// Runs the frame callbacks requested so far. Callbacks requested meanwhile wait for the next frame.
	pub fn run_frame(&self) -> usize {
		self.run_microtasks();
		let frames = std::mem::take(&mut self.lanes.borrow_mut().frames);
		trace!(count = frames.len(), "Running animation frame.");
		let count = frames.len();
		for (_, task) in frames {
			task();
			self.run_microtasks();
		}
		count
	}

	/// Moves the clock forward, firing due timers in order.
	pub fn advance(&self, milliseconds: f64) {
		self.run_microtasks();
		let target = self.lanes.borrow().now + milliseconds;
		loop {
			let timer = {
				let mut lanes = self.lanes.borrow_mut();
				let earliest = lanes
					.timers
					.iter()
					.enumerate()
					.filter(|(_, timer)| timer.due <= target)
					.min_by(|(_, a), (_, b)| a.due.partial_cmp(&b.due).unwrap_or(core::cmp::Ordering::Equal).then(a.id.0.cmp(&b.id.0)))
					.map(|(index, _)| index);
				earliest.map(|index| {
					let timer = lanes.timers.remove(index);
					lanes.now = lanes.now.max(timer.due);
					timer
				})
			};
			match timer {
				Some(timer) => {
					(timer.task)();
					self.run_microtasks();
				}
				None => break,
			}
		}
		self.lanes.borrow_mut().now = target;
	}
}

impl Platform for ManualPlatform {
	fn now(&self) -> f64 {
		self.lanes.borrow().now
	}

	fn queue_microtask(&self, task: Task) {
		self.lanes.borrow_mut().microtasks.push_back(task);
	}

	fn request_frame(&self, task: Task) -> FrameId {
		let id = FrameId(self.next_id());
		self.lanes.borrow_mut().frames.push((id, task));
		id
	}

	fn cancel_frame(&self, frame: FrameId) {
		self.lanes.borrow_mut().frames.retain(|(id, _)| *id != frame);
	}

	fn set_timeout(&self, delay: u32, task: Task) -> TimerId {
		let id = TimerId(self.next_id());
		let mut lanes = self.lanes.borrow_mut();
		let due = lanes.now + f64::from(delay);
		lanes.timers.push(Timer { id, due, task });
		id
	}

	fn clear_timeout(&self, timer: TimerId) {
		self.lanes.borrow_mut().timers.retain(|t| t.id != timer);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::rc::Rc;

	#[test]
	fn lanes_run_in_browser_order() {
		let platform = Rc::new(ManualPlatform::new());
		let log = Rc::new(RefCell::new(Vec::new()));

		let frame_log = Rc::clone(&log);
		let inner_platform = Rc::clone(&platform);
		platform.request_frame(Box::new(move || {
			frame_log.borrow_mut().push("frame");
			let microtask_log = Rc::clone(&frame_log);
			inner_platform.queue_microtask(Box::new(move || microtask_log.borrow_mut().push("microtask after frame")));
			let next_log = Rc::clone(&frame_log);
			inner_platform.request_frame(Box::new(move || next_log.borrow_mut().push("next frame")));
		}));
		let cancelled = platform.request_frame(Box::new(|| panic!("cancelled frame ran")));
		platform.cancel_frame(cancelled);

		assert_eq!(platform.run_frame(), 1);
		assert_eq!(*log.borrow(), vec!["frame", "microtask after frame"]);
		assert_eq!(platform.run_frame(), 1);
		assert_eq!(log.borrow().last(), Some(&"next frame"));
	}

	#[test]
	fn timers_fire_in_due_order() {
		let platform = ManualPlatform::new();
		let log = Rc::new(RefCell::new(Vec::new()));
		for (delay, name) in &[(30, "c"), (10, "a"), (20, "b")] {
			let log = Rc::clone(&log);
			let name = *name;
			platform.set_timeout(*delay, Box::new(move || log.borrow_mut().push(name)));
		}
		let cleared = platform.set_timeout(15, Box::new(|| panic!("cleared timer fired")));
		platform.clear_timeout(cleared);

		platform.advance(25.0);
		assert_eq!(*log.borrow(), vec!["a", "b"]);
		assert!((platform.now() - 25.0).abs() < f64::EPSILON);
		platform.advance(5.0);
		assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
		assert_eq!(platform.pending_timers(), 0);
	}
}
