//! Host-agnostic events as seen by listeners.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A native event, converted by the [`Host`](`crate::host::Host`) that observed it.
///
/// `id` identifies the native event object: the same native event reaching several listeners carries the same `id`,
/// and later events carry larger ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	pub id: u64,
	pub name: String,
	/// Milliseconds on the host's clock.
	pub timestamp: f64,
	/// Event payload, e.g. `{"target": {"value": "…"}}` for `input` events.
	pub data: Value,
}

impl Event {
	#[must_use]
	pub fn new(id: u64, name: impl Into<String>, timestamp: f64, data: Value) -> Self {
		Self {
			id,
			name: name.into(),
			timestamp,
			data,
		}
	}

	/// Looks up a dotted path like `target.value` in the payload.
	#[must_use]
	pub fn get(&self, path: &str) -> Option<&Value> {
		path.split('.').filter(|segment| !segment.is_empty()).try_fold(&self.data, |value, segment| value.get(segment))
	}

	/// Copies only the listed dotted paths out of the payload, preserving their nesting.
	///
	/// Missing paths are skipped.
	#[must_use]
	pub fn project(&self, include: &[String]) -> Value {
		let mut projected = Map::new();
		for path in include {
			let value = match self.get(path) {
				Some(value) => value.clone(),
				None => continue,
			};

			let mut segments = path.split('.').filter(|segment| !segment.is_empty()).peekable();
			let mut object = &mut projected;
			while let Some(segment) = segments.next() {
				if segments.peek().is_none() {
					object.insert(segment.to_owned(), value);
					break;
				}
				let entry = object.entry(segment.to_owned()).or_insert_with(|| Value::Object(Map::new()));
				if !entry.is_object() {
					*entry = Value::Object(Map::new());
				}
				object = match entry {
					Value::Object(object) => object,
					_ => unreachable!(),
				};
			}
		}
		Value::Object(projected)
	}
}
