//! Structural addresses of nodes within a rendered tree.

use core::fmt::{self, Debug, Display, Formatter};
use serde::{Deserialize, Serialize};

/// One step from a node to one of its children.
///
/// Keyed children are addressed by their key, so their [`Path`] survives reordering.
/// Unkeyed children are addressed by their position in the sibling list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Hop {
	Index(u32),
	Key(String),
}

/// Address of a node, relative to the mount root.
///
/// The empty path is the root itself.
/// Comparison and hashing are structural, so keys may contain any characters.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<Hop>);

/// A [`Path`] viewed as its last hop.
#[derive(Debug, PartialEq, Eq)]
pub enum PathRef<'a> {
	Root,
	Key(&'a str, Path),
	Index(u32, Path),
}

impl Path {
	#[must_use]
	pub const fn root() -> Self {
		Self(Vec::new())
	}

	#[must_use]
	pub fn from_hops(hops: Vec<Hop>) -> Self {
		Self(hops)
	}

	#[must_use]
	pub fn into_hops(self) -> Vec<Hop> {
		self.0
	}

	#[must_use]
	pub fn hops(&self) -> &[Hop] {
		&self.0
	}

	#[must_use]
	pub fn is_root(&self) -> bool {
		self.0.is_empty()
	}

	/// Address of the child at `index` with `key` (which may be empty for positional children).
	#[must_use]
	pub fn child(&self, index: usize, key: &str) -> Self {
		let mut hops = Vec::with_capacity(self.0.len() + 1);
		hops.extend_from_slice(&self.0);
		hops.push(if key.is_empty() {
			#[allow(clippy::cast_possible_truncation)]
			Hop::Index(index as u32)
		} else {
			Hop::Key(key.to_owned())
		});
		Self(hops)
	}

	#[must_use]
	pub fn parent(&self) -> Option<Self> {
		self.0.split_last().map(|(_, rest)| Self(rest.to_vec()))
	}

	#[must_use]
	pub fn view(&self) -> PathRef<'_> {
		match self.0.split_last() {
			None => PathRef::Root,
			Some((Hop::Key(key), rest)) => PathRef::Key(key, Self(rest.to_vec())),
			Some((&Hop::Index(index), rest)) => PathRef::Index(index, Self(rest.to_vec())),
		}
	}

	/// Whether `self` is `ancestor` or lies below it.
	#[must_use]
	pub fn starts_with(&self, ancestor: &Self) -> bool {
		self.0.starts_with(&ancestor.0)
	}
}

impl Display for Path {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str("/")?;
		for (i, hop) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str("/")?;
			}
			match hop {
				Hop::Index(index) => write!(f, "{}", index)?,
				Hop::Key(key) => write!(f, "{:?}", key)?,
			}
		}
		Ok(())
	}
}

impl Debug for Path {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "Path({})", self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keys_and_indices_never_collide() {
		let root = Path::root();
		assert_ne!(root.child(1, ""), root.child(0, "1"));
		assert_ne!(root.child(0, "a/b"), root.child(0, "a").child(0, "b"));
	}

	#[test]
	fn recursive_view() {
		let path = Path::root().child(3, "").child(0, "item");
		match path.view() {
			PathRef::Key(key, parent) => {
				assert_eq!(key, "item");
				assert_eq!(parent.view(), PathRef::Index(3, Path::root()));
			}
			other => panic!("Unexpected {:?}", other),
		}
		assert!(path.starts_with(&Path::root().child(3, "")));
		assert_eq!(path.parent().and_then(|p| p.parent()), Some(Path::root()));
	}

	#[test]
	fn wire_form_is_a_flat_list() {
		let path = Path::root().child(2, "").child(0, "k");
		let json = serde_json::to_string(&path).unwrap();
		assert_eq!(json, r#"[2,"k"]"#);
		assert_eq!(serde_json::from_str::<Path>(&json).unwrap(), path);
	}
}
