//! Edit scripts produced by [`diff`](`crate::diff::diff`) and consumed by the [`Reconciler`](`crate::reconcile::Reconciler`).
//!
//! All addressing is by integer index:
//!
//! - [`Change`] indices refer to the live child list at the moment the change is applied (changes apply in order).
//! - [`Patch::index`] of a child patch refers to the parent's child list after all of the parent's changes
//!   and trailing removals were applied.

use crate::{attribute::Attribute, node::Node};
use core::fmt::{self, Debug, Formatter};

pub struct Patch<Msg> {
	/// Position of the patched node within its parent. `0` for the root.
	pub index: usize,
	/// Number of trailing children to remove after `changes` were applied.
	pub removed: usize,
	pub changes: Vec<Change<Msg>>,
	pub children: Vec<Patch<Msg>>,
}

pub enum Change<Msg> {
	ReplaceText {
		content: String,
	},
	ReplaceInnerHtml {
		html: String,
	},
	UpdateAttrs {
		added: Vec<Attribute<Msg>>,
		removed: Vec<Attribute<Msg>>,
	},
	/// Relocates the keyed child `key` in front of the child currently at `before`, without recreating it.
	Move {
		key: String,
		before: usize,
	},
	Replace {
		index: usize,
		with: Node<Msg>,
	},
	Remove {
		index: usize,
	},
	Insert {
		nodes: Vec<Node<Msg>>,
		before: usize,
	},
}

impl<Msg> Patch<Msg> {
	#[must_use]
	pub fn new(index: usize, removed: usize, changes: Vec<Change<Msg>>, children: Vec<Patch<Msg>>) -> Self {
		Self {
			index,
			removed,
			changes,
			children,
		}
	}

	/// Whether applying this patch would do nothing.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.removed == 0 && self.changes.is_empty() && self.children.is_empty()
	}

	/// Total number of changes in this patch and all child patches.
	#[must_use]
	pub fn change_count(&self) -> usize {
		self.changes.len() + self.children.iter().map(Self::change_count).sum::<usize>()
	}
}

impl<Msg> Change<Msg> {
	#[must_use]
	pub fn kind(&self) -> &'static str {
		match self {
			Self::ReplaceText { .. } => "replace-text",
			Self::ReplaceInnerHtml { .. } => "replace-inner-html",
			Self::UpdateAttrs { .. } => "update",
			Self::Move { .. } => "move",
			Self::Replace { .. } => "replace",
			Self::Remove { .. } => "remove",
			Self::Insert { .. } => "insert",
		}
	}
}

impl<Msg> Clone for Patch<Msg> {
	fn clone(&self) -> Self {
		Self {
			index: self.index,
			removed: self.removed,
			changes: self.changes.clone(),
			children: self.children.clone(),
		}
	}
}

impl<Msg> Clone for Change<Msg> {
	fn clone(&self) -> Self {
		match self {
			Self::ReplaceText { content } => Self::ReplaceText { content: content.clone() },
			Self::ReplaceInnerHtml { html } => Self::ReplaceInnerHtml { html: html.clone() },
			Self::UpdateAttrs { added, removed } => Self::UpdateAttrs {
				added: added.clone(),
				removed: removed.clone(),
			},
			Self::Move { key, before } => Self::Move {
				key: key.clone(),
				before: *before,
			},
			Self::Replace { index, with } => Self::Replace {
				index: *index,
				with: with.clone(),
			},
			Self::Remove { index } => Self::Remove { index: *index },
			Self::Insert { nodes, before } => Self::Insert {
				nodes: nodes.clone(),
				before: *before,
			},
		}
	}
}

impl<Msg> Debug for Patch<Msg> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Patch")
			.field("index", &self.index)
			.field("removed", &self.removed)
			.field("changes", &self.changes)
			.field("children", &self.children)
			.finish()
	}
}

impl<Msg> Debug for Change<Msg> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::ReplaceText { content } => f.debug_struct("ReplaceText").field("content", content).finish(),
			Self::ReplaceInnerHtml { html } => f.debug_struct("ReplaceInnerHtml").field("html", html).finish(),
			Self::UpdateAttrs { added, removed } => f.debug_struct("UpdateAttrs").field("added", added).field("removed", removed).finish(),
			Self::Move { key, before } => f.debug_struct("Move").field("key", key).field("before", before).finish(),
			Self::Replace { index, with } => f.debug_struct("Replace").field("index", index).field("with", with).finish(),
			Self::Remove { index } => f.debug_struct("Remove").field("index", index).finish(),
			Self::Insert { nodes, before } => f.debug_struct("Insert").field("nodes", nodes).field("before", before).finish(),
		}
	}
}
