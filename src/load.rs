//! Adopting markup that already exists in the mount container, e.g. from server-side rendering.

use crate::{
	attribute::{attribute, Attribute},
	host::{Described, Host},
	node::{fragment, namespaced, text, Node, NodeKind},
	reconcile::{NodeId, Reconciler},
};
use tracing::{instrument, trace, warn};

/// Converts the mount container's current children into a VDOM fragment and builds the matching shadow tree,
/// so that the first render only patches what differs.
///
/// Comments and other nodes without VDOM counterpart are removed from the live tree.
/// Only markup is virtualized. Live form state like a field's current `value` stays out of the tree,
/// so the first render leaves input typed before mounting alone unless the view sets it.
#[instrument(skip_all)]
pub fn virtualize<H: Host, Msg>(reconciler: &mut Reconciler<H>) -> Node<Msg> {
	let root_id = reconciler.root_id();
	let root = reconciler.root().clone();
	let children = load_child_nodes(reconciler, root_id, &root);
	trace!(count = children.len(), "Virtualized existing children.");
	fragment(children)
}

fn load_child_nodes<H: Host, Msg>(reconciler: &mut Reconciler<H>, parent: NodeId, live: &H::Node) -> Vec<Node<Msg>> {
	let mut nodes = Vec::new();
	for child in reconciler.host().child_nodes(live) {
		match reconciler.host().describe(&child) {
			Described::Element {
				namespace,
				tag,
				attributes,
			} => {
				let id = reconciler.adopt(parent, NodeKind::Element, child.clone());
				let children = load_child_nodes(reconciler, id, &child);
				nodes.push(namespaced(namespace, tag, load_attributes(attributes), children));
			}
			Described::Text(content) => {
				reconciler.adopt(parent, NodeKind::Text, child);
				nodes.push(text(content));
			}
			Described::Other => {
				warn!(node = ?child, "Removing unrecognised child node.");
				reconciler.host().remove_child(live, &child);
			}
		}
	}
	nodes
}

fn load_attributes<Msg>(attributes: Vec<(String, String)>) -> Vec<Attribute<Msg>> {
	attributes.into_iter().map(|(name, value)| attribute(name, value)).collect()
}
