#![doc(html_root_url = "https://docs.rs/vdom-reconcile/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! A keyed virtual DOM differ, patch reconciler and paint-synchronized update scheduler.
//!
//! - [`node`] and [`attribute`] describe immutable view trees.
//! - [`diff`] compares two trees into a [`Patch`], carrying the [`Events`] registry along.
//! - [`reconcile`] applies patches to a [`Host`] through a shadow tree and routes native events back.
//! - [`runtime`] drives an [`Application`] on a [`Platform`]'s microtask, frame and timer lanes.
//! - [`wire`] and [`remote`] move patches across a process boundary as JSON.
//!
//! [`memory`] and [`ManualPlatform`] stand in for the browser outside of it, [`web`] is the real thing.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod attribute;
pub mod diff;
pub mod effect;
pub mod event;
pub mod events;
pub mod host;
pub mod load;
pub mod memory;
pub mod node;
pub mod patch;
pub mod path;
pub mod platform;
pub mod reconcile;
pub mod remote;
pub mod runtime;
pub mod web;
pub mod wire;

pub use crate::{
	attribute::{Attribute, EventListener},
	diff::diff,
	effect::{Actions, Effects},
	event::Event,
	events::Events,
	host::Host,
	memory::MemoryDom,
	node::Node,
	patch::{Change, Patch},
	path::Path,
	platform::{ManualPlatform, Platform},
	reconcile::Reconciler,
	remote::RemoteClient,
	runtime::{Application, Runtime, RuntimeConfig},
};
