//! # topomap-domain
//!
//! Pure engine for turning a discovered home-automation topology into a
//! canonical, validated, versioned **manifest**.
//!
//! ## Responsibilities
//! - Foundational types: content-addressed identifiers, error conventions, timestamps
//! - Define the **raw topology** handed over by a discovery adapter
//! - Define the canonical **Entities**, **Devices** and **Areas** of a manifest
//! - Describe entity attributes with typed **descriptors** and keep a **service** catalog
//! - **Normalize** a raw topology (dedupe, area inheritance, cycles, orphans)
//! - **Validate** the normalized graph against a versioned schema descriptor
//! - **Build** manifests with a deterministic version bump and checksum
//! - **Encode** manifests to a canonical binary form and a JSON projection
//! - **Diff** manifest generations, **verify** artifacts, **render** templates
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod area;
pub mod descriptor;
pub mod device;
pub mod entity;
pub mod issue;
pub mod manifest;
pub mod schema;
pub mod service;
pub mod topology;

pub mod build;
pub mod codec;
pub mod diff;
pub mod lock;
pub mod normalize;
pub mod projection;
pub mod render;
pub mod stats;
pub mod validate;
pub mod verify;
