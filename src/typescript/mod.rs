//! TypeScript emission.
//!
//! [`bindings`] plans every client method once; [`client`] renders the classes
//! that call the transport and [`types`] renders the declarations they use.

pub mod bindings;
pub mod client;
pub mod mapping;
pub mod types;

/// First lines of every generated TypeScript file.
pub const GENERATED_HEADER: &str = "\
// This file is generated by client-from-source. Do not edit by hand.
/* eslint-disable */

";
