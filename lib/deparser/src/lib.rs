// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The deparser model of a programmable switch pipeline.
//!
//! The deparser sits at the end of each ingress and egress pipeline.
//! It takes the Packet Header Vector (PHV) the match-action stages
//! leave behind and, driven entirely by configuration tables, turns
//! it back into packet bytes plus the sideband metadata consumed by
//! the traffic manager (ingress) or the MAC (egress). Along the way
//! it computes checksums, makes mirror, resubmit and learn copies,
//! decides whether the packet is dropped, and keeps a bank of
//! hardware counters.
//!
//! The per-pipe entry point is [`engine::deparser::Deparser`].

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::len_without_is_empty)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(all(not(feature = "std"), test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

// This is needed so that the counter-macro
// (`#[derive(CounterProvider)]`) can use fully-qualified type paths.
extern crate self as deparser;

pub use deparser_api as api;

pub mod engine;
#[cfg(feature = "std")]
pub mod print;
pub mod provider;
