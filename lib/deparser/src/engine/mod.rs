// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The deparser engine.
//!
//! The modules are listed roughly in the order a deparse call walks
//! through them: the PHV is summed by the checksum engines, the
//! metadata record is extracted, the POV is resolved and the header
//! assembled, and finally the disposition is decided, copies are made
//! and counters are bumped.

pub mod checksum;
pub mod counter;
pub mod deparser;
pub mod disposition;
pub mod fde;
pub mod meta;
pub mod mirror;
pub mod packet;
pub mod phv;
pub mod pov;

pub use deparser::Deparser;
pub use packet::Packet;
pub use phv::Phv;
