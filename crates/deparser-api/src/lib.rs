// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub mod cfg;
pub mod clone;
pub mod csum;
pub mod error;
pub mod fde;
pub mod meta;
pub mod phv;

pub use cfg::*;
pub use clone::*;
pub use csum::*;
pub use error::*;
pub use fde::*;
pub use meta::*;
pub use phv::*;

/// The overall version of the configuration API. Anytime a type in
/// this crate changes shape, this number should increment. Saved
/// configurations carry no version of their own; consumers compare
/// against this value when exchanging configuration out of band.
pub const API_VERSION: u64 = 3;

/// The processing direction of a deparser instance.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Gress {
    Ingress = 0,
    Egress = 1,
}

impl core::str::FromStr for Gress {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ingress" | "in" => Ok(Gress::Ingress),
            "egress" | "out" => Ok(Gress::Egress),
            _ => Err(format!("invalid gress: {}", s)),
        }
    }
}

impl Display for Gress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let gress_str = match self {
            Gress::Ingress => "INGRESS",
            Gress::Egress => "EGRESS",
        };

        write!(f, "{}", gress_str)
    }
}

/// Return a mask covering the low `width` bits of a `u32`.
pub const fn mask32(width: u8) -> u32 {
    if width >= 32 { u32::MAX } else { (1u32 << width) - 1 }
}
