// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Configuration errors.
//!
//! Deparsing itself never fails; every problem a caller can run into
//! happens while writing configuration.

use super::meta::MetaField;
use core::fmt;
use core::fmt::Display;
use serde::Serialize;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum DeparserError {
    /// A raw value does not name a container or pseudo source.
    BadPhvAddr(u16),

    /// A POV position names something other than an 8-bit container.
    BadPovSource { byte: usize, addr: u16 },

    /// A table index is beyond the size of the table.
    IndexOutOfRange { table: &'static str, idx: usize, max: usize },

    /// A table holds more entries than the hardware provides.
    TableTooLarge { table: &'static str, len: usize, max: usize },

    /// An FDE length outside of 1..=4 on a valid entry.
    BadFdeLength { idx: usize, len: u8 },

    /// A metadata spec wider than the field it feeds.
    MetaTooWide { field: MetaField, width: u8, max: u8 },

    /// A metadata spec reaching beyond bit 31 of its source.
    MetaOutOfBounds { field: MetaField, shift: u8, width: u8 },

    /// A metadata default that does not fit in the field.
    MetaDefaultTooWide { field: MetaField, default: u32 },

    /// A clone header whose length exceeds what the table allows.
    BadCloneLength { table: &'static str, len: u16, max: u16 },

    /// Lookup of a counter by a name that does not exist.
    NoSuchCounter,
}

impl Display for DeparserError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadPhvAddr(addr) => {
                write!(f, "bad PHV address: {addr}")
            }

            Self::BadPovSource { byte, addr } => {
                write!(f, "POV byte {byte}: {addr} is not an 8-bit container")
            }

            Self::IndexOutOfRange { table, idx, max } => {
                write!(f, "{table} index {idx} out of range (max {max})")
            }

            Self::TableTooLarge { table, len, max } => {
                write!(f, "{table} has {len} entries (max {max})")
            }

            Self::BadFdeLength { idx, len } => {
                write!(f, "FDE {idx}: bad length {len}")
            }

            Self::MetaTooWide { field, width, max } => {
                write!(f, "{field}: width {width} exceeds field width {max}")
            }

            Self::MetaOutOfBounds { field, shift, width } => {
                write!(f, "{field}: bits {shift}+{width} exceed 32-bit source")
            }

            Self::MetaDefaultTooWide { field, default } => {
                write!(f, "{field}: default {default:#x} does not fit")
            }

            Self::BadCloneLength { table, len, max } => {
                write!(f, "{table}: header length {len} exceeds {max}")
            }

            Self::NoSuchCounter => write!(f, "no such counter"),
        }
    }
}

#[cfg(any(feature = "std", test))]
impl std::error::Error for DeparserError {}
