// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Providers plug the services the deparser needs from the rest of
//! the chip model into the engine. Logging is one; knowledge of which
//! ports and pipes exist is another. Neither is the deparser's to
//! decide, and both have at least two obvious implementations: the
//! full chip model and a unit test.

use alloc::boxed::Box;
use core::fmt;
use core::fmt::Display;

/// The set of all providers required by a [`Deparser`].
///
/// [`Deparser`]: crate::engine::Deparser
pub struct Providers {
    pub log: Box<dyn LogProvider>,
    pub chip: Box<dyn ChipProvider>,
}

/// A logging provider provides the means to log messages to some
/// destination based on the context in which the deparser is running.
///
/// Logging levels are provided by [`LogLevel`].
pub trait LogProvider: Send + Sync {
    /// Log a message at the specified level.
    fn log(&self, level: LogLevel, msg: &str);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Note,
    Warn,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let level_s = match self {
            Self::Note => "[NOTE]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERROR]",
        };
        write!(f, "{level_s}")
    }
}

#[cfg(any(feature = "std", test))]
#[derive(Clone, Copy)]
pub struct PrintlnLog;

#[cfg(any(feature = "std", test))]
impl LogProvider for PrintlnLog {
    fn log(&self, level: LogLevel, msg: &str) {
        println!("{level} {msg}");
    }
}

/// What the deparser needs to know about the chip around it.
///
/// Port numbering, the set of pipes present, and the ingress buffer
/// all belong to other blocks of the chip model.
pub trait ChipProvider: Send + Sync {
    /// Is `port` a port which exists on this chip?
    fn is_valid_port(&self, port: u16) -> bool;

    /// The bitmask of pipes present in the system.
    fn pipe_mask(&self) -> u8;

    /// Account for an ingress packet from `port` which the deparser
    /// dropped.
    fn ibuf_discard(&self, port: u16);
}

/// The number of ports each pipe of a [`StaticChip`] carries.
#[cfg(any(feature = "std", test))]
pub const STATIC_PORTS_PER_PIPE: u16 = 72;

/// A chip with a fixed port layout: port numbers are `pipe << 7 |
/// local`, and a port is valid when its pipe is present and `local`
/// is below [`STATIC_PORTS_PER_PIPE`].
#[cfg(any(feature = "std", test))]
pub struct StaticChip {
    pipe_mask: u8,
    ibuf_discards: std::vec::Vec<core::sync::atomic::AtomicU64>,
}

#[cfg(any(feature = "std", test))]
impl StaticChip {
    /// A chip with pipes `0..num_pipes` present.
    pub fn new(num_pipes: u8) -> Self {
        let pipe_mask = if num_pipes >= 8 {
            u8::MAX
        } else {
            (1u8 << num_pipes) - 1
        };
        Self::with_mask(pipe_mask)
    }

    pub fn with_mask(pipe_mask: u8) -> Self {
        let ibuf_discards = (0..=0x1FF)
            .map(|_| core::sync::atomic::AtomicU64::new(0))
            .collect();
        Self { pipe_mask, ibuf_discards }
    }

    /// The number of ingress buffer discards recorded for `port`.
    pub fn ibuf_discards(&self, port: u16) -> u64 {
        self.ibuf_discards[usize::from(port & 0x1FF)]
            .load(core::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(any(feature = "std", test))]
impl ChipProvider for StaticChip {
    fn is_valid_port(&self, port: u16) -> bool {
        let pipe = port >> 7;
        let local = port & 0x7F;
        pipe < 8
            && self.pipe_mask & (1 << pipe) != 0
            && local < STATIC_PORTS_PER_PIPE
    }

    fn pipe_mask(&self) -> u8 {
        self.pipe_mask
    }

    fn ibuf_discard(&self, port: u16) {
        self.ibuf_discards[usize::from(port & 0x1FF)]
            .fetch_add(1, core::sync::atomic::Ordering::Relaxed);
    }
}
