// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

pub mod ipv4;

// Let's make our lives easier and pub use a bunch of stuff.
pub use deparser::api::*;
pub use deparser::engine::Deparser;
pub use deparser::engine::Packet;
pub use deparser::engine::Phv;
pub use deparser::engine::counter::Counter;
pub use deparser::engine::counter::CounterBank;
pub use deparser::engine::disposition::Disposition;
pub use deparser::engine::disposition::DropReason;
pub use deparser::engine::disposition::MgidTable;
pub use deparser::engine::packet::EgressOut;
pub use deparser::engine::packet::IngressOut;
pub use deparser::provider::ChipProvider;
pub use deparser::provider::LogLevel;
pub use deparser::provider::LogProvider;
pub use deparser::provider::Providers;
pub use deparser::provider::StaticChip;
pub use std::sync::Arc;
pub use std::sync::Mutex;

/// Expects a disposition, printing the whole output otherwise.
#[macro_export]
macro_rules! expect_disposition {
    ($out:expr, $disp:pat) => {
        assert!(
            matches!($out.disposition, $disp),
            "expected {}, got {:?}",
            stringify!($disp),
            $out
        );
    };
}

/// A log provider which keeps every message for later inspection.
#[derive(Clone, Default)]
pub struct CaptureLog {
    msgs: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl CaptureLog {
    /// The messages logged so far.
    pub fn msgs(&self) -> Vec<(LogLevel, String)> {
        self.msgs.lock().unwrap().clone()
    }

    /// The number of messages logged at `level`.
    pub fn count(&self, level: LogLevel) -> usize {
        self.msgs.lock().unwrap().iter().filter(|(l, _)| *l == level).count()
    }
}

impl LogProvider for CaptureLog {
    fn log(&self, level: LogLevel, msg: &str) {
        self.msgs.lock().unwrap().push((level, msg.to_string()));
    }
}

/// A [`StaticChip`] the test keeps a handle to after giving it to a
/// [`Deparser`].
#[derive(Clone)]
pub struct SharedChip(pub Arc<StaticChip>);

impl ChipProvider for SharedChip {
    fn is_valid_port(&self, port: u16) -> bool {
        self.0.is_valid_port(port)
    }

    fn pipe_mask(&self) -> u8 {
        self.0.pipe_mask()
    }

    fn ibuf_discard(&self, port: u16) {
        self.0.ibuf_discard(port)
    }
}

/// Everything a test needs to poke at around a [`Deparser`].
pub struct Harness {
    pub dp: Deparser,
    pub log: CaptureLog,
    pub chip: SharedChip,
}

/// Build a deparser for pipe 0 of a chip with `num_pipes` pipes.
pub fn harness(cfg: DeparserCfg, num_pipes: u8) -> Harness {
    let log = CaptureLog::default();
    let chip = SharedChip(Arc::new(StaticChip::new(num_pipes)));
    let providers = Providers {
        log: Box::new(log.clone()),
        chip: Box::new(chip.clone()),
    };
    let dp = Deparser::new(0, cfg, providers).unwrap();
    Harness { dp, log, chip }
}

/// Build a PHV from a list of container values.
pub fn phv_with(vals: &[(PhvAddr, u32)]) -> Phv {
    let mut phv = Phv::new();
    for (addr, val) in vals {
        phv.set(*addr, *val).unwrap();
    }
    phv
}
