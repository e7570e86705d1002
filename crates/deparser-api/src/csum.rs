// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Checksum engine configuration.

use super::DeparserError;
use super::phv::PhvAddr;
use super::phv::PhvKind;
use alloc::vec::Vec;
use serde::Deserialize;
use serde::Serialize;

/// One container feeding a checksum engine.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CsumEntryCfg {
    pub addr: PhvAddr,
    #[serde(default = "enabled_default")]
    pub enabled: bool,

    /// Swap the bytes of each 16-bit word before summing.
    #[serde(default)]
    pub swap: bool,

    /// Sum into the verify accumulator rather than the compute one.
    #[serde(default)]
    pub verify: bool,
}

fn enabled_default() -> bool {
    true
}

impl CsumEntryCfg {
    pub fn new(addr: PhvAddr) -> Self {
        Self { addr, enabled: true, swap: false, verify: false }
    }

    /// Unpack the per-container control byte: bit 0 enable, bit 1
    /// swap, bit 2 verify.
    pub fn from_raw(addr: PhvAddr, raw: u8) -> Self {
        Self {
            addr,
            enabled: raw & 0x1 != 0,
            swap: raw & 0x2 != 0,
            verify: raw & 0x4 != 0,
        }
    }

    pub fn to_raw(&self) -> u8 {
        u8::from(self.enabled)
            | (u8::from(self.swap) << 1)
            | (u8::from(self.verify) << 2)
    }
}

/// The container list of a single checksum engine.
///
/// Entries naming ordinary and tagalong containers share one list;
/// the address says which namespace an entry reads.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct CsumEngineCfg {
    pub entries: Vec<CsumEntryCfg>,
}

impl CsumEngineCfg {
    /// Write the control byte for `addr`, replacing any existing
    /// entry for that container.
    pub fn write_entry(&mut self, addr: PhvAddr, raw: u8) {
        let entry = CsumEntryCfg::from_raw(addr, raw);
        match self.entries.iter_mut().find(|e| e.addr == addr) {
            Some(e) => *e = entry,
            None => self.entries.push(entry),
        }
    }

    /// The ordinary-namespace entries.
    pub fn phv_entries(&self) -> impl Iterator<Item = &CsumEntryCfg> {
        self.entries.iter().filter(|e| !e.addr.is_tagalong())
    }

    /// The tagalong-namespace entries.
    pub fn tphv_entries(&self) -> impl Iterator<Item = &CsumEntryCfg> {
        self.entries.iter().filter(|e| e.addr.is_tagalong())
    }

    pub fn validate(&self) -> Result<(), DeparserError> {
        // An engine may not sum its own (or another engine's) output.
        for e in &self.entries {
            if let PhvKind::Checksum(_) = e.addr.kind() {
                return Err(DeparserError::BadPhvAddr(e.addr.raw()));
            }
        }

        Ok(())
    }
}
