// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The Packet Header Vector store.

use super::checksum::CsumResults;
use alloc::vec::Vec;
use deparser_api::DeparserError;
use deparser_api::PHV_ADDR_SPACE;
use deparser_api::PhvAddr;
use deparser_api::PhvKind;

/// The PHV of a single packet: every ordinary and tagalong container,
/// each either invalid or holding a value of its width.
///
/// The PHV belongs to the caller; the deparser only reads it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Phv {
    vals: Vec<Option<u32>>,
}

impl Default for Phv {
    fn default() -> Self {
        Self::new()
    }
}

impl Phv {
    /// A PHV with every container invalid.
    pub fn new() -> Self {
        Self { vals: vec![None; PHV_ADDR_SPACE] }
    }

    /// Write `val` to `addr` and mark it valid. The value is truncated
    /// to the width of the container.
    ///
    /// Checksum read-back sources are produced by the deparser and
    /// cannot be written.
    pub fn set(&mut self, addr: PhvAddr, val: u32) -> Result<(), DeparserError> {
        if let PhvKind::Checksum(_) = addr.kind() {
            return Err(DeparserError::BadPhvAddr(addr.raw()));
        }

        self.vals[addr.idx()] = Some(val & addr.width().mask());
        Ok(())
    }

    pub fn invalidate(&mut self, addr: PhvAddr) {
        self.vals[addr.idx()] = None;
    }

    /// Invalidate every container.
    pub fn clear(&mut self) {
        self.vals.iter_mut().for_each(|v| *v = None);
    }

    /// The value of `addr`, if valid.
    pub fn get(&self, addr: PhvAddr) -> Option<u32> {
        self.vals[addr.idx()]
    }

    pub fn is_valid(&self, addr: PhvAddr) -> bool {
        self.get(addr).is_some()
    }

    /// The value of `addr`, reading an invalid container as zero.
    pub fn read(&self, addr: PhvAddr) -> u32 {
        self.get(addr).unwrap_or(0)
    }

    /// Iterate the valid containers in address order.
    pub fn iter(&self) -> impl Iterator<Item = (PhvAddr, u32)> + '_ {
        self.vals.iter().enumerate().filter_map(|(i, v)| {
            let val = (*v)?;
            let addr = PhvAddr::new(i as u16).ok()?;
            Some((addr, val))
        })
    }
}

/// The sources a deparse call can read: the PHV plus the checksum
/// engine read-back range.
#[derive(Clone, Copy)]
pub struct PhvView<'a> {
    phv: &'a Phv,
    csum: &'a CsumResults,
}

impl<'a> PhvView<'a> {
    pub fn new(phv: &'a Phv, csum: &'a CsumResults) -> Self {
        Self { phv, csum }
    }

    pub fn phv(&self) -> &'a Phv {
        self.phv
    }

    /// The value of `addr`. A checksum source is valid when its engine
    /// has anything to sum.
    pub fn get(&self, addr: PhvAddr) -> Option<u32> {
        match addr.kind() {
            PhvKind::Checksum(engine) => {
                self.csum.get(engine).map(|r| u32::from(r.csum))
            }

            _ => self.phv.get(addr),
        }
    }

    /// Append the big-endian bytes of `addr` to `out`, each container
    /// contributing its full width and an invalid one reading as
    /// zeros.
    pub fn put_be(&self, addr: PhvAddr, out: &mut Vec<u8>) {
        let val = self.get(addr).unwrap_or(0);
        let bytes = val.to_be_bytes();
        out.extend_from_slice(&bytes[4 - addr.width().bytes()..]);
    }
}
