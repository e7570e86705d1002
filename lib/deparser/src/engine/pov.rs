// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Packet-Of-Validity resolution.

use super::phv::Phv;
use core::fmt;
use deparser_api::POV_BYTES;
use deparser_api::PovPositionTable;

/// The resolved 256-bit POV of one packet.
///
/// Bit `n` lives in bit `n % 8` of byte `n / 8`, byte `k` being the
/// value of the container configured for POV byte `k`.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct Pov {
    bytes: [u8; POV_BYTES],
}

impl Pov {
    /// Read each configured POV byte out of `phv`. Unconfigured bytes
    /// and invalid containers contribute zero bits.
    pub fn resolve(tbl: &PovPositionTable, phv: &Phv) -> Self {
        let mut bytes = [0u8; POV_BYTES];
        for (byte, src) in bytes.iter_mut().zip(tbl.bytes.iter()) {
            if let Some(addr) = src {
                *byte = phv.read(*addr) as u8;
            }
        }
        Self { bytes }
    }

    pub fn is_set(&self, bit: u8) -> bool {
        let bit = usize::from(bit);
        (self.bytes[bit / 8] >> (bit % 8)) & 1 == 1
    }

    pub fn bytes(&self) -> &[u8; POV_BYTES] {
        &self.bytes
    }
}

impl fmt::Debug for Pov {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pov(")?;
        // Highest bit first, as a 256-bit number would be written.
        for b in self.bytes.iter().rev() {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use deparser_api::PhvAddr;

    #[test]
    fn resolve_bits() {
        let mut tbl = PovPositionTable::default();
        tbl.set(0, Some(PhvAddr::byte(0, 0))).unwrap();
        tbl.set(31, Some(PhvAddr::byte(0, 1))).unwrap();
        tbl.set(2, Some(PhvAddr::byte(0, 2))).unwrap();

        let mut phv = Phv::new();
        phv.set(PhvAddr::byte(0, 0), 0b0000_0101).unwrap();
        phv.set(PhvAddr::byte(0, 1), 0x80).unwrap();
        // B0.2 is left invalid.

        let pov = Pov::resolve(&tbl, &phv);
        assert!(pov.is_set(0));
        assert!(!pov.is_set(1));
        assert!(pov.is_set(2));
        assert!(pov.is_set(255));
        assert!(!pov.is_set(16));
        let ones: u32 = pov.bytes().iter().map(|b| b.count_ones()).sum();
        assert_eq!(ones, 3);
        assert_eq!(Pov::resolve(&tbl, &phv), pov);
    }
}
