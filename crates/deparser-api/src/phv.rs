// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! PHV container addressing.
//!
//! Every container has a stable 9-bit address. The address space is
//! split into the ordinary PHV (words, bytes, halves), a small range
//! of pseudo sources which read back checksum engine results, and the
//! tagalong PHV.
//!
//! ```text
//!   0..64    32-bit words     4 groups x 16
//!  64..128   8-bit bytes      4 groups x 16
//! 128..224   16-bit halves    6 groups x 16
//! 224..230   checksum engines 6
//! 256..288   tagalong words   8 groups x 4
//! 288..320   tagalong bytes   8 groups x 4
//! 320..368   tagalong halves  8 groups x 6
//! ```

use super::DeparserError;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub const PHV_GROUP_SIZE: u16 = 16;
pub const PHV_WORD_BASE: u16 = 0;
pub const PHV_BYTE_BASE: u16 = 64;
pub const PHV_HALF_BASE: u16 = 128;
pub const PHV_NORMAL_END: u16 = 224;

pub const CSUM_BASE: u16 = 224;
pub const CSUM_ENGINES: usize = 6;

pub const TPHV_WORD_BASE: u16 = 256;
pub const TPHV_BYTE_BASE: u16 = 288;
pub const TPHV_HALF_BASE: u16 = 320;
pub const TPHV_END: u16 = 368;

/// The number of tagalong groups, and the containers per group.
pub const TPHV_GROUPS: u16 = 8;
pub const TPHV_WORDS_PER_GROUP: u16 = 4;
pub const TPHV_BYTES_PER_GROUP: u16 = 4;
pub const TPHV_HALVES_PER_GROUP: u16 = 6;

/// The size of the address space, including the unused holes.
pub const PHV_ADDR_SPACE: usize = TPHV_END as usize;

/// Marks an unused source slot in packed register formats.
pub const PHV_ADDR_NONE: u16 = 0x1FF;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum PhvWidth {
    W8,
    W16,
    W32,
}

impl PhvWidth {
    pub const fn bits(self) -> u8 {
        match self {
            Self::W8 => 8,
            Self::W16 => 16,
            Self::W32 => 32,
        }
    }

    pub const fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    pub const fn mask(self) -> u32 {
        super::mask32(self.bits())
    }
}

/// What lives behind a [`PhvAddr`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PhvKind {
    Normal(PhvWidth),
    Tagalong(PhvWidth),
    Checksum(u8),
}

impl PhvKind {
    pub fn width(self) -> PhvWidth {
        match self {
            Self::Normal(w) | Self::Tagalong(w) => w,
            Self::Checksum(_) => PhvWidth::W16,
        }
    }
}

/// The address of a PHV container or checksum pseudo source.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq,
    PartialOrd, Serialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct PhvAddr(u16);

impl PhvAddr {
    /// Validate a raw address.
    pub const fn new(raw: u16) -> Result<Self, DeparserError> {
        if Self::kind_of(raw).is_some() {
            Ok(Self(raw))
        } else {
            Err(DeparserError::BadPhvAddr(raw))
        }
    }

    /// The 32-bit container `idx` of group `group`.
    ///
    /// # Panics
    ///
    /// These constructors are meant for building constant
    /// configuration and panic on an impossible address.
    pub const fn word(group: u16, idx: u16) -> Self {
        assert!(group < 4 && idx < PHV_GROUP_SIZE);
        Self(PHV_WORD_BASE + group * PHV_GROUP_SIZE + idx)
    }

    pub const fn byte(group: u16, idx: u16) -> Self {
        assert!(group < 4 && idx < PHV_GROUP_SIZE);
        Self(PHV_BYTE_BASE + group * PHV_GROUP_SIZE + idx)
    }

    pub const fn half(group: u16, idx: u16) -> Self {
        assert!(group < 6 && idx < PHV_GROUP_SIZE);
        Self(PHV_HALF_BASE + group * PHV_GROUP_SIZE + idx)
    }

    pub const fn t_word(group: u16, idx: u16) -> Self {
        assert!(group < TPHV_GROUPS && idx < TPHV_WORDS_PER_GROUP);
        Self(TPHV_WORD_BASE + group * TPHV_WORDS_PER_GROUP + idx)
    }

    pub const fn t_byte(group: u16, idx: u16) -> Self {
        assert!(group < TPHV_GROUPS && idx < TPHV_BYTES_PER_GROUP);
        Self(TPHV_BYTE_BASE + group * TPHV_BYTES_PER_GROUP + idx)
    }

    pub const fn t_half(group: u16, idx: u16) -> Self {
        assert!(group < TPHV_GROUPS && idx < TPHV_HALVES_PER_GROUP);
        Self(TPHV_HALF_BASE + group * TPHV_HALVES_PER_GROUP + idx)
    }

    /// The read-back source of checksum engine `engine`.
    pub const fn csum(engine: u8) -> Self {
        assert!((engine as usize) < CSUM_ENGINES);
        Self(CSUM_BASE + engine as u16)
    }

    /// The 8-bit container with flat number `num` (0..64), as used by
    /// the POV position registers.
    pub const fn byte_num(num: u16) -> Result<Self, DeparserError> {
        if num < 4 * PHV_GROUP_SIZE {
            Ok(Self(PHV_BYTE_BASE + num))
        } else {
            Err(DeparserError::BadPhvAddr(num))
        }
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn idx(self) -> usize {
        self.0 as usize
    }

    pub const fn kind(self) -> PhvKind {
        match Self::kind_of(self.0) {
            Some(k) => k,
            // Unreachable: every constructor validates.
            None => PhvKind::Normal(PhvWidth::W32),
        }
    }

    pub const fn width(self) -> PhvWidth {
        match self.kind() {
            PhvKind::Normal(w) | PhvKind::Tagalong(w) => w,
            PhvKind::Checksum(_) => PhvWidth::W16,
        }
    }

    pub const fn is_tagalong(self) -> bool {
        matches!(self.kind(), PhvKind::Tagalong(_))
    }

    const fn kind_of(raw: u16) -> Option<PhvKind> {
        use PhvKind::*;
        use PhvWidth::*;

        match raw {
            0..PHV_BYTE_BASE => Some(Normal(W32)),
            PHV_BYTE_BASE..PHV_HALF_BASE => Some(Normal(W8)),
            PHV_HALF_BASE..PHV_NORMAL_END => Some(Normal(W16)),
            CSUM_BASE..TPHV_WORD_BASE => {
                let engine = raw - CSUM_BASE;
                if (engine as usize) < CSUM_ENGINES {
                    Some(Checksum(engine as u8))
                } else {
                    None
                }
            }
            TPHV_WORD_BASE..TPHV_BYTE_BASE => Some(Tagalong(W32)),
            TPHV_BYTE_BASE..TPHV_HALF_BASE => Some(Tagalong(W8)),
            TPHV_HALF_BASE..TPHV_END => Some(Tagalong(W16)),
            _ => None,
        }
    }
}

impl TryFrom<u16> for PhvAddr {
    type Error = DeparserError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<PhvAddr> for u16 {
    fn from(addr: PhvAddr) -> u16 {
        addr.0
    }
}

impl Display for PhvAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let raw = self.0;
        match self.kind() {
            PhvKind::Normal(w) => {
                let base = match w {
                    PhvWidth::W32 => PHV_WORD_BASE,
                    PhvWidth::W8 => PHV_BYTE_BASE,
                    PhvWidth::W16 => PHV_HALF_BASE,
                };
                let off = raw - base;
                let pfx = match w {
                    PhvWidth::W32 => "W",
                    PhvWidth::W8 => "B",
                    PhvWidth::W16 => "H",
                };
                write!(
                    f,
                    "{pfx}{}.{}",
                    off / PHV_GROUP_SIZE,
                    off % PHV_GROUP_SIZE
                )
            }

            PhvKind::Tagalong(w) => {
                let (pfx, base, per) = match w {
                    PhvWidth::W32 => {
                        ("TW", TPHV_WORD_BASE, TPHV_WORDS_PER_GROUP)
                    }
                    PhvWidth::W8 => ("TB", TPHV_BYTE_BASE, TPHV_BYTES_PER_GROUP),
                    PhvWidth::W16 => {
                        ("TH", TPHV_HALF_BASE, TPHV_HALVES_PER_GROUP)
                    }
                };
                let off = raw - base;
                write!(f, "{pfx}{}.{}", off / per, off % per)
            }

            PhvKind::Checksum(e) => write!(f, "CSUM{e}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn address_map() {
        assert_eq!(PhvAddr::word(0, 10).raw(), 10);
        assert_eq!(PhvAddr::word(0, 10).width(), PhvWidth::W32);
        assert_eq!(PhvAddr::byte(1, 0).raw(), 80);
        assert_eq!(PhvAddr::byte(1, 0).width(), PhvWidth::W8);
        assert_eq!(PhvAddr::half(5, 15).raw(), 223);
        assert_eq!(PhvAddr::half(5, 15).width(), PhvWidth::W16);
        assert_eq!(PhvAddr::csum(2).kind(), PhvKind::Checksum(2));
        assert_eq!(PhvAddr::t_word(7, 3).raw(), 287);
        assert_eq!(PhvAddr::t_byte(0, 0).kind(), PhvKind::Tagalong(PhvWidth::W8));
        assert_eq!(PhvAddr::t_half(7, 5).raw(), 367);
        assert!(PhvAddr::t_half(7, 5).is_tagalong());
    }

    #[test]
    fn reject_holes() {
        assert_eq!(PhvAddr::new(230), Err(DeparserError::BadPhvAddr(230)));
        assert_eq!(PhvAddr::new(255), Err(DeparserError::BadPhvAddr(255)));
        assert_eq!(PhvAddr::new(368), Err(DeparserError::BadPhvAddr(368)));
        assert_eq!(
            PhvAddr::new(PHV_ADDR_NONE),
            Err(DeparserError::BadPhvAddr(PHV_ADDR_NONE))
        );
        assert!(PhvAddr::new(229).is_ok());
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", PhvAddr::word(0, 10)), "W0.10");
        assert_eq!(format!("{}", PhvAddr::half(2, 1)), "H2.1");
        assert_eq!(format!("{}", PhvAddr::t_byte(3, 2)), "TB3.2");
        assert_eq!(format!("{}", PhvAddr::csum(0)), "CSUM0");
    }
}
