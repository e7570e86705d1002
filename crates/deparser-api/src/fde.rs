// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Field Dictionary and POV position configuration.

use super::DeparserError;
use super::phv::PHV_ADDR_NONE;
use super::phv::PhvAddr;
use super::phv::PhvKind;
use super::phv::PhvWidth;
use alloc::vec::Vec;
use serde::Deserialize;
use serde::Serialize;

/// The number of entries in the Field Dictionary.
pub const FDE_ENTRIES: usize = 192;

/// The maximum number of sources a single FDE may concatenate.
pub const FDE_MAX_SOURCES: usize = 4;

/// The maximum number of bytes a single FDE emits.
pub const FDE_MAX_LEN: u8 = 4;

/// The number of POV bytes, and so of POV bits.
pub const POV_BYTES: usize = 32;
pub const POV_BITS: usize = POV_BYTES * 8;

/// The number of POV position registers and sub-fields per register.
pub const POV_REGS: usize = 4;
pub const POV_FIELDS_PER_REG: usize = 8;

const FDE_SRC_BITS: u32 = 9;
const FDE_SRC_MASK: u64 = 0x1FF;
const FDE_LEN_SHIFT: u32 = 36;
const FDE_POV_SHIFT: u32 = 39;
const FDE_VER_SHIFT: u32 = 47;
const FDE_VALID_SHIFT: u32 = 51;
const FDE_OFF_SHIFT: u32 = 52;

/// A single Field Dictionary Entry.
///
/// When applicable, the entry concatenates its `sources` big-endian
/// (each contributing its full container width) and emits the low
/// `len` bytes of the result.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct FdeCfg {
    pub valid: bool,
    pub sources: heapless::Vec<PhvAddr, FDE_MAX_SOURCES>,
    pub offset: u16,
    pub len: u8,
    pub pov_bit: u8,
    pub version_mask: u8,
}

impl FdeCfg {
    /// An entry emitting `len` bytes of `src`, gated on `pov_bit` for
    /// every packet version.
    pub fn single(src: PhvAddr, offset: u16, len: u8, pov_bit: u8) -> Self {
        let mut sources = heapless::Vec::new();
        // A fresh vector always has room for one.
        let _ = sources.push(src);
        Self { valid: true, sources, offset, len, pov_bit, version_mask: 0xF }
    }

    /// An entry concatenating several sources.
    pub fn multi(
        srcs: &[PhvAddr],
        offset: u16,
        len: u8,
        pov_bit: u8,
    ) -> Result<Self, DeparserError> {
        let sources = heapless::Vec::from_slice(srcs).map_err(|_| {
            DeparserError::TableTooLarge {
                table: "FDE sources",
                len: srcs.len(),
                max: FDE_MAX_SOURCES,
            }
        })?;
        Ok(Self { valid: true, sources, offset, len, pov_bit, version_mask: 0xF })
    }

    /// Does this entry apply to a packet of version `version`?
    pub fn version_ok(&self, version: u8) -> bool {
        (self.version_mask >> (version & 0x3)) & 1 == 1
    }

    /// The number of bytes the configured sources produce.
    pub fn source_bytes(&self) -> usize {
        self.sources.iter().map(|s| s.width().bytes()).sum()
    }

    /// Unpack a raw dictionary register.
    ///
    /// ```text
    /// bits  0..36  four 9-bit sources, 0x1FF marks an unused slot
    /// bits 36..39  length
    /// bits 39..47  POV bit
    /// bits 47..51  version mask
    /// bit  51      valid
    /// bits 52..62  output offset
    /// ```
    pub fn from_raw(raw: u64) -> Result<Self, DeparserError> {
        let mut sources = heapless::Vec::new();
        for slot in 0..FDE_MAX_SOURCES as u32 {
            let src = ((raw >> (slot * FDE_SRC_BITS)) & FDE_SRC_MASK) as u16;
            if src == PHV_ADDR_NONE {
                continue;
            }
            // At most four slots exist, so the push cannot fail.
            let _ = sources.push(PhvAddr::new(src)?);
        }

        Ok(Self {
            valid: (raw >> FDE_VALID_SHIFT) & 1 == 1,
            sources,
            offset: ((raw >> FDE_OFF_SHIFT) & 0x3FF) as u16,
            len: ((raw >> FDE_LEN_SHIFT) & 0x7) as u8,
            pov_bit: ((raw >> FDE_POV_SHIFT) & 0xFF) as u8,
            version_mask: ((raw >> FDE_VER_SHIFT) & 0xF) as u8,
        })
    }

    /// Pack this entry into its register form.
    pub fn to_raw(&self) -> u64 {
        let mut raw = 0u64;
        for slot in 0..FDE_MAX_SOURCES {
            let src = self
                .sources
                .get(slot)
                .map(|s| s.raw())
                .unwrap_or(PHV_ADDR_NONE);
            raw |= u64::from(src) << (slot as u32 * FDE_SRC_BITS);
        }
        raw |= u64::from(self.len & 0x7) << FDE_LEN_SHIFT;
        raw |= u64::from(self.pov_bit) << FDE_POV_SHIFT;
        raw |= u64::from(self.version_mask & 0xF) << FDE_VER_SHIFT;
        raw |= u64::from(self.valid) << FDE_VALID_SHIFT;
        raw |= u64::from(self.offset & 0x3FF) << FDE_OFF_SHIFT;
        raw
    }

    pub fn validate(&self, idx: usize) -> Result<(), DeparserError> {
        if self.valid && (self.len == 0 || self.len > FDE_MAX_LEN) {
            return Err(DeparserError::BadFdeLength { idx, len: self.len });
        }

        Ok(())
    }
}

/// Where each POV byte comes from.
///
/// Each of the 32 POV bytes is read from one 8-bit container; an
/// unconfigured byte contributes zero bits. The serialized form lists
/// only the configured bytes.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "Vec<PovPositionEntry>", into = "Vec<PovPositionEntry>")]
pub struct PovPositionTable {
    pub bytes: [Option<PhvAddr>; POV_BYTES],
}

/// The serialized form of one configured POV byte.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PovPositionEntry {
    pub byte: usize,
    pub src: PhvAddr,
}

impl TryFrom<Vec<PovPositionEntry>> for PovPositionTable {
    type Error = DeparserError;

    fn try_from(entries: Vec<PovPositionEntry>) -> Result<Self, Self::Error> {
        let mut tbl = Self::default();
        for e in entries {
            tbl.set(e.byte, Some(e.src))?;
        }
        Ok(tbl)
    }
}

impl From<PovPositionTable> for Vec<PovPositionEntry> {
    fn from(tbl: PovPositionTable) -> Self {
        tbl.bytes
            .iter()
            .enumerate()
            .filter_map(|(byte, src)| {
                src.map(|src| PovPositionEntry { byte, src })
            })
            .collect()
    }
}

impl Default for PovPositionTable {
    fn default() -> Self {
        Self { bytes: [None; POV_BYTES] }
    }
}

impl PovPositionTable {
    /// Point POV byte `byte` at the 8-bit container `src`.
    pub fn set(
        &mut self,
        byte: usize,
        src: Option<PhvAddr>,
    ) -> Result<(), DeparserError> {
        if byte >= POV_BYTES {
            return Err(DeparserError::IndexOutOfRange {
                table: "POV position",
                idx: byte,
                max: POV_BYTES - 1,
            });
        }

        if let Some(addr) = src {
            if addr.kind() != PhvKind::Normal(PhvWidth::W8) {
                return Err(DeparserError::BadPovSource {
                    byte,
                    addr: addr.raw(),
                });
            }
        }

        self.bytes[byte] = src;
        Ok(())
    }

    /// Unpack POV position register `reg`.
    ///
    /// Each register holds eight 8-bit sub-fields, sub-field `k`
    /// configuring POV byte `reg * 8 + k`. Bit 7 of a sub-field is its
    /// valid bit, bits 0..7 the flat number of an ordinary 8-bit
    /// container.
    pub fn write_reg(
        &mut self,
        reg: usize,
        raw: u64,
    ) -> Result<(), DeparserError> {
        if reg >= POV_REGS {
            return Err(DeparserError::IndexOutOfRange {
                table: "POV position register",
                idx: reg,
                max: POV_REGS - 1,
            });
        }

        // Decode the whole register before writing any of it.
        let mut decoded = [None; POV_FIELDS_PER_REG];
        for (k, slot) in decoded.iter_mut().enumerate() {
            let field = ((raw >> (k * 8)) & 0xFF) as u16;
            if field & 0x80 != 0 {
                *slot = Some(PhvAddr::byte_num(field & 0x7F)?);
            }
        }

        for (k, src) in decoded.into_iter().enumerate() {
            self.bytes[reg * POV_FIELDS_PER_REG + k] = src;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), DeparserError> {
        for (byte, src) in self.bytes.iter().enumerate() {
            if let Some(addr) = src {
                if addr.kind() != PhvKind::Normal(PhvWidth::W8) {
                    return Err(DeparserError::BadPovSource {
                        byte,
                        addr: addr.raw(),
                    });
                }
            }
        }

        Ok(())
    }
}
