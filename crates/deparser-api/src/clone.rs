// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Configuration of the packet copies the deparser can make: mirror,
//! resubmit, learn digests and packet generator metadata.

use super::DeparserError;
use super::phv::PhvAddr;
use alloc::vec::Vec;
use serde::Deserialize;
use serde::Serialize;

pub const CLONE_MAX_SOURCES: usize = 8;

/// A clone header never exceeds eight full words.
pub const CLONE_MAX_LEN: u16 = 32;

pub const MIRROR_SESSIONS: usize = 256;
pub const RESUBMIT_ENTRIES: usize = 8;
pub const LEARN_ENTRIES: usize = 8;

/// A private header built from a list of containers.
///
/// The containers are concatenated big-endian and the result is
/// truncated or zero-padded to `len` bytes.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct CloneHdrCfg {
    pub len: u16,
    pub sources: heapless::Vec<PhvAddr, CLONE_MAX_SOURCES>,
}

impl CloneHdrCfg {
    pub fn new(len: u16, srcs: &[PhvAddr]) -> Result<Self, DeparserError> {
        let sources = heapless::Vec::from_slice(srcs).map_err(|_| {
            DeparserError::TableTooLarge {
                table: "clone sources",
                len: srcs.len(),
                max: CLONE_MAX_SOURCES,
            }
        })?;
        Ok(Self { len, sources })
    }

    pub fn validate(&self, table: &'static str) -> Result<(), DeparserError> {
        if self.len > CLONE_MAX_LEN {
            return Err(DeparserError::BadCloneLength {
                table,
                len: self.len,
                max: CLONE_MAX_LEN,
            });
        }

        Ok(())
    }
}

/// One mirror session.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct MirrorSessionCfg {
    pub valid: bool,

    /// Where the mirror metadata id comes from. The session number is
    /// used when unset or when the container is invalid.
    pub id_phv: Option<PhvAddr>,

    /// Carry only the mirror header, not the packet.
    pub truncate: bool,

    pub hdr: CloneHdrCfg,
}

/// Per-gress mirror configuration. The session number is extracted
/// through [`super::MetaField::MirrorSession`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct MirrorCfg {
    pub enabled: bool,
    pub sessions: Vec<MirrorSessionCfg>,
}

/// A resubmit, learn, or generator table entry.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct CloneEntryCfg {
    pub valid: bool,
    pub hdr: CloneHdrCfg,
}

impl CloneEntryCfg {
    pub fn new(len: u16, srcs: &[PhvAddr]) -> Result<Self, DeparserError> {
        Ok(Self { valid: true, hdr: CloneHdrCfg::new(len, srcs)? })
    }
}

/// Ingress resubmit configuration. The table index is extracted
/// through [`super::MetaField::ResubmitIndex`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct ResubmitCfg {
    pub enabled: bool,
    pub entries: Vec<CloneEntryCfg>,
}

/// Ingress learn digest configuration. The table index is extracted
/// through [`super::MetaField::LearnIndex`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct LearnCfg {
    pub enabled: bool,
    pub entries: Vec<CloneEntryCfg>,
}

/// Packet generator metadata, emitted when
/// [`super::MetaField::PgenTrigger`] is set.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct PgenCfg {
    pub enabled: bool,
    pub hdr: CloneHdrCfg,
}

fn check_table(
    table: &'static str,
    len: usize,
    max: usize,
) -> Result<(), DeparserError> {
    if len > max {
        return Err(DeparserError::TableTooLarge { table, len, max });
    }
    Ok(())
}

impl MirrorCfg {
    pub fn validate(&self) -> Result<(), DeparserError> {
        check_table("mirror", self.sessions.len(), MIRROR_SESSIONS)?;
        self.sessions.iter().try_for_each(|s| s.hdr.validate("mirror"))
    }
}

impl ResubmitCfg {
    pub fn validate(&self) -> Result<(), DeparserError> {
        check_table("resubmit", self.entries.len(), RESUBMIT_ENTRIES)?;
        self.entries.iter().try_for_each(|e| e.hdr.validate("resubmit"))
    }
}

impl LearnCfg {
    pub fn validate(&self) -> Result<(), DeparserError> {
        check_table("learn", self.entries.len(), LEARN_ENTRIES)?;
        self.entries.iter().try_for_each(|e| e.hdr.validate("learn"))
    }
}

impl PgenCfg {
    pub fn validate(&self) -> Result<(), DeparserError> {
        self.hdr.validate("pgen")
    }
}
