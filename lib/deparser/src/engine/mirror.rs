// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Packet copies: mirror, resubmit, learn digests and packet
//! generator metadata.
//!
//! Each copy carries a private header built from its own list of
//! containers, independent of the POV and the Field Dictionary. The
//! table entry is selected by a metadata field, so a copy is only
//! made when that field is present, the feature is enabled and the
//! selected entry is valid.

use super::meta::MetaRecord;
use super::phv::PhvView;
use alloc::vec::Vec;
use deparser_api::CloneHdrCfg;
use deparser_api::LearnCfg;
use deparser_api::MetaField;
use deparser_api::MirrorCfg;
use deparser_api::PgenCfg;
use deparser_api::ResubmitCfg;
use serde::Serialize;

/// A mirror copy.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MirrorPkt {
    pub session: u8,

    /// The mirror id carried in the copy's metadata.
    pub id: u32,

    /// The length of the mirror header at the front of `pkt`.
    pub hdr_len: u16,
    pub pkt: Vec<u8>,
}

/// A resubmit copy, headed back to the parser.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ResubmitPkt {
    pub index: u8,

    /// The length of the resubmit header at the front of `pkt`.
    pub hdr_len: u16,
    pub pkt: Vec<u8>,
}

/// A learn digest, headed to the control plane.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LearnQuantum {
    pub index: u8,
    pub data: Vec<u8>,
}

/// Metadata for the packet generator.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PktGenMeta {
    pub data: Vec<u8>,
}

/// Build a clone header: the sources concatenated big-endian, then
/// truncated or zero-padded to the configured length.
pub fn build_hdr(cfg: &CloneHdrCfg, src: &PhvView) -> Vec<u8> {
    let mut hdr = Vec::with_capacity(usize::from(cfg.len));
    for addr in &cfg.sources {
        src.put_be(*addr, &mut hdr);
    }
    hdr.resize(usize::from(cfg.len), 0);
    hdr
}

/// Make the mirror copy, if any.
///
/// `deparsed` is the packet as it would leave the deparser. A
/// truncating session carries the mirror header alone.
pub fn mirror(
    cfg: &MirrorCfg,
    meta: &MetaRecord,
    src: &PhvView,
    deparsed: &[u8],
) -> Option<MirrorPkt> {
    if !cfg.enabled {
        return None;
    }

    let session = meta.get(MetaField::MirrorSession)? as u8;
    let entry = cfg.sessions.get(usize::from(session))?;
    if !entry.valid {
        return None;
    }

    let id = entry
        .id_phv
        .and_then(|addr| src.get(addr))
        .unwrap_or(u32::from(session));
    let mut pkt = build_hdr(&entry.hdr, src);
    let hdr_len = pkt.len() as u16;
    if !entry.truncate {
        pkt.extend_from_slice(deparsed);
    }

    Some(MirrorPkt { session, id, hdr_len, pkt })
}

/// Make the resubmit copy, if any. The copy carries the whole
/// original packet behind its header.
pub fn resubmit(
    cfg: &ResubmitCfg,
    meta: &MetaRecord,
    src: &PhvView,
    orig: &[u8],
) -> Option<ResubmitPkt> {
    if !cfg.enabled {
        return None;
    }

    let index = meta.get(MetaField::ResubmitIndex)? as u8;
    let entry = cfg.entries.get(usize::from(index))?;
    if !entry.valid {
        return None;
    }

    let mut pkt = build_hdr(&entry.hdr, src);
    let hdr_len = pkt.len() as u16;
    pkt.extend_from_slice(orig);
    Some(ResubmitPkt { index, hdr_len, pkt })
}

/// Make the learn digest, if any.
pub fn learn(
    cfg: &LearnCfg,
    meta: &MetaRecord,
    src: &PhvView,
) -> Option<LearnQuantum> {
    if !cfg.enabled {
        return None;
    }

    let index = meta.get(MetaField::LearnIndex)? as u8;
    let entry = cfg.entries.get(usize::from(index))?;
    if !entry.valid {
        return None;
    }

    Some(LearnQuantum { index, data: build_hdr(&entry.hdr, src) })
}

/// Make the packet generator metadata, if triggered.
pub fn pgen(
    cfg: &PgenCfg,
    meta: &MetaRecord,
    src: &PhvView,
) -> Option<PktGenMeta> {
    if !cfg.enabled || !meta.flag(MetaField::PgenTrigger) {
        return None;
    }

    Some(PktGenMeta { data: build_hdr(&cfg.hdr, src) })
}
