// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Header assembly from the Field Dictionary.
//!
//! The Field Dictionary is an ordered table of entries, each naming
//! up to four containers, a length and the POV bit which says whether
//! the header field it belongs to is present. Assembly walks the table
//! in index order and emits each applicable entry at a streaming
//! cursor, so the header is exactly the concatenation of the
//! applicable entries.
//!
//! An entry concatenates its sources big-endian, each at its full
//! container width, and emits the low `len` bytes of the result. A
//! single 32-bit source with a length of 2 emits the low half of the
//! word; a single 8-bit source with a length of 2 emits a zero byte
//! followed by the container. Invalid containers still occupy their
//! width and read as zero.

use super::phv::PhvView;
use super::pov::Pov;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use deparser_api::FdeCfg;

/// Is `fde` part of the header of this packet?
pub fn is_applicable(fde: &FdeCfg, pov: &Pov, version: u8) -> bool {
    fde.valid && pov.is_set(fde.pov_bit) && fde.version_ok(version)
}

/// The indexes of the entries which are emitted for this packet, in
/// table order.
///
/// When more than one applicable entry claims the same output offset
/// only the last of them in table order is emitted.
pub fn active_entries(fdes: &[FdeCfg], pov: &Pov, version: u8) -> Vec<usize> {
    let mut last_at: BTreeMap<u16, usize> = BTreeMap::new();
    for (i, fde) in fdes.iter().enumerate() {
        if is_applicable(fde, pov, version) {
            last_at.insert(fde.offset, i);
        }
    }

    fdes.iter()
        .enumerate()
        .filter(|(i, fde)| {
            is_applicable(fde, pov, version)
                && last_at.get(&fde.offset) == Some(i)
        })
        .map(|(i, _)| i)
        .collect()
}

/// Append the bytes of a single entry to `out`.
pub fn emit(fde: &FdeCfg, src: &PhvView, out: &mut Vec<u8>) {
    // At most four 32-bit sources, so the concatenation always fits.
    let mut cat: Vec<u8> = Vec::with_capacity(16);
    for addr in &fde.sources {
        src.put_be(*addr, &mut cat);
    }

    let len = usize::from(fde.len);
    if cat.len() >= len {
        out.extend_from_slice(&cat[cat.len() - len..]);
    } else {
        out.resize(out.len() + len - cat.len(), 0);
        out.extend_from_slice(&cat);
    }
}

/// Assemble the header of one packet.
pub fn assemble(
    fdes: &[FdeCfg],
    pov: &Pov,
    version: u8,
    src: &PhvView,
) -> Vec<u8> {
    let mut hdr = Vec::new();
    for i in active_entries(fdes, pov, version) {
        emit(&fdes[i], src, &mut hdr);
    }
    hdr
}
