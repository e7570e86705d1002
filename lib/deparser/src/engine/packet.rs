// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Packets going in and out of the deparser.

use super::disposition::Disposition;
use super::meta::MetaRecord;
use super::mirror::LearnQuantum;
use super::mirror::MirrorPkt;
use super::mirror::PktGenMeta;
use super::mirror::ResubmitPkt;
use alloc::vec::Vec;
use deparser_api::Gress;
use serde::Serialize;

/// The packet the PHV was parsed from.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Packet {
    /// The packet as it arrived at the parser.
    pub bytes: Vec<u8>,

    /// The number of leading bytes the parser consumed into the PHV.
    /// The deparser replaces them with the header it assembles.
    pub hdr_len: usize,

    /// The port the packet arrived on.
    pub port: u16,
}

impl Packet {
    pub fn new(bytes: Vec<u8>, hdr_len: usize, port: u16) -> Self {
        Self { bytes, hdr_len, port }
    }

    /// The bytes behind the parsed header. A header length beyond the
    /// end of the packet leaves no payload.
    pub fn payload(&self) -> &[u8] {
        let start = self.hdr_len.min(self.bytes.len());
        &self.bytes[start..]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// The sideband metadata handed on with a deparsed packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct TxMeta {
    pub gress: Gress,

    /// Every present metadata field.
    pub fields: MetaRecord,

    /// The unicast port, when it names a port which exists.
    pub egress_port: Option<u16>,

    /// Ingress only: the pipes a multicast packet is replicated to.
    pub pipe_vector: u8,

    /// Ingress only: a copy goes to the CPU.
    pub cpu_copy: bool,

    pub version: u8,
}

/// A packet leaving the deparser.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Deparsed {
    pub pkt: Vec<u8>,

    /// The length of the assembled header at the front of `pkt`.
    pub hdr_len: usize,

    pub meta: TxMeta,
}

/// Everything an ingress deparse call produced.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct IngressOut {
    /// `None` when the packet was dropped or resubmitted.
    pub pkt: Option<Deparsed>,
    pub learn: Option<LearnQuantum>,
    pub mirror: Option<MirrorPkt>,
    pub resubmit: Option<ResubmitPkt>,
    pub pgen: Option<PktGenMeta>,
    pub disposition: Disposition,
}

/// Everything an egress deparse call produced.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EgressOut {
    /// `None` when the packet was dropped.
    pub pkt: Option<Deparsed>,
    pub mirror: Option<MirrorPkt>,
    pub disposition: Disposition,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payload_clamps() {
        let pkt = Packet::new(vec![1, 2, 3], 2, 0);
        assert_eq!(pkt.payload(), &[3]);
        let pkt = Packet::new(vec![1, 2, 3], 7, 0);
        assert!(pkt.payload().is_empty());
    }
}
