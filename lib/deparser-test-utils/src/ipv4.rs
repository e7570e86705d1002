// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! A canned Ethernet + IPv4 deparser program.
//!
//! POV byte 0 comes from `B0.0`: bit 0 marks the Ethernet header
//! valid, bit 1 the IPv4 header. The IPv4 header checksum is
//! produced by checksum engine 0 and placed through its pseudo
//! container. The remaining ordinary containers of byte group 0 and
//! half group 1 carry the packet's metadata.
//!
//! ```text
//! offset  source      field
//! 0       W0.0 H0.0   ethernet destination
//! 6       W0.1 H0.1   ethernet source
//! 12      H0.2        ethertype
//! 14      H0.3        version, ihl, tos
//! 16      H0.4        total length
//! 18      H0.5        identification
//! 20      H0.6        flags, fragment offset
//! 22      H0.7        ttl, protocol
//! 24      CSUM0       header checksum
//! 26      W0.2        source address
//! 30      W0.3        destination address
//! ```

use deparser::api::CsumEngineCfg;
use deparser::api::CsumEntryCfg;
use deparser::api::DeparserCfg;
use deparser::api::FdeCfg;
use deparser::api::GressCfg;
use deparser::api::MetaField;
use deparser::api::MetaFieldSpec;
use deparser::api::PhvAddr;
use deparser::engine::Packet;
use deparser::engine::Phv;
use smoltcp::wire::EthernetAddress;
use smoltcp::wire::EthernetProtocol;
use smoltcp::wire::Ipv4Address;

pub const ETH_HDR_LEN: usize = 14;
pub const IPV4_HDR_LEN: usize = 20;
pub const HDR_LEN: usize = ETH_HDR_LEN + IPV4_HDR_LEN;

pub const POV_ETH: u8 = 0;
pub const POV_IPV4: u8 = 1;

pub const POV: PhvAddr = PhvAddr::byte(0, 0);
pub const DROP_CTL: PhvAddr = PhvAddr::byte(0, 1);
pub const COPY_TO_CPU: PhvAddr = PhvAddr::byte(0, 2);
pub const MIRROR_SESSION: PhvAddr = PhvAddr::byte(0, 3);
pub const RESUBMIT_INDEX: PhvAddr = PhvAddr::byte(0, 4);
pub const LEARN_INDEX: PhvAddr = PhvAddr::byte(0, 5);
pub const VERSION: PhvAddr = PhvAddr::byte(0, 6);
pub const PGEN_TRIGGER: PhvAddr = PhvAddr::byte(0, 7);
pub const FORCE_TX_ERROR: PhvAddr = PhvAddr::byte(0, 8);
pub const PORT: PhvAddr = PhvAddr::half(1, 0);
pub const MGID1: PhvAddr = PhvAddr::half(1, 1);

const ETH_DST_HI: PhvAddr = PhvAddr::word(0, 0);
const ETH_DST_LO: PhvAddr = PhvAddr::half(0, 0);
const ETH_SRC_HI: PhvAddr = PhvAddr::word(0, 1);
const ETH_SRC_LO: PhvAddr = PhvAddr::half(0, 1);
const ETHERTYPE: PhvAddr = PhvAddr::half(0, 2);
const IP_VER_TOS: PhvAddr = PhvAddr::half(0, 3);
const IP_TOTAL_LEN: PhvAddr = PhvAddr::half(0, 4);
const IP_IDENT: PhvAddr = PhvAddr::half(0, 5);
const IP_FRAG: PhvAddr = PhvAddr::half(0, 6);
const IP_TTL_PROTO: PhvAddr = PhvAddr::half(0, 7);
const IP_SRC: PhvAddr = PhvAddr::word(0, 2);
const IP_DST: PhvAddr = PhvAddr::word(0, 3);

/// The header fields, in the `(source, offset, len, pov bit)` form
/// of a single-source Field Dictionary entry.
const FIELDS: [(PhvAddr, u16, u8, u8); 13] = [
    (ETH_DST_HI, 0, 4, POV_ETH),
    (ETH_DST_LO, 4, 2, POV_ETH),
    (ETH_SRC_HI, 6, 4, POV_ETH),
    (ETH_SRC_LO, 10, 2, POV_ETH),
    (ETHERTYPE, 12, 2, POV_ETH),
    (IP_VER_TOS, 14, 2, POV_IPV4),
    (IP_TOTAL_LEN, 16, 2, POV_IPV4),
    (IP_IDENT, 18, 2, POV_IPV4),
    (IP_FRAG, 20, 2, POV_IPV4),
    (IP_TTL_PROTO, 22, 2, POV_IPV4),
    (PhvAddr::csum(0), 24, 2, POV_IPV4),
    (IP_SRC, 26, 4, POV_IPV4),
    (IP_DST, 30, 4, POV_IPV4),
];

/// The containers summed into the IPv4 header checksum.
const CSUM_SOURCES: [PhvAddr; 7] = [
    IP_VER_TOS,
    IP_TOTAL_LEN,
    IP_IDENT,
    IP_FRAG,
    IP_TTL_PROTO,
    IP_SRC,
    IP_DST,
];

/// The program of one gress.
pub fn gress_cfg() -> GressCfg {
    let mut cfg = GressCfg::default();
    cfg.pov.set(0, Some(POV)).unwrap();

    cfg.fde = FIELDS
        .iter()
        .map(|(src, off, len, bit)| FdeCfg::single(*src, *off, *len, *bit))
        .collect();

    cfg.csum = vec![CsumEngineCfg {
        entries: CSUM_SOURCES.iter().map(|a| CsumEntryCfg::new(*a)).collect(),
    }];

    let specs = [
        (MetaField::EgressUnicastPort, MetaFieldSpec::phv(PORT, 0, 9)),
        (MetaField::DropCtl, MetaFieldSpec::phv(DROP_CTL, 0, 3)),
        (MetaField::CopyToCpu, MetaFieldSpec::phv(COPY_TO_CPU, 0, 1)),
        (MetaField::Mgid1, MetaFieldSpec::phv(MGID1, 0, 16)),
        (MetaField::MirrorSession, MetaFieldSpec::phv(MIRROR_SESSION, 0, 8)),
        (MetaField::ResubmitIndex, MetaFieldSpec::phv(RESUBMIT_INDEX, 0, 3)),
        (MetaField::LearnIndex, MetaFieldSpec::phv(LEARN_INDEX, 0, 3)),
        (MetaField::Version, MetaFieldSpec::phv(VERSION, 0, 2)),
        (MetaField::PgenTrigger, MetaFieldSpec::phv(PGEN_TRIGGER, 0, 1)),
        (MetaField::ForceTxError, MetaFieldSpec::phv(FORCE_TX_ERROR, 0, 1)),
    ];
    for (field, spec) in specs {
        cfg.meta.set(field, spec).unwrap();
    }

    cfg
}

/// The same program on both gresses.
pub fn cfg() -> DeparserCfg {
    let mut cfg = DeparserCfg::default();
    cfg.ingress.common = gress_cfg();
    cfg.egress = gress_cfg();
    cfg
}

/// The contents of an Ethernet + IPv4 header as held in the PHV.
#[derive(Clone, Debug)]
pub struct Ipv4Pkt {
    pub eth_dst: EthernetAddress,
    pub eth_src: EthernetAddress,
    pub ip_src: Ipv4Address,
    pub ip_dst: Ipv4Address,
    pub ident: u16,
    pub ttl: u8,
    pub proto: u8,
    pub payload: Vec<u8>,
}

fn split_mac(mac: &EthernetAddress) -> (u32, u32) {
    let b = mac.0;
    let hi = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
    let lo = u32::from(u16::from_be_bytes([b[4], b[5]]));
    (hi, lo)
}

impl Ipv4Pkt {
    /// A UDP packet between two guests.
    pub fn sample() -> Self {
        Self {
            eth_dst: EthernetAddress([0xA8, 0x40, 0x25, 0xF0, 0x00, 0x01]),
            eth_src: EthernetAddress([0xA8, 0x40, 0x25, 0xF0, 0x00, 0x02]),
            ip_src: Ipv4Address::new(10, 0, 0, 5),
            ip_dst: Ipv4Address::new(10, 0, 0, 6),
            ident: 0x1DE0,
            ttl: 64,
            proto: 17,
            payload: b"the payload".to_vec(),
        }
    }

    fn total_len(&self) -> u16 {
        (IPV4_HDR_LEN + self.payload.len()) as u16
    }

    /// The PHV the parser would produce for this packet, with both
    /// headers valid and no metadata set.
    pub fn phv(&self) -> Phv {
        let mut phv = Phv::new();
        let (dst_hi, dst_lo) = split_mac(&self.eth_dst);
        let (src_hi, src_lo) = split_mac(&self.eth_src);

        let vals = [
            (POV, (1 << POV_ETH) | (1 << POV_IPV4)),
            (ETH_DST_HI, dst_hi),
            (ETH_DST_LO, dst_lo),
            (ETH_SRC_HI, src_hi),
            (ETH_SRC_LO, src_lo),
            (ETHERTYPE, u32::from(u16::from(EthernetProtocol::Ipv4))),
            (IP_VER_TOS, 0x4500),
            (IP_TOTAL_LEN, u32::from(self.total_len())),
            (IP_IDENT, u32::from(self.ident)),
            (IP_FRAG, 0x4000),
            (IP_TTL_PROTO, (u32::from(self.ttl) << 8) | u32::from(self.proto)),
            (IP_SRC, u32::from_be_bytes(self.ip_src.0)),
            (IP_DST, u32::from_be_bytes(self.ip_dst.0)),
        ];
        for (addr, val) in vals {
            phv.set(addr, val).unwrap();
        }

        phv
    }

    /// The packet as it arrived: the headers the parser consumed,
    /// followed by the payload.
    pub fn packet(&self, port: u16) -> Packet {
        let mut bytes = Vec::with_capacity(HDR_LEN + self.payload.len());
        bytes.extend_from_slice(&self.eth_dst.0);
        bytes.extend_from_slice(&self.eth_src.0);
        bytes.extend_from_slice(&u16::from(EthernetProtocol::Ipv4).to_be_bytes());
        bytes.extend_from_slice(&[0x45, 0x00]);
        bytes.extend_from_slice(&self.total_len().to_be_bytes());
        bytes.extend_from_slice(&self.ident.to_be_bytes());
        bytes.extend_from_slice(&[0x40, 0x00, self.ttl, self.proto]);
        // The parser never checks the incoming checksum.
        bytes.extend_from_slice(&[0x00, 0x00]);
        bytes.extend_from_slice(&self.ip_src.0);
        bytes.extend_from_slice(&self.ip_dst.0);
        bytes.extend_from_slice(&self.payload);
        Packet::new(bytes, HDR_LEN, port)
    }
}
