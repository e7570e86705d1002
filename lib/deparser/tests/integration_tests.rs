// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Integration tests.
//!
//! These drive a whole [`Deparser`] with the canned Ethernet + IPv4
//! program from `deparser-test-utils` and check the packets which
//! come out the other side with smoltcp.

use deparser::print::print_counters_into;
use deparser::print::print_ingress_out_into;
use deparser_test_utils::ipv4;
use deparser_test_utils::ipv4::Ipv4Pkt;
use deparser_test_utils::*;
use smoltcp::wire::EthernetFrame;
use smoltcp::wire::EthernetProtocol;
use smoltcp::wire::IpProtocol;
use smoltcp::wire::Ipv4Packet;

fn ipv4_harness() -> Harness {
    harness(ipv4::cfg(), 4)
}

/// Check the deparsed bytes are the packet `pkt` describes.
fn check_ipv4(bytes: &[u8], pkt: &Ipv4Pkt) {
    let frame = EthernetFrame::new_checked(bytes).unwrap();
    assert_eq!(frame.dst_addr(), pkt.eth_dst);
    assert_eq!(frame.src_addr(), pkt.eth_src);
    assert_eq!(frame.ethertype(), EthernetProtocol::Ipv4);

    let ip = Ipv4Packet::new_checked(frame.payload()).unwrap();
    assert!(ip.verify_checksum(), "bad IPv4 checksum: {:#06x}", ip.checksum());
    assert_eq!(ip.src_addr(), pkt.ip_src);
    assert_eq!(ip.dst_addr(), pkt.ip_dst);
    assert_eq!(ip.hop_limit(), pkt.ttl);
    assert_eq!(ip.next_header(), IpProtocol::Udp);
    assert_eq!(ip.ident(), pkt.ident);
    assert_eq!(ip.payload(), &pkt.payload[..]);
}

#[test]
fn ipv4_forward() {
    let mut h = ipv4_harness();
    let pkt = Ipv4Pkt::sample();
    let mut phv = pkt.phv();
    phv.set(ipv4::PORT, 5).unwrap();

    let out = h.dp.deparse_ingress(&phv, &pkt.packet(9));
    expect_disposition!(out, Disposition::Forward);
    let d = out.pkt.unwrap();
    assert_eq!(d.hdr_len, ipv4::HDR_LEN);
    assert_eq!(d.meta.egress_port, Some(5));
    assert_eq!(d.meta.pipe_vector, 0);
    check_ipv4(&d.pkt, &pkt);

    let c = &h.dp.counters().ingress;
    assert_eq!(c.phv.val(), 1);
    assert_eq!(c.tphv.val(), 1);
    assert_eq!(c.read.val(), 1);
    assert_eq!(c.pkts.val(), 1);
    assert_eq!(c.fwd.val(), 1);
    assert_eq!(c.disc.val(), 0);
    assert_eq!(h.chip.0.ibuf_discards(9), 0);
}

#[test]
fn egress_rewrites_ttl() {
    let mut h = ipv4_harness();
    let mut pkt = Ipv4Pkt::sample();
    pkt.ttl = 63;
    let mut phv = pkt.phv();
    phv.set(ipv4::PORT, 70).unwrap();

    // The arriving packet still carries the old TTL; the header comes
    // from the PHV alone.
    let mut orig = pkt.clone();
    orig.ttl = 64;
    let out = h.dp.deparse_egress(&phv, &orig.packet(1));
    expect_disposition!(out, Disposition::Forward);
    check_ipv4(&out.pkt.unwrap().pkt, &pkt);
    assert_eq!(h.dp.counters().egress.fwd.val(), 1);
}

#[test]
fn invalid_ipv4_header_is_left_out() {
    let mut h = ipv4_harness();
    let pkt = Ipv4Pkt::sample();
    let mut phv = pkt.phv();
    phv.set(ipv4::PORT, 5).unwrap();
    phv.set(ipv4::POV, 1 << ipv4::POV_ETH).unwrap();

    let out = h.dp.deparse_ingress(&phv, &pkt.packet(0));
    let d = out.pkt.unwrap();
    assert_eq!(d.hdr_len, ipv4::ETH_HDR_LEN);
    assert_eq!(&d.pkt[ipv4::ETH_HDR_LEN..], &pkt.payload[..]);
}

#[test]
fn single_word_header() {
    let mut h = harness(DeparserCfg::default(), 1);
    let dp = &mut h.dp;
    dp.set_pov_byte(Gress::Egress, 0, Some(PhvAddr::byte(0, 0))).unwrap();
    dp.set_fde(Gress::Egress, 0, FdeCfg::single(PhvAddr::word(0, 0), 0, 4, 0))
        .unwrap();
    dp.set_meta_spec(
        Gress::Egress,
        MetaField::EgressUnicastPort,
        MetaFieldSpec::fixed(1),
    )
    .unwrap();

    let phv = phv_with(&[
        (PhvAddr::byte(0, 0), 0x01),
        (PhvAddr::word(0, 0), 0xBAAD_DAAD),
    ]);
    let pkt = Packet::new(vec![0xFF, 0xFF, 0x01, 0x02, 0x03], 2, 0);
    let out = dp.deparse_egress(&phv, &pkt);
    assert_eq!(
        out.pkt.unwrap().pkt,
        vec![0xBA, 0xAD, 0xDA, 0xAD, 0x01, 0x02, 0x03]
    );
}

#[test]
fn egress_without_port_is_dropped() {
    let mut h = ipv4_harness();
    let pkt = Ipv4Pkt::sample();

    // No port at all.
    let out = h.dp.deparse_egress(&pkt.phv(), &pkt.packet(0));
    expect_disposition!(out, Disposition::Drop(DropReason::NoDestination));
    assert!(out.pkt.is_none());

    // A port the chip doesn't have.
    let mut phv = pkt.phv();
    phv.set(ipv4::PORT, 80).unwrap();
    let out = h.dp.deparse_egress(&phv, &pkt.packet(0));
    expect_disposition!(out, Disposition::Drop(DropReason::NoDestination));

    let c = &h.dp.counters().egress;
    assert_eq!(c.pkts.val(), 2);
    assert_eq!(c.disc.val(), 2);
    assert_eq!(c.discard.val(), 2);
    assert_eq!(c.read.val(), 0);
}

#[test]
fn drop_ctl_drops_everything() {
    let mut h = ipv4_harness();
    h.dp.set_mirror_enabled(Gress::Ingress, true);
    h.dp.set_mirror_session(
        Gress::Ingress,
        1,
        MirrorSessionCfg {
            valid: true,
            id_phv: None,
            truncate: false,
            hdr: CloneHdrCfg::new(2, &[ipv4::PORT]).unwrap(),
        },
    )
    .unwrap();
    h.dp.set_learn_enabled(true);
    h.dp.set_learn_entry(0, CloneEntryCfg::new(2, &[ipv4::PORT]).unwrap())
        .unwrap();

    let pkt = Ipv4Pkt::sample();
    let mut phv = pkt.phv();
    phv.set(ipv4::PORT, 5).unwrap();
    phv.set(ipv4::MIRROR_SESSION, 1).unwrap();
    phv.set(ipv4::LEARN_INDEX, 0).unwrap();
    phv.set(ipv4::DROP_CTL, 0x1).unwrap();

    let out = h.dp.deparse_ingress(&phv, &pkt.packet(9));
    expect_disposition!(out, Disposition::Drop(DropReason::DropCtl));
    assert!(out.pkt.is_none());
    assert!(out.mirror.is_none());
    assert!(out.learn.is_none());
    assert_eq!(h.chip.0.ibuf_discards(9), 1);
    assert_eq!(h.dp.counters().ingress.discard.val(), 1);
    assert_eq!(h.dp.counters().ingress.mirr.val(), 0);

    // With only the mirror suppressed the packet goes on its way.
    phv.set(ipv4::DROP_CTL, 0x4).unwrap();
    let out = h.dp.deparse_ingress(&phv, &pkt.packet(9));
    expect_disposition!(out, Disposition::Forward);
    assert!(out.mirror.is_none());
    assert!(out.learn.is_some());
}

#[test]
fn drop_ctl_suppresses_forward() {
    let mut h = ipv4_harness();
    h.dp.set_mirror_enabled(Gress::Ingress, true);
    h.dp.set_mirror_session(
        Gress::Ingress,
        1,
        MirrorSessionCfg {
            valid: true,
            id_phv: None,
            truncate: false,
            hdr: CloneHdrCfg::new(2, &[ipv4::PORT]).unwrap(),
        },
    )
    .unwrap();
    h.dp.set_learn_enabled(true);
    h.dp.set_learn_entry(0, CloneEntryCfg::new(2, &[ipv4::PORT]).unwrap())
        .unwrap();
    h.dp.set_resubmit_enabled(true);
    h.dp.set_resubmit_entry(3, CloneEntryCfg::new(2, &[ipv4::PORT]).unwrap())
        .unwrap();

    let pkt = Ipv4Pkt::sample();
    let mut phv = pkt.phv();
    phv.set(ipv4::PORT, 5).unwrap();
    phv.set(ipv4::MIRROR_SESSION, 1).unwrap();
    phv.set(ipv4::LEARN_INDEX, 0).unwrap();
    phv.set(ipv4::DROP_CTL, 0x2).unwrap();

    let out = h.dp.deparse_ingress(&phv, &pkt.packet(9));
    expect_disposition!(out, Disposition::Drop(DropReason::FwdSuppressed));
    assert!(out.pkt.is_none());
    let m = out.mirror.unwrap();
    assert_eq!(&m.pkt[..2], &[0x00, 0x05]);
    assert!(out.learn.is_some());
    assert_eq!(h.chip.0.ibuf_discards(9), 1);
    {
        let c = &h.dp.counters().ingress;
        assert_eq!(c.fwd.val(), 0);
        assert_eq!(c.disc.val(), 1);
        assert_eq!(c.mirr.val(), 1);
    }

    // Resubmission goes ahead as well.
    phv.set(ipv4::RESUBMIT_INDEX, 3).unwrap();
    let out = h.dp.deparse_ingress(&phv, &pkt.packet(9));
    expect_disposition!(out, Disposition::Resubmit);
    assert!(out.resubmit.is_some());
    assert_eq!(h.dp.counters().ingress.resubmit.val(), 1);

    // At egress the packet is suppressed and the mirror kept.
    h.dp.set_mirror_enabled(Gress::Egress, true);
    h.dp.set_mirror_session(
        Gress::Egress,
        1,
        MirrorSessionCfg {
            valid: true,
            id_phv: None,
            truncate: true,
            hdr: CloneHdrCfg::new(2, &[ipv4::PORT]).unwrap(),
        },
    )
    .unwrap();
    let out = h.dp.deparse_egress(&phv, &pkt.packet(0));
    expect_disposition!(out, Disposition::Drop(DropReason::FwdSuppressed));
    assert!(out.pkt.is_none());
    assert_eq!(out.mirror.unwrap().pkt, vec![0x00, 0x05]);
    assert_eq!(h.dp.counters().egress.disc.val(), 1);
    assert_eq!(h.dp.counters().egress.mirr.val(), 1);
}

#[test]
fn multicast_pipe_vector() {
    let mut h = ipv4_harness();
    h.dp.set_pipe_vector(MgidTable::Mgid1, 0x10, 0b1111_0110);

    let pkt = Ipv4Pkt::sample();
    let mut phv = pkt.phv();
    phv.set(ipv4::MGID1, 0x10).unwrap();

    let out = h.dp.deparse_ingress(&phv, &pkt.packet(0));
    expect_disposition!(out, Disposition::Forward);
    let d = out.pkt.unwrap();
    // Only four pipes are present.
    assert_eq!(d.meta.pipe_vector, 0b0110);
    assert_eq!(d.meta.egress_port, None);

    // A group with no pipes goes nowhere.
    phv.set(ipv4::MGID1, 0x11).unwrap();
    let out = h.dp.deparse_ingress(&phv, &pkt.packet(0));
    expect_disposition!(out, Disposition::Drop(DropReason::NoDestination));
}

#[test]
fn copy_to_cpu() {
    let mut h = ipv4_harness();
    h.dp.set_cpu_pipe_vector(0b1);

    let pkt = Ipv4Pkt::sample();
    let mut phv = pkt.phv();
    phv.set(ipv4::COPY_TO_CPU, 1).unwrap();

    let out = h.dp.deparse_ingress(&phv, &pkt.packet(0));
    expect_disposition!(out, Disposition::Forward);
    let d = out.pkt.unwrap();
    assert!(d.meta.cpu_copy);
    assert_eq!(d.meta.pipe_vector, 0b1);

    // Suppressing the CPU copy leaves no destination.
    phv.set(ipv4::DROP_CTL, 0x2).unwrap();
    let out = h.dp.deparse_ingress(&phv, &pkt.packet(0));
    expect_disposition!(out, Disposition::Drop(DropReason::NoDestination));
}

#[test]
fn resubmit_defers_tagalong_count() {
    let mut h = ipv4_harness();
    h.dp.set_resubmit_enabled(true);
    h.dp.set_resubmit_entry(
        2,
        CloneEntryCfg::new(4, &[ipv4::PORT, ipv4::MGID1]).unwrap(),
    )
    .unwrap();
    h.dp.set_learn_enabled(true);
    h.dp.set_learn_entry(0, CloneEntryCfg::new(2, &[ipv4::PORT]).unwrap())
        .unwrap();

    let pkt = Ipv4Pkt::sample();
    let orig = pkt.packet(9);
    let mut phv = pkt.phv();
    phv.set(ipv4::PORT, 5).unwrap();
    phv.set(ipv4::MGID1, 0x0102).unwrap();
    phv.set(ipv4::RESUBMIT_INDEX, 2).unwrap();
    phv.set(ipv4::LEARN_INDEX, 0).unwrap();

    let out = h.dp.deparse_ingress(&phv, &orig);
    expect_disposition!(out, Disposition::Resubmit);
    assert!(out.pkt.is_none());
    assert!(out.learn.is_none());
    let r = out.resubmit.unwrap();
    assert_eq!(r.index, 2);
    assert_eq!(r.hdr_len, 4);
    assert_eq!(&r.pkt[..4], &[0x00, 0x05, 0x01, 0x02]);
    assert_eq!(&r.pkt[4..], &orig.bytes[..]);

    {
        let c = &h.dp.counters().ingress;
        assert_eq!(c.phv.val(), 1);
        assert_eq!(c.resubmit.val(), 1);
        assert_eq!(c.tphv.val(), 0);
        assert_eq!(c.read.val(), 0);
        assert_eq!(c.fwd.val(), 0);
        assert_eq!(c.learn.val(), 0);
    }

    // The second pass counts both tagalong PHVs.
    phv.invalidate(ipv4::RESUBMIT_INDEX);
    let out = h.dp.deparse_ingress(&phv, &orig);
    expect_disposition!(out, Disposition::Forward);
    assert!(out.learn.is_some());
    let c = &h.dp.counters().ingress;
    assert_eq!(c.phv.val(), 2);
    assert_eq!(c.tphv.val(), 2);
    assert_eq!(c.read.val(), 1);
    assert_eq!(c.learn.val(), 1);
}

#[test]
fn mirror_copy() {
    let mut h = ipv4_harness();
    h.dp.set_mirror_enabled(Gress::Egress, true);
    h.dp.set_mirror_session(
        Gress::Egress,
        7,
        MirrorSessionCfg {
            valid: true,
            id_phv: Some(ipv4::MGID1),
            truncate: false,
            hdr: CloneHdrCfg::new(2, &[ipv4::PORT]).unwrap(),
        },
    )
    .unwrap();

    let pkt = Ipv4Pkt::sample();
    let mut phv = pkt.phv();
    phv.set(ipv4::PORT, 5).unwrap();
    phv.set(ipv4::MGID1, 0x77).unwrap();
    phv.set(ipv4::MIRROR_SESSION, 7).unwrap();

    let out = h.dp.deparse_egress(&phv, &pkt.packet(0));
    expect_disposition!(out, Disposition::Forward);
    let m = out.mirror.unwrap();
    let d = out.pkt.unwrap();
    assert_eq!(m.session, 7);
    assert_eq!(m.id, 0x77);
    assert_eq!(m.hdr_len, 2);
    assert_eq!(&m.pkt[..2], &[0x00, 0x05]);
    assert_eq!(&m.pkt[2..], &d.pkt[..]);
    assert_eq!(h.dp.counters().egress.mirr.val(), 1);

    // A mirror survives the primary packet being dropped for want of
    // a destination.
    phv.invalidate(ipv4::PORT);
    let out = h.dp.deparse_egress(&phv, &pkt.packet(0));
    expect_disposition!(out, Disposition::Drop(DropReason::NoDestination));
    assert_eq!(out.mirror.unwrap().pkt[..2], [0x00, 0x00]);
}

#[test]
fn learn_and_pgen() {
    let mut h = ipv4_harness();
    h.dp.set_learn_enabled(true);
    h.dp.set_learn_entry(1, CloneEntryCfg::new(2, &[ipv4::PORT]).unwrap())
        .unwrap();
    h.dp.set_pgen(PgenCfg {
        enabled: true,
        hdr: CloneHdrCfg::new(1, &[ipv4::LEARN_INDEX]).unwrap(),
    })
    .unwrap();

    let pkt = Ipv4Pkt::sample();
    let mut phv = pkt.phv();
    phv.set(ipv4::PORT, 5).unwrap();
    phv.set(ipv4::LEARN_INDEX, 1).unwrap();
    phv.set(ipv4::PGEN_TRIGGER, 1).unwrap();

    let out = h.dp.deparse_ingress(&phv, &pkt.packet(0));
    expect_disposition!(out, Disposition::Forward);
    let l = out.learn.unwrap();
    assert_eq!(l.index, 1);
    assert_eq!(l.data, vec![0x00, 0x05]);
    assert_eq!(out.pgen.unwrap().data, vec![0x01]);
    assert_eq!(h.dp.counters().ingress.learn.val(), 1);
}

#[test]
fn header_too_long() {
    let mut h = ipv4_harness();
    h.dp.set_max_hdr_len(Gress::Ingress, 20);

    let pkt = Ipv4Pkt::sample();
    let mut phv = pkt.phv();
    phv.set(ipv4::PORT, 5).unwrap();

    let out = h.dp.deparse_ingress(&phv, &pkt.packet(3));
    expect_disposition!(out, Disposition::Drop(DropReason::HdrTooLong));
    assert_eq!(h.dp.counters().ingress.hdr_too_long.val(), 1);
    assert_eq!(h.chip.0.ibuf_discards(3), 1);
    assert_eq!(h.log.count(LogLevel::Warn), 1);

    // Without the IPv4 header the Ethernet header alone fits.
    phv.set(ipv4::POV, 1 << ipv4::POV_ETH).unwrap();
    let out = h.dp.deparse_ingress(&phv, &pkt.packet(3));
    expect_disposition!(out, Disposition::Forward);
}

#[test]
fn version_masks_entries() {
    let mut h = ipv4_harness();
    // Emit the IPv4 destination for version 0 only.
    let mut fde = h.dp.fde(Gress::Ingress, 12).cloned().unwrap();
    fde.version_mask = 0b0001;
    h.dp.set_fde(Gress::Ingress, 12, fde).unwrap();

    let pkt = Ipv4Pkt::sample();
    let mut phv = pkt.phv();
    phv.set(ipv4::PORT, 5).unwrap();

    let out = h.dp.deparse_ingress(&phv, &pkt.packet(0));
    assert_eq!(out.pkt.unwrap().hdr_len, ipv4::HDR_LEN);

    phv.set(ipv4::VERSION, 2).unwrap();
    let out = h.dp.deparse_ingress(&phv, &pkt.packet(0));
    let d = out.pkt.unwrap();
    assert_eq!(d.meta.version, 2);
    assert_eq!(d.hdr_len, ipv4::HDR_LEN - 4);
}

#[test]
fn egress_port_errors() {
    let mut h = ipv4_harness();
    // Engine 1 verifies H2.0 against H2.1.
    h.dp.write_csum_entry(Gress::Egress, 1, PhvAddr::half(2, 0), 0b101)
        .unwrap();
    h.dp.write_csum_entry(Gress::Egress, 1, PhvAddr::half(2, 1), 0b001)
        .unwrap();

    let pkt = Ipv4Pkt::sample();
    let mut phv = pkt.phv();
    phv.set(ipv4::PORT, (1 << 7) | 5).unwrap();
    phv.set(PhvAddr::half(2, 0), 0x1234).unwrap();
    phv.set(PhvAddr::half(2, 1), 0xEDCB).unwrap();

    let out = h.dp.deparse_egress(&phv, &pkt.packet(0));
    expect_disposition!(out, Disposition::Forward);
    assert_eq!(h.dp.counters().port_error(5).unwrap().val(), 0);

    phv.set(PhvAddr::half(2, 1), 0).unwrap();
    let out = h.dp.deparse_egress(&phv, &pkt.packet(0));
    expect_disposition!(out, Disposition::Forward);
    assert_eq!(h.dp.counters().port_error(5).unwrap().val(), 1);
    assert_eq!(h.log.count(LogLevel::Note), 1);

    phv.set(PhvAddr::half(2, 1), 0xEDCB).unwrap();
    phv.set(ipv4::FORCE_TX_ERROR, 1).unwrap();
    let out = h.dp.deparse_egress(&phv, &pkt.packet(0));
    expect_disposition!(out, Disposition::Forward);
    assert_eq!(h.dp.counters().port_error(5).unwrap().val(), 2);
}

#[test]
fn rejected_writes_are_logged() {
    let mut h = ipv4_harness();
    assert!(h.dp.set_pov_byte(Gress::Ingress, 0, Some(PhvAddr::half(0, 0))).is_err());
    assert!(h.dp.write_pov_reg(Gress::Ingress, 4, 0).is_err());
    assert_eq!(h.log.count(LogLevel::Warn), 2);

    // The program is untouched.
    assert_eq!(h.dp.cfg().ingress.common.pov.bytes[0], Some(ipv4::POV));
}

#[test]
fn counters_print_and_serialize() {
    let mut h = ipv4_harness();
    let pkt = Ipv4Pkt::sample();
    let mut phv = pkt.phv();
    phv.set(ipv4::PORT, 5).unwrap();
    let out = h.dp.deparse_ingress(&phv, &pkt.packet(0));

    let mut buf = vec![];
    print_ingress_out_into(&mut buf, &out).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert!(text.starts_with("INGRESS FORWARD"));

    let snap = h.dp.counters_snap();
    let mut buf = vec![];
    print_counters_into(&mut buf, &snap).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert!(text.contains("fwd"));

    let json = serde_json::to_value(&snap).unwrap();
    assert_eq!(json["ingress"]["fwd"], 1);
    assert_eq!(json["egress"]["fwd"], 0);

    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["disposition"], "forward");
}
