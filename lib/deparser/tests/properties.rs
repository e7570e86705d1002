// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Property tests over the deparser's invariants.

use deparser::engine::counter::WrapCounter;
use deparser::engine::disposition::pipe_vector;
use deparser::engine::meta::MetaRecord;
use deparser_test_utils::ipv4;
use deparser_test_utils::ipv4::Ipv4Pkt;
use deparser_test_utils::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn counters_wrap_modulo_width(start in 0u64..=0xFFFF, n in any::<u32>()) {
        let mut c = WrapCounter::<16>::new();
        c.set(start);
        c.add(u64::from(n));
        prop_assert_eq!(c.val(), (start + u64::from(n)) % (1 << 16));
    }

    #[test]
    fn pipe_vector_within_present(
        mgid1_pipes in any::<u8>(),
        mgid2_pipes in any::<u8>(),
        cpu_pipes in any::<u8>(),
        present in any::<u8>(),
        cpu in any::<bool>(),
    ) {
        let mut cfg = IngressCfg::default();
        cfg.mgid1.set(1, mgid1_pipes);
        cfg.mgid2.set(2, mgid2_pipes);
        cfg.cpu_pipe_vector = cpu_pipes;

        let mut meta = MetaRecord::default();
        meta.set(MetaField::Mgid1, Some(1));
        meta.set(MetaField::Mgid2, Some(2));

        let pv = pipe_vector(&cfg, &meta, cpu, present);
        prop_assert_eq!(pv & !present, 0);
        let cpu_term = if cpu { cpu_pipes } else { 0 };
        prop_assert_eq!(pv, (mgid1_pipes | mgid2_pipes | cpu_term) & present);
    }

    #[test]
    fn header_is_active_entries_in_order(
        pov_bits in any::<u8>(),
        lens in proptest::collection::vec(1u8..=4, 8),
        wide in proptest::collection::vec(any::<bool>(), 8),
        vals in proptest::collection::vec(any::<u32>(), 8),
    ) {
        let mut h = harness(DeparserCfg::default(), 1);
        let dp = &mut h.dp;
        dp.set_pov_byte(Gress::Egress, 0, Some(PhvAddr::byte(0, 0))).unwrap();
        dp.set_meta_spec(
            Gress::Egress,
            MetaField::EgressUnicastPort,
            MetaFieldSpec::fixed(1),
        )
        .unwrap();

        let mut phv = vec![(PhvAddr::byte(0, 0), u32::from(pov_bits))];
        let mut expected = vec![];
        for i in 0..8 {
            let src = if wide[i] {
                PhvAddr::word(0, i as u16)
            } else {
                PhvAddr::half(0, i as u16)
            };
            let len = lens[i];
            let fde = FdeCfg::single(src, i as u16 * 4, len, i as u8);
            dp.set_fde(Gress::Egress, i, fde).unwrap();
            phv.push((src, vals[i]));

            if pov_bits & (1 << i) != 0 {
                // The low `len` bytes of the container, big-endian,
                // zero-extended past its width.
                let val = u64::from(vals[i] & src.width().mask());
                let be = val.to_be_bytes();
                expected.extend_from_slice(&be[8 - usize::from(len)..]);
            }
        }

        let out = dp.deparse_egress(&phv_with(&phv), &Packet::default());
        let d = out.pkt.unwrap();
        prop_assert_eq!(d.hdr_len, expected.len());
        prop_assert_eq!(d.pkt, expected);
    }

    #[test]
    fn drop_ctl_bit0_drops_everything(
        ctl in 0u32..8,
        session in 0u32..4,
        learn in 0u32..2,
        port in 0u32..72,
    ) {
        let mut h = harness(ipv4::cfg(), 4);
        h.dp.set_mirror_enabled(Gress::Ingress, true);
        for s in 0..4 {
            h.dp.set_mirror_session(
                Gress::Ingress,
                s,
                MirrorSessionCfg {
                    valid: true,
                    id_phv: None,
                    truncate: true,
                    hdr: CloneHdrCfg::new(1, &[ipv4::POV]).unwrap(),
                },
            )
            .unwrap();
        }
        h.dp.set_learn_enabled(true);
        h.dp.set_learn_entry(1, CloneEntryCfg::new(1, &[ipv4::POV]).unwrap())
            .unwrap();

        let pkt = Ipv4Pkt::sample();
        let mut phv = pkt.phv();
        phv.set(ipv4::DROP_CTL, ctl | 0x1).unwrap();
        phv.set(ipv4::MIRROR_SESSION, session).unwrap();
        phv.set(ipv4::LEARN_INDEX, learn).unwrap();
        phv.set(ipv4::PORT, port).unwrap();

        let out = h.dp.deparse_ingress(&phv, &pkt.packet(0));
        prop_assert_eq!(out.disposition, Disposition::Drop(DropReason::DropCtl));
        prop_assert!(out.pkt.is_none());
        prop_assert!(out.mirror.is_none());
        prop_assert!(out.learn.is_none());
        prop_assert!(out.resubmit.is_none());
        prop_assert!(out.pgen.is_none());
    }
}
