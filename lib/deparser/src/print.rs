// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Print deparser results in a human-friendly manner.
//!
//! This is mostly just a place to hang printing routines so that they
//! can be used by both deparseadm and integration tests.

use crate::engine::counter::CounterBankSnap;
use crate::engine::meta::MetaRecord;
use crate::engine::mirror::MirrorPkt;
use crate::engine::packet::Deparsed;
use crate::engine::packet::EgressOut;
use crate::engine::packet::IngressOut;
use deparser_api::DeparserCfg;
use deparser_api::GressCfg;
use std::io::Write;
use std::string::String;
use tabwriter::TabWriter;

/// Print a horizontal rule in bold.
pub fn write_hrb(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:=<70}", "=")
}

/// Print a horizontal rule.
pub fn write_hr(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:-<70}", "-")
}

/// Format bytes as space separated hex, 16 to a line.
pub fn hex_lines(bytes: &[u8]) -> std::vec::Vec<String> {
    bytes
        .chunks(16)
        .map(|c| {
            c.iter()
                .map(|b| format!("{b:02X}"))
                .collect::<std::vec::Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn write_hex(t: &mut impl Write, bytes: &[u8]) -> std::io::Result<()> {
    for (i, line) in hex_lines(bytes).iter().enumerate() {
        writeln!(t, "{:04X}\t{line}", i * 16)?;
    }
    Ok(())
}

/// Print the counters of a [`CounterBankSnap`].
pub fn print_counters(snap: &CounterBankSnap) -> std::io::Result<()> {
    print_counters_into(&mut std::io::stdout(), snap)
}

/// Print the counters of a [`CounterBankSnap`] into a given writer.
pub fn print_counters_into(
    writer: &mut impl Write,
    snap: &CounterBankSnap,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    let egress = snap.egress.pairs();

    writeln!(t, "Counters")?;
    write_hrb(&mut t)?;
    writeln!(t, "NAME\tINGRESS\tEGRESS")?;
    for (name, ival) in snap.ingress.pairs() {
        let eval = egress
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| format!("{v}"))
            .unwrap_or_else(|| String::from("-"));
        writeln!(t, "{name}\t{ival}\t{eval}")?;
    }
    t.flush()?;

    let errs: std::vec::Vec<_> = snap
        .port_errors
        .iter()
        .enumerate()
        .filter(|(_, v)| **v != 0)
        .collect();
    if !errs.is_empty() {
        writeln!(t, "\nPort Errors")?;
        write_hr(&mut t)?;
        writeln!(t, "PORT\tERRORS")?;
        for (port, val) in errs {
            writeln!(t, "{port}\t{val}")?;
        }
    }

    writeln!(t)?;
    t.flush()
}

fn print_meta(t: &mut impl Write, meta: &MetaRecord) -> std::io::Result<()> {
    writeln!(t, "FIELD\tVALUE")?;
    for (field, val) in meta.iter() {
        writeln!(t, "{field}\t{val:#x}")?;
    }
    Ok(())
}

fn print_deparsed(t: &mut impl Write, d: &Deparsed) -> std::io::Result<()> {
    let port = d
        .meta
        .egress_port
        .map(|p| format!("{p}"))
        .unwrap_or_else(|| String::from("-"));
    writeln!(
        t,
        "Packet ({} bytes, header {}) port {port} pipes {:#06b} cpu {} \
         version {}",
        d.pkt.len(),
        d.hdr_len,
        d.meta.pipe_vector,
        d.meta.cpu_copy,
        d.meta.version,
    )?;
    write_hr(t)?;
    write_hex(t, &d.pkt)?;
    writeln!(t, "\nMetadata")?;
    write_hr(t)?;
    print_meta(t, &d.meta.fields)
}

fn print_mirror(t: &mut impl Write, m: &MirrorPkt) -> std::io::Result<()> {
    writeln!(
        t,
        "\nMirror session {} id {:#x} ({} bytes, header {})",
        m.session,
        m.id,
        m.pkt.len(),
        m.hdr_len
    )?;
    write_hr(t)?;
    write_hex(t, &m.pkt)
}

/// Print an [`IngressOut`].
pub fn print_ingress_out(out: &IngressOut) -> std::io::Result<()> {
    print_ingress_out_into(&mut std::io::stdout(), out)
}

/// Print an [`IngressOut`] into a given writer.
pub fn print_ingress_out_into(
    writer: &mut impl Write,
    out: &IngressOut,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "INGRESS {}", out.disposition)?;
    write_hrb(&mut t)?;
    if let Some(d) = &out.pkt {
        print_deparsed(&mut t, d)?;
    }

    if let Some(m) = &out.mirror {
        print_mirror(&mut t, m)?;
    }

    if let Some(r) = &out.resubmit {
        writeln!(
            t,
            "\nResubmit index {} ({} bytes, header {})",
            r.index,
            r.pkt.len(),
            r.hdr_len
        )?;
        write_hr(&mut t)?;
        write_hex(&mut t, &r.pkt)?;
    }

    if let Some(l) = &out.learn {
        writeln!(t, "\nLearn index {}", l.index)?;
        write_hr(&mut t)?;
        write_hex(&mut t, &l.data)?;
    }

    if let Some(p) = &out.pgen {
        writeln!(t, "\nPacket generator metadata")?;
        write_hr(&mut t)?;
        write_hex(&mut t, &p.data)?;
    }

    writeln!(t)?;
    t.flush()
}

/// Print an [`EgressOut`].
pub fn print_egress_out(out: &EgressOut) -> std::io::Result<()> {
    print_egress_out_into(&mut std::io::stdout(), out)
}

/// Print an [`EgressOut`] into a given writer.
pub fn print_egress_out_into(
    writer: &mut impl Write,
    out: &EgressOut,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "EGRESS {}", out.disposition)?;
    write_hrb(&mut t)?;
    if let Some(d) = &out.pkt {
        print_deparsed(&mut t, d)?;
    }

    if let Some(m) = &out.mirror {
        print_mirror(&mut t, m)?;
    }

    writeln!(t)?;
    t.flush()
}

fn print_gress_cfg(
    t: &mut impl Write,
    name: &str,
    cfg: &GressCfg,
) -> std::io::Result<()> {
    let pov = cfg.pov.bytes.iter().filter(|b| b.is_some()).count();
    let fde = cfg.fde.iter().filter(|f| f.valid).count();
    let src_bytes: usize =
        cfg.fde.iter().filter(|f| f.valid).map(|f| f.source_bytes()).sum();
    let csum = cfg.csum.iter().filter(|c| !c.entries.is_empty()).count();
    let csum_phv: usize = cfg.csum.iter().map(|c| c.phv_entries().count()).sum();
    let csum_tphv: usize =
        cfg.csum.iter().map(|c| c.tphv_entries().count()).sum();
    let sessions = cfg.mirror.sessions.iter().filter(|s| s.valid).count();
    writeln!(
        t,
        "{name}\t{pov}\t{fde}\t{src_bytes}\t{csum}\t\
         {csum_phv}/{csum_tphv}\t{}\t{}\t{}",
        cfg.meta.iter().count(),
        if cfg.mirror.enabled { sessions } else { 0 },
        cfg.max_hdr_len,
    )
}

/// Print a summary of a [`DeparserCfg`].
pub fn print_cfg_into(
    writer: &mut impl Write,
    cfg: &DeparserCfg,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    writeln!(
        t,
        "GRESS\tPOV BYTES\tFDES\tSRC BYTES\tCSUM ENGINES\tCSUM PHV/TPHV\t\
         META\tMIRRORS\tMAX HDR"
    )?;
    print_gress_cfg(&mut t, "ingress", &cfg.ingress.common)?;
    print_gress_cfg(&mut t, "egress", &cfg.egress)?;
    t.flush()?;

    let ing = &cfg.ingress;
    writeln!(
        t,
        "\nresubmit {}/{}\tlearn {}/{}\tpgen {}\tmgid1 {}\tmgid2 {}",
        ing.resubmit.entries.iter().filter(|e| e.valid).count(),
        if ing.resubmit.enabled { "on" } else { "off" },
        ing.learn.entries.iter().filter(|e| e.valid).count(),
        if ing.learn.enabled { "on" } else { "off" },
        if ing.pgen.enabled { "on" } else { "off" },
        ing.mgid1.len(),
        ing.mgid2.len(),
    )?;
    t.flush()
}

#[cfg(test)]
mod test {
    use super::*;
    use deparser_api::CsumEngineCfg;
    use deparser_api::FdeCfg;
    use deparser_api::PhvAddr;

    #[test]
    fn cfg_summary() {
        let mut cfg = DeparserCfg::default();
        cfg.egress.fde = vec![
            FdeCfg::single(PhvAddr::word(0, 0), 0, 4, 0),
            FdeCfg::multi(&[PhvAddr::half(0, 0), PhvAddr::byte(0, 1)], 4, 3, 1)
                .unwrap(),
        ];
        let mut eng = CsumEngineCfg::default();
        eng.write_entry(PhvAddr::half(0, 1), 0x1);
        eng.write_entry(PhvAddr::half(0, 2), 0x1);
        eng.write_entry(PhvAddr::t_word(0, 0), 0x1);
        cfg.egress.csum = vec![eng];

        let mut out = vec![];
        print_cfg_into(&mut out, &cfg).unwrap();
        let out = String::from_utf8(out).unwrap();
        let egress: std::vec::Vec<&str> = out
            .lines()
            .find(|l| l.starts_with("egress"))
            .unwrap()
            .split_whitespace()
            .collect();
        // FDEs, their source bytes, engines and entries per namespace.
        assert_eq!(&egress[2..6], &["2", "7", "1", "2/1"]);
    }
}
