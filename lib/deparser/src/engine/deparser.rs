// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The per-pipe deparser.
//!
//! A [`Deparser`] owns the configuration and counters of one pipe,
//! for both gresses. Configuration is written through the setters
//! below, each of which validates the single entry it writes; the
//! deparse calls themselves never fail.
//!
//! A deparse call proceeds as follows.
//!
//! 1. Run the checksum engines over the PHV.
//! 2. Extract the metadata record, which also gives the packet
//!    version.
//! 3. Resolve the POV and assemble the header from the Field
//!    Dictionary, reading checksum results through their pseudo
//!    sources.
//! 4. Resolve the destination and apply `drop_ctl`.
//! 5. Make the copies: resubmit, mirror, learn, packet generator.
//! 6. Count the outcome.

use super::checksum;
use super::checksum::CsumResults;
use super::counter::CounterBank;
use super::counter::CounterBankSnap;
use super::counter::Tally;
use super::disposition;
use super::disposition::Disposition;
use super::disposition::DropReason;
use super::disposition::MgidTable;
use super::disposition::Resolution;
use super::fde;
use super::meta;
use super::meta::MetaRecord;
use super::mirror;
use super::packet::Deparsed;
use super::packet::EgressOut;
use super::packet::IngressOut;
use super::packet::Packet;
use super::packet::TxMeta;
use super::phv::Phv;
use super::phv::PhvView;
use super::pov::Pov;
use crate::provider::LogLevel;
use crate::provider::Providers;
use alloc::vec::Vec;
use deparser_api::CSUM_ENGINES;
use deparser_api::CloneEntryCfg;
use deparser_api::DeparserCfg;
use deparser_api::DeparserError;
use deparser_api::FDE_ENTRIES;
use deparser_api::FdeCfg;
use deparser_api::Gress;
use deparser_api::GressCfg;
use deparser_api::LEARN_ENTRIES;
use deparser_api::MAX_PIPES;
use deparser_api::MIRROR_SESSIONS;
use deparser_api::MetaField;
use deparser_api::MetaFieldSpec;
use deparser_api::MirrorSessionCfg;
use deparser_api::PgenCfg;
use deparser_api::PhvAddr;
use deparser_api::RESUBMIT_ENTRIES;

/// The part of a deparse call both gresses share.
struct Assembled {
    csum: CsumResults,
    meta: MetaRecord,
    version: u8,
    hdr: Vec<u8>,
}

fn assemble(cfg: &GressCfg, phv: &Phv) -> Assembled {
    let csum = checksum::compute(&cfg.csum, phv);
    let view = PhvView::new(phv, &csum);
    let meta = meta::evaluate(&cfg.meta, &view);
    let version = (meta.get(MetaField::Version).unwrap_or(0) & 0x3) as u8;
    let pov = Pov::resolve(&cfg.pov, phv);
    let hdr = fde::assemble(&cfg.fde, &pov, version, &view);
    Assembled { csum, meta, version, hdr }
}

/// Grow `tbl` so that `idx` is a valid index.
fn slot<T: Default + Clone>(tbl: &mut Vec<T>, idx: usize) -> &mut T {
    if tbl.len() <= idx {
        tbl.resize(idx + 1, T::default());
    }
    &mut tbl[idx]
}

fn check_idx(
    table: &'static str,
    idx: usize,
    size: usize,
) -> Result<(), DeparserError> {
    if idx >= size {
        return Err(DeparserError::IndexOutOfRange {
            table,
            idx,
            max: size - 1,
        });
    }
    Ok(())
}

/// The deparser of one pipe.
pub struct Deparser {
    pipe: u8,
    cfg: DeparserCfg,
    counters: CounterBank,
    providers: Providers,
}

impl Deparser {
    /// Create the deparser of pipe `pipe`.
    pub fn new(
        pipe: u8,
        cfg: DeparserCfg,
        providers: Providers,
    ) -> Result<Self, DeparserError> {
        check_idx("pipe", usize::from(pipe), usize::from(MAX_PIPES))?;
        cfg.validate()?;
        Ok(Self { pipe, cfg, counters: CounterBank::new(), providers })
    }

    pub fn pipe(&self) -> u8 {
        self.pipe
    }

    pub fn cfg(&self) -> &DeparserCfg {
        &self.cfg
    }

    pub fn counters(&self) -> &CounterBank {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut CounterBank {
        &mut self.counters
    }

    pub fn counters_snap(&self) -> CounterBankSnap {
        self.counters.snapshot()
    }

    /// Replace the whole configuration.
    pub fn set_cfg(&mut self, cfg: DeparserCfg) -> Result<(), DeparserError> {
        let res = cfg.validate();
        self.logged("configuration", res)?;
        self.cfg = cfg;
        Ok(())
    }

    fn log(&self, level: LogLevel, msg: &str) {
        self.providers.log.log(level, msg);
    }

    /// Report a rejected configuration write.
    fn logged<T>(
        &self,
        what: &str,
        res: Result<T, DeparserError>,
    ) -> Result<T, DeparserError> {
        if let Err(e) = &res {
            let msg = format!("pipe {}: rejected {what} write: {e}", self.pipe);
            self.log(LogLevel::Warn, &msg);
        }
        res
    }

    fn gress_cfg_mut(&mut self, gress: Gress) -> &mut GressCfg {
        match gress {
            Gress::Ingress => &mut self.cfg.ingress.common,
            Gress::Egress => &mut self.cfg.egress,
        }
    }

    fn gress_cfg(&self, gress: Gress) -> &GressCfg {
        match gress {
            Gress::Ingress => &self.cfg.ingress.common,
            Gress::Egress => &self.cfg.egress,
        }
    }

    // ================================================================
    // Configuration
    // ================================================================

    /// Write Field Dictionary entry `idx` from its register form.
    pub fn write_fde(
        &mut self,
        gress: Gress,
        idx: usize,
        raw: u64,
    ) -> Result<(), DeparserError> {
        let res = FdeCfg::from_raw(raw);
        let fde = self.logged("FDE", res)?;
        self.set_fde(gress, idx, fde)
    }

    /// Set Field Dictionary entry `idx`.
    pub fn set_fde(
        &mut self,
        gress: Gress,
        idx: usize,
        fde: FdeCfg,
    ) -> Result<(), DeparserError> {
        let res = check_idx("FDE", idx, FDE_ENTRIES)
            .and_then(|_| fde.validate(idx));
        self.logged("FDE", res)?;
        *slot(&mut self.gress_cfg_mut(gress).fde, idx) = fde;
        Ok(())
    }

    pub fn fde(&self, gress: Gress, idx: usize) -> Option<&FdeCfg> {
        self.gress_cfg(gress).fde.get(idx)
    }

    /// Write POV position register `reg`.
    pub fn write_pov_reg(
        &mut self,
        gress: Gress,
        reg: usize,
        raw: u64,
    ) -> Result<(), DeparserError> {
        let res = self.gress_cfg_mut(gress).pov.write_reg(reg, raw);
        self.logged("POV position", res)
    }

    /// Point POV byte `byte` at an 8-bit container.
    pub fn set_pov_byte(
        &mut self,
        gress: Gress,
        byte: usize,
        src: Option<PhvAddr>,
    ) -> Result<(), DeparserError> {
        let res = self.gress_cfg_mut(gress).pov.set(byte, src);
        self.logged("POV position", res)
    }

    /// Set how metadata field `field` is extracted.
    pub fn set_meta_spec(
        &mut self,
        gress: Gress,
        field: MetaField,
        spec: MetaFieldSpec,
    ) -> Result<(), DeparserError> {
        let res = self.gress_cfg_mut(gress).meta.set(field, spec);
        self.logged("metadata spec", res)
    }

    /// Remove the spec of `field`, leaving the field absent.
    pub fn clear_meta_spec(&mut self, gress: Gress, field: MetaField) {
        self.gress_cfg_mut(gress).meta.clear(field);
    }

    /// Write the control byte of container `addr` in checksum engine
    /// `engine`.
    pub fn write_csum_entry(
        &mut self,
        gress: Gress,
        engine: usize,
        addr: PhvAddr,
        raw: u8,
    ) -> Result<(), DeparserError> {
        let res = check_idx("checksum engine", engine, CSUM_ENGINES);
        self.logged("checksum", res)?;

        let mut eng = self
            .gress_cfg(gress)
            .csum
            .get(engine)
            .cloned()
            .unwrap_or_default();
        eng.write_entry(addr, raw);
        let res = eng.validate();
        self.logged("checksum", res)?;

        *slot(&mut self.gress_cfg_mut(gress).csum, engine) = eng;
        Ok(())
    }

    pub fn set_mirror_enabled(&mut self, gress: Gress, enabled: bool) {
        self.gress_cfg_mut(gress).mirror.enabled = enabled;
    }

    pub fn set_mirror_session(
        &mut self,
        gress: Gress,
        session: usize,
        cfg: MirrorSessionCfg,
    ) -> Result<(), DeparserError> {
        let res = check_idx("mirror", session, MIRROR_SESSIONS)
            .and_then(|_| cfg.hdr.validate("mirror"));
        self.logged("mirror session", res)?;
        *slot(&mut self.gress_cfg_mut(gress).mirror.sessions, session) = cfg;
        Ok(())
    }

    pub fn set_max_hdr_len(&mut self, gress: Gress, len: u16) {
        self.gress_cfg_mut(gress).max_hdr_len = len;
    }

    pub fn set_resubmit_enabled(&mut self, enabled: bool) {
        self.cfg.ingress.resubmit.enabled = enabled;
    }

    pub fn set_resubmit_entry(
        &mut self,
        idx: usize,
        entry: CloneEntryCfg,
    ) -> Result<(), DeparserError> {
        let res = check_idx("resubmit", idx, RESUBMIT_ENTRIES)
            .and_then(|_| entry.hdr.validate("resubmit"));
        self.logged("resubmit", res)?;
        *slot(&mut self.cfg.ingress.resubmit.entries, idx) = entry;
        Ok(())
    }

    pub fn set_learn_enabled(&mut self, enabled: bool) {
        self.cfg.ingress.learn.enabled = enabled;
    }

    pub fn set_learn_entry(
        &mut self,
        idx: usize,
        entry: CloneEntryCfg,
    ) -> Result<(), DeparserError> {
        let res = check_idx("learn", idx, LEARN_ENTRIES)
            .and_then(|_| entry.hdr.validate("learn"));
        self.logged("learn", res)?;
        *slot(&mut self.cfg.ingress.learn.entries, idx) = entry;
        Ok(())
    }

    pub fn set_pgen(&mut self, cfg: PgenCfg) -> Result<(), DeparserError> {
        let res = cfg.validate();
        self.logged("packet generator", res)?;
        self.cfg.ingress.pgen = cfg;
        Ok(())
    }

    /// Map multicast group `mgid` to `pipes`. Zero removes the group.
    pub fn set_pipe_vector(&mut self, table: MgidTable, mgid: u16, pipes: u8) {
        let tbl = match table {
            MgidTable::Mgid1 => &mut self.cfg.ingress.mgid1,
            MgidTable::Mgid2 => &mut self.cfg.ingress.mgid2,
        };
        tbl.set(mgid, pipes);
    }

    pub fn set_cpu_pipe_vector(&mut self, pipes: u8) {
        self.cfg.ingress.cpu_pipe_vector = pipes;
    }

    // ================================================================
    // Deparsing
    // ================================================================

    /// Drop an over-long header, unless `drop_ctl` already dropped the
    /// packet.
    fn check_hdr_len(
        &self,
        gress: Gress,
        hdr_len: usize,
        res: &mut Resolution,
    ) {
        let max = usize::from(self.gress_cfg(gress).max_hdr_len);
        let ctl_drop = matches!(
            res.drop,
            Some(DropReason::DropCtl | DropReason::FwdSuppressed)
        );
        if hdr_len <= max || ctl_drop {
            return;
        }

        let msg = format!(
            "pipe {} {gress}: header of {hdr_len} bytes exceeds {max}",
            self.pipe
        );
        self.log(LogLevel::Warn, &msg);
        res.drop = Some(DropReason::HdrTooLong);
        res.mirror_ok = false;
    }

    fn deparsed(
        gress: Gress,
        asm: &Assembled,
        res: &Resolution,
        pkt: &Packet,
    ) -> Deparsed {
        let mut bytes = Vec::with_capacity(asm.hdr.len() + pkt.payload().len());
        bytes.extend_from_slice(&asm.hdr);
        bytes.extend_from_slice(pkt.payload());

        Deparsed {
            pkt: bytes,
            hdr_len: asm.hdr.len(),
            meta: TxMeta {
                gress,
                fields: asm.meta,
                egress_port: res.egress_port,
                pipe_vector: res.pipe_vector,
                cpu_copy: res.cpu_copy,
                version: asm.version,
            },
        }
    }

    /// Deparse an ingress PHV.
    ///
    /// `pkt` is the packet the PHV was parsed from. The result holds
    /// the deparsed packet unless it was dropped or resubmitted, plus
    /// any copies made along the way.
    pub fn deparse_ingress(&mut self, phv: &Phv, pkt: &Packet) -> IngressOut {
        self.counters.ingress_begin();

        let cfg = &self.cfg.ingress;
        let asm = assemble(&cfg.common, phv);
        let view = PhvView::new(phv, &asm.csum);
        let chip = self.providers.chip.as_ref();
        let mut res = disposition::resolve_ingress(cfg, &asm.meta, chip);

        let resubmit = if res.copies_ok {
            mirror::resubmit(&cfg.resubmit, &asm.meta, &view, &pkt.bytes)
        } else {
            None
        };

        if resubmit.is_none() {
            self.check_hdr_len(Gress::Ingress, asm.hdr.len(), &mut res);
        }

        let cfg = &self.cfg.ingress;
        let deparsed = Self::deparsed(Gress::Ingress, &asm, &res, pkt);

        let mirror = if res.mirror_ok {
            mirror::mirror(&cfg.common.mirror, &asm.meta, &view, &deparsed.pkt)
        } else {
            None
        };

        let (learn, pgen) = if res.copies_ok && resubmit.is_none() {
            (
                mirror::learn(&cfg.learn, &asm.meta, &view),
                mirror::pgen(&cfg.pgen, &asm.meta, &view),
            )
        } else {
            (None, None)
        };

        let disposition = match (resubmit.is_some(), res.drop) {
            (true, _) => Disposition::Resubmit,
            (false, Some(reason)) => Disposition::Drop(reason),
            (false, None) => Disposition::Forward,
        };

        self.counters.ingress_end(&Tally {
            disposition,
            mirrored: mirror.is_some(),
            learned: learn.is_some(),
        });

        if let Disposition::Drop(_) = disposition {
            self.providers.chip.ibuf_discard(pkt.port);
        }

        let pkt = match disposition {
            Disposition::Forward => Some(deparsed),
            _ => None,
        };

        IngressOut { pkt, learn, mirror, resubmit, pgen, disposition }
    }

    /// Deparse an egress PHV.
    ///
    /// The result holds the deparsed packet unless it was dropped,
    /// plus the mirror copy if one was made.
    pub fn deparse_egress(&mut self, phv: &Phv, pkt: &Packet) -> EgressOut {
        let cfg = &self.cfg.egress;
        let asm = assemble(cfg, phv);
        let view = PhvView::new(phv, &asm.csum);
        let chip = self.providers.chip.as_ref();
        let mut res = disposition::resolve_egress(&asm.meta, chip);
        self.check_hdr_len(Gress::Egress, asm.hdr.len(), &mut res);

        let cfg = &self.cfg.egress;
        let deparsed = Self::deparsed(Gress::Egress, &asm, &res, pkt);
        let mirror = if res.mirror_ok {
            mirror::mirror(&cfg.mirror, &asm.meta, &view, &deparsed.pkt)
        } else {
            None
        };

        let disposition = match res.drop {
            Some(reason) => Disposition::Drop(reason),
            None => Disposition::Forward,
        };

        let failed: Vec<u8> = asm.csum.failed().collect();
        if let Some(port) = res.egress_port {
            for engine in &failed {
                let msg = format!(
                    "pipe {} EGRESS: checksum engine {engine} failed verify \
                     for port {port}",
                    self.pipe
                );
                self.log(LogLevel::Note, &msg);
                self.counters.incr_port_error(port);
            }

            if disposition == Disposition::Forward
                && asm.meta.flag(MetaField::ForceTxError)
            {
                self.counters.incr_port_error(port);
            }
        }

        self.counters.egress(&Tally {
            disposition,
            mirrored: mirror.is_some(),
            learned: false,
        });

        let pkt = match disposition {
            Disposition::Forward => Some(deparsed),
            _ => None,
        };

        EgressOut { pkt, mirror, disposition }
    }
}
