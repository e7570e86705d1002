// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Whole-deparser configuration.

use super::DeparserError;
use super::clone::LearnCfg;
use super::clone::MirrorCfg;
use super::clone::PgenCfg;
use super::clone::ResubmitCfg;
use super::csum::CsumEngineCfg;
use super::fde::FDE_ENTRIES;
use super::fde::FdeCfg;
use super::fde::PovPositionTable;
use super::meta::MetaSpecs;
use super::phv::CSUM_ENGINES;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use serde::Deserialize;
use serde::Serialize;

/// Headers longer than this are dropped unless configured otherwise.
pub const DEF_MAX_HDR_LEN: u16 = 480;

/// The maximum number of pipes in a system.
pub const MAX_PIPES: u8 = 4;

fn def_max_hdr_len() -> u16 {
    DEF_MAX_HDR_LEN
}

/// The configuration shared by both gresses.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct GressCfg {
    pub pov: PovPositionTable,
    pub fde: Vec<FdeCfg>,
    pub csum: Vec<CsumEngineCfg>,
    pub meta: MetaSpecs,
    pub mirror: MirrorCfg,
    #[serde(default = "def_max_hdr_len")]
    pub max_hdr_len: u16,
}

impl Default for GressCfg {
    fn default() -> Self {
        Self {
            pov: PovPositionTable::default(),
            fde: Vec::new(),
            csum: Vec::new(),
            meta: MetaSpecs::default(),
            mirror: MirrorCfg::default(),
            max_hdr_len: DEF_MAX_HDR_LEN,
        }
    }
}

impl GressCfg {
    pub fn validate(&self) -> Result<(), DeparserError> {
        if self.fde.len() > FDE_ENTRIES {
            return Err(DeparserError::TableTooLarge {
                table: "FDE",
                len: self.fde.len(),
                max: FDE_ENTRIES,
            });
        }

        if self.csum.len() > CSUM_ENGINES {
            return Err(DeparserError::TableTooLarge {
                table: "checksum",
                len: self.csum.len(),
                max: CSUM_ENGINES,
            });
        }

        self.pov.validate()?;
        self.fde.iter().enumerate().try_for_each(|(i, f)| f.validate(i))?;
        self.csum.iter().try_for_each(|c| c.validate())?;
        self.meta.validate()?;
        self.mirror.validate()
    }
}

/// A map from multicast group id to the pipes the group reaches.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(from = "Vec<PipeVectorEntry>", into = "Vec<PipeVectorEntry>")]
pub struct PipeVectorTable(BTreeMap<u16, u8>);

/// The serialized form of one [`PipeVectorTable`] mapping.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PipeVectorEntry {
    pub mgid: u16,
    pub pipes: u8,
}

impl PipeVectorTable {
    pub fn set(&mut self, mgid: u16, pipes: u8) {
        if pipes == 0 {
            self.0.remove(&mgid);
        } else {
            self.0.insert(mgid, pipes);
        }
    }

    /// The pipes `mgid` reaches; zero for an unknown group.
    pub fn lookup(&self, mgid: u16) -> u8 {
        self.0.get(&mgid).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<PipeVectorEntry>> for PipeVectorTable {
    fn from(entries: Vec<PipeVectorEntry>) -> Self {
        let mut tbl = Self::default();
        for e in entries {
            tbl.set(e.mgid, e.pipes);
        }
        tbl
    }
}

impl From<PipeVectorTable> for Vec<PipeVectorEntry> {
    fn from(tbl: PipeVectorTable) -> Self {
        tbl.0
            .into_iter()
            .map(|(mgid, pipes)| PipeVectorEntry { mgid, pipes })
            .collect()
    }
}

/// Ingress configuration: the shared tables plus the copies and
/// multicast state only ingress has.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct IngressCfg {
    pub common: GressCfg,
    pub resubmit: ResubmitCfg,
    pub learn: LearnCfg,
    pub pgen: PgenCfg,
    pub mgid1: PipeVectorTable,
    pub mgid2: PipeVectorTable,

    /// The pipes a copy-to-cpu packet is replicated to.
    pub cpu_pipe_vector: u8,
}

impl IngressCfg {
    pub fn validate(&self) -> Result<(), DeparserError> {
        self.common.validate()?;
        self.resubmit.validate()?;
        self.learn.validate()?;
        self.pgen.validate()
    }
}

/// The full configuration of one pipe's deparser.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct DeparserCfg {
    pub ingress: IngressCfg,
    pub egress: GressCfg,
}

impl DeparserCfg {
    pub fn validate(&self) -> Result<(), DeparserError> {
        self.ingress.validate()?;
        self.egress.validate()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::FdeCfg;
    use crate::MetaField;
    use crate::PhvAddr;

    #[test]
    fn pipe_vector_lookup() {
        let mut tbl = PipeVectorTable::default();
        tbl.set(100, 0b0101);
        assert_eq!(tbl.lookup(100), 0b0101);
        assert_eq!(tbl.lookup(101), 0);
        tbl.set(100, 0);
        assert!(tbl.is_empty());
    }

    #[test]
    fn sparse_toml() {
        let cfg: DeparserCfg = toml::from_str(
            r#"
            [ingress]
            cpu_pipe_vector = 1
            mgid1 = [ { mgid = 7, pipes = 3 } ]

            [[ingress.common.fde]]
            valid = true
            sources = [10]
            offset = 0
            len = 4
            pov_bit = 0
            version_mask = 15

            [egress.meta.egress_unicast_port]
            use_phv = true
            phv = 129
            width = 9
            "#,
        )
        .unwrap();

        assert_eq!(cfg.ingress.cpu_pipe_vector, 1);
        assert_eq!(cfg.ingress.mgid1.lookup(7), 3);
        assert_eq!(
            cfg.ingress.common.fde[0],
            FdeCfg::single(PhvAddr::word(0, 10), 0, 4, 0)
        );
        assert_eq!(cfg.ingress.common.max_hdr_len, DEF_MAX_HDR_LEN);
        assert_eq!(
            cfg.egress.meta.get(MetaField::EgressUnicastPort).unwrap().phv,
            PhvAddr::half(0, 1)
        );
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn reject_oversized_tables() {
        let mut cfg = DeparserCfg::default();
        cfg.egress.fde = vec![FdeCfg::default(); FDE_ENTRIES + 1];
        assert!(cfg.validate().is_err());

        let mut cfg = DeparserCfg::default();
        cfg.ingress.common.csum = vec![CsumEngineCfg::default(); CSUM_ENGINES + 1];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn reject_bad_address_on_load() {
        let res: Result<DeparserCfg, _> = toml::from_str(
            r#"
            [[egress.fde]]
            sources = [240]
            "#,
        );
        assert!(res.is_err());
    }
}
