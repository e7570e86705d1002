// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Drop and destination resolution.

use super::meta::MetaRecord;
use crate::provider::ChipProvider;
use bitflags::bitflags;
use core::fmt;
use core::fmt::Display;
use deparser_api::IngressCfg;
use deparser_api::MetaField;
use serde::Serialize;

bitflags! {
    /// The bits of the `drop_ctl` metadata field.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DropCtl: u8 {
        /// Drop the packet and every copy of it.
        const DROP = 1 << 0;
        /// Suppress the primary packet, including its copy-to-cpu
        /// destination. Copies are unaffected.
        const SUPPRESS_FWD = 1 << 1;
        /// Suppress the mirror copy.
        const SUPPRESS_MIRROR = 1 << 2;
    }
}

impl DropCtl {
    pub fn from_meta(meta: &MetaRecord) -> Self {
        let raw = meta.get(MetaField::DropCtl).unwrap_or(0);
        Self::from_bits_truncate(raw as u8)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// `drop_ctl` bit 0.
    DropCtl,
    /// Neither a unicast port nor a multicast pipe vector.
    NoDestination,
    /// `drop_ctl` bit 1.
    FwdSuppressed,
    /// The assembled header exceeds the maximum length.
    HdrTooLong,
}

impl Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::DropCtl => "drop_ctl",
            Self::NoDestination => "no destination",
            Self::FwdSuppressed => "forward suppressed",
            Self::HdrTooLong => "header too long",
        };
        write!(f, "{s}")
    }
}

/// What became of the primary packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Forward,
    Drop(DropReason),
    /// The packet went back to the parser; there is no primary
    /// packet.
    Resubmit,
}

impl Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "FORWARD"),
            Self::Drop(reason) => write!(f, "DROP ({reason})"),
            Self::Resubmit => write!(f, "RESUBMIT"),
        }
    }
}

/// Which of the two multicast group tables.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MgidTable {
    Mgid1,
    Mgid2,
}

/// The destination of a packet, before any copies are considered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Resolution {
    /// `None` when the packet has somewhere to go.
    pub drop: Option<DropReason>,
    pub egress_port: Option<u16>,
    pub pipe_vector: u8,
    pub cpu_copy: bool,

    /// Whether a mirror copy may be made.
    pub mirror_ok: bool,

    /// Whether copies which bypass the primary packet (resubmit,
    /// learn, packet generation) may be made.
    pub copies_ok: bool,
}

/// The unicast port, if it names a port that exists.
fn unicast_port(meta: &MetaRecord, chip: &dyn ChipProvider) -> Option<u16> {
    meta.get(MetaField::EgressUnicastPort)
        .map(|p| p as u16)
        .filter(|p| chip.is_valid_port(*p))
}

/// Compute the multicast pipe vector. Each term is limited to the
/// pipes actually present before they are combined.
pub fn pipe_vector(
    cfg: &IngressCfg,
    meta: &MetaRecord,
    cpu_copy: bool,
    present: u8,
) -> u8 {
    let mgid1 = meta
        .get(MetaField::Mgid1)
        .map(|g| cfg.mgid1.lookup(g as u16) & present)
        .unwrap_or(0);
    let mgid2 = meta
        .get(MetaField::Mgid2)
        .map(|g| cfg.mgid2.lookup(g as u16) & present)
        .unwrap_or(0);
    let cpu = if cpu_copy { cfg.cpu_pipe_vector & present } else { 0 };
    mgid1 | mgid2 | cpu
}

/// Resolve an ingress packet.
pub fn resolve_ingress(
    cfg: &IngressCfg,
    meta: &MetaRecord,
    chip: &dyn ChipProvider,
) -> Resolution {
    let ctl = DropCtl::from_meta(meta);
    let cpu_copy =
        meta.flag(MetaField::CopyToCpu) && !ctl.contains(DropCtl::SUPPRESS_FWD);
    let egress_port = unicast_port(meta, chip);
    let pipe_vector = pipe_vector(cfg, meta, cpu_copy, chip.pipe_mask());

    if ctl.contains(DropCtl::DROP) {
        return Resolution {
            drop: Some(DropReason::DropCtl),
            egress_port,
            pipe_vector,
            cpu_copy,
            mirror_ok: false,
            copies_ok: false,
        };
    }

    let drop = if egress_port.is_none() && pipe_vector == 0 {
        Some(DropReason::NoDestination)
    } else if ctl.contains(DropCtl::SUPPRESS_FWD) {
        Some(DropReason::FwdSuppressed)
    } else {
        None
    };

    Resolution {
        drop,
        egress_port,
        pipe_vector,
        cpu_copy,
        mirror_ok: !ctl.contains(DropCtl::SUPPRESS_MIRROR),
        copies_ok: true,
    }
}

/// Resolve an egress packet. Egress has no multicast: the packet
/// leaves through its unicast port or not at all.
pub fn resolve_egress(meta: &MetaRecord, chip: &dyn ChipProvider) -> Resolution {
    let ctl = DropCtl::from_meta(meta);
    let egress_port = unicast_port(meta, chip);

    let drop = if ctl.contains(DropCtl::DROP) {
        Some(DropReason::DropCtl)
    } else if egress_port.is_none() {
        Some(DropReason::NoDestination)
    } else if ctl.contains(DropCtl::SUPPRESS_FWD) {
        Some(DropReason::FwdSuppressed)
    } else {
        None
    };

    Resolution {
        drop,
        egress_port,
        pipe_vector: 0,
        cpu_copy: false,
        mirror_ok: !ctl.contains(DropCtl::DROP)
            && !ctl.contains(DropCtl::SUPPRESS_MIRROR),
        copies_ok: !ctl.contains(DropCtl::DROP),
    }
}
