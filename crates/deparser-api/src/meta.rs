// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Metadata field extraction specs.
//!
//! Every piece of sideband metadata the deparser hands to the traffic
//! manager or the MAC is described by the same [`MetaFieldSpec`]: an
//! optional PHV source, a bit range within it, and a default. Which
//! container and bits feed which field is configuration, not code.

use super::DeparserError;
use super::mask32;
use super::phv::PhvAddr;
use alloc::collections::BTreeMap;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// The logical metadata fields.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
    Serialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MetaField {
    Version,
    Icos,
    Ecos,
    Qid,
    Xid,
    Yid,
    Rid,
    Hash1,
    Hash2,
    MeterColor,
    Mgid1,
    Mgid2,
    CopyToCpu,
    CopyToCpuCos,
    CtDisable,
    CtMcast,
    DeflectOnDrop,
    CaptureTxTs,
    ForceTxError,
    PhysIngressPort,
    UseYidTable,
    BypassEgress,
    DropCtl,
    EgressUnicastPort,
    MirrorSession,
    ResubmitIndex,
    LearnIndex,
    PgenTrigger,
}

impl MetaField {
    pub const COUNT: usize = 28;

    pub const ALL: [MetaField; Self::COUNT] = [
        Self::Version,
        Self::Icos,
        Self::Ecos,
        Self::Qid,
        Self::Xid,
        Self::Yid,
        Self::Rid,
        Self::Hash1,
        Self::Hash2,
        Self::MeterColor,
        Self::Mgid1,
        Self::Mgid2,
        Self::CopyToCpu,
        Self::CopyToCpuCos,
        Self::CtDisable,
        Self::CtMcast,
        Self::DeflectOnDrop,
        Self::CaptureTxTs,
        Self::ForceTxError,
        Self::PhysIngressPort,
        Self::UseYidTable,
        Self::BypassEgress,
        Self::DropCtl,
        Self::EgressUnicastPort,
        Self::MirrorSession,
        Self::ResubmitIndex,
        Self::LearnIndex,
        Self::PgenTrigger,
    ];

    pub const fn idx(self) -> usize {
        self as usize
    }

    /// The width of the field as the hardware carries it.
    pub const fn width(self) -> u8 {
        match self {
            Self::Version | Self::MeterColor => 2,
            Self::Icos | Self::Ecos | Self::CopyToCpuCos | Self::DropCtl => 3,
            Self::Qid => 7,
            Self::Xid | Self::Rid | Self::Mgid1 | Self::Mgid2 => 16,
            Self::Yid | Self::PhysIngressPort | Self::EgressUnicastPort => 9,
            Self::Hash1 | Self::Hash2 => 13,
            Self::MirrorSession => 8,
            Self::ResubmitIndex | Self::LearnIndex => 3,
            Self::CopyToCpu
            | Self::CtDisable
            | Self::CtMcast
            | Self::DeflectOnDrop
            | Self::CaptureTxTs
            | Self::ForceTxError
            | Self::UseYidTable
            | Self::BypassEgress
            | Self::PgenTrigger => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Icos => "icos",
            Self::Ecos => "ecos",
            Self::Qid => "qid",
            Self::Xid => "xid",
            Self::Yid => "yid",
            Self::Rid => "rid",
            Self::Hash1 => "hash1",
            Self::Hash2 => "hash2",
            Self::MeterColor => "meter_color",
            Self::Mgid1 => "mgid1",
            Self::Mgid2 => "mgid2",
            Self::CopyToCpu => "copy_to_cpu",
            Self::CopyToCpuCos => "copy_to_cpu_cos",
            Self::CtDisable => "ct_disable",
            Self::CtMcast => "ct_mcast",
            Self::DeflectOnDrop => "deflect_on_drop",
            Self::CaptureTxTs => "capture_tx_ts",
            Self::ForceTxError => "force_tx_error",
            Self::PhysIngressPort => "physical_ingress_port",
            Self::UseYidTable => "use_yid_table",
            Self::BypassEgress => "bypass_egress",
            Self::DropCtl => "drop_ctl",
            Self::EgressUnicastPort => "egress_unicast_port",
            Self::MirrorSession => "mirror_session",
            Self::ResubmitIndex => "resubmit_index",
            Self::LearnIndex => "learn_index",
            Self::PgenTrigger => "pgen_trigger",
        }
    }
}

impl Display for MetaField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How a single metadata field is derived.
///
/// The field is `source[shift..shift + width]` when `use_phv` is set
/// and the source container is valid, and `default` otherwise. A
/// `None` default means the field is absent.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct MetaFieldSpec {
    pub use_phv: bool,
    pub phv: PhvAddr,
    pub shift: u8,
    pub width: u8,
    pub default: Option<u32>,
}

impl MetaFieldSpec {
    /// A field taken from bits `shift..shift + width` of `phv`.
    pub fn phv(phv: PhvAddr, shift: u8, width: u8) -> Self {
        Self { use_phv: true, phv, shift, width, default: None }
    }

    /// A field which always takes `val`.
    pub fn fixed(val: u32) -> Self {
        Self { default: Some(val), ..Default::default() }
    }

    pub fn with_default(mut self, val: u32) -> Self {
        self.default = Some(val);
        self
    }

    pub fn validate(&self, field: MetaField) -> Result<(), DeparserError> {
        let max = field.width();
        if self.use_phv {
            if self.width > max {
                return Err(DeparserError::MetaTooWide {
                    field,
                    width: self.width,
                    max,
                });
            }

            let end = u32::from(self.shift) + u32::from(self.width);
            if self.shift >= 32 || end > 32 {
                return Err(DeparserError::MetaOutOfBounds {
                    field,
                    shift: self.shift,
                    width: self.width,
                });
            }
        }

        if let Some(default) = self.default {
            if default & !mask32(max) != 0 {
                return Err(DeparserError::MetaDefaultTooWide {
                    field,
                    default,
                });
            }
        }

        Ok(())
    }
}

/// The metadata specs of one gress. Fields without a spec are absent.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetaSpecs(pub BTreeMap<MetaField, MetaFieldSpec>);

impl MetaSpecs {
    pub fn get(&self, field: MetaField) -> Option<&MetaFieldSpec> {
        self.0.get(&field)
    }

    pub fn set(
        &mut self,
        field: MetaField,
        spec: MetaFieldSpec,
    ) -> Result<(), DeparserError> {
        spec.validate(field)?;
        self.0.insert(field, spec);
        Ok(())
    }

    pub fn clear(&mut self, field: MetaField) {
        self.0.remove(&field);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetaField, &MetaFieldSpec)> {
        self.0.iter()
    }

    pub fn validate(&self) -> Result<(), DeparserError> {
        self.0.iter().try_for_each(|(field, spec)| spec.validate(*field))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_is_in_discriminant_order() {
        for (i, f) in MetaField::ALL.iter().enumerate() {
            assert_eq!(f.idx(), i);
        }
    }

    #[test]
    fn spec_validation() {
        let src = PhvAddr::word(0, 0);
        assert!(MetaFieldSpec::phv(src, 0, 3).validate(MetaField::Icos).is_ok());
        assert_eq!(
            MetaFieldSpec::phv(src, 0, 4).validate(MetaField::Icos),
            Err(DeparserError::MetaTooWide {
                field: MetaField::Icos,
                width: 4,
                max: 3
            })
        );
        assert!(
            MetaFieldSpec::phv(src, 30, 3).validate(MetaField::Icos).is_err()
        );
        assert_eq!(
            MetaFieldSpec::phv(src, 32, 0).validate(MetaField::Icos),
            Err(DeparserError::MetaOutOfBounds {
                field: MetaField::Icos,
                shift: 32,
                width: 0
            })
        );
        assert!(MetaFieldSpec::phv(src, 31, 1).validate(MetaField::Icos).is_ok());
        assert!(MetaFieldSpec::fixed(8).validate(MetaField::Icos).is_err());
        assert!(MetaFieldSpec::fixed(7).validate(MetaField::Icos).is_ok());
    }

    #[test]
    fn specs_from_toml() {
        let specs: MetaSpecs = toml::from_str(
            r#"
            [egress_unicast_port]
            use_phv = true
            phv = 128
            width = 9
            default = 4

            [drop_ctl]
            default = 0
            "#,
        )
        .unwrap();
        let port = specs.get(MetaField::EgressUnicastPort).unwrap();
        assert_eq!(port.phv, PhvAddr::half(0, 0));
        assert_eq!(port.default, Some(4));
        assert_eq!(specs.get(MetaField::DropCtl).unwrap().default, Some(0));
        assert!(specs.validate().is_ok());
    }
}
