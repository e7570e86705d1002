// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Metadata extraction.
//!
//! Every metadata field is produced by the same rule, driven by its
//! [`MetaFieldSpec`]; no field gets special treatment here. What a
//! field means is up to its consumer.

use super::phv::PhvView;
use core::fmt;
use deparser_api::MetaField;
use deparser_api::MetaFieldSpec;
use deparser_api::MetaSpecs;
use deparser_api::mask32;
use serde::Serialize;
use serde::Serializer;
use serde::ser::SerializeMap;

/// The metadata fields produced by one deparse call.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct MetaRecord {
    vals: [Option<u32>; MetaField::COUNT],
}

impl MetaRecord {
    pub fn get(&self, field: MetaField) -> Option<u32> {
        self.vals[field.idx()]
    }

    /// Is the single-bit `field` present and set?
    pub fn flag(&self, field: MetaField) -> bool {
        self.get(field).is_some_and(|v| v != 0)
    }

    pub fn set(&mut self, field: MetaField, val: Option<u32>) {
        self.vals[field.idx()] = val;
    }

    /// Iterate the present fields.
    pub fn iter(&self) -> impl Iterator<Item = (MetaField, u32)> + '_ {
        MetaField::ALL
            .iter()
            .filter_map(|f| self.get(*f).map(|v| (*f, v)))
    }
}

impl fmt::Debug for MetaRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter().map(|(k, v)| (k.name(), v))).finish()
    }
}

impl Serialize for MetaRecord {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(None)?;
        for (field, val) in self.iter() {
            map.serialize_entry(field.name(), &val)?;
        }
        map.end()
    }
}

/// Evaluate a single spec.
///
/// The field is taken from the PHV when the spec says so and the
/// source is valid; otherwise the default, which may be absent.
pub fn extract(spec: &MetaFieldSpec, src: &PhvView) -> Option<u32> {
    if spec.use_phv {
        if let Some(val) = src.get(spec.phv) {
            let shifted = val.checked_shr(u32::from(spec.shift)).unwrap_or(0);
            return Some(shifted & mask32(spec.width));
        }
    }

    spec.default
}

/// Evaluate every configured spec. Fields without a spec are absent.
pub fn evaluate(specs: &MetaSpecs, src: &PhvView) -> MetaRecord {
    let mut rec = MetaRecord::default();
    for (field, spec) in specs.iter() {
        rec.set(*field, extract(spec, src));
    }
    rec
}
