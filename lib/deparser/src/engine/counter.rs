// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The deparser counter bank.
//!
//! Hardware counters are narrower than a `u64` and wrap to zero on
//! overflow rather than saturating. Each gress has a named set of
//! them, declared as a struct of [`WrapCounter`] fields with
//! `#[derive(CounterProvider)]`, which generates name lookup and a
//! serializable snapshot type.

use super::disposition::Disposition;
use super::disposition::DropReason;
use alloc::vec::Vec;
use counter_macro::CounterProvider;
use deparser_api::DeparserError;
use deparser_api::Gress;
use serde::Serialize;

/// The number of per-port error counters. They are indexed by the
/// pipe-local port number.
pub const PORT_ERR_COUNTERS: usize = 72;

/// A single hardware counter.
pub trait Counter {
    /// The width of the counter in bits.
    fn width(&self) -> u32;

    fn val(&self) -> u64;

    /// Write the counter. Bits beyond its width are discarded.
    fn set(&mut self, val: u64);

    /// Add one, wrapping to zero.
    fn incr(&mut self);

    /// Add `n`, wrapping modulo the width.
    fn add(&mut self, n: u64);

    /// Set the counter to its maximum value, so the next increment
    /// wraps.
    fn wrap_to_max(&mut self);
}

/// A counter `BITS` wide.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WrapCounter<const BITS: u32> {
    value: u64,
}

impl<const BITS: u32> WrapCounter<BITS> {
    pub const MAX: u64 = if BITS >= 64 { u64::MAX } else { (1 << BITS) - 1 };

    pub const fn new() -> Self {
        Self { value: 0 }
    }

    pub const fn val(&self) -> u64 {
        self.value
    }

    pub fn set(&mut self, val: u64) {
        self.value = val & Self::MAX;
    }

    pub fn incr(&mut self) {
        self.add(1);
    }

    pub fn add(&mut self, n: u64) {
        self.value = self.value.wrapping_add(n) & Self::MAX;
    }
}

impl<const BITS: u32> Counter for WrapCounter<BITS> {
    fn width(&self) -> u32 {
        BITS
    }

    fn val(&self) -> u64 {
        self.value
    }

    fn set(&mut self, val: u64) {
        WrapCounter::set(self, val)
    }

    fn incr(&mut self) {
        WrapCounter::incr(self)
    }

    fn add(&mut self, n: u64) {
        WrapCounter::add(self, n)
    }

    fn wrap_to_max(&mut self) {
        self.value = Self::MAX;
    }
}

/// A provider of named wrap-on-overflow counters.
///
/// Rather than implementing this trait manually, derive it on a
/// struct of named [`WrapCounter`] fields.
///
/// ```ignore
/// #[derive(CounterProvider)]
/// struct SomeCounters {
///     pkts: WrapCounter<48>,
///     errors: WrapCounter<16>,
/// }
/// ```
pub trait CounterProvider: Sized {
    const NUM_FIELDS: u32;

    /// The field names, in declaration order.
    const NAMES: &'static [&'static str];

    type Snap;

    fn new() -> Self;

    /// Return a snapshot of the counters. This is how you obtain a
    /// copy, as opposed to the traditional clone().
    fn snapshot(&self) -> Self::Snap;

    fn counter(&self, name: &str) -> Option<&dyn Counter>;

    fn counter_mut(&mut self, name: &str) -> Option<&mut dyn Counter>;

    fn num_fields(&self) -> u32 {
        Self::NUM_FIELDS
    }

    fn names(&self) -> &'static [&'static str] {
        Self::NAMES
    }
}

/// Ingress deparser counters.
#[derive(CounterProvider)]
pub struct IngressCounters {
    /// PHVs presented to the deparser.
    pub phv: WrapCounter<48>,

    /// Tagalong PHVs presented to the deparser. This trails `phv` by
    /// one call whenever the most recent call resubmitted.
    pub tphv: WrapCounter<48>,

    pub resubmit: WrapCounter<32>,

    /// Packets handed on with a destination.
    pub read: WrapCounter<48>,

    pub discard: WrapCounter<32>,
    pub learn: WrapCounter<32>,
    pub hdr_too_long: WrapCounter<16>,

    /// Packets forwarded or discarded.
    pub pkts: WrapCounter<48>,

    pub fwd: WrapCounter<48>,
    pub disc: WrapCounter<48>,

    /// Mirror copies made.
    pub mirr: WrapCounter<48>,
}

/// Egress deparser counters.
#[derive(CounterProvider)]
pub struct EgressCounters {
    pub phv: WrapCounter<48>,
    pub tphv: WrapCounter<48>,
    pub read: WrapCounter<48>,
    pub discard: WrapCounter<32>,
    pub hdr_too_long: WrapCounter<16>,
    pub pkts: WrapCounter<48>,
    pub fwd: WrapCounter<48>,
    pub disc: WrapCounter<48>,
    pub mirr: WrapCounter<48>,
}

/// What a single deparse call did, as far as the counters care.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Tally {
    pub disposition: Disposition,
    pub mirrored: bool,
    pub learned: bool,
}

/// A point-in-time copy of the whole [`CounterBank`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CounterBankSnap {
    pub ingress: IngressCountersSnap,
    pub egress: EgressCountersSnap,
    pub port_errors: Vec<u64>,
}

/// All counters owned by one pipe's deparser.
pub struct CounterBank {
    pub ingress: IngressCounters,
    pub egress: EgressCounters,
    port_errors: [WrapCounter<16>; PORT_ERR_COUNTERS],

    // The last ingress call resubmitted and has yet to count its
    // tagalong PHV.
    tphv_pending: bool,
}

impl Default for CounterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterBank {
    pub fn new() -> Self {
        Self {
            ingress: IngressCounters::new(),
            egress: EgressCounters::new(),
            port_errors: [WrapCounter::new(); PORT_ERR_COUNTERS],
            tphv_pending: false,
        }
    }

    pub fn snapshot(&self) -> CounterBankSnap {
        CounterBankSnap {
            ingress: self.ingress.snapshot(),
            egress: self.egress.snapshot(),
            port_errors: self.port_errors.iter().map(|c| c.val()).collect(),
        }
    }

    /// Look up the counter `name` of `gress`.
    pub fn counter(
        &self,
        gress: Gress,
        name: &str,
    ) -> Result<&dyn Counter, DeparserError> {
        let ctr = match gress {
            Gress::Ingress => self.ingress.counter(name),
            Gress::Egress => self.egress.counter(name),
        };
        ctr.ok_or(DeparserError::NoSuchCounter)
    }

    pub fn counter_mut(
        &mut self,
        gress: Gress,
        name: &str,
    ) -> Result<&mut dyn Counter, DeparserError> {
        let ctr = match gress {
            Gress::Ingress => self.ingress.counter_mut(name),
            Gress::Egress => self.egress.counter_mut(name),
        };
        ctr.ok_or(DeparserError::NoSuchCounter)
    }

    /// The error counter of pipe-local port `local`.
    pub fn port_error(&self, local: usize) -> Option<&dyn Counter> {
        self.port_errors.get(local).map(|c| c as &dyn Counter)
    }

    pub fn port_error_mut(&mut self, local: usize) -> Option<&mut dyn Counter> {
        self.port_errors.get_mut(local).map(|c| c as &mut dyn Counter)
    }

    /// Count an error against `port`. Ports whose pipe-local number
    /// has no counter are ignored.
    pub fn incr_port_error(&mut self, port: u16) {
        let local = usize::from(port & 0x7F);
        if let Some(c) = self.port_errors.get_mut(local) {
            c.incr();
        }
    }

    /// Count the start of an ingress deparse call.
    pub(crate) fn ingress_begin(&mut self) {
        self.ingress.phv.incr();
        if self.tphv_pending {
            self.ingress.tphv.incr();
            self.tphv_pending = false;
        }
    }

    /// Count the outcome of an ingress deparse call.
    pub(crate) fn ingress_end(&mut self, tally: &Tally) {
        let c = &mut self.ingress;

        match tally.disposition {
            Disposition::Forward => {
                c.tphv.incr();
                c.read.incr();
                c.pkts.incr();
                c.fwd.incr();
            }

            Disposition::Drop(reason) => {
                c.tphv.incr();
                c.pkts.incr();
                c.discard.incr();
                c.disc.incr();
                if reason == DropReason::HdrTooLong {
                    c.hdr_too_long.incr();
                }
            }

            Disposition::Resubmit => {
                c.resubmit.incr();
                self.tphv_pending = true;
            }
        }

        if tally.mirrored {
            self.ingress.mirr.incr();
        }

        if tally.learned {
            self.ingress.learn.incr();
        }
    }

    /// Count an egress deparse call.
    pub(crate) fn egress(&mut self, tally: &Tally) {
        let c = &mut self.egress;
        c.phv.incr();
        c.tphv.incr();

        match tally.disposition {
            Disposition::Forward => {
                c.read.incr();
                c.pkts.incr();
                c.fwd.incr();
            }

            Disposition::Drop(reason) => {
                c.pkts.incr();
                c.discard.incr();
                c.disc.incr();
                if reason == DropReason::HdrTooLong {
                    c.hdr_too_long.incr();
                }
            }

            // Egress never resubmits.
            Disposition::Resubmit => {}
        }

        if tally.mirrored {
            c.mirr.incr();
        }
    }
}
