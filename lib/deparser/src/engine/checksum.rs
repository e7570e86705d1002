// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The deparser checksum engines.
//!
//! Each engine keeps a rolling one's complement sum over a configured
//! list of PHV containers. The [`Checksum`] type provides the rolling
//! sum, delaying the folding of carries until the finalized value is
//! needed; [`HeaderChecksum`] is the finalized value as it is written
//! into a header.
//!
//! # Containers as 16-bit words
//!
//! Unlike a checksum over packet bytes, an engine sums logical
//! container values, not memory. Each container is split into the
//! 16-bit words it would occupy on the wire:
//!
//! * a 32-bit container contributes its high word, then its low word,
//! * a 16-bit container contributes its value,
//! * an 8-bit container contributes its value in the low byte lane.
//!
//! An entry with `swap` set byte-swaps each of its words first, which
//! moves an 8-bit container into the high byte lane. Because the
//! words are logical values the engine never converts byte order; the
//! result is a logical `u16` to be written big-endian.
//!
//! # Relevant RFCs
//!
//! * 1071 Computing the Internet Checksum

use super::phv::Phv;
use deparser_api::CSUM_ENGINES;
use deparser_api::CsumEngineCfg;
use deparser_api::CsumEntryCfg;
use deparser_api::PhvWidth;

/// The checksum value, as it is contained in a network header.
///
/// This holds the one's complement of the folded sum.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HeaderChecksum {
    inner: u16,
}

impl HeaderChecksum {
    /// The value to be written into the header.
    pub fn value(&self) -> u16 {
        self.inner
    }

    /// The bytes of this header checksum in network order.
    pub fn bytes(&self) -> [u8; 2] {
        self.inner.to_be_bytes()
    }
}

impl From<Checksum> for HeaderChecksum {
    /// Finalize the rolling checksum and put it into header form by
    /// performing one's complement.
    fn from(mut csum: Checksum) -> HeaderChecksum {
        Self { inner: !csum.finalize() }
    }
}

/// A rolling one's complement checksum calculation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Checksum {
    inner: u32,
}

impl Checksum {
    /// Creates a new checksum counter.
    pub fn new() -> Self {
        Self::from(0)
    }

    /// Add a single logical 16-bit word.
    pub fn add_word(&mut self, word: u16) {
        self.inner += u32::from(word);
        // Fold early so a long entry list cannot overflow.
        if self.inner & 0x8000_0000 != 0 {
            self.fold();
        }
    }

    /// Add `bytes` as a sequence of big-endian 16-bit words, the last
    /// odd byte padded with zero.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        let mut chunks = bytes.chunks_exact(2);
        for pair in &mut chunks {
            self.add_word(u16::from_be_bytes([pair[0], pair[1]]));
        }

        if let [last] = chunks.remainder() {
            self.add_word(u16::from_be_bytes([*last, 0]));
        }
    }

    /// Create a new rolling checksum, starting with the passed in
    /// `bytes`.
    pub fn compute(bytes: &[u8]) -> Self {
        let mut csum = Self::new();
        csum.add_bytes(bytes);
        csum
    }

    /// Finalize the sum by adding up all the accumulated carries and
    /// returning the resulting value as a `u16`.
    pub fn finalize(&mut self) -> u16 {
        self.fold();
        (self.inner & 0xFFFF) as u16
    }

    fn fold(&mut self) {
        while (self.inner >> 16) != 0 {
            self.inner = (self.inner >> 16) + (self.inner & 0xFFFF);
        }
    }
}

impl From<u32> for Checksum {
    fn from(csum: u32) -> Self {
        Self { inner: csum }
    }
}

impl core::ops::Add for Checksum {
    type Output = Self;

    fn add(mut self, mut other: Self) -> Self {
        let sum = u32::from(self.finalize()) + u32::from(other.finalize());
        Self { inner: sum }
    }
}

impl core::ops::AddAssign for Checksum {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// The output of one checksum engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CsumResult {
    /// The header checksum over the compute entries.
    pub csum: u16,

    /// Whether the compute and verify entries together sum to zero.
    /// `None` when the engine has no verify entries.
    pub verified: Option<bool>,
}

/// The outputs of every engine of one gress.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CsumResults([Option<CsumResult>; CSUM_ENGINES]);

impl CsumResults {
    /// The result of `engine`, if it has any enabled entries.
    pub fn get(&self, engine: u8) -> Option<&CsumResult> {
        self.0.get(usize::from(engine)).and_then(|r| r.as_ref())
    }

    /// The engines whose verify failed.
    pub fn failed(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().enumerate().filter_map(|(i, r)| match r {
            Some(CsumResult { verified: Some(false), .. }) => Some(i as u8),
            _ => None,
        })
    }
}

/// Add the words of one engine entry to `csum`. An invalid container
/// contributes nothing.
fn add_entry(csum: &mut Checksum, entry: &CsumEntryCfg, phv: &Phv) {
    let Some(val) = phv.get(entry.addr) else {
        return;
    };

    let mut add = |word: u16| {
        csum.add_word(if entry.swap { word.swap_bytes() } else { word })
    };

    match entry.addr.width() {
        PhvWidth::W32 => {
            add((val >> 16) as u16);
            add(val as u16);
        }

        PhvWidth::W16 | PhvWidth::W8 => add(val as u16),
    }
}

/// Run a single engine. An engine without enabled entries produces
/// nothing.
pub fn run_engine(cfg: &CsumEngineCfg, phv: &Phv) -> Option<CsumResult> {
    let mut compute = Checksum::new();
    let mut verify = Checksum::new();
    let mut any = false;
    let mut any_verify = false;

    for entry in cfg.entries.iter().filter(|e| e.enabled) {
        any = true;
        if entry.verify {
            any_verify = true;
            add_entry(&mut verify, entry, phv);
        } else {
            add_entry(&mut compute, entry, phv);
        }
    }

    if !any {
        return None;
    }

    let verified = any_verify.then(|| (compute + verify).finalize() == 0xFFFF);
    Some(CsumResult { csum: HeaderChecksum::from(compute).value(), verified })
}

/// Run every configured engine over `phv`.
pub fn compute(engines: &[CsumEngineCfg], phv: &Phv) -> CsumResults {
    let mut res = CsumResults::default();
    for (slot, cfg) in res.0.iter_mut().zip(engines) {
        *slot = run_engine(cfg, phv);
    }
    res
}
