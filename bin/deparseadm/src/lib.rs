// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Deparser administration library.
//!
//! Loads deparser configuration and PHV descriptions from TOML and
//! writes deparsed packets to capture files.

use deparser::engine::Packet;
use deparser::engine::Phv;
use deparser_api::DeparserCfg;
use deparser_api::DeparserError;
use deparser_api::PhvAddr;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

pub mod pcap;

/// Errors related to loading and running a deparser.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {0}: {1}")]
    Io(String, std::io::Error),

    #[error("failed to parse {0}: {1}")]
    Toml(String, toml::de::Error),

    #[error("invalid configuration: {0}")]
    Cfg(#[from] DeparserError),

    #[error("packet bytes: invalid hex at offset {0}")]
    BadHex(usize),

    #[error("packet header length {hdr_len} exceeds packet length {len}")]
    HdrLen { hdr_len: usize, len: usize },

    #[error("pcap: {0}")]
    Pcap(String),
}

fn read(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::Io(path.display().to_string(), e))
}

fn parse<T: for<'de> Deserialize<'de>>(
    path: &Path,
    text: &str,
) -> Result<T, Error> {
    toml::from_str(text).map_err(|e| Error::Toml(path.display().to_string(), e))
}

/// Load and validate a deparser configuration.
pub fn load_cfg(path: &Path) -> Result<DeparserCfg, Error> {
    let cfg: DeparserCfg = parse(path, &read(path)?)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load a PHV description.
pub fn load_phv(path: &Path) -> Result<PhvFile, Error> {
    parse(path, &read(path)?)
}

/// The value of a single PHV container.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
pub struct ContainerVal {
    pub addr: PhvAddr,
    pub val: u32,
}

/// The packet the PHV was parsed from.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct PacketDesc {
    /// The packet bytes as a hex string. Whitespace is ignored.
    pub bytes: String,
    pub hdr_len: usize,
    pub port: u16,
}

/// A PHV description: the valid containers plus the packet they
/// came from.
///
/// ```toml
/// [packet]
/// bytes = "0102 0304 0506"
/// hdr_len = 4
/// port = 3
///
/// [[containers]]
/// addr = 64
/// val = 1
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct PhvFile {
    pub packet: PacketDesc,
    pub containers: Vec<ContainerVal>,
}

impl PhvFile {
    pub fn phv(&self) -> Result<Phv, Error> {
        let mut phv = Phv::new();
        for c in &self.containers {
            phv.set(c.addr, c.val)?;
        }
        Ok(phv)
    }

    pub fn packet(&self) -> Result<Packet, Error> {
        let bytes = parse_hex(&self.packet.bytes)?;
        if self.packet.hdr_len > bytes.len() {
            return Err(Error::HdrLen {
                hdr_len: self.packet.hdr_len,
                len: bytes.len(),
            });
        }
        Ok(Packet::new(bytes, self.packet.hdr_len, self.packet.port))
    }
}

/// Decode a hex string, ignoring whitespace.
pub fn parse_hex(s: &str) -> Result<Vec<u8>, Error> {
    let digits: Vec<(usize, char)> =
        s.char_indices().filter(|(_, c)| !c.is_whitespace()).collect();

    digits
        .chunks(2)
        .map(|pair| match pair {
            [(off, hi), (_, lo)] => {
                let hi = hi.to_digit(16).ok_or(Error::BadHex(*off))?;
                let lo = lo.to_digit(16).ok_or(Error::BadHex(*off))?;
                Ok((hi << 4 | lo) as u8)
            }

            // An odd digit out.
            _ => Err(Error::BadHex(pair[0].0)),
        })
        .collect()
}
