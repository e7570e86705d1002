// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Routines for building packet capture files.

use super::Error;
use pcap_parser::Linktype;
use pcap_parser::ToVec;
use pcap_parser::pcap::LegacyPcapBlock;
use pcap_parser::pcap::PcapHeader;
use std::io::Write;

/// Build a packet capture from a series of packets.
pub struct PcapBuilder<W: Write> {
    out: W,
}

impl<W: Write> PcapBuilder<W> {
    /// Create a new pcap builder, writing the capture to `out`.
    pub fn new(mut out: W) -> Result<Self, Error> {
        let mut hdr = PcapHeader {
            magic_number: 0xa1b2c3d4,
            version_major: 2,
            version_minor: 4,
            thiszone: 0,
            sigfigs: 0,
            snaplen: 65535,
            network: Linktype::ETHERNET,
        };

        let bytes = hdr.to_vec().map_err(|e| Error::Pcap(format!("{e:?}")))?;
        out.write_all(&bytes).map_err(|e| Error::Pcap(e.to_string()))?;
        Ok(Self { out })
    }

    /// Add a packet to the capture.
    pub fn add_pkt(&mut self, pkt: &[u8]) -> Result<(), Error> {
        let mut block = LegacyPcapBlock {
            ts_sec: 7777,
            ts_usec: 7777,
            caplen: pkt.len() as u32,
            origlen: pkt.len() as u32,
            data: pkt,
        };

        let bytes = block.to_vec().map_err(|e| Error::Pcap(format!("{e:?}")))?;
        self.out.write_all(&bytes).map_err(|e| Error::Pcap(e.to_string()))
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pcap_parser::pcap::parse_pcap_frame;
    use pcap_parser::pcap::parse_pcap_header;

    #[test]
    fn capture_reads_back() {
        let mut pb = PcapBuilder::new(Vec::new()).unwrap();
        pb.add_pkt(&[1, 2, 3]).unwrap();
        pb.add_pkt(&[4, 5]).unwrap();
        let buf = pb.into_inner();

        let (rest, hdr) = parse_pcap_header(&buf).unwrap();
        assert_eq!(hdr.network, Linktype::ETHERNET);
        let (rest, block) = parse_pcap_frame(rest).unwrap();
        assert_eq!(block.data, &[1, 2, 3]);
        let (rest, block) = parse_pcap_frame(rest).unwrap();
        assert_eq!(block.data, &[4, 5]);
        assert!(rest.is_empty());
    }
}
