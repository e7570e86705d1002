// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use clap::ValueEnum;

use deparser::engine::Deparser;
use deparser::engine::packet::EgressOut;
use deparser::engine::packet::IngressOut;
use deparser::print::print_cfg_into;
use deparser::print::print_counters;
use deparser::print::print_egress_out;
use deparser::print::print_ingress_out;
use deparser::provider::PrintlnLog;
use deparser::provider::Providers;
use deparser::provider::StaticChip;
use deparser_api::API_VERSION;
use deparser_api::Gress;
use deparseadm::load_cfg;
use deparseadm::load_phv;
use deparseadm::pcap::PcapBuilder;
use serde::Serialize;

/// Run the switch deparser model outside of a chip
#[derive(Debug, Parser)]
#[command(version = deparser_pkg_version())]
enum Command {
    /// Load and validate a configuration, then summarize it.
    Check {
        /// The TOML configuration file.
        cfg: PathBuf,
    },

    /// Deparse a single PHV.
    Run {
        /// The TOML configuration file.
        cfg: PathBuf,

        /// The TOML PHV description.
        phv: PathBuf,

        #[arg(long, value_enum, default_value_t = GressArg::Ingress)]
        gress: GressArg,

        /// The pipe the deparser belongs to.
        #[arg(long, default_value_t = 0)]
        pipe: u8,

        /// The number of pipes present.
        #[arg(long, default_value_t = 4)]
        pipes: u8,

        /// Write every packet leaving the deparser to a pcap file.
        #[arg(long)]
        pcap: Option<PathBuf>,

        /// Emit the results as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum GressArg {
    Ingress,
    Egress,
}

impl From<GressArg> for Gress {
    fn from(g: GressArg) -> Self {
        match g {
            GressArg::Ingress => Gress::Ingress,
            GressArg::Egress => Gress::Egress,
        }
    }
}

fn deparser_pkg_version() -> String {
    format!("{} (API v{})", env!("CARGO_PKG_VERSION"), API_VERSION)
}

#[derive(Serialize)]
#[serde(untagged)]
enum Out {
    Ingress(IngressOut),
    Egress(EgressOut),
}

impl Out {
    /// The packets leaving the deparser, in capture order.
    fn pkts(&self) -> Vec<&[u8]> {
        let mut pkts = vec![];
        match self {
            Self::Ingress(out) => {
                pkts.extend(out.pkt.as_ref().map(|d| d.pkt.as_slice()));
                pkts.extend(out.mirror.as_ref().map(|m| m.pkt.as_slice()));
                pkts.extend(out.resubmit.as_ref().map(|r| r.pkt.as_slice()));
            }

            Self::Egress(out) => {
                pkts.extend(out.pkt.as_ref().map(|d| d.pkt.as_slice()));
                pkts.extend(out.mirror.as_ref().map(|m| m.pkt.as_slice()));
            }
        }
        pkts
    }

    fn print(&self) -> io::Result<()> {
        match self {
            Self::Ingress(out) => print_ingress_out(out),
            Self::Egress(out) => print_egress_out(out),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cmd = Command::parse();
    match cmd {
        Command::Check { cfg } => {
            let cfg = load_cfg(&cfg)?;
            print_cfg_into(&mut io::stdout(), &cfg)?;
        }

        Command::Run { cfg, phv, gress, pipe, pipes, pcap, json } => {
            let cfg = load_cfg(&cfg)?;
            let phv_file = load_phv(&phv)?;
            let phv = phv_file.phv()?;
            let pkt = phv_file.packet()?;

            let providers = Providers {
                log: Box::new(PrintlnLog),
                chip: Box::new(StaticChip::new(pipes)),
            };
            let mut dp = Deparser::new(pipe, cfg, providers)?;

            let out = match Gress::from(gress) {
                Gress::Ingress => Out::Ingress(dp.deparse_ingress(&phv, &pkt)),
                Gress::Egress => Out::Egress(dp.deparse_egress(&phv, &pkt)),
            };

            if let Some(path) = pcap {
                let file = File::create(&path).map_err(|e| {
                    anyhow::anyhow!("failed to create {}: {e}", path.display())
                })?;
                let mut pb = PcapBuilder::new(BufWriter::new(file))?;
                for p in out.pkts() {
                    pb.add_pkt(p)?;
                }
                pb.into_inner().flush()?;
            }

            if json {
                #[derive(Serialize)]
                struct Report<'a> {
                    out: &'a Out,
                    counters: deparser::engine::counter::CounterBankSnap,
                }

                let report = Report { out: &out, counters: dp.counters_snap() };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                out.print()?;
                print_counters(&dp.counters_snap())?;
            }
        }
    }

    Ok(())
}
