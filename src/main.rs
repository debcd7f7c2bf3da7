//! A tool to detect and track embargoed resources in a PASTA+ data repository.
//!
//! # Overview
//!
//! `embargo-sniffer` inspects every data package in a PASTA+ repository and
//! records which of its resources are embargoed, meaning the public is unable
//! to read them. Findings accumulate in a local SQLite ledger that downstream
//! reporting can query.
//!
//! Two kinds of embargo are distinguished:
//!
//! - **Explicit**: the resource's access control carries a rule that denies
//!   the public principal read permission.
//! - **Implicit**: no access control applies to the resource at all, or none
//!   of its rules grant the public read permission.
//!
//! The tool also flags resources readable by authenticated users despite the
//! public embargo, and marks *ephemeral* embargoes, explicit embargoes in the
//! repository's access matrix that the package's own metadata no longer backs.
//!
//! # Quick Start
//!
//! Scan the repository and update the local ledger:
//!
//! ```bash
//! embargo-sniffer scan
//! ```
//!
//! Scanning is incremental: newly created packages are pulled from the
//! registry into a local package pool, then only packages created since the
//! last completed run are classified. A full re-run starts from scratch after:
//!
//! ```bash
//! embargo-sniffer reset
//! ```
//!
//! # Basic Usage
//!
//! **Pull new packages without classifying them:**
//! ```bash
//! embargo-sniffer scan --packages-only
//! ```
//!
//! **Limit the registry pull batch size:**
//! ```bash
//! embargo-sniffer scan --limit 500
//! ```
//!
//! **Remove only one classification slice:**
//! ```bash
//! embargo-sniffer reset --category explicit
//! embargo-sniffer reset --category implicit
//! ```
//!
//! # Configuration
//!
//! Settings come from an optional TOML file given with `--config`; every field
//! has a production default:
//!
//! ```toml
//! base_url = "https://pasta.lternet.edu/package/"
//! data_dir = "/var/sniffer"
//! start_date = "2013-01-01T00:00:00"
//! ignored_scopes = ["ecotrends", "lter-landsat", "lter-landsat-ledaps"]
//! ```
//!
//! Credentials and the registry database URL never live in the file; they are
//! passed on the command line or through the environment:
//!
//! ```bash
//! export PASTA_DN="uid=sniffer,o=EDI,dc=edirepository,dc=org"
//! export PASTA_PASSWORD=...
//! export PASTA_REGISTRY_URL=postgres://pasta@db.lternet.edu/pasta
//! embargo-sniffer scan
//! ```
//!
//! Only one instance runs at a time; a second invocation exits immediately
//! when the run lock is held.

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use embargo_sniffer::Result;

mod commands;

use crate::commands::{ResetArgs, ScanArgs, reset_ledger, scan_packages};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "embargo-sniffer", version, about)]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: SnifferSubcommand,
}

#[derive(Subcommand, Debug)]
enum SnifferSubcommand {
    /// Acquire new packages and record embargoed resources in the ledger
    Scan(ScanArgs),
    /// Remove recorded classifications from the ledger
    Reset(ResetArgs),
}

fn main() -> Result<()> {
    match &Cli::parse().command {
        SnifferSubcommand::Scan(scan_args) => scan_packages(scan_args),
        SnifferSubcommand::Reset(reset_args) => reset_ledger(reset_args),
    }
}
