//! CLI for swathsync: mirror a date range of swath granules.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use swathsync_core::bucket::parse_date;
use swathsync_core::config;
use swathsync_core::driver::RangeDriver;

/// Mirror daily swath granules for every configured product.
#[derive(Debug, Parser)]
#[command(name = "swathsync", version)]
#[command(
    about = "swathsync: mirror daily satellite swath files from a remote archive",
    long_about = None
)]
pub struct Cli {
    /// First day to mirror, as YYYYMMDD.
    pub start_date: String,
    /// Last day to mirror (inclusive), as YYYYMMDD.
    pub end_date: String,
}

impl Cli {
    /// Parse `std::env::args`, exiting 0 for help/version and 1 on misuse.
    pub fn parse_or_exit() -> Self {
        match Self::try_parse() {
            Ok(cli) => cli,
            Err(err) => {
                let _ = err.print();
                std::process::exit(exit_code_for(err.kind()));
            }
        }
    }

    pub async fn run(self) -> Result<()> {
        let start = parse_date(&self.start_date)?;
        let end = parse_date(&self.end_date)?;

        let cfg = config::load_or_init().context("failed to load configuration")?;
        tracing::debug!("loaded config: {:?}", cfg);
        if cfg.resolved_token().is_none() {
            tracing::warn!(
                "no archive token configured; set `token` in config.toml or {}",
                config::TOKEN_ENV
            );
        }

        let driver = RangeDriver::from_config(&cfg);
        let summary = driver.run(&cfg.products, start, end).await;
        println!(
            "{} bucket(s): {} downloaded, {} already present, {} failed, {} without manifest",
            summary.buckets,
            summary.succeeded,
            summary.skipped,
            summary.failed,
            summary.manifests_unavailable
        );
        Ok(())
    }
}

fn exit_code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}
