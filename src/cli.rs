//! Command-line surface (spec.md §4.7/§6's "control surface"), grounded
//! on the teacher's `clap` derive shape, dropping the `Search`/
//! `AutoRegister` subcommands tied to the Postgres/captcha stack this
//! repo does not carry.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "onionwatch", about = "Breadth-first hidden-service crawler")]
pub struct Cli {
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the crawl engine.
    Crawl {
        /// Comma-separated seed URLs, or a path to a newline-delimited file.
        #[arg(long)]
        seeds: Option<String>,
        /// A single additional seed URL.
        #[arg(long)]
        seed: Option<String>,
        /// Override every domain's crawl depth ceiling.
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Print aggregate store/graph/alert/frontier stats.
    Stats,
    /// Write a report file (json|csv|emails|crypto).
    Export {
        #[arg(long, default_value = "json")]
        format: String,
        #[arg(long)]
        output: Option<String>,
    },
    /// Queue validated seed URLs without starting the engine.
    AddSeeds { urls: Vec<String> },
    /// Tag a crawled URL as important or a false positive.
    MarkIntel {
        url: String,
        /// `important` or `false_positive`.
        label: String,
        #[arg(long, default_value_t = true)]
        value: bool,
    },
    /// Add a domain to the blacklist or whitelist.
    Blacklist {
        domain: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    Whitelist { domain: String },
    /// Boost or freeze a domain's crawl priority.
    BoostDomain { domain: String, boost: f64 },
    FreezeDomain { domain: String },
    UnfreezeDomain { domain: String },
    /// Delete intel rows older than `days` (optionally anonymizing instead).
    Purge {
        #[arg(long, default_value_t = 90)]
        days: i64,
        #[arg(long, default_value_t = false)]
        anonymize: bool,
    },
    Vacuum,
}
