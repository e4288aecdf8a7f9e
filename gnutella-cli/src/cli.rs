use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Remote servent to talk to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: Ipv4Addr,

    #[arg(long, default_value_t = 6346)]
    pub port: u16,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sends a Query packet and prints every QueryHit received within
    /// the listening window.
    Search {
        query: String,

        #[arg(long, default_value_t = 7)]
        ttl: u8,

        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },

    /// Fetches a single chunk of a file over HTTP from a direct source.
    Download {
        /// File index as advertised in the QueryHit record.
        index: u32,
        name: String,

        #[arg(long)]
        sha1: Option<String>,

        #[arg(long)]
        out: PathBuf,
    },
}
