//! Command-line demo client: issues a Query over an already-connected
//! Gnutella stream and prints the QueryHits it gets back, or fetches a
//! single file chunk over HTTP.

mod cli;

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::{Duration, Instant};

use clap::Parser;
use gnutella_core::hit_parser::HitParser;
use gnutella_core::http_downloader;
use gnutella_core::query_builder::{PeerMode, QueryBuilder};
use gnutella_core::Outcome;
use gnutella_dtyp::Sha1Digest;
use gnutella_msg::header::{Function, Header};
use gnutella_msg::message::{Message, Packet};
use gnutella_transport::http::{parse_response, RequestBuilder};
use gnutella_transport::tcp::GnutellaStream;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use cli::{Cli, Commands};

const SIZE_CEILING: usize = 64 * 1024;

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Search { query, ttl, timeout_secs } => run_search(cli.host, cli.port, &query, ttl, timeout_secs).await,
        Commands::Download { index, name, sha1, out } => {
            run_download(cli.host, cli.port, index, &name, sha1.as_deref(), &out).await
        }
    };

    if let Err(err) = result {
        log::error!("{err}");
        std::process::exit(1);
    }
}

async fn run_search(host: Ipv4Addr, port: u16, query: &str, ttl: u8, timeout_secs: u64) -> Result<(), String> {
    let addr = SocketAddr::from((host, port));
    let mut stream = GnutellaStream::connect(addr).await.map_err(|e| e.to_string())?;

    let builder = QueryBuilder { mode: PeerMode::Leaf, firewalled: true, oob_reply_addr: None, muid_draw_attempts: 10 };
    let mut rng = rand::thread_rng();
    let packet = builder.build(&mut rng, query, ttl, |_| false).ok_or("could not draw a unique MUID")?;
    let muid = packet.header.muid;

    stream.write_packet(&packet).await.map_err(|e| e.to_string())?;
    log::info!("sent query {query:?} with ttl {ttl}");

    let parser = HitParser { push_ignored_hint: false };
    let deadline = Instant::now() + Duration::from_secs(timeout_secs);
    let mut hits = 0u32;

    while Instant::now() < deadline {
        let remaining = deadline - Instant::now();
        let next = tokio::time::timeout(remaining, stream.read_packet(SIZE_CEILING)).await;
        let packet = match next {
            Ok(Ok(packet)) => packet,
            Ok(Err(err)) => return Err(err.to_string()),
            Err(_) => break,
        };

        if packet.header.muid != muid || packet.header.function != Function::QueryHit {
            continue;
        }
        let Message::QueryHit(payload) = packet.message else { continue };
        match parser.parse(&payload) {
            Outcome::Continue(result) => {
                hits += 1;
                println!("hit from {}:{} ({} results)", result.addr, result.port, result.records.len());
                for record in &result.records {
                    println!("  [{}] {} ({} bytes)", record.file_index, record.name, record.file_size);
                }
            }
            Outcome::DropWith(reason) => log::warn!("dropped a hit: {reason:?}"),
            Outcome::Stop => break,
        }
    }

    println!("{hits} hit(s) received");
    Ok(())
}

async fn run_download(
    host: Ipv4Addr,
    port: u16,
    index: u32,
    name: &str,
    sha1: Option<&str>,
    out: &Path,
) -> Result<(), String> {
    let addr = SocketAddr::from((host, port));
    let mut tcp = TcpStream::connect(addr).await.map_err(|e| e.to_string())?;

    let mut download = gnutella_core::download::Download::new(name, index, slotmap::KeyData::from_ffi(0).into());
    if let Some(sha1) = sha1 {
        download.sha1 = Some(sha1.parse::<Sha1Digest>().map_err(|e| e.to_string())?);
    }

    let (path, _uri_res) = http_downloader::select_path(&download);
    let request = RequestBuilder::get(path, true).header("Host", format!("{host}:{port}")).build();
    tcp.write_all(request.as_bytes()).await.map_err(|e| e.to_string())?;

    let mut buf = Vec::new();
    let (response, leftover) = loop {
        if let Some(parsed) = parse_response(&buf).map_err(|e| e.to_string())? {
            break parsed;
        }
        let mut chunk = [0u8; 4096];
        let n = tcp.read(&mut chunk).await.map_err(|e| e.to_string())?;
        if n == 0 {
            return Err("connection closed before headers arrived".to_string());
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    if response.status.code != 200 && response.status.code != 206 {
        return Err(format!("unexpected status {} {}", response.status.code, response.status.message));
    }

    let total: Option<u64> = response.header("content-length").and_then(|v| v.parse().ok());
    let bar = match total {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} ({eta})").unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        }
        None => ProgressBar::new_spinner(),
    };

    let mut file = tokio::fs::File::create(out).await.map_err(|e| e.to_string())?;
    file.write_all(&leftover).await.map_err(|e| e.to_string())?;
    bar.inc(leftover.len() as u64);

    let mut chunk = [0u8; 8192];
    loop {
        let n = tcp.read(&mut chunk).await.map_err(|e| e.to_string())?;
        if n == 0 {
            break;
        }
        file.write_all(&chunk[..n]).await.map_err(|e| e.to_string())?;
        bar.inc(n as u64);
    }
    bar.finish();

    println!("saved to {}", out.display());
    Ok(())
}
