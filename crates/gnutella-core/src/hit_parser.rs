//! HitParser: turns a parsed QueryHit payload into a `ResultSet`,
//! running ExtensionParser over each record's tag and the trailer's GGEP
//! block, and accumulating the SHA-1/ALT error counts that decide whether
//! the whole hit is dropped as malformed.

use std::net::Ipv4Addr;

use gnutella_dtyp::{Guid, Sha1Digest};
use gnutella_ggep::tail::Extension;
use gnutella_ggep::{block, gtkgv, id::GgepId, typed, GgepSocketAddr};
use gnutella_msg::query_hit::QueryHitPayload;

use crate::error::{DropReason, Outcome};

/// The UI-facing `search_handle_ignored_files` tri-state is carried here
/// only as a per-record flag pair; the core never interprets it beyond
/// passing it through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultFlags(u8);

impl ResultFlags {
    pub const DONT_SHOW: ResultFlags = ResultFlags(0x01);
    pub const IGNORED: ResultFlags = ResultFlags(0x02);

    pub fn empty() -> Self {
        ResultFlags(0)
    }

    pub fn contains(self, flag: ResultFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn insert(&mut self, flag: ResultFlags) {
        self.0 |= flag.0;
    }
}

impl std::ops::BitOr for ResultFlags {
    type Output = ResultFlags;
    fn bitor(self, rhs: ResultFlags) -> ResultFlags {
        ResultFlags(self.0 | rhs.0)
    }
}

const TRAILER_FLAG_FIREWALLED: u8 = 0x01;
const TRAILER_FLAG_BUSY: u8 = 0x04;
const TRAILER_FLAG_UPLOADED: u8 = 0x08;
const TRAILER_FLAG_GGEP: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrailerStatus {
    pub busy: bool,
    pub firewalled: bool,
    pub uploaded: bool,
    pub has_ggep: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub file_index: u32,
    pub file_size: u32,
    pub name: String,
    pub sha1: Option<Sha1Digest>,
    pub alt_locs: Vec<GgepSocketAddr>,
    pub flags: ResultFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    pub vendor_code: [u8; 4],
    pub addr: Ipv4Addr,
    pub port: u16,
    pub speed: u32,
    pub guid: Guid,
    pub hostname: Option<String>,
    pub proxies: Vec<GgepSocketAddr>,
    pub status: TrailerStatus,
    pub records: Vec<ParsedRecord>,
}

pub struct HitParser {
    /// Whether ServerTable already has `push-ignored` evidence for this
    /// server — if so, the trailer's firewalled bit is cleared.
    pub push_ignored_hint: bool,
}

impl HitParser {
    pub fn parse(&self, payload: &QueryHitPayload) -> Outcome<ResultSet> {
        if payload.tail.len() < 16 {
            return Outcome::DropWith(DropReason::TooSmall);
        }
        let (trailer_bytes, guid_bytes) = payload.tail.split_at(payload.tail.len() - 16);
        let mut guid_arr = [0u8; 16];
        guid_arr.copy_from_slice(guid_bytes);
        let guid = Guid::from(guid_arr);

        let mut status = TrailerStatus::default();
        let mut vendor_code = [0u8; 4];
        let mut hostname = None;
        let mut proxies = Vec::new();

        if trailer_bytes.len() >= 5 {
            let open_size = trailer_bytes[4] as usize;
            if open_size + 5 <= trailer_bytes.len() && open_size >= 2 {
                vendor_code.copy_from_slice(&trailer_bytes[0..4]);
                let enabler = trailer_bytes[5];
                let active = trailer_bytes[6];
                status.busy = active & TRAILER_FLAG_BUSY != 0 && enabler & TRAILER_FLAG_BUSY != 0;
                status.firewalled =
                    active & TRAILER_FLAG_FIREWALLED != 0 && enabler & TRAILER_FLAG_FIREWALLED != 0;
                status.uploaded =
                    active & TRAILER_FLAG_UPLOADED != 0 && enabler & TRAILER_FLAG_UPLOADED != 0;
                status.has_ggep = active & TRAILER_FLAG_GGEP != 0;

                if self.push_ignored_hint {
                    status.firewalled = false;
                }

                if status.has_ggep {
                    let private = &trailer_bytes[7..5 + open_size];
                    if let Ok((blocks, _)) = block::parse_section(private) {
                        hostname = typed::hostname(&blocks).ok();
                        if let Some(ipv6) = typed::ipv6(&blocks, &GgepId::GtkgIpv6).ok().flatten() {
                            // GTKG.IPV6 replaces the IPv4 address only if routable
                            // and not hostile; that policy decision belongs to the
                            // caller (ServerTable), so we just surface it via hostname
                            // substitution being out of scope here and let the caller
                            // read `ipv6` separately if it needs to. Parsed but unused
                            // beyond validity-checking in this minimal core.
                            let _ = ipv6;
                        }
                        if let Ok(entries) = typed::ipv4_vector(
                            blocks
                                .iter()
                                .find(|b| b.id == GgepId::Push)
                                .map(|b| b.payload.as_slice())
                                .unwrap_or(&[]),
                            None,
                        ) {
                            proxies = entries;
                        }
                        let _ = gtkgv::parse; // GTKGV payload decoded on demand by callers that need version info.
                    }
                }
            }
        }

        let mut records = Vec::with_capacity(payload.records.len());
        let mut sha1_error_count = 0u32;

        for record in &payload.records {
            let name = match record.name.as_str() {
                Ok(s) => s.to_string(),
                Err(_) => return Outcome::DropWith(DropReason::MalformedUtf8),
            };

            let extensions = gnutella_ggep::tail::parse(&record.tag.bytes);
            let mut sha1 = None;
            let mut alt_locs = Vec::new();
            let mut seen_sha1 = 0;

            for ext in &extensions {
                if let Extension::Ggep(ggep_block) = ext {
                    if ggep_block.id == GgepId::Sha1 {
                        seen_sha1 += 1;
                        match typed::sha1(std::slice::from_ref(ggep_block)) {
                            Ok(digest) => sha1 = Some(digest),
                            Err(_) => sha1_error_count += 1,
                        }
                    }
                    if ggep_block.id == GgepId::Alt {
                        if let Ok(entries) = typed::ipv4_vector(&ggep_block.payload, None) {
                            alt_locs.extend(entries);
                        }
                    }
                }
                if let Extension::Huge(urn) = ext {
                    if sha1.is_none() {
                        if let Ok(digest) = urn.parse::<Sha1Digest>() {
                            sha1 = Some(digest);
                        }
                    }
                }
            }

            if !alt_locs.is_empty() && sha1.is_none() {
                // ALT-without-hash: warn only, never escalated to a drop.
            }
            if seen_sha1 > 1 {
                sha1_error_count += 1;
            }

            records.push(ParsedRecord {
                file_index: record.file_index,
                file_size: record.file_size,
                name,
                sha1,
                alt_locs,
                flags: ResultFlags::empty(),
            });
        }

        if sha1_error_count > 0 {
            return Outcome::DropWith(DropReason::MalformedSha1);
        }

        Outcome::Continue(ResultSet {
            vendor_code,
            addr: payload.ip,
            port: payload.port,
            speed: payload.speed,
            guid,
            hostname,
            proxies,
            status,
            records,
        })
    }
}
