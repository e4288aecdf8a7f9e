//! QueryBuilder: turns a Search plus the current peer mode into a
//! wire-ready Query packet.

use std::net::Ipv4Addr;

use gnutella_dtyp::Guid;
use gnutella_msg::header::{Function, Header};
use gnutella_msg::message::{Message, Packet};
use gnutella_msg::query::{QueryPayload, SpeedFlags};
use rand::RngCore;

use crate::muid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerMode {
    Leaf,
    Ultrapeer,
}

/// The locally-advertised OOB reply address, when UDP is active and that
/// address is externally routable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OobReplyAddr {
    pub addr: Ipv4Addr,
    pub port: u16,
}

pub struct QueryBuilder {
    pub mode: PeerMode,
    pub firewalled: bool,
    pub oob_reply_addr: Option<OobReplyAddr>,
    pub muid_draw_attempts: u32,
}

impl QueryBuilder {
    /// Builds a Query packet for `query_text`. `is_muid_taken` lets the
    /// caller check drawn MUIDs against the live MUID→Search map.
    pub fn build(
        &self,
        rng: &mut impl RngCore,
        query_text: &str,
        ttl: u8,
        is_muid_taken: impl Fn(&Guid) -> bool,
    ) -> Option<Packet> {
        let use_oob = self.oob_reply_addr.is_some();

        let muid = if use_oob {
            let OobReplyAddr { addr, port } = self.oob_reply_addr.unwrap();
            let mut candidate = muid::oob_muid(rng, addr, port);
            let mut attempts_left = self.muid_draw_attempts;
            while is_muid_taken(&candidate) && attempts_left > 0 {
                candidate = muid::oob_muid(rng, addr, port);
                attempts_left -= 1;
            }
            if is_muid_taken(&candidate) {
                return None;
            }
            candidate
        } else {
            muid::draw_unique_muid(rng, self.muid_draw_attempts, is_muid_taken)?
        };

        let mut speed = SpeedFlags::new();
        speed.set_mark(true);
        speed.set_firewalled(self.firewalled);
        speed.set_leaf_guided(self.mode == PeerMode::Leaf);
        speed.set_ggep_h(true);
        speed.set_oob_reply(use_oob);

        let payload = QueryPayload::new(query_text, speed);
        let header = Header::new(muid, Function::Query, ttl, 0, 0);
        Some(Packet { header, message: Message::Query(payload) })
    }

    /// Builds the plain `urn:sha1:<base32>` form of a query when the
    /// search's text is itself an SHA-1 urn.
    pub fn build_urn_query(
        &self,
        rng: &mut impl RngCore,
        urn: &str,
        ttl: u8,
        is_muid_taken: impl Fn(&Guid) -> bool,
    ) -> Option<Packet> {
        self.build(rng, urn, ttl, is_muid_taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn oob_query_sets_oob_and_ggep_h_bits() {
        let builder = QueryBuilder {
            mode: PeerMode::Ultrapeer,
            firewalled: false,
            oob_reply_addr: Some(OobReplyAddr { addr: Ipv4Addr::new(198, 51, 100, 7), port: 6346 }),
            muid_draw_attempts: 10,
        };
        let mut rng = StepRng::new(1, 1);
        let packet = builder.build(&mut rng, "hello world", 7, |_| false).unwrap();
        let Message::Query(payload) = packet.message else { panic!("expected Query") };
        assert!(payload.speed.oob_reply());
        assert!(payload.speed.ggep_h());
        assert!(!payload.speed.firewalled());
    }

    #[test]
    fn non_oob_query_draws_plain_random_muid() {
        let builder = QueryBuilder {
            mode: PeerMode::Leaf,
            firewalled: true,
            oob_reply_addr: None,
            muid_draw_attempts: 10,
        };
        let mut rng = StepRng::new(7, 3);
        let packet = builder.build(&mut rng, "moby dick", 7, |_| false).unwrap();
        let Message::Query(payload) = packet.message else { panic!("expected Query") };
        assert!(!payload.speed.oob_reply());
        assert!(payload.speed.firewalled());
        assert!(payload.speed.leaf_guided());
    }

    #[test]
    fn gives_up_when_every_muid_is_taken() {
        let builder = QueryBuilder {
            mode: PeerMode::Leaf,
            firewalled: false,
            oob_reply_addr: None,
            muid_draw_attempts: 3,
        };
        let mut rng = StepRng::new(1, 1);
        assert!(builder.build(&mut rng, "x", 7, |_| true).is_none());
    }
}
