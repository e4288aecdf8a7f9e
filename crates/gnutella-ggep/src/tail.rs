//! The top-level `ExtensionParser`: scans a Query/QueryHit extension tail
//! for interleaved HUGE URNs, GGEP sections, and XML metadata blobs.

use crate::block::{self, GgepBlock};

/// Ceiling on how many typed entries one tail yields; past this, remaining
/// bytes are folded into a single trailing [`Extension::Overhead`] rather
/// than silently dropped.
pub const MAX_EXTENSIONS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    /// A HUGE URN string, verbatim (e.g. `urn:sha1:...`).
    Huge(String),
    Ggep(GgepBlock),
    /// An XML metadata blob, verbatim.
    Xml(String),
    /// Bytes this parser didn't recognize, or couldn't finish decoding.
    Overhead(Vec<u8>),
}

/// Scans `tail` for recognized extension openers and returns the typed
/// entries found, in order.
pub fn parse(tail: &[u8]) -> Vec<Extension> {
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < tail.len() {
        if out.len() >= MAX_EXTENSIONS {
            out.push(Extension::Overhead(tail[pos..].to_vec()));
            return out;
        }

        let rest = &tail[pos..];
        if rest.starts_with(b"urn:") {
            let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
            out.push(Extension::Huge(String::from_utf8_lossy(&rest[..end]).into_owned()));
            pos += end + if end < rest.len() { 1 } else { 0 };
        } else if rest[0] == block::MAGIC {
            match block::parse_section(rest) {
                Ok((blocks, consumed)) => {
                    out.extend(blocks.into_iter().map(Extension::Ggep));
                    pos += consumed;
                }
                Err(_) => {
                    out.push(Extension::Overhead(rest.to_vec()));
                    return out;
                }
            }
        } else if rest.starts_with(b"<?xml") {
            let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
            out.push(Extension::Xml(String::from_utf8_lossy(&rest[..end]).into_owned()));
            pos += end + if end < rest.len() { 1 } else { 0 };
        } else {
            // Skip a lone separator NUL between extensions; anything else
            // unrecognized becomes overhead for the remainder of the tail.
            if rest[0] == 0 {
                pos += 1;
            } else {
                out.push(Extension::Overhead(rest.to_vec()));
                return out;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::GgepId;

    #[test]
    fn huge_urn_alone() {
        let tail = b"urn:sha1:PLACEHOLDERPLACEHOLDERPLA\0";
        let extensions = parse(tail);
        assert_eq!(
            extensions,
            vec![Extension::Huge("urn:sha1:PLACEHOLDERPLACEHOLDERPLA".to_string())]
        );
    }

    #[test]
    fn huge_then_ggep() {
        let block = GgepBlock::new(GgepId::Uint32, vec![0x2A]);
        let ggep_bytes =
            block::render_section(&[(block.clone(), block::EncodeOptions::default())]).unwrap();

        let mut tail = b"urn:sha1:PLACEHOLDERPLACEHOLDERPLA\0".to_vec();
        tail.extend(ggep_bytes);

        let extensions = parse(&tail);
        assert_eq!(
            extensions,
            vec![
                Extension::Huge("urn:sha1:PLACEHOLDERPLACEHOLDERPLA".to_string()),
                Extension::Ggep(block),
            ]
        );
    }

    #[test]
    fn unrecognized_bytes_become_overhead() {
        let tail = b"\xffnonsense";
        let extensions = parse(tail);
        assert_eq!(extensions, vec![Extension::Overhead(tail.to_vec())]);
    }

    #[test]
    fn cap_folds_remainder_into_trailing_overhead() {
        let block = GgepBlock::new(GgepId::Uint32, vec![0x01]);
        let one_block =
            block::render_section(&[(block, block::EncodeOptions::default())]).unwrap();

        let mut tail = Vec::new();
        for _ in 0..(MAX_EXTENSIONS + 5) {
            tail.extend(&one_block);
        }

        let extensions = parse(&tail);
        assert_eq!(extensions.len(), MAX_EXTENSIONS + 1);
        assert!(matches!(extensions.last().unwrap(), Extension::Overhead(_)));
    }

    #[test]
    fn xml_blob() {
        let tail = b"<?xml version=\"1.0\"?><audios/>\0";
        let extensions = parse(tail);
        assert_eq!(
            extensions,
            vec![Extension::Xml("<?xml version=\"1.0\"?><audios/>".to_string())]
        );
    }
}
