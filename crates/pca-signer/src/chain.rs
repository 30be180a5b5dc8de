//! Certificate chain splitting.
//!
//! The authority returns the issuing chain as concatenated PEM blocks ordered
//! from the first intermediate up to the root. Consumers want the root on its
//! own (for trust stores) and the intermediates appended to the leaf.

use crate::{Error, Result};
use pem::{EncodeConfig, LineEnding, Pem};

const BEGIN_MARKER: &[u8] = b"-----BEGIN ";
const DASHES: &[u8] = b"-----";
const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Splits a PEM certificate chain into `(intermediates, root)`.
///
/// Every block is re-encoded with LF line endings and 64-column wrapping.
/// The last block in the input is the root; all blocks before it are
/// concatenated, in order, into the intermediates buffer, which is empty when
/// the chain holds a single certificate.
///
/// # Errors
///
/// Returns [`Error::InvalidChain`] if the input is empty, a block cannot be
/// decoded, a block is not labelled `CERTIFICATE`, or anything other than a
/// PEM block follows the last certificate.
pub fn split_root_certificate(chain_pem: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut intermediates = Vec::new();
    let mut remaining = chain_pem;

    loop {
        let (block, rest) = next_pem_block(remaining)
            .ok_or_else(|| Error::InvalidChain("failed to read certificate".to_string()))?;
        if block.tag() != CERTIFICATE_LABEL {
            return Err(Error::InvalidChain(format!(
                "unexpected PEM block: {}",
                block.tag()
            )));
        }

        let encoded = encode_block(&block);
        if rest.is_empty() {
            return Ok((intermediates, encoded.into_bytes()));
        }
        intermediates.extend_from_slice(encoded.as_bytes());
        remaining = rest;
    }
}

/// Re-encodes a PEM block the way the chain is handed back to callers.
pub(crate) fn encode_block(block: &Pem) -> String {
    pem::encode_config(block, EncodeConfig::new().set_line_ending(LineEnding::LF))
}

/// Decodes the next PEM block in `input`.
///
/// Text before the `-----BEGIN` line is skipped. On success returns the block
/// and the bytes after its `-----END` line, with trailing blanks and a single
/// line ending on that line consumed.
pub(crate) fn next_pem_block(input: &[u8]) -> Option<(Pem, &[u8])> {
    let start = find(input, BEGIN_MARKER)?;
    let after_begin = &input[start + BEGIN_MARKER.len()..];

    let label_len = find(after_begin, DASHES)?;
    let label = &after_begin[..label_len];
    if label.contains(&b'\n') {
        return None;
    }

    let end_marker = [b"-----END ", label, DASHES].concat();
    let end_offset = find(after_begin, &end_marker)?;
    let block_end = start + BEGIN_MARKER.len() + end_offset + end_marker.len();

    let block = pem::parse(&input[start..block_end]).ok()?;
    Some((block, consume_line_ending(&input[block_end..])))
}

fn consume_line_ending(mut rest: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', tail @ ..] = rest {
        rest = tail;
    }
    match rest {
        [b'\r', b'\n', tail @ ..] | [b'\n', tail @ ..] | [b'\r', tail @ ..] => tail,
        _ => rest,
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{generate_chain, pem_certificate};

    #[test]
    fn test_single_certificate_is_root() {
        let root = pem_certificate("Root CA");
        let (intermediates, split_root) = split_root_certificate(root.as_bytes()).unwrap();
        assert!(intermediates.is_empty());
        assert_eq!(String::from_utf8(split_root).unwrap(), root);
    }

    #[test]
    fn test_intermediates_then_root() {
        let chain = generate_chain(3);
        let input = chain.concat();
        let (intermediates, root) = split_root_certificate(input.as_bytes()).unwrap();

        assert_eq!(
            String::from_utf8(intermediates).unwrap(),
            format!("{}{}", chain[0], chain[1])
        );
        assert_eq!(String::from_utf8(root).unwrap(), chain[2]);
    }

    #[test]
    fn test_reencodes_crlf_input() {
        let chain = generate_chain(2);
        let input = chain.concat().replace('\n', "\r\n");
        let (intermediates, root) = split_root_certificate(input.as_bytes()).unwrap();

        assert_eq!(String::from_utf8(intermediates).unwrap(), chain[0]);
        assert_eq!(String::from_utf8(root).unwrap(), chain[1]);
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert!(matches!(
            split_root_certificate(b""),
            Err(Error::InvalidChain(_))
        ));
    }

    #[test]
    fn test_non_pem_rejected() {
        assert!(matches!(
            split_root_certificate(b"not a certificate chain"),
            Err(Error::InvalidChain(_))
        ));
    }

    #[test]
    fn test_wrong_label_rejected() {
        let key = pem::encode_config(
            &Pem::new("PRIVATE KEY", vec![1, 2, 3]),
            EncodeConfig::new().set_line_ending(LineEnding::LF),
        );
        let input = format!("{}{}", pem_certificate("Intermediate"), key);
        match split_root_certificate(input.as_bytes()) {
            Err(Error::InvalidChain(msg)) => assert!(msg.contains("PRIVATE KEY")),
            other => panic!("expected InvalidChain, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let input = format!("{}\ntrailing", pem_certificate("Root CA"));
        assert!(matches!(
            split_root_certificate(input.as_bytes()),
            Err(Error::InvalidChain(_))
        ));
    }

    #[test]
    fn test_next_pem_block_rest() {
        let input = b"junk\n-----BEGIN THING-----\nAQID\n-----END THING-----  \r\nafter";
        let (block, rest) = next_pem_block(input).unwrap();
        assert_eq!(block.tag(), "THING");
        assert_eq!(block.contents(), &[1, 2, 3]);
        assert_eq!(rest, b"after");
    }

    #[test]
    fn test_next_pem_block_unterminated() {
        assert!(next_pem_block(b"-----BEGIN THING-----\nAQID\n").is_none());
        assert!(next_pem_block(b"-----BEGIN THING-----\nAQID\n-----END OTHER-----\n").is_none());
    }
}
