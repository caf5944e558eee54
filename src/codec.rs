//! SOH/EOT framing
//!
//! Every unit on the wire, in both directions, is
//! `SOH <token> (',' <token>)* EOT` with SOH = 0x01 and EOT = 0x04.
//!
//! [`encode`] and [`decode`] work on one complete unit. [`FrameCodec`] is the
//! streaming side used with `tokio_util::codec::Framed`: it buffers bytes until
//! an EOT shows up and then hands the cut unit to [`decode`].
//!
//! Tokens cannot contain a comma or a sentinel byte; there is no escaping.

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::command::Reply;
use crate::error::{CodecError, FrameError, ProtocolError};

/// Start of header
pub const SOH: u8 = 0x01;
/// End of transmission
pub const EOT: u8 = 0x04;

/// Start of every oversized unit that gets a reply instead of silence
const SENDMSG_PREFIX: &[u8] = b"\x01SENDMSG,";

/// Build a framed unit from a command name and its arguments
pub fn encode<S: AsRef<str>>(command: &str, args: &[S]) -> Bytes {
    frame(&join_fields(command, args))
}

/// Wrap an already comma-joined payload in sentinels
pub fn frame(payload: &str) -> Bytes {
    let mut buf = BytesMut::new();
    put_frame(payload, &mut buf);
    buf.freeze()
}

/// Comma-join a command name and its arguments into an unframed payload
pub fn join_fields<S: AsRef<str>>(command: &str, args: &[S]) -> String {
    let mut payload = command.to_string();
    for arg in args {
        payload.push(',');
        payload.push_str(arg.as_ref());
    }
    payload
}

fn put_frame(payload: &str, dst: &mut BytesMut) {
    dst.reserve(payload.len() + 2);
    dst.put_u8(SOH);
    dst.put_slice(payload.as_bytes());
    dst.put_u8(EOT);
}

/// Validate one raw unit and split its payload into tokens
///
/// Empty input, or input that opened with SOH but has no EOT yet, is
/// `NeedsMoreData`. An empty payload yields zero tokens.
pub fn decode(raw: &[u8]) -> Result<Vec<String>, FrameError> {
    let Some(&first) = raw.first() else {
        return Err(FrameError::NeedsMoreData);
    };
    if first != SOH {
        return Err(ProtocolError::MissingStart.into());
    }
    if !raw[1..].contains(&EOT) {
        return Err(FrameError::NeedsMoreData);
    }
    if raw[raw.len() - 1] != EOT {
        return Err(ProtocolError::MissingEnd.into());
    }

    let payload = std::str::from_utf8(&raw[1..raw.len() - 1])
        .map_err(|_| ProtocolError::InvalidUtf8)?;
    Ok(split_fields(payload))
}

/// Split a payload on commas
pub fn split_fields(payload: &str) -> Vec<String> {
    if payload.is_empty() {
        return Vec::new();
    }
    payload.split(',').map(str::to_string).collect()
}

/// Streaming codec for `Framed`
///
/// Yields one item per EOT-terminated unit: `Ok(tokens)` for a well-formed
/// unit, `Err(ProtocolError)` for a malformed one. Malformed units do not end
/// the stream; only IO errors do. A unit over the length ceiling that opens
/// with `SENDMSG,` comes out as `OversizedMessage` so its sender can be told.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_len: usize,
    /// Where to resume the EOT scan in the buffer
    next_index: usize,
    /// Dropping an oversized unit until its EOT arrives
    discarding: bool,
}

impl FrameCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            max_frame_len,
            next_index: 0,
            discarding: false,
        }
    }

    fn oversized(&self, unit: &[u8]) -> ProtocolError {
        let limit = self.max_frame_len;
        if unit.starts_with(SENDMSG_PREFIX) {
            ProtocolError::OversizedMessage { limit }
        } else {
            ProtocolError::Oversized { limit }
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_FRAME_LEN)
    }
}

impl Decoder for FrameCodec {
    type Item = Result<Vec<String>, ProtocolError>;
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let start = self.next_index.min(buf.len());
            let Some(offset) = buf[start..].iter().position(|b| *b == EOT) else {
                if self.discarding {
                    buf.clear();
                    self.next_index = 0;
                } else if buf.len() > self.max_frame_len {
                    let err = self.oversized(buf);
                    buf.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Ok(Some(Err(err)));
                } else {
                    self.next_index = buf.len();
                }
                return Ok(None);
            };

            let raw = buf.split_to(start + offset + 1);
            self.next_index = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if raw.len() > self.max_frame_len {
                return Ok(Some(Err(self.oversized(&raw))));
            }

            let item = match decode(&raw) {
                Ok(tokens) => Ok(tokens),
                Err(FrameError::Malformed(e)) => Err(e),
                // raw always ends in EOT here
                Err(FrameError::NeedsMoreData) => Err(ProtocolError::MissingEnd),
            };
            return Ok(Some(item));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(item) => Ok(Some(item)),
            None => {
                if !buf.is_empty() {
                    debug!("Dropping {} unterminated bytes at end of stream", buf.len());
                    buf.clear();
                }
                self.next_index = 0;
                Ok(None)
            }
        }
    }
}

impl Encoder<Reply> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, reply: Reply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match reply {
            Reply::Frame(payload) => put_frame(&payload, dst),
            Reply::Raw(text) => dst.put_slice(text.as_bytes()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Item = Result<Vec<String>, ProtocolError>;

    fn decode_all(codec: &mut FrameCodec, buf: &mut BytesMut) -> Vec<Item> {
        let mut out = Vec::new();
        while let Some(item) = codec.decode(buf).unwrap() {
            out.push(item);
        }
        out
    }

    #[test]
    fn test_encode_with_args() {
        let bytes = encode("SENDMSG", &["G2", "G1", "hello world"]);
        assert_eq!(&bytes[..], b"\x01SENDMSG,G2,G1,hello world\x04");
    }

    #[test]
    fn test_encode_without_args() {
        let bytes = encode::<&str>("LEAVE", &[]);
        assert_eq!(&bytes[..], b"\x01LEAVE\x04");
    }

    #[test]
    fn test_decode_round_trip() {
        let bytes = encode("KEEPALIVE", &["G7"]);
        assert_eq!(decode(&bytes).unwrap(), vec!["KEEPALIVE", "G7"]);
    }

    #[test]
    fn test_decode_empty_payload() {
        assert_eq!(decode(b"\x01\x04").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_decode_missing_start() {
        assert_eq!(
            decode(b"GETMSGS,G2\x04"),
            Err(FrameError::Malformed(ProtocolError::MissingStart))
        );
    }

    #[test]
    fn test_decode_missing_end() {
        assert_eq!(
            decode(b"\x01GETMSGS\x04,G2"),
            Err(FrameError::Malformed(ProtocolError::MissingEnd))
        );
    }

    #[test]
    fn test_decode_needs_more_data() {
        assert_eq!(decode(b""), Err(FrameError::NeedsMoreData));
        assert_eq!(decode(b"\x01GETMSGS,G"), Err(FrameError::NeedsMoreData));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert_eq!(
            decode(b"\x01\xff\xfe\x04"),
            Err(FrameError::Malformed(ProtocolError::InvalidUtf8))
        );
    }

    #[test]
    fn test_comma_in_argument_is_not_preserved() {
        let bytes = encode("SENDMSG", &["G2", "G1", "a,b"]);
        assert_eq!(decode(&bytes).unwrap().len(), 5);
    }

    #[test]
    fn test_codec_waits_for_eot() {
        let mut codec = FrameCodec::new(64);
        let mut buf = BytesMut::from(&b"\x01KEEPALIVE,"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"G1\x04");
        let item = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(item.unwrap(), vec!["KEEPALIVE", "G1"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_splits_back_to_back_frames() {
        let mut codec = FrameCodec::new(64);
        let mut buf = BytesMut::from(&b"\x01LEAVE\x04\x01LISTSERVERS\x04\x01GET"[..]);
        let items = decode_all(&mut codec, &mut buf);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &vec!["LEAVE".to_string()]);
        assert_eq!(items[1].as_ref().unwrap(), &vec!["LISTSERVERS".to_string()]);
        assert_eq!(&buf[..], b"\x01GET");
    }

    #[test]
    fn test_codec_reports_missing_start_and_continues() {
        let mut codec = FrameCodec::new(64);
        let mut buf = BytesMut::from(&b"GETMSGS,G2\x04\x01GETMSGS,G2\x04"[..]);
        let items = decode_all(&mut codec, &mut buf);
        assert_eq!(items[0], Err(ProtocolError::MissingStart));
        assert_eq!(items[1].as_ref().unwrap()[1], "G2");
    }

    #[test]
    fn test_codec_discards_oversized_until_eot() {
        let mut codec = FrameCodec::new(8);
        let mut buf = BytesMut::from(&b"\x01GETMSGS,G2,G1,"[..]);
        let item = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(item, Err(ProtocolError::Oversized { limit: 8 }));

        buf.extend_from_slice(b"still the same frame\x04\x01LEAVE\x04");
        let items = decode_all(&mut codec, &mut buf);
        assert_eq!(items, vec![Ok(vec!["LEAVE".to_string()])]);
    }

    #[test]
    fn test_codec_flags_oversized_sendmsg() {
        let mut codec = FrameCodec::new(16);
        let mut buf = BytesMut::from(&b"\x01SENDMSG,G2,G1,0123456789"[..]);
        let item = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(item, Err(ProtocolError::OversizedMessage { limit: 16 }));

        buf.extend_from_slice(b"tail\x04\x01KEEPALIVE,G2\x04");
        let items = decode_all(&mut codec, &mut buf);
        assert_eq!(items, vec![Ok(vec!["KEEPALIVE".to_string(), "G2".to_string()])]);
    }

    #[test]
    fn test_codec_flags_oversized_sendmsg_in_one_read() {
        let mut codec = FrameCodec::new(16);
        let mut buf = BytesMut::from(&b"\x01SENDMSG,G2,G1,0123456789\x04\x01LEAVE\x04"[..]);
        let items = decode_all(&mut codec, &mut buf);
        assert_eq!(
            items,
            vec![
                Err(ProtocolError::OversizedMessage { limit: 16 }),
                Ok(vec!["LEAVE".to_string()]),
            ]
        );
    }

    #[test]
    fn test_codec_eof_drops_partial_frame() {
        let mut codec = FrameCodec::new(64);
        let mut buf = BytesMut::from(&b"\x01GETMS"[..]);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encoder_frames_and_raw() {
        let mut codec = FrameCodec::default();
        let mut dst = BytesMut::new();
        codec
            .encode(Reply::Frame("KEEPALIVE,3".to_string()), &mut dst)
            .unwrap();
        codec.encode(Reply::Raw("oops".to_string()), &mut dst).unwrap();
        assert_eq!(&dst[..], b"\x01KEEPALIVE,3\x04oops");
    }

    #[test]
    fn test_encode_matches_encoder_output() {
        let mut codec = FrameCodec::default();
        let mut dst = BytesMut::new();
        let payload = join_fields("SERVERS", &["1", "127.0.0.1", "4000"]);
        codec.encode(Reply::Frame(payload), &mut dst).unwrap();
        assert_eq!(&dst[..], &encode("SERVERS", &["1", "127.0.0.1", "4000"])[..]);
    }

    mod laws {
        use proptest::prelude::*;

        use super::*;

        const TOKEN: &str = "[^,\x01\x04]{0,12}";
        const NAME: &str = "[^,\x01\x04]{1,12}";

        proptest! {
            #[test]
            fn encode_then_decode_returns_the_tokens(
                command in NAME,
                args in prop::collection::vec(TOKEN, 0..6),
            ) {
                let bytes = encode(&command, &args);
                let mut expected = vec![command];
                expected.extend(args);
                prop_assert_eq!(decode(&bytes).unwrap(), expected);
            }

            #[test]
            fn codec_output_ignores_read_boundaries(
                units in prop::collection::vec((NAME, prop::collection::vec(TOKEN, 0..4)), 1..5),
                cut in any::<prop::sample::Index>(),
            ) {
                let mut wire = BytesMut::new();
                for (command, args) in &units {
                    wire.extend_from_slice(&encode(command, args));
                }
                let at = cut.index(wire.len() + 1);

                let mut codec = FrameCodec::default();
                let mut buf = BytesMut::from(&wire[..at]);
                let mut items = decode_all(&mut codec, &mut buf);
                buf.extend_from_slice(&wire[at..]);
                items.extend(decode_all(&mut codec, &mut buf));

                let expected: Vec<Item> = units
                    .into_iter()
                    .map(|(command, args)| {
                        let mut tokens = vec![command];
                        tokens.extend(args);
                        Ok(tokens)
                    })
                    .collect();
                prop_assert_eq!(items, expected);
                prop_assert!(buf.is_empty());
            }
        }
    }
}
