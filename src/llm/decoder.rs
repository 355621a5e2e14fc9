//! Incremental UTF-8 decoding of a chunked response body.
//!
//! Network chunks carry no alignment guarantee, so a multi-byte character can
//! straddle two (or more) chunks. [`Utf8Decoder`] keeps the incomplete tail of
//! each chunk and completes it with the next one; [`decode_stream`] lifts that
//! over a byte stream and yields one text fragment per chunk that produced
//! text.

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::{DecodeError, ExplainError, TransportError};

/// What to do with an incomplete sequence still buffered at end of stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TailPolicy {
    /// Drop it and log a warning.
    #[default]
    Drop,
    /// Fail the stream with [`DecodeError::Truncated`].
    Reject,
}

impl TailPolicy {
    /// Policy matching the `stream.strict_decoding` setting.
    #[must_use]
    pub fn from_strict(strict: bool) -> Self {
        if strict { Self::Reject } else { Self::Drop }
    }
}

/// Streaming UTF-8 decoder.
///
/// Invalid sequences decode to U+FFFD; an incomplete sequence at the end of a
/// chunk is held back until more bytes arrive.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Create a decoder with an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning every character it completes.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        let consumed = self.pending.len() - rest.len();
        self.pending.drain(..consumed);
        out
    }

    /// Number of bytes waiting for the rest of their sequence.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// End the stream, returning how many buffered bytes were never completed.
    #[must_use]
    pub fn finish(self) -> usize {
        self.pending.len()
    }
}

/// Decode a body stream into text fragments.
///
/// Chunks that complete no characters (empty chunks, or chunks holding only
/// the start of a sequence) yield nothing. The stream is finite and ends when
/// `body` ends.
pub fn decode_stream<S>(
    body: S,
    tail: TailPolicy,
) -> impl Stream<Item = Result<String, ExplainError>> + Send
where
    S: Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
{
    async_stream::try_stream! {
        let mut decoder = Utf8Decoder::new();

        futures::pin_mut!(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            let text = decoder.decode(&chunk);
            if !text.is_empty() {
                yield text;
            }
        }

        let dropped = decoder.finish();
        if dropped > 0 {
            match tail {
                TailPolicy::Drop => {
                    tracing::warn!(
                        name: "stream.decode.truncated",
                        dropped_bytes = dropped,
                        "Response ended mid-character; dropping incomplete tail"
                    );
                }
                TailPolicy::Reject => {
                    Err::<(), _>(DecodeError::Truncated { dropped })?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Bytes, TransportError>> + Send + 'static {
        let owned: Vec<Result<Bytes, TransportError>> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p)))
            .collect();
        futures::stream::iter(owned)
    }

    async fn collect(
        parts: &[&[u8]],
        tail: TailPolicy,
    ) -> Vec<Result<String, ExplainError>> {
        decode_stream(chunks(parts), tail).collect().await
    }

    #[test]
    fn test_split_two_byte_char() {
        let bytes = "héllo".as_bytes();
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&bytes[..2]), "h");
        assert_eq!(decoder.pending(), 1);
        assert_eq!(decoder.decode(&bytes[2..]), "éllo");
        assert_eq!(decoder.finish(), 0);
    }

    #[test]
    fn test_four_byte_char_one_byte_at_a_time() {
        let bytes = "🔬".as_bytes();
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.decode(&bytes[1..2]), "");
        assert_eq!(decoder.decode(&bytes[2..3]), "");
        assert_eq!(decoder.decode(&bytes[3..]), "🔬");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_invalid_bytes_become_replacement() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_every_split_point_round_trips() {
        let text = "Naïve café → 日本語 🎓 done";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = Utf8Decoder::new();
            let mut out = decoder.decode(&bytes[..split]);
            out.push_str(&decoder.decode(&bytes[split..]));
            assert_eq!(out, text, "split at {split}");
            assert_eq!(decoder.finish(), 0);
        }
    }

    #[tokio::test]
    async fn test_one_fragment_per_chunk() {
        let out = collect(&[&b"Hel"[..], &b"lo wor"[..], &b"ld"[..]], TailPolicy::Drop).await;
        let fragments: Vec<String> = out.into_iter().map(Result::unwrap).collect();
        assert_eq!(fragments, vec!["Hel", "lo wor", "ld"]);
        assert_eq!(fragments.concat(), "Hello world");
    }

    #[tokio::test]
    async fn test_empty_stream_yields_nothing() {
        assert!(collect(&[], TailPolicy::Drop).await.is_empty());
        assert!(collect(&[&b""[..], &b""[..]], TailPolicy::Drop).await.is_empty());
    }

    #[tokio::test]
    async fn test_split_char_across_chunks() {
        let bytes = "añb".as_bytes();
        let out = collect(&[&bytes[..2], &bytes[2..]], TailPolicy::Drop).await;
        let fragments: Vec<String> = out.into_iter().map(Result::unwrap).collect();
        assert_eq!(fragments, vec!["a", "ñb"]);
    }

    #[tokio::test]
    async fn test_truncated_tail_dropped() {
        let bytes = "ok é".as_bytes();
        let out = collect(&[&bytes[..bytes.len() - 1]], TailPolicy::Drop).await;
        let fragments: Vec<String> = out.into_iter().map(Result::unwrap).collect();
        assert_eq!(fragments, vec!["ok "]);
    }

    #[tokio::test]
    async fn test_truncated_tail_rejected() {
        let bytes = "ok é".as_bytes();
        let out = collect(&[&bytes[..bytes.len() - 1]], TailPolicy::Reject).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_deref().unwrap(), "ok ");
        assert!(matches!(
            out[1],
            Err(ExplainError::Decode(DecodeError::Truncated { dropped: 1 }))
        ));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let body = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(TransportError::Connection("reset".to_string())),
        ]);
        let out: Vec<_> = decode_stream(body, TailPolicy::Drop).collect().await;
        assert_eq!(out.len(), 2);
        assert!(matches!(out[1], Err(ExplainError::Transport(_))));
    }
}
