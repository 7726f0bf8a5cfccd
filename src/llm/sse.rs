//! Server-Sent Events decoding shared by the streaming providers.
//!
//! [`SseDecoder`] buffers raw bytes and yields the `data:` payload of every
//! complete event. Events are split on blank lines at the byte level; the
//! delimiters are ASCII, so a multi-byte UTF-8 character split across network
//! chunks is reassembled before it is decoded.
//!
//! [`delta_stream`] wires a decoder to a byte stream and a per-event decoding
//! function, producing a [`DeltaStream`].

use std::collections::VecDeque;
use std::fmt::Display;

use futures::StreamExt;
use futures::stream::{self, BoxStream, Stream};

use super::{DeltaStream, ProviderError};

/// What one SSE payload means to a provider.
#[derive(Debug, PartialEq, Eq)]
pub enum SseStep {
    /// A text fragment to surface.
    Delta(String),
    /// End-of-stream marker (`[DONE]`); anything after it is ignored.
    Done,
}

/// Per-event decoder. `Ok(None)` skips the event (keep-alives, empty deltas).
pub type DecodeFn = fn(&str) -> Result<Option<SseStep>, ProviderError>;

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; return the data payloads of every completed event.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some((end, delim_len)) = find_boundary(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..end + delim_len).take(end).collect();
            if let Some(data) = parse_event(&String::from_utf8_lossy(&raw)) {
                events.push(data);
            }
        }
        events
    }

    /// Flush a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        parse_event(&String::from_utf8_lossy(&raw))
    }
}

/// Earliest event boundary: `(event_len, delimiter_len)`.
fn find_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Join the `data:` lines of one event. Comments and other fields are ignored.
fn parse_event(text: &str) -> Option<String> {
    let mut data: Option<String> = None;
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            match data.as_mut() {
                Some(d) => {
                    d.push('\n');
                    d.push_str(rest);
                }
                None => data = Some(rest.to_string()),
            }
        }
    }
    data
}

struct DeltaState<B, E> {
    bytes: BoxStream<'static, Result<B, E>>,
    decoder: SseDecoder,
    decode: DecodeFn,
    pending: VecDeque<Result<String, ProviderError>>,
    finished: bool,
}

impl<B, E> DeltaState<B, E> {
    /// Queue decoded payloads; stops at `[DONE]` or the first decode error.
    fn absorb(&mut self, payloads: impl IntoIterator<Item = String>) {
        for data in payloads {
            match (self.decode)(&data) {
                Ok(Some(SseStep::Delta(text))) => self.pending.push_back(Ok(text)),
                Ok(Some(SseStep::Done)) => {
                    self.finished = true;
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    self.pending.push_back(Err(e));
                    self.finished = true;
                    return;
                }
            }
        }
    }
}

/// Turn a byte stream carrying SSE into a [`DeltaStream`].
///
/// Deltas are yielded in emission order. A transport error ends the stream
/// with a single [`ProviderError::Stream`] item after any deltas already
/// decoded.
pub fn delta_stream<S, B, E>(bytes: S, decode: DecodeFn) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DeltaState {
        bytes: bytes.boxed(),
        decoder: SseDecoder::new(),
        decode,
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let payloads = st.decoder.feed(chunk.as_ref());
                    st.absorb(payloads);
                }
                Some(Err(e)) => {
                    st.pending.push_back(Err(ProviderError::Stream(e.to_string())));
                    st.finished = true;
                }
                None => {
                    let tail = st.decoder.finish();
                    st.absorb(tail);
                    st.finished = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_decode(data: &str) -> Result<Option<SseStep>, ProviderError> {
        match data {
            "[DONE]" => Ok(Some(SseStep::Done)),
            "" => Ok(None),
            "boom" => Err(ProviderError::Stream("bad frame".into())),
            other => Ok(Some(SseStep::Delta(other.to_string()))),
        }
    }

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
        let owned: Vec<Result<Vec<u8>, std::io::Error>> =
            parts.iter().map(|p| Ok(p.to_vec())).collect();
        stream::iter(owned)
    }

    #[test]
    fn decoder_handles_split_events() {
        let mut d = SseDecoder::new();
        assert!(d.feed(b"data: hel").is_empty());
        assert_eq!(d.feed(b"lo\n\ndata: world\n\n"), vec!["hello", "world"]);
    }

    #[test]
    fn decoder_joins_multiline_data_and_skips_comments() {
        let mut d = SseDecoder::new();
        let events = d.feed(b": keep-alive\n\nevent: x\ndata: a\ndata: b\r\n\r\n");
        assert_eq!(events, vec!["a\nb"]);
    }

    #[test]
    fn decoder_reassembles_utf8_across_chunks() {
        let mut d = SseDecoder::new();
        let bytes = "data: café\n\n".as_bytes();
        let split = bytes.len() - 3; // inside the two-byte 'é'
        assert!(d.feed(&bytes[..split]).is_empty());
        assert_eq!(d.feed(&bytes[split..]), vec!["café"]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut d = SseDecoder::new();
        assert!(d.feed(b"data: tail").is_empty());
        assert_eq!(d.finish().as_deref(), Some("tail"));
        assert_eq!(d.finish(), None);
    }

    #[tokio::test]
    async fn delta_stream_stops_at_done() {
        let s = delta_stream(chunks(&[b"data: a\n\ndata: b\n\n", b"data: [DONE]\n\ndata: c\n\n"]), echo_decode);
        let items: Vec<String> = s.map(|r| r.unwrap()).collect().await;
        assert_eq!(items, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn delta_stream_surfaces_decode_error_after_prior_deltas() {
        let s = delta_stream(chunks(&[b"data: a\n\ndata: boom\n\ndata: c\n\n"]), echo_decode);
        let items: Vec<_> = s.collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "a");
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn delta_stream_transport_error_ends_stream() {
        let parts: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"data: a\n\n".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(b"data: never\n\n".to_vec()),
        ];
        let items: Vec<_> = delta_stream(stream::iter(parts), echo_decode).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(ProviderError::Stream(_))));
    }
}
