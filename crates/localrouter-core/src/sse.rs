//! Server-sent-events line reading shared by every streaming provider.
//!
//! All upstreams in the gateway frame their streams the same way: lines
//! prefixed `data: `, a `[DONE]` sentinel terminating the stream, and empty
//! or non-`data:` lines to be skipped. Keeping one reader here avoids
//! per-provider drift in that logic.

use crate::error::GatewayError;
use bytes::Bytes;
use futures::{Stream, StreamExt};

/// The payload prefix of an SSE data line.
const DATA_PREFIX: &str = "data: ";

/// The sentinel payload that terminates a stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Turn a byte stream of an SSE body into a stream of `data:` payloads.
///
/// Empty lines and lines without the `data: ` prefix are skipped. The stream
/// ends when the body ends or when a `[DONE]` payload is seen; the sentinel
/// itself is not yielded. A transport error ends the stream after yielding it.
pub fn data_events<S, E>(body: S) -> impl Stream<Item = Result<String, GatewayError>>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<GatewayError>,
{
    async_stream::stream! {
        let mut body = std::pin::pin!(body);
        let mut buffer = String::new();

        while let Some(next) = body.next().await {
            let bytes = match next {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim_end_matches('\r').to_string();
                buffer.drain(..=pos);

                if line.is_empty() {
                    continue;
                }
                let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                    continue;
                };
                if payload == DONE_SENTINEL {
                    return;
                }
                yield Ok(payload.to_string());
            }
        }
    }
}
