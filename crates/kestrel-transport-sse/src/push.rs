//! Server-push line decoding.
//!
//! The push channel delivers one event per line in the form
//! `<observable>$<jsonPayloadOrEmpty>`. The `$` delimiter is part of the
//! stream name (stream names carry the trailing marker by convention), and
//! an empty payload denotes a null-data event.

use kestrel_core::protocol::ObservableEvent;
use kestrel_core::Payload;
use tracing::warn;

/// Delimiter between stream name and payload on a push line.
pub const STREAM_DELIMITER: char = '$';

/// Decode one push line into an event.
///
/// Lines without the delimiter or with unparseable payloads are rejected
/// with `None`; the caller logs and skips them.
#[must_use]
pub fn decode_push_line(line: &str) -> Option<ObservableEvent> {
    let Some(index) = line.find(STREAM_DELIMITER) else {
        warn!(line, "push line without stream delimiter");
        return None;
    };

    // The delimiter belongs to the stream name.
    let observable = line[..=index].to_owned();
    let payload = &line[index + 1..];
    let data = if payload.is_empty() {
        Payload::null()
    } else {
        match serde_json::from_str(payload) {
            Ok(value) => Payload::Json(value),
            Err(err) => {
                warn!(observable, error = %err, "push line with unparseable payload");
                return None;
            }
        }
    };

    Some(ObservableEvent { observable, data })
}
