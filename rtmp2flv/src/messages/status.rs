//! Recognition of the AMF-encoded status messages that bracket playback.
//!
//! Only the fixed byte signatures are matched. The payloads are AMF0, but a
//! full decoder is unnecessary: the strings of interest always appear with
//! the `02 <u16 length>` string framing, so scanning for those byte
//! sequences is enough to classify a message and pull out the stream name.

const AMF_STRING_MARKER: u8 = 0x02;

const PLAY_START_DESCRIPTION_PREFIX: &str = "Started playing ";

/// `02 <u16 len> <bytes>`: an AMF string value.
fn amf_string(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(3 + text.len());
    bytes.push(AMF_STRING_MARKER);
    bytes.extend_from_slice(&(text.len() as u16).to_be_bytes());
    bytes.extend_from_slice(text.as_bytes());
    bytes
}

/// `<u16 len> <bytes>`: an AMF object property key.
fn amf_property_key(name: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 + name.len());
    bytes.extend_from_slice(&(name.len() as u16).to_be_bytes());
    bytes.extend_from_slice(name.as_bytes());
    bytes
}

fn starts_with_amf_string(payload: &[u8], text: &str) -> bool {
    payload.starts_with(&amf_string(text))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

/// Matches the `onStatus` command announcing `NetStream.Play.Start` and
/// extracts the stream name from its description property, which reads
/// `Started playing <name>` with an optional trailing period.
pub fn play_start_stream_name(payload: &[u8]) -> Option<String> {
    if !starts_with_amf_string(payload, "onStatus") {
        return None;
    }

    let mut code = amf_property_key("code");
    code.extend_from_slice(&amf_string("NetStream.Play.Start"));
    if !contains(payload, &code) {
        return None;
    }

    let mut description = amf_property_key("description");
    description.push(AMF_STRING_MARKER);
    let start = find(payload, &description)? + description.len();
    let length = u16::from_be_bytes([*payload.get(start)?, *payload.get(start + 1)?]) as usize;
    let text = payload.get(start + 2..start + 2 + length)?;
    let text = std::str::from_utf8(text).ok()?;

    let name = text.strip_prefix(PLAY_START_DESCRIPTION_PREFIX)?;
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

/// `onStatus` data message announcing `NetStream.Data.Start`.
pub fn is_data_start(payload: &[u8]) -> bool {
    starts_with_amf_string(payload, "onStatus")
        && contains(payload, &amf_string("NetStream.Data.Start"))
}

/// The `onMetaData` script message.
pub fn is_metadata(payload: &[u8]) -> bool {
    starts_with_amf_string(payload, "onMetaData")
}

/// `onPlayStatus` data message announcing `NetStream.Play.Complete`.
pub fn is_play_complete(payload: &[u8]) -> bool {
    contains(payload, &amf_string("onPlayStatus"))
        && contains(payload, &amf_string("NetStream.Play.Complete"))
}
