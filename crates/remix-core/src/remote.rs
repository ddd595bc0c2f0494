//! Remote audio service clients
//!
//! Blocking HTTP clients for the two companion services: the stem splitter
//! (multipart file upload) and the YouTube-to-MP3 converter (JSON url). Both
//! reply with `{"message": ...}` on success and `{"error": ...}` on failure.
//!
//! Requests are single-shot. No retries, no polling; the caller decides what
//! to do with a failure.

use std::io::Read;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteServiceError {
    /// The service answered with an error payload or a bare failure status
    #[error("Service rejected the request: {0}")]
    Rejected(String),

    /// The request never got a usable answer (DNS, connect, timeout)
    #[error("Request failed: {0}")]
    Transport(String),

    /// The service answered, but not in the expected shape
    #[error("Unexpected response from service: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, RemoteServiceError>;

/// Stem configurations accepted by the splitter service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StemCount {
    /// Vocals / accompaniment
    #[default]
    Two,
    /// Vocals / drums / bass / other
    Four,
    /// Vocals / drums / bass / piano / other
    Five,
}

impl StemCount {
    /// The wire value the service expects
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Two => "2stems",
            Self::Four => "4stems",
            Self::Five => "5stems",
        }
    }
}

impl std::fmt::Display for StemCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both services reply with exactly one of these fields
#[derive(Debug, Deserialize)]
struct ServiceReply {
    message: Option<String>,
    error: Option<String>,
}

/// Client for the stem-splitting service
pub struct SplitterClient {
    endpoint: String,
    agent: ureq::Agent,
}

impl SplitterClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            agent: ureq::Agent::new(),
        }
    }

    /// Upload a file for stem separation.
    ///
    /// Sends `multipart/form-data` with a `file` part (the original bytes,
    /// original filename) and a `stems` part. Returns the service's status
    /// message on success.
    pub fn split(&self, filename: &str, bytes: &[u8], stems: StemCount) -> Result<String> {
        let boundary = multipart_boundary();
        let body = build_multipart(&boundary, filename, bytes, stems);

        log::info!(
            "Uploading {} ({} bytes) for {} separation",
            filename,
            bytes.len(),
            stems
        );
        let response = self
            .agent
            .post(&self.endpoint)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&body);
        handle_response(response)
    }
}

/// Client for the YouTube-to-MP3 conversion service
pub struct ConverterClient {
    endpoint: String,
    agent: ureq::Agent,
}

impl ConverterClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            agent: ureq::Agent::new(),
        }
    }

    /// Submit a video URL for conversion. The URL is passed through as
    /// opaque text; the service does its own validation.
    pub fn convert(&self, url: &str) -> Result<String> {
        log::info!("Submitting {} for conversion", url);
        let response = self
            .agent
            .post(&self.endpoint)
            .send_json(serde_json::json!({ "url": url }));
        handle_response(response)
    }
}

fn handle_response(
    response: std::result::Result<ureq::Response, ureq::Error>,
) -> Result<String> {
    match response {
        Ok(resp) => parse_reply(resp.into_reader()),
        // Error statuses still carry the {"error": ...} payload
        Err(ureq::Error::Status(code, resp)) => match parse_reply(resp.into_reader()) {
            Ok(message) => Err(RemoteServiceError::Rejected(message)),
            Err(RemoteServiceError::Rejected(error)) => Err(RemoteServiceError::Rejected(error)),
            Err(_) => Err(RemoteServiceError::Rejected(format!("HTTP {}", code))),
        },
        Err(ureq::Error::Transport(t)) => Err(RemoteServiceError::Transport(t.to_string())),
    }
}

fn parse_reply(mut reader: impl Read) -> Result<String> {
    let mut body = String::new();
    reader
        .read_to_string(&mut body)
        .map_err(|e| RemoteServiceError::Transport(e.to_string()))?;

    let reply: ServiceReply = serde_json::from_str(&body)
        .map_err(|_| RemoteServiceError::InvalidResponse(truncate(&body)))?;

    match (reply.message, reply.error) {
        (Some(message), _) => Ok(message),
        (None, Some(error)) => Err(RemoteServiceError::Rejected(error)),
        (None, None) => Err(RemoteServiceError::InvalidResponse(truncate(&body))),
    }
}

fn truncate(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.len() <= LIMIT {
        return body.to_string();
    }
    // Cut on a char boundary; LIMIT may fall inside a multibyte sequence
    let end = (0..=LIMIT)
        .rev()
        .find(|&i| body.is_char_boundary(i))
        .unwrap_or(0);
    format!("{}...", &body[..end])
}

fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("----remix-form-{:08x}", nanos)
}

/// Assemble a two-part `multipart/form-data` body: the file and the stems
/// selector
fn build_multipart(boundary: &str, filename: &str, bytes: &[u8], stems: StemCount) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"stems\"\r\n\r\n");
    body.extend_from_slice(stems.as_str().as_bytes());
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_count_wire_values() {
        assert_eq!(StemCount::Two.as_str(), "2stems");
        assert_eq!(StemCount::Four.as_str(), "4stems");
        assert_eq!(StemCount::Five.as_str(), "5stems");
        assert_eq!(StemCount::default(), StemCount::Two);
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = build_multipart("BOUND", "song.mp3", b"\x01\x02\x03", StemCount::Four);
        let text = String::from_utf8_lossy(&body);

        assert!(text.starts_with("--BOUND\r\n"));
        assert!(text.contains("name=\"file\"; filename=\"song.mp3\""));
        assert!(text.contains("Content-Type: application/octet-stream\r\n\r\n\x01\x02\x03\r\n"));
        assert!(text.contains("name=\"stems\"\r\n\r\n4stems\r\n"));
        assert!(text.ends_with("--BOUND--\r\n"));
    }

    #[test]
    fn test_parse_success_reply() {
        let message = parse_reply(r#"{"message": "Stems ready"}"#.as_bytes()).unwrap();
        assert_eq!(message, "Stems ready");
    }

    #[test]
    fn test_parse_error_reply() {
        let err = parse_reply(r#"{"error": "No file provided"}"#.as_bytes()).unwrap_err();
        assert!(matches!(err, RemoteServiceError::Rejected(e) if e == "No file provided"));
    }

    #[test]
    fn test_parse_garbage_reply() {
        let err = parse_reply(b"<html>gateway timeout</html>".as_slice()).unwrap_err();
        assert!(matches!(err, RemoteServiceError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_long_multibyte_reply_truncates_cleanly() {
        // A multibyte char straddling the truncation limit must not split
        let mut body = "a".repeat(199);
        body.push_str("échec de la passerelle, réessayez plus tard");

        let err = parse_reply(body.as_bytes()).unwrap_err();
        match err {
            RemoteServiceError::InvalidResponse(snippet) => {
                assert!(snippet.ends_with("..."));
                assert!(snippet.len() <= 203);
                assert!(snippet.starts_with("aaa"));
            }
            other => panic!("expected InvalidResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_message_wins_over_error() {
        let message = parse_reply(r#"{"message": "ok", "error": "no"}"#.as_bytes()).unwrap();
        assert_eq!(message, "ok");
    }
}
