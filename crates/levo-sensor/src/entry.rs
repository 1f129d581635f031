// Copyright 2025-Present Levo.ai, Inc. https://levo.ai/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Serialize, Serializer};
use tracing::warn;

use crate::config::Config;
use crate::redact::Redactor;
use crate::snapshot::{RequestParts, ResponseParts};

/// Sentinel stored in place of a body that exceeds the size threshold.
pub const CONTENT_TOO_LARGE: &str = "[CONTENT TOO LARGE]";

/// Transport header prefix marking application headers.
const TRANSPORT_HEADER_PREFIX: &str = "HTTP_";

/// Normalized, redacted snapshot of one request/response transaction.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    /// Capture start time.
    #[serde(serialize_with = "epoch_millis")]
    pub timestamp: SystemTime,
    /// Wall-clock time spent in the wrapped call.
    pub duration_ms: u64,
    pub request: RequestRecord,
    pub response: ResponseRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub method: String,
    pub path: String,
    /// Query string with sensitive field values masked.
    pub query_string: String,
    /// Application headers: prefix stripped, `_` mapped to `-`, lower-cased.
    pub headers: HashMap<String, String>,
    /// Redacted body, or [`CONTENT_TOO_LARGE`] when over the threshold.
    pub body: String,
    pub remote_ip: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseRecord {
    pub status: u16,
    pub headers: HashMap<String, String>,
    /// Redacted body, or [`CONTENT_TOO_LARGE`] when over the threshold.
    pub body: String,
    /// Byte size of the stored body.
    pub size: usize,
}

/// Builds [`Entry`] values from host snapshots.
///
/// Holds the pieces that are constant across transactions: the compiled
/// redaction rules and the body size threshold.
#[derive(Debug, Clone)]
pub struct EntryBuilder {
    redactor: Redactor,
    size_threshold_bytes: usize,
}

impl EntryBuilder {
    pub fn new(config: &Config) -> Self {
        EntryBuilder {
            redactor: Redactor::new(&config.filter_fields),
            size_threshold_bytes: config.size_threshold_kb.saturating_mul(1024),
        }
    }

    /// Assembles an entry from one transaction.
    ///
    /// The request body stream is read exactly once and rewound to its start
    /// afterwards, so any later consumer sees the original bytes. Capture
    /// failures degrade to an empty body; this method never fails.
    pub fn build<R: Read + Seek>(
        &self,
        parts: &RequestParts,
        body: &mut R,
        response: &ResponseParts,
        timestamp: SystemTime,
        duration_ms: u64,
    ) -> Entry {
        let headers = self.extract_headers(&parts.headers);
        let request_id = headers
            .get("x-request-id")
            .cloned()
            .or_else(|| parts.request_id.clone());

        let request_body = match read_rewound(body) {
            Ok(bytes) => self.bounded_text(&bytes),
            Err(e) => {
                warn!(error = %e, "request body unreadable, capturing empty body");
                String::new()
            }
        };

        let response_bytes = concat_chunks(response);
        let response_body = self.bounded_text(&response_bytes);

        Entry {
            timestamp,
            duration_ms,
            request: RequestRecord {
                method: parts.method.clone(),
                path: parts.path.clone(),
                query_string: self.redactor.redact(&parts.query_string),
                headers,
                body: request_body,
                remote_ip: parts.remote_ip.clone(),
                request_id,
            },
            response: ResponseRecord {
                status: response.status,
                headers: response.headers.clone(),
                size: response_body.len(),
                body: response_body,
            },
        }
    }

    /// Keeps `HTTP_`-prefixed transport headers, strips the prefix, maps the
    /// `_` separators to `-`, lower-cases the name, and masks the value.
    fn extract_headers(&self, transport: &HashMap<String, String>) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        for (key, value) in transport {
            if let Some(name) = key.strip_prefix(TRANSPORT_HEADER_PREFIX) {
                headers.insert(
                    name.replace('_', "-").to_ascii_lowercase(),
                    self.redactor.redact(value),
                );
            }
        }
        headers
    }

    /// Applies the size cap, then redaction. Oversized bodies become the
    /// sentinel and skip redaction entirely.
    fn bounded_text(&self, bytes: &[u8]) -> String {
        if bytes.len() > self.size_threshold_bytes {
            return CONTENT_TOO_LARGE.to_string();
        }
        self.redactor.redact(&String::from_utf8_lossy(bytes))
    }
}

/// Reads the full stream from its start and rewinds it again, leaving the
/// stream positioned at byte zero for the next consumer.
fn read_rewound<R: Read + Seek>(stream: &mut R) -> std::io::Result<Vec<u8>> {
    stream.seek(SeekFrom::Start(0))?;
    let mut content = Vec::new();
    stream.read_to_end(&mut content)?;
    stream.seek(SeekFrom::Start(0))?;
    Ok(content)
}

fn concat_chunks(response: &ResponseParts) -> Vec<u8> {
    let total: usize = response.body_chunks.iter().map(|chunk| chunk.len()).sum();
    let mut content = Vec::with_capacity(total);
    for chunk in &response.body_chunks {
        content.extend_from_slice(chunk);
    }
    content
}

fn epoch_millis<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    serializer.serialize_u64(millis)
}
