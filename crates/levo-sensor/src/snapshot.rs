// Copyright 2025-Present Levo.ai, Inc. https://levo.ai/
// SPDX-License-Identifier: Apache-2.0

//! Host-facing snapshot types.
//!
//! The host integration hands the sensor one [`RequestParts`] and one
//! [`ResponseParts`] per transaction, plus the request body as any
//! `Read + Seek` stream. Header names in [`RequestParts::headers`] use the
//! transport (CGI-style) representation, e.g. `HTTP_X_REQUEST_ID`; the entry
//! builder normalizes them to wire form.

use std::collections::HashMap;

use bytes::Bytes;

/// Transport-level view of one inbound request, minus the body stream.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    /// HTTP method, verbatim (`GET`, `POST`, …).
    pub method: String,
    /// Request path without the query string.
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query_string: String,
    /// Transport header map (`HTTP_`-prefixed names). Non-`HTTP_` entries
    /// are dropped during extraction.
    pub headers: HashMap<String, String>,
    /// Peer address as reported by the transport.
    pub remote_ip: String,
    /// Host-assigned request identifier, used when no `x-request-id` header
    /// is present.
    pub request_id: Option<String>,
}

/// The response triple produced by the wrapped handler.
///
/// The body is kept as the chunk sequence the host produced; the sensor
/// concatenates the chunks for capture but returns the parts untouched.
#[derive(Debug, Clone, Default)]
pub struct ResponseParts {
    /// HTTP status code.
    pub status: u16,
    /// Response header map, verbatim.
    pub headers: HashMap<String, String>,
    /// Body chunks in write order.
    pub body_chunks: Vec<Bytes>,
}

impl ResponseParts {
    /// Convenience constructor for a single-chunk body.
    pub fn new(status: u16, headers: HashMap<String, String>, body: impl Into<Bytes>) -> Self {
        ResponseParts {
            status,
            headers,
            body_chunks: vec![body.into()],
        }
    }
}
