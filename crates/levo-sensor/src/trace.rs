// Copyright 2025-Present Levo.ai, Inc. https://levo.ai/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::entry::Entry;

/// Span kind reported for every captured transaction.
const SPAN_KIND_SERVER: &str = "SERVER";
/// Scheme assumed when the request carries no `x-forwarded-proto` header.
const DEFAULT_HTTP_SCHEME: &str = "http";

/// Static service metadata, constant across all records in a process
/// lifetime. Field names are the wire contract.
#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub service_name: String,
    pub host_name: String,
    pub telemetry_sdk_language: String,
    pub telemetry_sdk_name: String,
    pub telemetry_sdk_version: String,
    pub levo_env: String,
}

impl Resource {
    pub fn new(config: &Config) -> Self {
        Resource {
            service_name: config.service_name.clone(),
            host_name: config.host_name.clone(),
            telemetry_sdk_language: "rust".to_string(),
            telemetry_sdk_name: "levo-rust-sensor".to_string(),
            telemetry_sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            levo_env: config.environment.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestTrace {
    /// Lower-cased header map plus the `:method`/`:path`/`:authority`
    /// pseudo-headers expected by the collector schema.
    pub headers: HashMap<String, String>,
    pub body: String,
    /// Reserved for partial-body capture; always false today.
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseTrace {
    pub headers: HashMap<String, String>,
    pub body: String,
    pub truncated: bool,
    pub status_code: u16,
}

/// Wire-format representation of one captured transaction, ready for
/// serialization. Disposable: built, serialized, and dropped per send.
#[derive(Debug, Clone, Serialize)]
pub struct TraceRecord {
    pub http_scheme: String,
    pub request: RequestTrace,
    pub response: ResponseTrace,
    pub resource: Resource,
    pub duration_ns: u64,
    pub request_time_ns: u64,
    pub trace_id: String,
    pub span_id: String,
    pub span_kind: String,
    pub path: String,
    pub method: String,
    pub client_ip: String,
}

impl TraceRecord {
    /// Converts an entry into a wire record with freshly generated trace and
    /// span identifiers.
    pub fn from_entry(entry: &Entry, resource: &Resource) -> TraceRecord {
        TraceRecord::from_entry_with_ids(
            entry,
            resource,
            Uuid::new_v4().to_string(),
            Uuid::new_v4().to_string(),
        )
    }

    /// Deterministic conversion core: everything except the identifiers is a
    /// pure function of the entry and resource metadata.
    pub fn from_entry_with_ids(
        entry: &Entry,
        resource: &Resource,
        trace_id: String,
        span_id: String,
    ) -> TraceRecord {
        let mut request_headers = lowercase_keys(&entry.request.headers);
        request_headers.insert(":method".to_string(), entry.request.method.clone());
        request_headers.insert(":path".to_string(), path_with_query(entry));
        if let Some(host) = request_headers.get("host").cloned() {
            request_headers.insert(":authority".to_string(), host);
        }

        let http_scheme = request_headers
            .get("x-forwarded-proto")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HTTP_SCHEME.to_string());

        let mut response_headers = lowercase_keys(&entry.response.headers);
        response_headers.insert(":status".to_string(), entry.response.status.to_string());

        TraceRecord {
            http_scheme,
            request: RequestTrace {
                headers: request_headers,
                body: entry.request.body.clone(),
                truncated: false,
            },
            response: ResponseTrace {
                headers: response_headers,
                body: entry.response.body.clone(),
                truncated: false,
                status_code: entry.response.status,
            },
            resource: resource.clone(),
            duration_ns: entry.duration_ms.saturating_mul(1_000_000),
            request_time_ns: entry
                .timestamp
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos() as u64)
                .unwrap_or(0),
            trace_id,
            span_id,
            span_kind: SPAN_KIND_SERVER.to_string(),
            path: entry.request.path.clone(),
            method: entry.request.method.clone(),
            client_ip: entry.request.remote_ip.clone(),
        }
    }
}

fn path_with_query(entry: &Entry) -> String {
    if entry.request.query_string.is_empty() {
        entry.request.path.clone()
    } else {
        format!("{}?{}", entry.request.path, entry.request.query_string)
    }
}

fn lowercase_keys(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::entry::{RequestRecord, ResponseRecord};

    use super::*;

    fn test_resource() -> Resource {
        Resource::new(&Config {
            environment: "staging".to_string(),
            service_name: "checkout".to_string(),
            host_name: "web-1".to_string(),
            ..Config::new("https://collector.levo.ai")
        })
    }

    fn test_entry() -> Entry {
        Entry {
            timestamp: UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            duration_ms: 42,
            request: RequestRecord {
                method: "POST".to_string(),
                path: "/users".to_string(),
                query_string: "page=2".to_string(),
                headers: [
                    ("host".to_string(), "api.example.com".to_string()),
                    ("x-forwarded-proto".to_string(), "https".to_string()),
                ]
                .into_iter()
                .collect(),
                body: "user=bob".to_string(),
                remote_ip: "10.0.0.1".to_string(),
                request_id: Some("req-1".to_string()),
            },
            response: ResponseRecord {
                status: 201,
                headers: [("Content-Type".to_string(), "application/json".to_string())]
                    .into_iter()
                    .collect(),
                body: "{}".to_string(),
                size: 2,
            },
        }
    }

    #[test]
    fn conversion_is_deterministic_given_fixed_ids() {
        let entry = test_entry();
        let record = TraceRecord::from_entry_with_ids(
            &entry,
            &test_resource(),
            "trace-fixed".to_string(),
            "span-fixed".to_string(),
        );

        assert_eq!(record.http_scheme, "https");
        assert_eq!(record.duration_ns, 42_000_000);
        assert_eq!(record.request_time_ns, 1_700_000_000_000_000_000);
        assert_eq!(record.trace_id, "trace-fixed");
        assert_eq!(record.span_id, "span-fixed");
        assert_eq!(record.span_kind, "SERVER");
        assert_eq!(record.path, "/users");
        assert_eq!(record.method, "POST");
        assert_eq!(record.client_ip, "10.0.0.1");
        assert_eq!(record.response.status_code, 201);
    }

    #[test]
    fn pseudo_headers_are_injected() {
        let record = TraceRecord::from_entry_with_ids(
            &test_entry(),
            &test_resource(),
            "t".to_string(),
            "s".to_string(),
        );

        assert_eq!(
            record.request.headers.get(":method").map(String::as_str),
            Some("POST")
        );
        assert_eq!(
            record.request.headers.get(":path").map(String::as_str),
            Some("/users?page=2")
        );
        assert_eq!(
            record.request.headers.get(":authority").map(String::as_str),
            Some("api.example.com")
        );
        assert_eq!(
            record.response.headers.get(":status").map(String::as_str),
            Some("201")
        );
    }

    #[test]
    fn header_keys_are_lowercased_on_the_wire() {
        let record = TraceRecord::from_entry_with_ids(
            &test_entry(),
            &test_resource(),
            "t".to_string(),
            "s".to_string(),
        );
        assert_eq!(
            record.response.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert!(!record.response.headers.contains_key("Content-Type"));
    }

    #[test]
    fn scheme_defaults_to_http_without_forwarding_header() {
        let mut entry = test_entry();
        entry.request.headers.remove("x-forwarded-proto");
        let record = TraceRecord::from_entry_with_ids(
            &entry,
            &test_resource(),
            "t".to_string(),
            "s".to_string(),
        );
        assert_eq!(record.http_scheme, "http");
    }

    #[test]
    fn fresh_identifiers_differ_per_conversion() {
        let entry = test_entry();
        let resource = test_resource();
        let first = TraceRecord::from_entry(&entry, &resource);
        let second = TraceRecord::from_entry(&entry, &resource);
        assert_ne!(first.trace_id, second.trace_id);
        assert_ne!(first.span_id, second.span_id);
        assert_ne!(first.trace_id, first.span_id);
    }

    #[test]
    fn serialized_shape_matches_the_wire_contract() {
        let record = TraceRecord::from_entry_with_ids(
            &test_entry(),
            &test_resource(),
            "t".to_string(),
            "s".to_string(),
        );
        let value = serde_json::to_value(&record).unwrap();

        for field in [
            "http_scheme",
            "request",
            "response",
            "resource",
            "duration_ns",
            "request_time_ns",
            "trace_id",
            "span_id",
            "span_kind",
            "path",
            "method",
            "client_ip",
        ] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
        for field in ["headers", "body", "truncated"] {
            assert!(value["request"].get(field).is_some());
            assert!(value["response"].get(field).is_some());
        }
        assert!(value["response"].get("status_code").is_some());
        for field in [
            "service_name",
            "host_name",
            "telemetry_sdk_language",
            "telemetry_sdk_name",
            "telemetry_sdk_version",
            "levo_env",
        ] {
            assert!(value["resource"].get(field).is_some());
        }
        assert_eq!(value["resource"]["levo_env"], "staging");
        assert_eq!(value["request"]["truncated"], false);
    }
}
