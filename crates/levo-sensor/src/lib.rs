// Copyright 2025-Present Levo.ai, Inc. https://levo.ai/
// SPDX-License-Identifier: Apache-2.0

//! # Levo Sensor
//!
//! In-process telemetry sensor for HTTP request pipelines. The sensor
//! observes each inbound transaction, builds a redacted, size-bounded
//! record of request and response, converts it into a wire trace record,
//! and delivers it asynchronously to a Levo collector — without adding
//! latency or failure risk to the original transaction.
//!
//! The pipeline is capture → redact → convert → deliver:
//! - [`middleware`]: the capture interceptor wrapping one request lifecycle
//! - [`entry`]: normalized, redacted transaction snapshots
//! - [`redact`]: heuristic masking of sensitive field values
//! - [`trace`]: conversion to the collector wire format
//! - [`sender`]: retrying, non-blocking delivery
//! - [`config`]: the static configuration injected into every component
//!
//! Nothing in this crate may surface as a failure of the wrapped request:
//! initialization errors degrade to a disabled no-op, capture errors fall
//! back to safe defaults, and delivery errors are retried then dropped.
//! Only operator-facing logs (via `tracing`) reflect the sensor's health.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod entry;
pub mod middleware;
pub mod redact;
pub mod sender;
pub mod snapshot;
pub mod trace;

pub use config::{Config, ConfigError};
pub use entry::{Entry, EntryBuilder, CONTENT_TOO_LARGE};
pub use middleware::Sensor;
pub use redact::Redactor;
pub use sender::{SenderError, TraceSender};
pub use snapshot::{RequestParts, ResponseParts};
pub use trace::{Resource, TraceRecord};
