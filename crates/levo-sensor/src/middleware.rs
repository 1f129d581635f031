// Copyright 2025-Present Levo.ai, Inc. https://levo.ai/
// SPDX-License-Identifier: Apache-2.0

use std::io::{Read, Seek};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use rand::Rng;
use tracing::{debug, error};

use crate::config::Config;
use crate::entry::EntryBuilder;
use crate::sender::TraceSender;
use crate::snapshot::{RequestParts, ResponseParts};
use crate::trace::{Resource, TraceRecord};

/// The capture interceptor: wraps one request lifecycle and feeds the
/// capture → redact → convert → deliver pipeline.
///
/// The sensor is invisible to the wrapped call. Nothing it does can change
/// the response, and every internal failure is converted into a log line at
/// this boundary. When construction fails (bad endpoint, no runtime) the
/// sensor degrades to a pass-through no-op instead of failing host startup.
pub struct Sensor {
    config: Arc<Config>,
    builder: EntryBuilder,
    resource: Resource,
    sender: Option<TraceSender>,
}

impl Sensor {
    /// Builds a sensor from an explicit configuration.
    pub fn new(config: Config) -> Sensor {
        let builder = EntryBuilder::new(&config);
        let resource = Resource::new(&config);

        let sender = if config.enabled {
            match TraceSender::new(&config) {
                Ok(sender) => Some(sender),
                Err(e) => {
                    error!(error = %e, "error initializing trace delivery, sensor disabled");
                    None
                }
            }
        } else {
            debug!("sensor disabled by configuration");
            None
        };

        Sensor {
            config: Arc::new(config),
            builder,
            resource,
            sender,
        }
    }

    /// Builds a sensor from `LEVO_*` environment variables, degrading to a
    /// disabled no-op when the environment is incomplete.
    pub fn from_env() -> Sensor {
        match Config::from_env() {
            Ok(config) => Sensor::new(config),
            Err(e) => {
                error!(error = %e, "error loading sensor configuration, sensor disabled");
                Sensor::new(Config {
                    enabled: false,
                    ..Config::default()
                })
            }
        }
    }

    /// True when capture can actually happen (enabled and delivery ready).
    pub fn is_active(&self) -> bool {
        self.sender.is_some()
    }

    /// Wraps one request lifecycle.
    ///
    /// Calls `next` with the untouched body stream, then captures the
    /// transaction and schedules delivery. The handler's response is always
    /// returned unmodified, the body stream is left rewound to its start,
    /// and capture or delivery failures never reach the caller.
    pub fn wrap<R, F>(&self, parts: &RequestParts, body: &mut R, next: F) -> ResponseParts
    where
        R: Read + Seek,
        F: FnOnce(&mut R) -> ResponseParts,
    {
        let Some(sender) = &self.sender else {
            return next(body);
        };
        if self.config.path_excluded(&parts.path) {
            return next(body);
        }
        if !sampled_in(self.config.sampling_rate) {
            return next(body);
        }

        let timestamp = SystemTime::now();
        let started = Instant::now();
        let response = next(body);
        let duration_ms = started.elapsed().as_millis() as u64;

        // Capture reads the stream once and rewinds it, so downstream
        // consumers of the request context still see the original bytes.
        let entry = self
            .builder
            .build(parts, body, &response, timestamp, duration_ms);
        let request_id = entry.request.request_id.clone();
        let record = TraceRecord::from_entry(&entry, &self.resource);
        sender.send_async(record, request_id);

        response
    }
}

/// Uniform sampling draw against the configured rate.
fn sampled_in(rate: f64) -> bool {
    rand::thread_rng().gen::<f64>() < rate
}
