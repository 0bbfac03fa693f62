//! Common test utilities for integration tests
//!
//! This module provides:
//! - Reading series generators on a fixed cadence, with optional noise
//! - Scripted alert channels (recording, hanging, failing)
//! - Engine construction helpers

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use aquaguard_core::{
    AlertChannel, ChannelError, EngineConfig, Notification, Reading, Severity, Timestamp,
};

/// Default sensor cadence
pub const CADENCE_MS: u64 = 10_000;

/// Clean water: every parameter in its excellent band
pub const CLEAN: (f32, f32, f32) = (7.2, 2.0, 20.0);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Readings on a fixed cadence
pub struct ReadingSeries {
    next_timestamp: Timestamp,
    cadence_ms: u64,
    seed: u32,
}

impl ReadingSeries {
    pub fn new(start: Timestamp) -> Self {
        Self {
            next_timestamp: start,
            cadence_ms: CADENCE_MS,
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Timestamp the next reading will carry
    pub fn now(&self) -> Timestamp {
        self.next_timestamp
    }

    /// Skip ahead without producing readings
    pub fn skip(&mut self, ms: u64) {
        self.next_timestamp += ms;
    }

    pub fn next(&mut self, ph: f32, turbidity: f32, temperature: f32) -> Reading {
        let reading = Reading::new(self.next_timestamp, ph, turbidity, temperature);
        self.next_timestamp += self.cadence_ms;
        reading
    }

    /// `count` identical readings
    pub fn steady(&mut self, count: usize, ph: f32, turbidity: f32, temperature: f32) -> Vec<Reading> {
        (0..count).map(|_| self.next(ph, turbidity, temperature)).collect()
    }

    /// Clean water with small sensor noise and occasional excursions
    pub fn noisy(&mut self, count: usize) -> Vec<Reading> {
        (0..count)
            .map(|_| {
                let excursion = if self.random_float() < 0.02 {
                    self.random_float() * 40.0
                } else {
                    0.0
                };
                let ph = CLEAN.0 + self.random_noise(0.2);
                let turbidity = (CLEAN.1 + self.random_noise(0.5) + excursion).max(0.0);
                let temperature = CLEAN.2 + self.random_noise(1.0);
                self.next(ph, turbidity, temperature)
            })
            .collect()
    }

    fn random_float(&mut self) -> f32 {
        self.seed = self.seed.wrapping_mul(1664525).wrapping_add(1013904223);
        (self.seed as f32) / (u32::MAX as f32)
    }

    fn random_noise(&mut self, amplitude: f32) -> f32 {
        (self.random_float() - 0.5) * 2.0 * amplitude
    }
}

/// Config with large logs and queues so long scenarios lose nothing
pub fn roomy_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.dispatcher.queue_capacity = 4096;
    config.dispatcher.log_capacity = 8192;
    config
}

/// Let spawned dispatcher and send tasks run
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// Channel that accepts everything and remembers it
pub struct RecordingChannel {
    name: &'static str,
    min_severity: Severity,
    received: Mutex<Vec<(Notification, tokio::time::Instant)>>,
}

impl RecordingChannel {
    pub fn new(name: &'static str) -> Arc<Self> {
        Self::with_min_severity(name, Severity::Info)
    }

    pub fn with_min_severity(name: &'static str, min_severity: Severity) -> Arc<Self> {
        Arc::new(Self {
            name,
            min_severity,
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn received_at(&self) -> Vec<tokio::time::Instant> {
        self.received.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl AlertChannel for RecordingChannel {
    fn name(&self) -> &str {
        self.name
    }

    fn min_severity(&self) -> Severity {
        self.min_severity
    }

    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        self.received
            .lock()
            .unwrap()
            .push((notification.clone(), tokio::time::Instant::now()));
        Ok(())
    }
}

/// Channel whose transport never answers
pub struct HangingChannel {
    name: &'static str,
    pub calls: AtomicU32,
}

impl HangingChannel {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertChannel for HangingChannel {
    fn name(&self) -> &str {
        self.name
    }

    async fn send(&self, _notification: &Notification) -> Result<(), ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_secs(24 * 3600)).await;
        Ok(())
    }
}

/// Channel that fails the first `failures` calls
pub struct FlakyChannel {
    name: &'static str,
    remaining_failures: AtomicU32,
    pub calls: AtomicU32,
}

impl FlakyChannel {
    pub fn new(name: &'static str, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            name,
            remaining_failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl AlertChannel for FlakyChannel {
    fn name(&self) -> &str {
        self.name
    }

    async fn send(&self, _notification: &Notification) -> Result<(), ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            Err(ChannelError::Transport("connection reset".into()))
        } else {
            Ok(())
        }
    }
}
