//! Station Monitor Example
//!
//! Runs a simulated day at a river station through the engine: clean water,
//! a turbidity spike after rain, and a slow pH drift that turns into a long
//! poor-quality stretch. Alerts go to a console channel.
//!
//! ## What You'll Learn
//!
//! - Building an engine with a custom alert channel
//! - Feeding readings and inspecting each tick
//! - Reading open events, alert records and counters from the read model
//!
//! ## Running the Example
//!
//! ```bash
//! RUST_LOG=info cargo run --example 01_station_monitor
//! ```

use std::time::Duration;

use async_trait::async_trait;

use aquaguard_core::{
    AlertChannel, ChannelError, Engine, IngestError, Notification, Reading, Severity,
};

const CADENCE_MS: u64 = 10_000;

/// Prints every alert it gets
struct ConsoleChannel;

#[async_trait]
impl AlertChannel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    fn min_severity(&self) -> Severity {
        Severity::Info
    }

    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        println!(
            "  >> [{}] {} #{} {:?}: {}",
            notification.severity,
            notification.event_kind,
            notification.event_id,
            notification.transition,
            notification.message
        );
        Ok(())
    }
}

/// Water at minute `minute` of the simulated day
fn water_at(minute: u64) -> (f32, f32, f32) {
    let temperature = 18.0 + (minute as f32 / 240.0).sin() * 2.0;
    match minute {
        // Rain: turbidity jumps and slowly settles
        120..=180 => (7.2, 4.0 + (180 - minute) as f32 * 0.4, temperature),
        // Upstream discharge: pH drifts down and stays low
        400..=520 => (7.2 - (minute - 400) as f32 * 0.02, 3.0, temperature),
        521..=620 => (4.8, 30.0, temperature),
        _ => (7.2, 3.0, temperature),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("AquaGuard Station Monitor Example");
    println!("=================================\n");

    let mut engine = Engine::builder().channel(ConsoleChannel).build()?;
    let model = engine.read_model();

    let mut timestamp = 0;
    while timestamp <= 12 * 60 * 60 * 1000 {
        let minute = timestamp / 60_000;
        let (ph, turbidity, temperature) = water_at(minute);
        let report = engine.process(Reading::new(timestamp, ph, turbidity, temperature))?;

        for transition in &report.transitions {
            println!(
                "t={:>4}min {:?} {} (severity {}, tier {}, score {:.0})",
                minute,
                transition.kind,
                transition.event.kind,
                transition.event.severity,
                report.classification.tier,
                report.classification.score
            );
        }

        timestamp += CADENCE_MS;
        tokio::task::yield_now().await;
    }

    // A sensor glitch and a clock that went backwards are rejected
    println!("\nRejected readings:");
    for reading in [
        Reading::new(timestamp, 15.2, 3.0, 18.0),
        Reading::new(timestamp - 60_000, 7.2, 3.0, 18.0),
    ] {
        match engine.process(reading) {
            Err(e @ IngestError::OutOfRange { .. }) => println!("  out of range: {}", e),
            Err(e) => println!("  {}", e),
            Ok(_) => println!("  unexpectedly accepted"),
        }
    }

    // Give in-flight alerts a moment before reading the log
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("\nCurrent state:");
    if let Some(latest) = model.latest() {
        println!("  Latest tier: {} (score {:.1})", latest.tier, latest.score);
    }
    for summary in model.summaries() {
        println!(
            "  {:<12} now {:>6.2}  avg {:>6.2}  range [{:.2}, {:.2}] over {} samples",
            summary.parameter.to_string(),
            summary.current,
            summary.average,
            summary.min,
            summary.max,
            summary.samples
        );
    }

    println!("\nOpen events:");
    for event in model.open_events() {
        println!("  #{} {} since {}min: {}", event.id, event.kind, event.opened_at / 60_000, event.description);
    }

    println!("\nRecently closed:");
    for event in model.closed_events() {
        println!(
            "  #{} {} lasted {}min",
            event.id,
            event.kind,
            event.duration_ms() / 60_000
        );
    }

    println!("\nLast alerts:");
    for record in model.recent_alerts(5) {
        println!(
            "  #{} {} via {} -> {:?} after {} attempt(s)",
            record.event_id, record.event_kind, record.channel, record.outcome, record.attempts
        );
    }

    let counters = model.counters();
    println!(
        "\nAccepted {} readings, rejected {}, {} slow ticks, {} window overwrites",
        counters.accepted, counters.rejected, counters.slow_ticks, counters.window_overwrites
    );

    engine.shutdown().await;
    Ok(())
}
