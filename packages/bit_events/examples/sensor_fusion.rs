//! Example demonstrating sensor fusion gating: AND-join on fresh readings
//! with consume-on-release, plus an OR wait for alert conditions.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bit_events::{EventBitSet, EventMask, Timeout, WaitMode};

const TEMPERATURE_FRESH: EventMask = EventMask::bit(0);
const HUMIDITY_FRESH: EventMask = EventMask::bit(1);
const PRESSURE_FRESH: EventMask = EventMask::bit(2);
const ALL_SENSORS: EventMask = EventMask::from_bits(0b111);

const TEMPERATURE_ALERT: EventMask = EventMask::bit(8);
const PRESSURE_ALERT: EventMask = EventMask::bit(9);
const ANY_ALERT: EventMask = EventMask::from_bits(0b11 << 8);

const CYCLES: u32 = 3;

fn main() {
    println!("=== Sensor Fusion Example ===");

    let events = Arc::new(EventBitSet::new());

    let sensors: Vec<_> = [
        ("temperature", TEMPERATURE_FRESH, 40),
        ("humidity", HUMIDITY_FRESH, 70),
        ("pressure", PRESSURE_FRESH, 55),
    ]
    .into_iter()
    .map(|(name, bit, interval_ms)| {
        let events = Arc::clone(&events);
        thread::spawn(move || {
            for cycle in 1..=CYCLES {
                thread::sleep(Duration::from_millis(interval_ms));
                println!("{name}: reading {cycle} ready");
                events.set_bits(bit);
            }
        })
    })
    .collect();

    // The fusion loop consumes one fresh reading from every sensor per
    // cycle: AND-join with clear-on-exit.
    for cycle in 1..=CYCLES {
        let observed = events.wait(
            ALL_SENSORS,
            WaitMode::All,
            true,
            Timeout::After(Duration::from_secs(2)),
        );

        if observed.contains(ALL_SENSORS) {
            println!("fusion: cycle {cycle} - all readings fresh, fusing");
        } else {
            println!(
                "fusion: cycle {cycle} - incomplete data ({}), skipping",
                ALL_SENSORS & !observed
            );
        }
    }

    // Alerts use an OR wait: any one alert bit releases the monitor.
    println!("monitor: watching for alerts...");
    let monitor = {
        let events = Arc::clone(&events);
        thread::spawn(move || events.wait(ANY_ALERT, WaitMode::Any, true, Timeout::Forever))
    };

    thread::sleep(Duration::from_millis(50));
    println!("pressure sensor: threshold exceeded!");
    events.set_bits(PRESSURE_ALERT);

    let observed = monitor.join().expect("monitor panicked");
    if observed.intersects(PRESSURE_ALERT) {
        println!("monitor: pressure alert handled");
    }
    if observed.intersects(TEMPERATURE_ALERT) {
        println!("monitor: temperature alert handled");
    }

    for sensor in sensors {
        sensor.join().expect("sensor panicked");
    }

    println!("\nExample completed successfully!");
}
