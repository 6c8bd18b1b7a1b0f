use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, Instant};

use motion_fusion_rs::{
    EventSink, GeoPosition, MotionEngine, MotionEvent, SensorKind, SimulatedHost,
};

#[derive(Parser, Debug)]
#[command(name = "motion_fusion")]
#[command(about = "Simulated device driving the motion fusion engine", long_about = None)]
struct Args {
    /// Duration in seconds (0 = continuous)
    #[arg(value_name = "SECONDS", default_value = "10")]
    duration: u64,

    /// Comma-separated event classes to subscribe (accel, orientation, heading)
    #[arg(long, default_value = "accel,orientation,heading")]
    events: String,

    /// Drop the rotation-vector sensor to exercise the magnetometer fallback
    #[arg(long)]
    no_rotation_vector: bool,
}

/// Messages the simulated device pushes into the engine's single owner task.
enum HostMessage {
    Sensor(SensorKind, Vec<f64>),
    Location(GeoPosition),
}

/// Prints each emitted event as one JSON line and keeps per-class counts.
#[derive(Default)]
struct JsonPrintSink {
    accel: u64,
    orientation: u64,
    heading: u64,
}

impl EventSink for JsonPrintSink {
    fn emit(&mut self, event: &MotionEvent) {
        match event {
            MotionEvent::Accel(_) => self.accel += 1,
            MotionEvent::Orientation(_) => self.orientation += 1,
            MotionEvent::Heading(_) => self.heading += 1,
        }
        if let Ok(json) = serde_json::to_string(event) {
            println!("[{}] {} {}", ts_now(), event.class(), json);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("[{}] Motion Fusion Demo Starting", ts_now());
    println!("  Duration: {} seconds (0=continuous)", args.duration);
    println!("  Events: {}", args.events);
    println!("  Rotation Vector: {}", !args.no_rotation_vector);

    let mut host = SimulatedHost::with_sensors(&[
        SensorKind::Accelerometer,
        SensorKind::Gyroscope,
        SensorKind::Magnetometer,
    ]);
    if !args.no_rotation_vector {
        host.add_sensor(SensorKind::RotationVector);
    }
    host.set_gps_fix(Some(GeoPosition::new(37.7749, -122.4194, 16.0)));

    let mut engine = MotionEngine::new(host, JsonPrintSink::default());
    engine.start_motion_updates()?;
    for name in args.events.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        engine.subscribe(name)?;
    }

    let (tx, mut rx) = mpsc::channel::<HostMessage>(500);
    let _accel_handle = tokio::spawn(accel_loop(tx.clone()));
    let _gyro_handle = tokio::spawn(gyro_loop(tx.clone()));
    let _mag_handle = tokio::spawn(mag_loop(tx.clone()));
    let _rv_handle = tokio::spawn(rotation_vector_loop(tx.clone()));
    let _location_handle = tokio::spawn(location_loop(tx.clone()));
    drop(tx);

    let deadline =
        (args.duration > 0).then(|| Instant::now() + Duration::from_secs(args.duration));

    // Single owner task: every sample and fix funnels through this loop, so
    // the engine sees strictly serial delivery.
    while let Some(message) = rx.recv().await {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                break;
            }
        }
        match message {
            HostMessage::Sensor(kind, values) => {
                // A real platform only delivers registered sensors
                if engine.host().is_registered(kind) {
                    engine.on_sensor_sample(kind, &values);
                }
            }
            HostMessage::Location(fix) => {
                if engine.host().location_updates_active() {
                    engine.on_location_update(fix);
                }
            }
        }
    }

    engine.unsubscribe_all()?;
    engine.stop_motion_updates()?;

    let sink = engine.sink();
    println!("[{}] Done", ts_now());
    println!(
        "  Events emitted: accel {} | orientation {} | heading {}",
        sink.accel, sink.orientation, sink.heading
    );
    Ok(())
}

// ── Simulated sensor streams (~50 Hz motion, slow location drift) ───────────

async fn accel_loop(tx: mpsc::Sender<HostMessage>) {
    use std::f64::consts::PI;
    let mut interval = interval(Duration::from_millis(20));
    let mut step = 0u64;
    loop {
        interval.tick().await;
        let t = step as f64 * 0.02;
        step += 1;
        let sample = vec![
            (t * 2.0 * PI).sin() * 0.5,
            (t * 2.0 * PI).cos() * 0.3,
            9.81 + (t * PI).sin() * 0.1,
        ];
        if send(&tx, HostMessage::Sensor(SensorKind::Accelerometer, sample)).await {
            break;
        }
    }
}

async fn gyro_loop(tx: mpsc::Sender<HostMessage>) {
    let mut interval = interval(Duration::from_millis(20));
    let mut step = 0u64;
    loop {
        interval.tick().await;
        let t = step as f64 * 0.02;
        step += 1;
        let sample = vec![
            (t * 0.5).sin() * 0.05,
            (t * 0.3).cos() * 0.03,
            (t * 1.0).sin() * 0.1,
        ];
        if send(&tx, HostMessage::Sensor(SensorKind::Gyroscope, sample)).await {
            break;
        }
    }
}

async fn mag_loop(tx: mpsc::Sender<HostMessage>) {
    let mut interval = interval(Duration::from_millis(20));
    let mut step = 0u64;
    loop {
        interval.tick().await;
        // Slowly rotating horizontal field with a constant downward component
        let yaw = step as f64 * 0.002;
        step += 1;
        let sample = vec![22.0 * yaw.sin(), 22.0 * yaw.cos(), -42.0];
        if send(&tx, HostMessage::Sensor(SensorKind::Magnetometer, sample)).await {
            break;
        }
    }
}

async fn rotation_vector_loop(tx: mpsc::Sender<HostMessage>) {
    let mut interval = interval(Duration::from_millis(20));
    let mut step = 0u64;
    loop {
        interval.tick().await;
        // Slow yaw sweep as a unit quaternion about the up axis
        let half_yaw = step as f64 * 0.001;
        step += 1;
        let sample = vec![0.0, 0.0, half_yaw.sin(), half_yaw.cos(), 0.0];
        if send(&tx, HostMessage::Sensor(SensorKind::RotationVector, sample)).await {
            break;
        }
    }
}

async fn location_loop(tx: mpsc::Sender<HostMessage>) {
    let mut interval = interval(Duration::from_secs(5));
    let mut step = 0u64;
    loop {
        interval.tick().await;
        let drift = step as f64 * 0.0001;
        step += 1;
        let fix = GeoPosition::new(37.7749 + drift, -122.4194 + drift, 16.0);
        if send(&tx, HostMessage::Location(fix)).await {
            break;
        }
    }
}

/// Returns true when the receiver is gone and the loop should stop.
async fn send(tx: &mpsc::Sender<HostMessage>, message: HostMessage) -> bool {
    tx.send(message).await.is_err()
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S%.3f").to_string()
}
