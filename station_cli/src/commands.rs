//! Command implementations. Each prints its result to stdout, as text or as
//! one JSON value with `--json`.

use eyre::WrapErr;
use serde_json::{Value, json};
use station_core::error::Result;
use station_core::{MeasureRequest, Measurement, Shot, Station};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How results are printed.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub weight_decimals: usize,
    pub height_decimals: usize,
}

impl Output {
    pub fn new(json: bool, cfg: &station_config::Config) -> Self {
        Self {
            json,
            weight_decimals: cfg.scale.precision as usize,
            height_decimals: cfg.measure.precision as usize,
        }
    }

    fn kg(&self, w: f32) -> String {
        format!("{w:.prec$} kg", prec = self.weight_decimals)
    }

    fn cm(&self, h: f32) -> String {
        format!("{h:.prec$} cm", prec = self.height_decimals)
    }
}

pub fn run_weigh(station: &Station, out: Output, tare: Option<f32>) -> Result<()> {
    let weight = station.weigh(tare)?;
    if out.json {
        println!("{}", json!({ "weight": num(weight) }));
    } else {
        println!("weight: {}", out.kg(weight));
    }
    Ok(())
}

pub fn run_height(station: &Station, out: Output, base: Option<f32>) -> Result<()> {
    let height = station.height(base)?;
    if out.json {
        println!("{}", json!({ "height": num(height) }));
    } else {
        println!("height: {}", out.cm(height));
    }
    Ok(())
}

/// Take one photo set. Fails with the first camera error after printing
/// every outcome.
pub fn run_capture(
    station: &Station,
    out: Output,
    folder: Option<PathBuf>,
    stem: Option<String>,
) -> Result<()> {
    let shots = station.capture(folder.as_deref(), stem.as_deref())?;
    if out.json {
        let list: Vec<Value> = shots.iter().map(shot_json).collect();
        println!("{}", Value::Array(list));
    } else if shots.is_empty() {
        println!("no cameras attached");
    } else {
        for shot in &shots {
            match &shot.outcome {
                Ok(path) => println!("{}: saved {}", shot.port, path.display()),
                Err(e) => println!("{}: failed: {e}", shot.port),
            }
        }
    }
    match shots.into_iter().find_map(|s| s.outcome.err()) {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Composite record; always printed as JSON.
pub fn run_measure(station: &Station, req: &MeasureRequest) -> Result<()> {
    let m = station.measure(req);
    println!("{}", measurement_json(&m));
    Ok(())
}

/// Read weight and height every `interval` until `count` readings were
/// taken or Ctrl-C is pressed. Failed reads are printed and the loop goes on.
pub fn run_watch(
    station: &Station,
    out: Output,
    count: Option<u64>,
    interval: Duration,
) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .wrap_err("install Ctrl-C handler")?;
    }

    let mut taken = 0u64;
    while !stop.load(Ordering::SeqCst) && count.is_none_or(|n| taken < n) {
        let weight = station.weigh(None);
        let height = station.height(None);
        if out.json {
            println!(
                "{}",
                json!({
                    "weight": weight.as_ref().ok().copied().map(num),
                    "height": height.as_ref().ok().copied().map(num),
                    "errors": ([weight.as_ref().err(), height.as_ref().err()]
                        .into_iter()
                        .flatten()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()),
                })
            );
        } else {
            let w = weight.map_or_else(|e| format!("error ({e})"), |w| out.kg(w));
            let h = height.map_or_else(|e| format!("error ({e})"), |h| out.cm(h));
            println!("weight: {w}  height: {h}");
        }
        taken += 1;
        if count.is_some_and(|n| taken >= n) {
            break;
        }
        pause(&stop, interval);
    }

    if stop.load(Ordering::SeqCst) {
        tracing::info!(readings = taken, "interrupted, stopping devices");
    }
    station.stop();
    Ok(())
}

/// Sleep for `interval` in short slices so Ctrl-C is noticed promptly.
fn pause(stop: &AtomicBool, interval: Duration) {
    const SLICE: Duration = Duration::from_millis(50);
    let deadline = Instant::now() + interval;
    while !stop.load(Ordering::SeqCst) {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }
        std::thread::sleep(left.min(SLICE));
    }
}

/// Open every device once. The test photo set goes to a scratch folder that
/// is removed afterwards.
pub fn run_self_check(station: &Station, out: Output) -> Result<()> {
    let weight = station.weigh(None)?;
    let height = station.height(None)?;

    let scratch = std::env::temp_dir().join(format!("station-self-check-{}", std::process::id()));
    let shots = station.capture(Some(&scratch), Some("self-check"));
    if let Err(e) = std::fs::remove_dir_all(&scratch) {
        tracing::debug!(error = %e, dir = %scratch.display(), "scratch folder not removed");
    }
    let shots = shots?;
    let failed: Vec<&Shot> = shots.iter().filter(|s| s.outcome.is_err()).collect();

    if out.json {
        println!(
            "{}",
            json!({
                "scale": num(weight),
                "sensor": num(height),
                "cameras": shots.iter().map(shot_json).collect::<Vec<_>>(),
                "ok": failed.is_empty(),
            })
        );
    } else {
        println!("scale: OK ({})", out.kg(weight));
        println!("sensor: OK ({})", out.cm(height));
        for shot in &shots {
            match &shot.outcome {
                Ok(_) => println!("camera {}: OK", shot.port),
                Err(e) => println!("camera {}: FAILED ({e})", shot.port),
            }
        }
        if failed.is_empty() {
            println!("OK");
        }
    }

    match failed.first() {
        Some(Shot {
            outcome: Err(e), ..
        }) => Err(eyre::Report::new(e.clone())),
        _ => Ok(()),
    }
}

/// JSON number with the shortest decimal form of `v`, so 0.815 prints as
/// 0.815 rather than its widened f64 value.
fn num(v: f32) -> Value {
    v.to_string().parse::<f64>().map_or(Value::Null, Value::from)
}

fn shot_json(shot: &Shot) -> Value {
    match &shot.outcome {
        Ok(path) => json!({ "port": shot.port, "path": path.display().to_string() }),
        Err(e) => json!({ "port": shot.port, "error": e.to_string() }),
    }
}

pub fn measurement_json(m: &Measurement) -> Value {
    json!({
        "weight": num(m.weight),
        "height": num(m.height),
        "photos": m.photos.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        "timestamp": m.timestamp,
        "faults": m
            .faults
            .iter()
            .map(|f| json!({ "source": f.source, "message": f.message }))
            .collect::<Vec<_>>(),
    })
}
