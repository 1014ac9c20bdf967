use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use a010_frame::{DecoderStats, Frame};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// Pixel bytes only, concatenated frame after frame.
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Min, max and mean depth value over a frame's pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelSummary {
    pub min: u8,
    pub max: u8,
    pub mean: f64,
}

impl PixelSummary {
    pub fn of(pixels: &[u8]) -> Option<Self> {
        let min = *pixels.iter().min()?;
        let max = *pixels.iter().max()?;
        let sum: u64 = pixels.iter().map(|&p| u64::from(p)).sum();
        Some(Self {
            min,
            max,
            mean: sum as f64 / pixels.len() as f64,
        })
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    kind: &'static str,
    source: &'a str,
    frame_id: u16,
    rows: u8,
    cols: u8,
    exposure_time: i32,
    sensor_temperature: i8,
    driver_temperature: i8,
    error_code: u8,
    pixels: usize,
    #[serde(flatten)]
    summary: Option<PixelSummary>,
    timestamp: String,
}

pub fn print_frame(frame: &Frame, source: &str, format: OutputFormat) {
    let summary = PixelSummary::of(frame.pixels.as_ref());
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                kind: "frame",
                source,
                frame_id: frame.frame_id,
                rows: frame.rows,
                cols: frame.cols,
                exposure_time: frame.exposure_time,
                sensor_temperature: frame.sensor_temperature,
                driver_temperature: frame.driver_temperature,
                error_code: frame.error_code,
                pixels: frame.pixels.len(),
                summary,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "FRAME", "SIZE", "EXPOSURE", "TEMP", "ERR", "MIN", "MAX", "MEAN",
                ])
                .add_row(vec![
                    frame.frame_id.to_string(),
                    format!("{}x{}", frame.rows, frame.cols),
                    frame.exposure_time.to_string(),
                    format!("{}/{}", frame.sensor_temperature, frame.driver_temperature),
                    frame.error_code.to_string(),
                    summary.map_or_else(String::new, |s| s.min.to_string()),
                    summary.map_or_else(String::new, |s| s.max.to_string()),
                    summary.map_or_else(String::new, |s| format!("{:.1}", s.mean)),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let range = summary.map_or_else(
                || "-".to_string(),
                |s| format!("{}..{} mean={:.1}", s.min, s.max, s.mean),
            );
            println!(
                "frame={} size={}x{} exposure={} temp={}/{} err={} depth={} source={}",
                frame.frame_id,
                frame.rows,
                frame.cols,
                frame.exposure_time,
                frame.sensor_temperature,
                frame.driver_temperature,
                frame.error_code,
                range,
                source
            );
        }
        OutputFormat::Raw => print_raw(frame.pixels.as_ref()),
    }
}

/// Print a one-record command result. `fields` drives the table and pretty
/// renderings; `record` is serialized as-is for JSON and raw output.
pub fn print_summary<T: Serialize>(record: &T, fields: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            println!(
                "{}",
                serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (key, value) in fields {
                table.add_row(vec![key.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line: Vec<String> = fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
            println!("{}", line.join(" "));
        }
    }
}

/// Log decoder counters at the end of a run (stderr).
pub fn log_stats(stats: &DecoderStats) {
    tracing::info!(
        bytes = stats.bytes_ingested,
        frames = stats.frames_emitted,
        rejected = stats.rejected(),
        sync_mismatches = stats.sync_mismatches,
        length_rejections = stats.length_rejections,
        duplicate_frames = stats.duplicate_frames,
        checksum_failures = stats.checksum_failures,
        transport_resets = stats.transport_resets,
        "decoder stats"
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
