//! Live recognition loop.
//!
//! Polls a capture device, runs detection + search every Nth frame, and
//! optionally posts matches to the attendance webhook with a per-person
//! cooldown. On a read failure the device is released and reopened after a
//! fixed delay; that reconnect is the only retry in the system.

use crate::attendance::{AttendanceClient, CooldownTracker};
use anyhow::{Context, Result};
use clap::Args;
use image::RgbImage;
use rollcall_core::{overlay, BoundingBox, FaceAnalyzer};
use rollcall_hw::{Camera, Frame};
use rollcall_store::{FaceDb, DEFAULT_SIMILARITY_THRESHOLD};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Delay before reopening the capture device after a read failure.
const REOPEN_DELAY: Duration = Duration::from_secs(2);

#[derive(Args)]
pub struct WatchArgs {
    /// V4L2 capture device (env: ROLLCALL_CAMERA_DEVICE, default /dev/video0)
    #[arg(long)]
    pub device: Option<String>,

    /// Run detection + search every Nth frame
    /// (env: ROLLCALL_DETECTION_INTERVAL, default 5)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Similarity threshold for a positive match
    /// (env: ROLLCALL_MATCH_THRESHOLD, default 0.55)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Seconds between attendance marks for the same person
    /// (env: ROLLCALL_ATTENDANCE_COOLDOWN, default 30)
    #[arg(long)]
    pub cooldown: Option<u64>,

    /// Attendance webhook URL (env: ROLLCALL_ATTENDANCE_URL); no marks are
    /// posted when unset
    #[arg(long)]
    pub attendance_url: Option<String>,

    /// Site identifier sent with each mark (env: ROLLCALL_SITE_ID)
    #[arg(long)]
    pub site_id: Option<String>,

    /// Camera identifier sent with each mark (env: ROLLCALL_CAMERA_ID)
    #[arg(long)]
    pub camera_id: Option<String>,

    /// Exit after the first successful attendance mark
    #[arg(long)]
    pub stop_after_detection: bool,

    /// Write annotated snapshot JPEGs to this directory on every processed
    /// detection
    #[arg(long)]
    pub snapshot_dir: Option<PathBuf>,
}

fn flag_or_env(flag: Option<String>, env_key: &str) -> Option<String> {
    flag.or_else(|| std::env::var(env_key).ok().filter(|v| !v.is_empty()))
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub async fn run(db: FaceDb, mut analyzer: FaceAnalyzer, args: WatchArgs) -> Result<()> {
    let device = flag_or_env(args.device.clone(), "ROLLCALL_CAMERA_DEVICE")
        .unwrap_or_else(|| "/dev/video0".to_string());
    let interval = args
        .interval
        .unwrap_or_else(|| env_u64("ROLLCALL_DETECTION_INTERVAL", 5));
    let threshold = args
        .threshold
        .unwrap_or_else(|| env_f32("ROLLCALL_MATCH_THRESHOLD", DEFAULT_SIMILARITY_THRESHOLD));
    let cooldown_secs = args
        .cooldown
        .unwrap_or_else(|| env_u64("ROLLCALL_ATTENDANCE_COOLDOWN", 30));

    let attendance = match flag_or_env(args.attendance_url.clone(), "ROLLCALL_ATTENDANCE_URL") {
        Some(url) => {
            let site_id = flag_or_env(args.site_id.clone(), "ROLLCALL_SITE_ID")
                .context("--site-id (or ROLLCALL_SITE_ID) is required with an attendance URL")?;
            let camera_id = flag_or_env(args.camera_id.clone(), "ROLLCALL_CAMERA_ID")
                .context("--camera-id (or ROLLCALL_CAMERA_ID) is required with an attendance URL")?;
            tracing::info!(url = %url, site_id = %site_id, camera_id = %camera_id, "attendance marking enabled");
            Some(AttendanceClient::new(url, site_id, camera_id)?)
        }
        None => {
            tracing::info!("no attendance URL configured, recognition only");
            None
        }
    };

    if let Some(dir) = &args.snapshot_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("could not create snapshot directory {}", dir.display()))?;
    }

    let mut cooldown = CooldownTracker::new(Duration::from_secs(cooldown_secs));

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("stop requested");
            stop.store(true, Ordering::SeqCst);
        });
    }

    // The initial open is fail-fast; only mid-stream failures reconnect.
    let mut camera = Camera::open(&device)?;
    tracing::info!(
        device = %device,
        width = camera.width,
        height = camera.height,
        interval,
        threshold,
        "watching"
    );

    let mut frame_count: u64 = 0;

    while !stop.load(Ordering::SeqCst) {
        let frame = match camera.capture_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "frame read failed, reopening capture device");
                drop(camera);
                match reopen(&device, &stop).await {
                    Some(cam) => {
                        camera = cam;
                        continue;
                    }
                    None => break,
                }
            }
        };

        frame_count += 1;
        if interval > 1 && frame_count % interval != 0 {
            continue;
        }

        if frame.is_dark {
            tracing::debug!(seq = frame.sequence, "dark frame skipped");
            continue;
        }

        let faces = match analyzer.analyze(&frame.data, frame.width, frame.height) {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(error = %e, "frame analysis failed");
                continue;
            }
        };

        let Some(primary) = faces.first() else {
            tracing::debug!(seq = frame.sequence, "no face in frame");
            continue;
        };

        match db.search(&primary.embedding, threshold).await {
            Ok(Some(m)) => {
                tracing::info!(
                    name = %m.name,
                    score = m.score,
                    personnel_id = ?m.personnel_id,
                    "face recognized"
                );

                if let Some(dir) = &args.snapshot_dir {
                    save_snapshot(dir, &frame, &primary.bbox, Some(&m.name));
                }

                if let Some(client) = &attendance {
                    let person = m.person_key().to_string();
                    if cooldown.should_mark(&person) {
                        match client.mark(&person, m.score).await {
                            Ok(response) if response.success => {
                                cooldown.mark(&person);
                                if args.stop_after_detection {
                                    tracing::info!(name = %m.name, "attendance marked, stopping");
                                    break;
                                }
                            }
                            Ok(_) => {} // success=false already logged by the client
                            Err(e) => {
                                tracing::warn!(error = %e, person = %person, "attendance mark failed")
                            }
                        }
                    } else {
                        tracing::debug!(person = %person, cooldown_secs, "cooldown active");
                    }
                }
            }
            Ok(None) => {
                tracing::info!(score_threshold = threshold, "no match for detected face");
                if let Some(dir) = &args.snapshot_dir {
                    save_snapshot(dir, &frame, &primary.bbox, None);
                }
            }
            Err(e) => tracing::warn!(error = %e, "face search failed"),
        }
    }

    tracing::info!("watch loop finished");
    Ok(())
}

/// Reopen the capture device, retrying with a fixed delay until it comes
/// back or a stop is requested.
async fn reopen(device: &str, stop: &AtomicBool) -> Option<Camera> {
    while !stop.load(Ordering::SeqCst) {
        tokio::time::sleep(REOPEN_DELAY).await;
        match Camera::open(device) {
            Ok(camera) => {
                tracing::info!(device, "capture device reopened");
                return Some(camera);
            }
            Err(e) => tracing::warn!(error = %e, device, "reopen failed, retrying"),
        }
    }
    None
}

/// Write an annotated JPEG of the frame. Failures are logged, never fatal.
fn save_snapshot(dir: &Path, frame: &Frame, bbox: &BoundingBox, matched: Option<&str>) {
    let Some(mut img) = RgbImage::from_raw(frame.width, frame.height, frame.data.clone()) else {
        tracing::warn!("frame buffer did not form a valid image");
        return;
    };

    let color = if matched.is_some() {
        overlay::MATCH_COLOR
    } else {
        overlay::UNKNOWN_COLOR
    };
    overlay::draw_face_box(&mut img, bbox, color);

    let label = sanitize_label(matched.unwrap_or("unknown"));
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
    let path = dir.join(format!("{label}_{stamp}.jpg"));

    match img.save(&path) {
        Ok(()) => tracing::debug!(path = %path.display(), "snapshot saved"),
        Err(e) => tracing::warn!(error = %e, path = %path.display(), "snapshot save failed"),
    }
}

/// Restrict a person name to filesystem-safe characters.
fn sanitize_label(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
