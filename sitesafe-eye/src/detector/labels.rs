//! Reader for YOLO text label files (`save_txt=True`)
//!
//! Each line is `class x_center y_center width height [confidence]` with
//! normalized coordinates. Video frames are written as `<stem>_<frame>.txt`.

use crate::detector::{DetectionOutput, DetectionRecord};
use crate::error::{DetectError, Result};
use crate::media::{has_extension, MediaKind};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Subdirectory of a run directory holding label files
pub const LABELS_DIR: &str = "labels";

/// Read every label file under `run_dir/labels`. A missing labels directory
/// means nothing was detected.
pub fn read_run_labels(
    run_dir: &Path,
    source_kind: MediaKind,
    class_names: &[String],
) -> Result<DetectionOutput> {
    let labels_dir = run_dir.join(LABELS_DIR);
    let mut output = DetectionOutput::new();
    if !labels_dir.is_dir() {
        debug!("No labels directory in {:?}", run_dir);
        return Ok(output);
    }

    let mut files: Vec<_> = fs::read_dir(&labels_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_extension(path, "txt"))
        .collect();
    files.sort();

    for path in files {
        let frame = match source_kind {
            MediaKind::Image => 1,
            MediaKind::Video => frame_index(&path),
        };
        let contents = fs::read_to_string(&path)?;
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = parse_line(line, class_names).map_err(|reason| DetectError::LabelParse {
                path: path.clone(),
                line: line_no + 1,
                reason,
            })?;
            output.push(frame, record);
        }
    }

    debug!(
        "Read {} detections over {} frames from {:?}",
        output.record_count(),
        output.frames_with_detections(),
        labels_dir
    );
    Ok(output)
}

/// Frame number from a `<stem>_<frame>.txt` name, 1 when there is none
fn frame_index(path: &Path) -> u32 {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.rsplit_once('_'))
        .and_then(|(_, n)| n.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

fn parse_line(line: &str, class_names: &[String]) -> std::result::Result<DetectionRecord, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return Err(format!("expected at least 5 fields, found {}", fields.len()));
    }

    let class_id: usize = fields[0]
        .parse()
        .map_err(|_| format!("invalid class id '{}'", fields[0]))?;

    let mut coords = [0.0f32; 4];
    for (slot, field) in coords.iter_mut().zip(&fields[1..5]) {
        let value: f32 = field
            .parse()
            .map_err(|_| format!("invalid coordinate '{}'", field))?;
        if !value.is_finite() {
            return Err(format!("non-finite coordinate '{}'", field));
        }
        *slot = value;
    }

    let confidence = match fields.get(5) {
        Some(field) => Some(
            field
                .parse::<f32>()
                .map_err(|_| format!("invalid confidence '{}'", field))?,
        ),
        None => None,
    };

    let class_name = class_names
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("class_{}", class_id));

    Ok(DetectionRecord {
        class_id,
        class_name,
        confidence,
        bbox: (coords[0], coords[1], coords[2], coords[3]),
    })
}
