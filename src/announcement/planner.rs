// Sequence planner — expands a typed request into the ordered file list.
//
// Pure: paths are computed from the MP3 root and parameters only. The
// planner never touches the filesystem; a file that does not exist surfaces
// at dispatch time, where the engine skips it with a warning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::announcement::AnnouncementType;

/// Errors produced while expanding a request into a sequence.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
}

/// Build the ordered audio-file sequence for one announcement.
///
/// Station announcements are the five-part chime/train/direction/
/// destination/track sequence; the other types resolve to a single file
/// under their catalog directory.
pub fn plan(
    mp3_dir: &Path,
    kind: AnnouncementType,
    parameters: &HashMap<String, String>,
) -> Result<Vec<PathBuf>, PlanError> {
    match kind {
        AnnouncementType::Station => {
            let train = require(parameters, "train_number")?;
            let direction = require(parameters, "direction")?;
            let destination = require(parameters, "destination")?;
            let track = require(parameters, "track_number")?;

            Ok(vec![
                mp3_dir.join("chime.mp3"),
                mp3_dir.join("train").join(format!("{train}.mp3")),
                mp3_dir.join("direction").join(format!("{direction}.mp3")),
                mp3_dir.join("destination").join(format!("{destination}.mp3")),
                mp3_dir.join("track").join(format!("{track}.mp3")),
            ])
        }
        AnnouncementType::Safety => {
            let language = require(parameters, "language")?;
            Ok(vec![mp3_dir
                .join("safety")
                .join(format!("safety_{language}.mp3"))])
        }
        AnnouncementType::Promo => {
            let file = require(parameters, "file")?;
            Ok(vec![mp3_dir.join("promo").join(with_mp3_extension(file))])
        }
        AnnouncementType::Emergency => {
            let file = require(parameters, "file")?;
            Ok(vec![mp3_dir
                .join("emergency")
                .join(with_mp3_extension(file))])
        }
        AnnouncementType::Lightning => {
            // The monitor resolves the catalog entry and passes its audio
            // file through; the path is relative to the MP3 root.
            let file = require(parameters, "audio_file")?;
            Ok(vec![mp3_dir.join(file)])
        }
    }
}

fn require<'a>(
    parameters: &'a HashMap<String, String>,
    key: &'static str,
) -> Result<&'a str, PlanError> {
    match parameters.get(key).map(String::as_str) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(PlanError::MissingParameter(key)),
    }
}

fn with_mp3_extension(stem: &str) -> String {
    if stem.ends_with(".mp3") {
        stem.to_string()
    } else {
        format!("{stem}.mp3")
    }
}
