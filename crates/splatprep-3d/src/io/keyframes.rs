use std::path::Path;

/// Error types for the keyframe mapping reader.
#[derive(Debug, thiserror::Error)]
pub enum KeyframeMappingError {
    /// Error reading the file
    #[error("error reading file")]
    IoError(#[from] std::io::Error),

    /// A data line could not be parsed
    #[error("Malformed keyframe mapping line {line}: {reason}")]
    MalformedLine {
        /// 1-based line number.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },
}

/// One keyframe written by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyframeEntry {
    /// Tracker timestamp, kept as written.
    pub timestamp: String,
    /// Tracker frame index.
    pub frame_id: u64,
    /// File name of the full resolution source image.
    pub filename: String,
}

fn is_header(line: &str) -> bool {
    line.starts_with("m-slam_file") || line.contains("original_filename")
}

/// Split off the first token; the remainder starts after the whitespace run that ends it.
fn split_token(s: &str) -> Option<(&str, &str)> {
    let (token, rest) = s.split_once(char::is_whitespace)?;
    Some((token, rest.trim_start()))
}

/// Parse a keyframe mapping document.
///
/// Each data line reads `timestamp frame_id "original_filename"`. Blank lines,
/// `#` comments and the header line are skipped.
pub fn parse_keyframe_mapping(text: &str) -> Result<Vec<KeyframeEntry>, KeyframeMappingError> {
    let mut entries = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || is_header(line) {
            continue;
        }

        let malformed = |reason: String| KeyframeMappingError::MalformedLine {
            line: idx + 1,
            reason,
        };

        let Some((timestamp, (frame_id, filename))) =
            split_token(line).and_then(|(timestamp, rest)| Some((timestamp, split_token(rest)?)))
        else {
            return Err(malformed("expected timestamp, frame id and file name".into()));
        };

        let frame_id = frame_id
            .parse::<u64>()
            .map_err(|e| malformed(format!("{frame_id}: {e}")))?;
        let filename = filename.trim_matches('"');
        if filename.is_empty() {
            return Err(malformed("empty file name".into()));
        }

        entries.push(KeyframeEntry {
            timestamp: timestamp.to_string(),
            frame_id,
            filename: filename.to_string(),
        });
    }
    Ok(entries)
}

/// Read a keyframe mapping file.
///
/// # Arguments
///
/// * `path` - The path to the mapping file written by the tracker.
///
/// # Returns
///
/// The entries in file order.
pub fn read_keyframe_mapping(
    path: impl AsRef<Path>,
) -> Result<Vec<KeyframeEntry>, KeyframeMappingError> {
    let entries = parse_keyframe_mapping(&std::fs::read_to_string(path.as_ref())?)?;
    log::debug!(
        "read {} keyframes from {}",
        entries.len(),
        path.as_ref().display()
    );
    Ok(entries)
}

/// The keyframe file names in mapping order.
pub fn keyframe_names(entries: &[KeyframeEntry]) -> Vec<String> {
    entries.iter().map(|e| e.filename.clone()).collect()
}
