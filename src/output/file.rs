//! Per-label text file output.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use parking_lot::RwLock;

use crate::error::SinkError;
use crate::types::DataPoint;

/// Appends each data point to `<base_dir>/<label>.txt`.
///
/// Path separators and control characters in a label become `_`, so every
/// file stays directly inside the base directory.
///
/// The file is opened and closed for every line. Each line goes out in a
/// single append-mode write, so concurrent writers to the same label do not
/// interleave within a line.
#[derive(Debug)]
pub struct FileSink {
    base_dir: PathBuf,
    /// Label to file path, filled in on first use of each label.
    files: RwLock<BTreeMap<String, PathBuf>>,
}

impl FileSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            files: RwLock::new(BTreeMap::new()),
        }
    }

    /// Get or create the path for a label.
    pub fn path_for(&self, label: &str) -> PathBuf {
        // Fast path: check if it exists
        {
            let files = self.files.read();
            if let Some(path) = files.get(label) {
                return path.clone();
            }
        }

        // Slow path: whoever takes the write lock first decides the path
        let mut files = self.files.write();
        files
            .entry(label.to_string())
            .or_insert_with(|| self.base_dir.join(format!("{}.txt", file_stem(label))))
            .clone()
    }

    /// Number of distinct labels written so far.
    pub fn label_count(&self) -> usize {
        self.files.read().len()
    }

    /// Append one line for `point`.
    pub fn write(&self, point: &DataPoint) -> Result<(), SinkError> {
        fs::create_dir_all(&self.base_dir).map_err(|source| SinkError::CreateDir {
            path: self.base_dir.clone(),
            source,
        })?;

        let path = self.path_for(&point.label);
        let line = format!("{point}\n");

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|source| SinkError::Write { path, source })
    }
}

fn file_stem(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn distinct_labels_get_distinct_files() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path());

        sink.write(&DataPoint::new(1, 100, "Saturation", "97%")).unwrap();
        sink.write(&DataPoint::new(2, 200, "ECG", "0.12")).unwrap();
        sink.write(&DataPoint::new(1, 300, "Saturation", "96%")).unwrap();

        let saturation = fs::read_to_string(dir.path().join("Saturation.txt")).unwrap();
        assert_eq!(
            saturation,
            "Patient ID: 1, Timestamp: 100, Label: Saturation, Data: 97%\n\
             Patient ID: 1, Timestamp: 300, Label: Saturation, Data: 96%\n"
        );

        let ecg = fs::read_to_string(dir.path().join("ECG.txt")).unwrap();
        assert_eq!(ecg, "Patient ID: 2, Timestamp: 200, Label: ECG, Data: 0.12\n");
        assert_eq!(sink.label_count(), 2);
    }

    #[test]
    fn base_dir_is_created_lazily() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("nested").join("output");
        let sink = FileSink::new(&base);
        assert!(!base.exists());

        sink.write(&DataPoint::new(1, 1, "Alert", "triggered")).unwrap();
        assert!(base.join("Alert.txt").exists());
    }

    #[test]
    fn unusable_base_dir_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "occupied").unwrap();

        let sink = FileSink::new(&blocker);
        let err = sink.write(&DataPoint::new(1, 1, "ECG", "0.1")).unwrap_err();
        assert!(matches!(err, SinkError::CreateDir { .. }));

        // The sink keeps working once the directory becomes usable
        fs::remove_file(&blocker).unwrap();
        sink.write(&DataPoint::new(1, 2, "ECG", "0.2")).unwrap();
        assert!(blocker.join("ECG.txt").exists());
    }

    #[test]
    fn path_is_stable_per_label() {
        let sink = FileSink::new("out");
        let first = sink.path_for("Saturation");
        let second = sink.path_for("Saturation");
        assert_eq!(first, second);
        assert_eq!(first, PathBuf::from("out").join("Saturation.txt"));
    }

    #[test]
    fn labels_cannot_leave_the_base_dir() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("output");
        let sink = FileSink::new(&base);

        for label in ["../escape", "/etc/passwd", "a\\b", "..", "line\nbreak"] {
            let path = sink.path_for(label);
            assert_eq!(path.parent(), Some(base.as_path()), "{label:?} -> {path:?}");
        }
        assert_eq!(sink.path_for("../escape"), base.join(".._escape.txt"));

        sink.write(&DataPoint::new(1, 1, "../escape", "1")).unwrap();
        assert!(base.join(".._escape.txt").exists());
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn concurrent_writers_keep_every_line() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(FileSink::new(dir.path()));

        let handles: Vec<_> = (1..=4)
            .map(|patient| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for ts in 0..50 {
                        sink.write(&DataPoint::new(patient, ts, "ECG", "0.5")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = fs::read_to_string(dir.path().join("ECG.txt")).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 200);
        assert!(lines.iter().all(|l| l.starts_with("Patient ID: ") && l.ends_with("Data: 0.5")));
        assert_eq!(sink.label_count(), 1);
    }
}
