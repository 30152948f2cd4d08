use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;

use super::{DatasetError, DatasetResult};

/// One detected face frame, as listed in `<name>.labeled_faces.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRecord {
    pub name: String,
    /// Relative to the frames folder, always `/` separated.
    pub filename: String,
    pub center: (i64, i64),
    pub size: (i64, i64),
}

impl ImageRecord {
    /// The numeric directory enclosing the frame, e.g. `Aaron_Eckhart/3/3.1.jpg` -> 3.
    pub fn video_index(&self) -> DatasetResult<i32> {
        let segments: Vec<&str> = self.filename.split('/').collect();
        if segments.len() < 3 {
            return Err(DatasetError::VideoIndex(self.filename.clone()));
        }
        segments[1..segments.len() - 1]
            .iter()
            .find(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<i32>().ok())
            .ok_or_else(|| DatasetError::VideoIndex(self.filename.clone()))
    }
}

pub fn labeled_faces_path(frames_dir: &Path, name: &str) -> PathBuf {
    frames_dir.join(format!("{name}.labeled_faces.txt"))
}

/// Every identity with a folder in the aligned directory, sorted case-insensitively.
pub fn discover_labels(aligned_dir: &Path) -> DatasetResult<Vec<String>> {
    let io_err = |e: std::io::Error| DatasetError::Io {
        path: aligned_dir.to_path_buf(),
        source: e,
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(aligned_dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if !entry.file_type().map_err(io_err)?.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => tracing::warn!("Skipping identity folder {:?}: not valid UTF-8", name),
        }
    }
    Ok(names
        .into_iter()
        .sorted_by_cached_key(|s| s.to_lowercase())
        .collect())
}

/// A plain list of identity names, one per line. Only the first comma-separated
/// column is used.
pub fn read_label_file(path: &Path) -> DatasetResult<Vec<String>> {
    let meta_err = |reason: String| DatasetError::Metadata {
        path: path.to_path_buf(),
        reason,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| meta_err(e.to_string()))?;

    let mut labels = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| meta_err(e.to_string()))?;
        if let Some(name) = row.get(0).map(str::trim).filter(|s| !s.is_empty()) {
            labels.push(name.to_string());
        }
    }
    Ok(labels)
}

/// Parses the rows `path, _, center_x, center_y, size_w, size_h[, ...]` of one
/// identity's metadata file.
pub fn read_person_records(path: &Path, name: &str) -> DatasetResult<Vec<ImageRecord>> {
    let meta_err = |reason: String| DatasetError::Metadata {
        path: path.to_path_buf(),
        reason,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| meta_err(e.to_string()))?;

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| meta_err(e.to_string()))?;
        if row.len() < 6 {
            return Err(meta_err(format!(
                "line {}: expected at least 6 fields, found {}",
                line + 1,
                row.len()
            )));
        }
        let int = |i: usize| {
            row[i].parse::<i64>().map_err(|e| {
                meta_err(format!("line {}: field {} {:?}: {}", line + 1, i, &row[i], e))
            })
        };
        records.push(ImageRecord {
            name: name.to_string(),
            filename: row[0].replace('\\', "/"),
            center: (int(2)?, int(3)?),
            size: (int(4)?, int(5)?),
        });
    }
    Ok(records)
}

/// Uniform sample without replacement of `min(cap, len)` records.
pub fn sample_records<R: Rng + ?Sized>(
    records: Vec<ImageRecord>,
    cap: Option<usize>,
    rng: &mut R,
) -> Vec<ImageRecord> {
    match cap {
        None => records,
        Some(cap) => {
            if cap > records.len() {
                tracing::warn!(
                    "Only {} images available, cannot sample {}; keeping all of them",
                    records.len(),
                    cap
                );
            }
            records.choose_multiple(rng, cap).cloned().collect()
        }
    }
}

/// Collects the records of every label, in label order.
///
/// A label whose metadata cannot be read ends the gathering: the error is
/// logged and the records collected so far are returned as they are.
pub fn gather_images_info<R: Rng + ?Sized>(
    frames_dir: &Path,
    labels: &[String],
    max_images_per_person: Option<usize>,
    rng: &mut R,
) -> Vec<ImageRecord> {
    let mut data = Vec::new();
    for name in labels {
        let data_file = labeled_faces_path(frames_dir, name);
        let person = match read_person_records(&data_file, name) {
            Ok(person) => person,
            Err(e) => {
                tracing::error!("{e}");
                return data;
            }
        };
        data.extend(sample_records(person, max_images_per_person, rng));
    }
    data
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(filename: &str) -> ImageRecord {
        ImageRecord {
            name: "Aaron_Eckhart".into(),
            filename: filename.into(),
            center: (0, 0),
            size: (0, 0),
        }
    }

    #[test]
    fn video_index_from_path() {
        assert_eq!(record("Aaron_Eckhart/0/0.555.jpg").video_index().unwrap(), 0);
        assert_eq!(record("Aaron_Eckhart/12/12.1.jpg").video_index().unwrap(), 12);
        assert_eq!(record("/data/Al_Gore/4/x/1.jpg").video_index().unwrap(), 4);
        assert!(record("Aaron_Eckhart/0.555.jpg").video_index().is_err());
        assert!(record("12/0.jpg").video_index().is_err());
        assert!(record("Aaron_Eckhart/a1/0.jpg").video_index().is_err());
    }

    #[test]
    fn parse_metadata_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Aaron_Eckhart.labeled_faces.txt");
        fs::write(
            &path,
            "Aaron_Eckhart\\0\\0.555.jpg,0,93,89,40,42,0.0,1\nAaron_Eckhart\\1\\1.2.jpg,0, 10, 11,12,13\n",
        )
        .unwrap();

        let records = read_person_records(&path, "Aaron_Eckhart").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].filename, "Aaron_Eckhart/0/0.555.jpg");
        assert_eq!(records[0].center, (93, 89));
        assert_eq!(records[0].size, (40, 42));
        assert_eq!(records[1].center, (10, 11));
        assert_eq!(records[1].video_index().unwrap(), 1);
    }

    #[test]
    fn malformed_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.labeled_faces.txt");
        fs::write(&path, "a/0/0.jpg,0,x,1,2,3\n").unwrap();
        assert!(matches!(
            read_person_records(&path, "bad"),
            Err(DatasetError::Metadata { .. })
        ));

        fs::write(&path, "a/0/0.jpg,0,1,2\n").unwrap();
        assert!(read_person_records(&path, "bad").is_err());
        assert!(read_person_records(&dir.path().join("missing.txt"), "missing").is_err());
    }

    #[test]
    fn labels_sorted_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["bob", "Alice", "Carol", "adam"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("README"), "not a label").unwrap();
        assert_eq!(
            discover_labels(dir.path()).unwrap(),
            vec!["adam", "Alice", "bob", "Carol"]
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_folders_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Bill_Gates")).unwrap();
        fs::create_dir(dir.path().join(OsStr::from_bytes(b"Jos\xe9"))).unwrap();
        assert_eq!(discover_labels(dir.path()).unwrap(), vec!["Bill_Gates"]);
    }

    #[test]
    fn label_file_first_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        fs::write(&path, "Bill_Clinton, 1\n George_W_Bush\n\n").unwrap();
        assert_eq!(read_label_file(&path).unwrap(), vec!["Bill_Clinton", "George_W_Bush"]);
    }

    #[test]
    fn sampling_caps() {
        let mut rng = StdRng::seed_from_u64(0);
        let records: Vec<_> = (0..10).map(|i| record(&format!("a/0/{i}.jpg"))).collect();

        let all = sample_records(records.clone(), None, &mut rng);
        assert_eq!(all, records);

        let some = sample_records(records.clone(), Some(4), &mut rng);
        assert_eq!(some.len(), 4);
        assert_eq!(some.iter().unique().count(), 4);
        assert!(some.iter().all(|r| records.contains(r)));

        assert_eq!(sample_records(records, Some(50), &mut rng).len(), 10);
    }
}
