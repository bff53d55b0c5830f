// Annotation index — labels.txt parsing and folder enumeration
//
// An ImageNet-2012 style tree looks like:
//
//   root/
//     train/
//       n01440764/
//         n01440764_10026.JPEG
//         ...
//     val/
//       n01440764/
//       ...
//     labels.txt        one `<folder> <class-id> <label>` line per class
//
// Everything the resolver needs is read exactly once, up front: the folder
// list sorted by numeric suffix, per-folder image lists sorted by the
// numeric token in the filename, and the class-id -> label map.  Nothing in
// here is ever mutated after construction.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use crate::error::DataError;
use crate::resolver::VAL_FOLDER_SIZE;

/// Which split of the dataset to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Val,
}

impl Phase {
    /// Directory name under the dataset root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Phase::Train => "train",
            Phase::Val => "val",
        }
    }
}

impl FromStr for Phase {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, DataError> {
        match s {
            "train" => Ok(Phase::Train),
            "val" => Ok(Phase::Val),
            other => Err(DataError::InvalidPhase(other.to_string())),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Numeric suffix of a folder identifier (`n01440764` -> 1440764).
///
/// Folder names are a single letter followed by digits; the digits decide
/// the folder order, not the lexical name.
pub fn folder_sort_key(name: &str) -> Result<u64, DataError> {
    name.get(1..)
        .and_then(|digits| digits.parse::<u64>().ok())
        .ok_or_else(|| DataError::MalformedFolderName {
            name: name.to_string(),
        })
}

/// Numeric token embedded in an image filename.
///
/// `n01440764_10026.JPEG` carries 10026 between the first two separators.
/// Zero padding is inconsistent across the dataset, so the parsed integer is
/// the only safe sort key — lexical order would put `x_10` before `x_2`.
pub fn image_sort_key(name: &str) -> Result<u64, DataError> {
    name.split(['_', '.'])
        .nth(1)
        .and_then(|token| token.parse::<u64>().ok())
        .ok_or_else(|| DataError::MalformedImageName {
            name: name.to_string(),
        })
}

/// Per-folder statistics: class id, image count, sorted image names.
#[derive(Debug, Clone)]
pub struct FolderStats {
    /// Numeric class id from the annotation file.
    pub class_id: i64,
    /// Number of images in the folder.
    pub len: usize,
    /// Image filenames sorted by their embedded numeric token.
    pub images: Vec<String>,
}

/// The immutable lookup structures built once when a dataset is opened.
///
/// Holds the class-id -> label map, the per-folder stats table, and the
/// folder list in numeric-suffix order.  The resolver assumes that order and,
/// for the validation split, that every folder holds exactly
/// [`VAL_FOLDER_SIZE`] images — which [`AnnotationIndex::from_feed`] verifies.
#[derive(Debug)]
pub struct AnnotationIndex {
    labels: HashMap<i64, String>,
    stats: HashMap<String, FolderStats>,
    folders: Vec<String>,
}

impl AnnotationIndex {
    /// Build the index from an annotation feed and a directory-listing
    /// primitive.
    ///
    /// `folders` is the unordered listing of the phase directory,
    /// `annotations` yields `<folder> <class-id> <label>` lines, and
    /// `list_folder` lists the image names inside one folder.  Any parse
    /// failure or folder/annotation mismatch aborts construction; no partial
    /// index is ever returned.
    pub fn from_feed<R, F>(
        phase: Phase,
        mut folders: Vec<String>,
        annotations: R,
        mut list_folder: F,
    ) -> Result<Self, DataError>
    where
        R: BufRead,
        F: FnMut(&str) -> io::Result<Vec<String>>,
    {
        let mut keyed: Vec<(u64, String)> = Vec::with_capacity(folders.len());
        for name in folders.drain(..) {
            keyed.push((folder_sort_key(&name)?, name));
        }
        keyed.sort_by_key(|&(key, _)| key);
        let folders: Vec<String> = keyed.into_iter().map(|(_, name)| name).collect();
        let known: HashSet<&str> = folders.iter().map(String::as_str).collect();

        let mut labels = HashMap::new();
        let mut stats = HashMap::new();

        for (line_idx, line) in annotations.lines().enumerate() {
            let line = line?;
            let mut tokens = line.split_whitespace();
            let (folder, class_id, label) =
                match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
                    (Some(folder), Some(id), Some(label), None) => (folder, id, label),
                    _ => {
                        return Err(DataError::MalformedAnnotationLine {
                            line_no: line_idx + 1,
                            line,
                        })
                    }
                };
            let class_id: i64 =
                class_id
                    .parse()
                    .map_err(|_| DataError::MalformedAnnotationLine {
                        line_no: line_idx + 1,
                        line: line.clone(),
                    })?;
            if !known.contains(folder) {
                return Err(DataError::MissingAnnotationForFolder {
                    folder: folder.to_string(),
                });
            }
            labels.insert(class_id, label.to_string());

            let mut images = list_folder(folder)?;
            let mut keyed: Vec<(u64, String)> = Vec::with_capacity(images.len());
            for name in images.drain(..) {
                keyed.push((image_sort_key(&name)?, name));
            }
            keyed.sort_by_key(|&(key, _)| key);
            let images: Vec<String> = keyed.into_iter().map(|(_, name)| name).collect();

            if phase == Phase::Val && images.len() != VAL_FOLDER_SIZE {
                return Err(DataError::ValFolderSize {
                    folder: folder.to_string(),
                    len: images.len(),
                    expected: VAL_FOLDER_SIZE,
                });
            }

            stats.insert(
                folder.to_string(),
                FolderStats {
                    class_id,
                    len: images.len(),
                    images,
                },
            );
        }

        for folder in &folders {
            if !stats.contains_key(folder) {
                return Err(DataError::MissingAnnotationForFolder {
                    folder: folder.clone(),
                });
            }
        }

        Ok(Self {
            labels,
            stats,
            folders,
        })
    }

    /// Open the index for `root_dir` and `phase`, listing the phase
    /// directory tree and reading `root_dir/labels.txt` exactly once.
    pub fn load(root_dir: &Path, phase: Phase) -> Result<Self, DataError> {
        let phase_dir = root_dir.join(phase.dir_name());
        let folders = list_entries(&phase_dir)?;
        let annotations = fs::File::open(root_dir.join("labels.txt"))?;
        let index = Self::from_feed(phase, folders, BufReader::new(annotations), |folder| {
            list_entries(&phase_dir.join(folder))
        })?;
        log::debug!(
            "indexed {} folders, {} classes under {}",
            index.folders.len(),
            index.labels.len(),
            phase_dir.display()
        );
        Ok(index)
    }

    /// Folder identifiers in numeric-suffix order.
    pub fn folders(&self) -> &[String] {
        &self.folders
    }

    /// Stats for one folder, if known.
    pub fn stats(&self, folder: &str) -> Option<&FolderStats> {
        self.stats.get(folder)
    }

    /// Stats for the folder at `position` in numeric order.
    ///
    /// # Panics
    /// Panics if `position >= self.folders().len()`.  Every indexed folder
    /// has stats: construction fails otherwise.
    pub fn stats_at(&self, position: usize) -> &FolderStats {
        &self.stats[&self.folders[position]]
    }

    /// Human-readable label for a class id.
    pub fn label(&self, class_id: i64) -> Option<&str> {
        self.labels.get(&class_id).map(String::as_str)
    }

    /// Number of annotated classes.
    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }
}

/// Directory-listing primitive: entry names under `path`, order unspecified.
fn list_entries(path: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(path)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn feed(
        phase: Phase,
        folders: &[&str],
        annotations: &str,
        images: &[(&str, &[&str])],
    ) -> Result<AnnotationIndex, DataError> {
        let images: HashMap<String, Vec<String>> = images
            .iter()
            .map(|(folder, names)| {
                (
                    folder.to_string(),
                    names.iter().map(|n| n.to_string()).collect(),
                )
            })
            .collect();
        AnnotationIndex::from_feed(
            phase,
            folders.iter().map(|f| f.to_string()).collect(),
            Cursor::new(annotations.to_string()),
            |folder| Ok(images.get(folder).cloned().unwrap_or_default()),
        )
    }

    #[test]
    fn folder_sort_key_parses_suffix() {
        assert_eq!(folder_sort_key("n01440764").unwrap(), 1440764);
        assert_eq!(folder_sort_key("n2").unwrap(), 2);
    }

    #[test]
    fn folder_sort_key_rejects_non_numeric() {
        assert!(matches!(
            folder_sort_key("nabc"),
            Err(DataError::MalformedFolderName { .. })
        ));
        assert!(matches!(
            folder_sort_key("n"),
            Err(DataError::MalformedFolderName { .. })
        ));
    }

    #[test]
    fn image_sort_key_parses_token() {
        assert_eq!(image_sort_key("n01440764_10026.JPEG").unwrap(), 10026);
        assert_eq!(image_sort_key("a_1.png").unwrap(), 1);
    }

    #[test]
    fn image_sort_key_rejects_missing_token() {
        assert!(matches!(
            image_sort_key("noseparators"),
            Err(DataError::MalformedImageName { .. })
        ));
        assert!(matches!(
            image_sort_key("x_y.png"),
            Err(DataError::MalformedImageName { .. })
        ));
    }

    #[test]
    fn phase_from_str() {
        assert_eq!("train".parse::<Phase>().unwrap(), Phase::Train);
        assert_eq!("val".parse::<Phase>().unwrap(), Phase::Val);
        assert!(matches!(
            "test".parse::<Phase>(),
            Err(DataError::InvalidPhase(_))
        ));
    }

    #[test]
    fn folders_sorted_numerically_not_lexically() {
        // Lexical order would put n10 before n2.
        let index = feed(
            Phase::Train,
            &["n10", "n2"],
            "n10 1 b\nn2 0 a\n",
            &[("n10", &["x_1.png"]), ("n2", &["x_1.png"])],
        )
        .unwrap();
        assert_eq!(index.folders(), &["n2".to_string(), "n10".to_string()]);
    }

    #[test]
    fn images_sorted_by_numeric_token() {
        let index = feed(
            Phase::Train,
            &["n1"],
            "n1 0 tench\n",
            &[("n1", &["x_10.png", "x_2.png", "x_001.png"])],
        )
        .unwrap();
        let stats = index.stats("n1").unwrap();
        assert_eq!(stats.images, vec!["x_001.png", "x_2.png", "x_10.png"]);
        assert_eq!(stats.len, 3);
        assert_eq!(stats.class_id, 0);
    }

    #[test]
    fn annotation_line_with_wrong_arity_fails() {
        let err = feed(Phase::Train, &["n1"], "n1 0\n", &[("n1", &["x_1.png"])]).unwrap_err();
        assert!(matches!(
            err,
            DataError::MalformedAnnotationLine { line_no: 1, .. }
        ));

        let err = feed(
            Phase::Train,
            &["n1"],
            "n1 0 tench extra\n",
            &[("n1", &["x_1.png"])],
        )
        .unwrap_err();
        assert!(matches!(err, DataError::MalformedAnnotationLine { .. }));
    }

    #[test]
    fn annotation_line_with_non_numeric_class_fails() {
        let err = feed(
            Phase::Train,
            &["n1"],
            "n1 zero tench\n",
            &[("n1", &["x_1.png"])],
        )
        .unwrap_err();
        assert!(matches!(err, DataError::MalformedAnnotationLine { .. }));
    }

    #[test]
    fn unannotated_folder_on_disk_fails() {
        let err = feed(
            Phase::Train,
            &["n1", "n2"],
            "n1 0 tench\n",
            &[("n1", &["x_1.png"]), ("n2", &["x_1.png"])],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DataError::MissingAnnotationForFolder { folder } if folder == "n2"
        ));
    }

    #[test]
    fn annotated_folder_missing_from_disk_fails() {
        let err = feed(
            Phase::Train,
            &["n1"],
            "n1 0 tench\nn2 1 goldfish\n",
            &[("n1", &["x_1.png"])],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DataError::MissingAnnotationForFolder { folder } if folder == "n2"
        ));
    }

    #[test]
    fn malformed_folder_name_fails() {
        let err = feed(Phase::Train, &["bad!"], "", &[]).unwrap_err();
        assert!(matches!(err, DataError::MalformedFolderName { .. }));
    }

    #[test]
    fn val_folder_size_is_enforced() {
        let names: Vec<String> = (0..3).map(|i| format!("x_{i}.png")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let err = feed(Phase::Val, &["n1"], "n1 0 tench\n", &[("n1", &names)]).unwrap_err();
        assert!(matches!(
            err,
            DataError::ValFolderSize { len: 3, expected: VAL_FOLDER_SIZE, .. }
        ));
    }

    #[test]
    fn labels_are_recorded() {
        let index = feed(
            Phase::Train,
            &["n1", "n2"],
            "n1 0 tench\nn2 1 goldfish\n",
            &[("n1", &["x_1.png"]), ("n2", &["x_1.png"])],
        )
        .unwrap();
        assert_eq!(index.num_classes(), 2);
        assert_eq!(index.label(0), Some("tench"));
        assert_eq!(index.label(1), Some("goldfish"));
        assert_eq!(index.label(7), None);
    }
}
