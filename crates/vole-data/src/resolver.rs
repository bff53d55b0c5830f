// Index resolver — global index -> (folder, image, class id)
//
// The flat global index space maps onto a two-level folder/file structure.
// Validation folders are uniformly sized, so the mapping is a plain div/mod.
// Training folders vary in width; the resolver divides by the maximum folder
// size for a first approximation and scans forward from there.  The
// approximation is never past the true folder (no folder exceeds the
// maximum), so the scan only ever moves toward it, and it terminates because
// the cumulative sums grow monotonically up to the total length.

use crate::annotations::{AnnotationIndex, Phase};
use crate::error::DataError;

/// Every validation folder holds exactly this many images.
pub const VAL_FOLDER_SIZE: usize = 50;

/// No training folder holds more than this many images.  The train-phase
/// first approximation relies on this bound.
pub const TRAIN_MAX_FOLDER_SIZE: usize = 1300;

/// A resolved global index: which folder, which image, which class.
///
/// Borrows from the [`AnnotationIndex`]; nothing is copied per lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedItem<'a> {
    /// Folder identifier the index landed in.
    pub folder: &'a str,
    /// Image filename at the local position inside that folder.
    pub image: &'a str,
    /// Numeric class id of the folder.
    pub class_id: i64,
}

/// Total number of samples for `phase`.
pub fn dataset_len(index: &AnnotationIndex, phase: Phase) -> usize {
    match phase {
        Phase::Val => VAL_FOLDER_SIZE * index.folders().len(),
        Phase::Train => (0..index.folders().len())
            .map(|position| index.stats_at(position).len)
            .sum(),
    }
}

/// Map a global index to its folder, image name, and class id.
///
/// Validation lookups are O(1).  Training lookups cost the forward scan from
/// the first approximation, which is bounded by the folder count and in
/// practice a handful of steps.  Out-of-range indices fail with
/// [`DataError::IndexOutOfRange`]; the resolver holds no state, so the
/// caller may simply retry with a valid index.
pub fn resolve<'a>(
    index: &'a AnnotationIndex,
    phase: Phase,
    global_index: usize,
) -> Result<ResolvedItem<'a>, DataError> {
    let folders = index.folders();

    let (position, local_index) = match phase {
        Phase::Val => {
            let position = global_index / VAL_FOLDER_SIZE;
            if position >= folders.len() {
                return Err(out_of_range(index, phase, global_index));
            }
            (position, global_index % VAL_FOLDER_SIZE)
        }
        Phase::Train => {
            let mut position = global_index / TRAIN_MAX_FOLDER_SIZE;
            let mut cumulative = TRAIN_MAX_FOLDER_SIZE * position;
            loop {
                if position >= folders.len() {
                    return Err(out_of_range(index, phase, global_index));
                }
                let folder_len = index.stats_at(position).len;
                if cumulative + folder_len > global_index {
                    break;
                }
                cumulative += folder_len;
                position += 1;
            }
            (position, global_index - cumulative)
        }
    };

    let stats = index.stats_at(position);
    Ok(ResolvedItem {
        folder: &folders[position],
        image: &stats.images[local_index],
        class_id: stats.class_id,
    })
}

// The length only matters once a lookup has already failed, so it is
// computed in the error path rather than on every call.
fn out_of_range(index: &AnnotationIndex, phase: Phase, global_index: usize) -> DataError {
    DataError::IndexOutOfRange {
        index: global_index,
        len: dataset_len(index, phase),
    }
}
