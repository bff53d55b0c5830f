//! # vole-data
//!
//! Indexed data loading for ImageNet-2012 style directory datasets.
//!
//! This crate provides:
//! - [`AnnotationIndex`] — folder list, per-folder stats, and class labels,
//!   built exactly once from `labels.txt` and the directory listing
//! - [`resolver`] — global index → (folder, image, class id) resolution:
//!   O(1) for the uniformly sized validation split, amortized near-O(1)
//!   for the variable-width training split
//! - [`ImageNetDataset`] — decode, grayscale expansion, resize, and
//!   transforms behind the [`Dataset`] trait
//! - [`DataLoader`] — batching, shuffling, parallel fetching

pub mod annotations;
pub mod dataset;
pub mod error;
pub mod imagenet;
pub mod loader;
pub mod resolver;
pub mod transform;

pub use annotations::{AnnotationIndex, FolderStats, Phase};
pub use dataset::{Dataset, Sample};
pub use error::DataError;
pub use imagenet::{ImageNetBuilder, ImageNetDataset};
pub use loader::{BatchIterator, DataLoader, DataLoaderConfig};
pub use resolver::{dataset_len, resolve, ResolvedItem, TRAIN_MAX_FOLDER_SIZE, VAL_FOLDER_SIZE};
pub use transform::{ChannelStandardize, Compose, Normalize, Transform};
