// ImageNetDataset — directory-backed ImageNet-2012 style dataset
//
// The dataset opens once: annotations and directory listings are read during
// `build()` and turned into the immutable AnnotationIndex.  After that,
// every lookup is pure index arithmetic plus a single image decode; the
// filesystem is never re-walked per item.
//
// USAGE:
//
//   let ds = ImageNetDataset::builder("data/imagenet", Phase::Train)
//       .resize(224, 224)
//       .transform(Box::new(Normalize::new(255.0)))
//       .build()?;
//   let sample = ds.fetch(0)?;
//   println!("{} samples, {} classes", ds.len(), ds.num_classes());

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::DynamicImage;

use crate::annotations::{AnnotationIndex, Phase};
use crate::dataset::{Dataset, Sample};
use crate::error::DataError;
use crate::resolver::{self, ResolvedItem};
use crate::transform::Transform;

/// Builder for [`ImageNetDataset`].
pub struct ImageNetBuilder {
    root: PathBuf,
    phase: Phase,
    resize: Option<(u32, u32)>,
    transform: Option<Box<dyn Transform>>,
}

impl ImageNetBuilder {
    /// Create a builder rooted at the dataset directory.
    pub fn new<P: AsRef<Path>>(root: P, phase: Phase) -> Self {
        ImageNetBuilder {
            root: root.as_ref().to_path_buf(),
            phase,
            resize: None,
            transform: None,
        }
    }

    /// Resize every decoded image to (width, height) using Lanczos3.
    pub fn resize(mut self, width: u32, height: u32) -> Self {
        self.resize = Some((width, height));
        self
    }

    /// Transform applied to each decoded sample.
    pub fn transform(mut self, t: Box<dyn Transform>) -> Self {
        self.transform = Some(t);
        self
    }

    /// Read the annotations, build the index, and cache the dataset length.
    pub fn build(self) -> Result<ImageNetDataset, DataError> {
        let index = AnnotationIndex::load(&self.root, self.phase)?;
        let len = resolver::dataset_len(&index, self.phase);
        log::info!(
            "{} split at {}: {} samples across {} classes",
            self.phase,
            self.root.display(),
            len,
            index.num_classes()
        );
        Ok(ImageNetDataset {
            root: self.root,
            phase: self.phase,
            index,
            len,
            resize: self.resize,
            transform: self.transform,
        })
    }
}

/// An ImageNet-2012 style dataset: one folder per class, images inside, and
/// a `labels.txt` mapping folders to numeric class ids.
///
/// Lookup structures are built once by [`ImageNetBuilder::build`] and held
/// immutably; `resolve`, `fetch`, and `get` are read-only and safe to call
/// from any number of threads.
pub struct ImageNetDataset {
    root: PathBuf,
    phase: Phase,
    index: AnnotationIndex,
    len: usize,
    resize: Option<(u32, u32)>,
    transform: Option<Box<dyn Transform>>,
}

impl std::fmt::Debug for ImageNetDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageNetDataset")
            .field("root", &self.root)
            .field("phase", &self.phase)
            .field("index", &self.index)
            .field("len", &self.len)
            .field("resize", &self.resize)
            .field("transform", &self.transform.as_ref().map(|_| "<transform>"))
            .finish()
    }
}

impl ImageNetDataset {
    /// Convenience entry-point: `ImageNetDataset::builder(root, phase)`.
    pub fn builder<P: AsRef<Path>>(root: P, phase: Phase) -> ImageNetBuilder {
        ImageNetBuilder::new(root, phase)
    }

    /// Open with default settings (no resize, no transform).
    pub fn load<P: AsRef<Path>>(root: P, phase: Phase) -> Result<Self, DataError> {
        Self::builder(root, phase).build()
    }

    /// Which split this dataset serves.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The underlying annotation index.
    pub fn annotations(&self) -> &AnnotationIndex {
        &self.index
    }

    /// Number of annotated classes.
    pub fn num_classes(&self) -> usize {
        self.index.num_classes()
    }

    /// Human-readable label for a class id.
    pub fn class_label(&self, class_id: i64) -> Option<&str> {
        self.index.label(class_id)
    }

    /// Map a global index to its folder, image name, and class id.
    pub fn resolve(&self, global_index: usize) -> Result<ResolvedItem<'_>, DataError> {
        resolver::resolve(&self.index, self.phase, global_index)
    }

    /// Absolute path of the image behind a global index.
    pub fn image_path(&self, global_index: usize) -> Result<PathBuf, DataError> {
        let item = self.resolve(global_index)?;
        Ok(self.item_path(&item))
    }

    fn item_path(&self, item: &ResolvedItem<'_>) -> PathBuf {
        self.root
            .join(self.phase.dir_name())
            .join(item.folder)
            .join(item.image)
    }

    /// Resolve, decode, and post-process the sample at `global_index`.
    ///
    /// Grayscale images are expanded to 3 channels by replication before the
    /// optional resize and transform run.
    pub fn fetch(&self, global_index: usize) -> Result<Sample, DataError> {
        let item = self.resolve(global_index)?;
        let path = self.item_path(&item);
        let img = image::open(&path).map_err(|source| DataError::Decode {
            path: path.clone(),
            source,
        })?;
        let (pixels, height, width) = decode_pixels(img, self.resize);
        let sample = Sample {
            image: pixels,
            shape: vec![height, width, 3],
            class_id: item.class_id,
        };
        Ok(match &self.transform {
            Some(t) => t.apply(sample),
            None => sample,
        })
    }
}

/// Flatten a decoded image to [H, W, C] f64 pixels, 3 channels always.
///
/// A single-channel source is replicated across channels first, so the
/// resize and transform stages only ever see 3-channel data.
fn decode_pixels(img: DynamicImage, resize: Option<(u32, u32)>) -> (Vec<f64>, usize, usize) {
    let img = match img {
        DynamicImage::ImageLuma8(gray) => {
            let (width, height) = gray.dimensions();
            let mut rgb = image::RgbImage::new(width, height);
            for (src, dst) in gray.pixels().zip(rgb.pixels_mut()) {
                let v = src.0[0];
                dst.0 = [v, v, v];
            }
            DynamicImage::ImageRgb8(rgb)
        }
        other => other,
    };
    let img = match resize {
        Some((width, height)) => img.resize_exact(width, height, FilterType::Lanczos3),
        None => img,
    };
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let pixels = rgb.as_raw().iter().map(|&v| v as f64).collect();
    (pixels, height as usize, width as usize)
}

impl Dataset for ImageNetDataset {
    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> Sample {
        // Out-of-range indices panic per the trait contract; a decode
        // failure degrades to a zero sample so epoch iteration survives a
        // corrupt file.  `fetch` is the error-propagating form.
        let item = match self.resolve(index) {
            Ok(item) => item,
            Err(e) => panic!("{e}"),
        };
        let class_id = item.class_id;
        match self.fetch(index) {
            Ok(sample) => sample,
            Err(e) => {
                log::warn!("failed to load sample {index}: {e}");
                let (width, height) = self.resize.unwrap_or((1, 1));
                let (width, height) = (width as usize, height as usize);
                Sample {
                    image: vec![0.0; height * width * 3],
                    shape: vec![height, width, 3],
                    class_id,
                }
            }
        }
    }

    fn name(&self) -> &str {
        match self.phase {
            Phase::Train => "imagenet-train",
            Phase::Val => "imagenet-val",
        }
    }
}
