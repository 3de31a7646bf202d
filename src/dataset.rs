//! Provides the labelled data a [Trainer][1] works on and the seam to load it.
//!
//! Acquiring the data is not part of sapling: a [DatasetLoader][2] is handed in
//! by the caller. Two loaders are provided, one wrapping tensors that already
//! exist and one reading a JSON document.
//!
//! [1]: ../trainer/struct.Trainer.html
//! [2]: ./trait.DatasetLoader.html
use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::tensor::Tensor;

#[derive(Debug, Clone, PartialEq)]
/// Features together with one binary label per sample.
///
/// Read-only once created.
pub struct Dataset {
    features: Tensor,
    labels: Tensor,
}

impl Dataset {
    /// Pair `features` of shape `(batch, ...)` with `labels` of shape `(batch, 1)`.
    ///
    /// Fails with a data error if the dataset is empty, the two tensors
    /// don't describe the same samples or a label lies outside `[0, 1]`.
    pub fn new(features: Tensor, labels: Tensor) -> Result<Dataset> {
        if features.rank() < 2 || features.is_empty() {
            data_err!("features of shape {:?} hold no samples", features.shape());
        }
        if labels.rank() != 2 || labels.shape()[1] != 1 {
            data_err!("labels must have shape (batch, 1), got {:?}", labels.shape());
        }
        if features.batch_size() != labels.batch_size() {
            data_err!("{} feature samples but {} labels", features.batch_size(), labels.batch_size());
        }
        if let Some(label) = labels.data().iter().find(|y| !(0f32..=1f32).contains(*y)) {
            data_err!("label {} is not a probability in [0, 1]", label);
        }
        Ok(Dataset {
            features: features,
            labels: labels,
        })
    }

    /// All features.
    pub fn features(&self) -> &Tensor {
        &self.features
    }

    /// All labels.
    pub fn labels(&self) -> &Tensor {
        &self.labels
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.features.batch_size()
    }

    /// Returns `true` if the dataset holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The per-sample shape of the features.
    pub fn sample_shape(&self) -> &[usize] {
        self.features.sample_shape()
    }

    /// Features and labels of the samples `start..end`.
    pub fn batch(&self, start: usize, end: usize) -> Result<(Tensor, Tensor)> {
        Ok((self.features.slice_batch(start, end)?, self.labels.slice_batch(start, end)?))
    }

    /// Features and labels of the given samples, in order.
    pub fn select(&self, indices: &[usize]) -> Result<(Tensor, Tensor)> {
        Ok((self.features.select_batch(indices)?, self.labels.select_batch(indices)?))
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Everything a [DatasetLoader][1] provides.
/// [1]: ./trait.DatasetLoader.html
pub struct DatasetBundle {
    /// The training set.
    pub train: Dataset,
    /// The held-out evaluation set.
    pub test: Dataset,
    /// Names of the classes, indexed by label.
    pub classes: Vec<String>,
}

/// Source of a training and an evaluation set.
pub trait DatasetLoader {
    /// Load both sets together with the class names.
    fn load_dataset(&self) -> Result<DatasetBundle>;
}

#[derive(Debug, Clone)]
/// Hands out tensors that were built by the caller.
pub struct InMemoryLoader {
    train_features: Tensor,
    train_labels: Tensor,
    test_features: Tensor,
    test_labels: Tensor,
    classes: Vec<String>,
}

impl InMemoryLoader {
    /// Wrap already existing tensors.
    pub fn new(train_features: Tensor,
               train_labels: Tensor,
               test_features: Tensor,
               test_labels: Tensor,
               classes: Vec<String>) -> InMemoryLoader {
        InMemoryLoader {
            train_features: train_features,
            train_labels: train_labels,
            test_features: test_features,
            test_labels: test_labels,
            classes: classes,
        }
    }
}

impl DatasetLoader for InMemoryLoader {
    fn load_dataset(&self) -> Result<DatasetBundle> {
        Ok(DatasetBundle {
            train: Dataset::new(self.train_features.clone(), self.train_labels.clone())?,
            test: Dataset::new(self.test_features.clone(), self.test_labels.clone())?,
            classes: self.classes.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// A batch of raw images as stored in a dataset document.
pub struct RawImages {
    /// `(batch, height, width, channels)`
    pub shape: Vec<usize>,
    /// Pixel values in `0..=255`, channels-last.
    pub data: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// The JSON document read by a [JsonFileLoader][1].
/// [1]: ./struct.JsonFileLoader.html
pub struct DatasetDocument {
    /// Training images
    pub train_set_x: RawImages,
    /// One label per training image
    pub train_set_y: Vec<f32>,
    /// Evaluation images
    pub test_set_x: RawImages,
    /// One label per evaluation image
    pub test_set_y: Vec<f32>,
    /// Class names
    #[serde(default)]
    pub list_classes: Vec<String>,
}

impl DatasetDocument {
    /// Turn the raw document into datasets.
    ///
    /// Pixels are scaled into `[0, 1]` and the labels become a column.
    pub fn into_bundle(self) -> Result<DatasetBundle> {
        Ok(DatasetBundle {
            train: Self::dataset(self.train_set_x, self.train_set_y)?,
            test: Self::dataset(self.test_set_x, self.test_set_y)?,
            classes: self.list_classes,
        })
    }

    fn dataset(images: RawImages, labels: Vec<f32>) -> Result<Dataset> {
        let pixels = images.data.into_iter().map(|p| p / 255f32).collect();
        let features = Tensor::new(&images.shape, pixels)?;
        let count = labels.len();
        let labels = Tensor::new(&[count, 1], labels)?;
        Dataset::new(features, labels)
    }
}

#[derive(Debug, Clone)]
/// Reads a [DatasetDocument][1] from a JSON file.
/// [1]: ./struct.DatasetDocument.html
pub struct JsonFileLoader {
    path: PathBuf,
}

impl JsonFileLoader {
    /// Create a loader for the file at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> JsonFileLoader {
        JsonFileLoader {
            path: path.as_ref().to_owned(),
        }
    }
}

impl DatasetLoader for JsonFileLoader {
    fn load_dataset(&self) -> Result<DatasetBundle> {
        info!("Loading dataset from {}", self.path.display());
        let json = fs::read_to_string(&self.path)?;
        let document: DatasetDocument = serde_json::from_str(&json)?;
        document.into_bundle()
    }
}
