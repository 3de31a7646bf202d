//! Provides the immutable N-dimensional array that flows through a Pipeline.
//!
//! A Tensor owns its buffer exclusively. Stages never change a Tensor they
//! receive; they always produce a new one. For batched data the first axis is
//! the batch axis, e.g. images are stored as `(batch, height, width, channels)`.
use std::fmt;
use crate::error::{Error, Result};

#[derive(Clone, PartialEq)]
/// An immutable `f32` array with a shape.
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Create a Tensor from a shape and a buffer.
    ///
    /// Fails with a shape error if the buffer length is not the product of the shape.
    pub fn new(shape: &[usize], data: Vec<f32>) -> Result<Tensor> {
        let expected = shape_size(shape);
        if data.len() != expected {
            shape_err!("buffer of {} elements does not fit shape {:?} ({} elements)",
                       data.len(), shape, expected);
        }
        Ok(Tensor {
            shape: shape.to_owned(),
            data: data,
        })
    }

    /// Create a Tensor of the given shape filled with zeros.
    pub fn zeros(shape: &[usize]) -> Tensor {
        Tensor {
            shape: shape.to_owned(),
            data: vec![0f32; shape_size(shape)],
        }
    }

    /// Create a Tensor by evaluating `f` for every flat index.
    pub fn from_fn<F: FnMut(usize) -> f32>(shape: &[usize], f: F) -> Tensor {
        Tensor {
            shape: shape.to_owned(),
            data: (0..shape_size(shape)).map(f).collect(),
        }
    }

    /// The shape of the Tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the Tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read access to the flat, row-major buffer.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Give up the Tensor and return its buffer.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Size of the first axis, or 0 for a rank-0 shape.
    pub fn batch_size(&self) -> usize {
        self.shape.first().cloned().unwrap_or(0)
    }

    /// Shape without the leading batch axis.
    pub fn sample_shape(&self) -> &[usize] {
        if self.shape.is_empty() { &self.shape } else { &self.shape[1..] }
    }

    /// Reinterpret the buffer with another shape of the same element count.
    pub fn reshape(self, shape: &[usize]) -> Result<Tensor> {
        if shape_size(shape) != self.data.len() {
            shape_err!("cannot reshape {:?} into {:?}", self.shape, shape);
        }
        Ok(Tensor {
            shape: shape.to_owned(),
            data: self.data,
        })
    }

    /// Copy the rows `start..end` of the batch axis into a new Tensor.
    pub fn slice_batch(&self, start: usize, end: usize) -> Result<Tensor> {
        if self.shape.is_empty() || start > end || end > self.shape[0] {
            shape_err!("batch slice {}..{} out of range for shape {:?}", start, end, self.shape);
        }
        let row = shape_size(&self.shape[1..]);
        let mut shape = self.shape.clone();
        shape[0] = end - start;
        Ok(Tensor {
            shape: shape,
            data: self.data[start * row..end * row].to_vec(),
        })
    }

    /// Gather the given rows of the batch axis, in order, into a new Tensor.
    pub fn select_batch(&self, indices: &[usize]) -> Result<Tensor> {
        if self.shape.is_empty() {
            shape_err!("cannot select rows of a rank-0 tensor");
        }
        let row = shape_size(&self.shape[1..]);
        let mut data = Vec::with_capacity(indices.len() * row);
        for &index in indices {
            if index >= self.shape[0] {
                shape_err!("row {} out of range for shape {:?}", index, self.shape);
            }
            data.extend_from_slice(&self.data[index * row..(index + 1) * row]);
        }
        let mut shape = self.shape.clone();
        shape[0] = indices.len();
        Ok(Tensor { shape: shape, data: data })
    }

    /// Produce a new Tensor of the same shape by applying `f` to every element.
    pub fn map<F: Fn(f32) -> f32>(&self, f: F) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    /// Human readable shape, e.g. `"2 3 2 (3)"` for a rank-3 Tensor.
    pub fn shape_string(&self) -> String {
        let mut string = String::new();
        for dim in &self.shape {
            string.push_str(&dim.to_string());
            string.push(' ');
        }
        string.push('(');
        string.push_str(&self.shape.len().to_string());
        string.push(')');

        string
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const PREVIEW: usize = 8;
        write!(f, "Tensor {{ shape: {:?}, data: {:?}", self.shape, &self.data[..self.data.len().min(PREVIEW)])?;
        if self.data.len() > PREVIEW {
            write!(f, " .. {} more", self.data.len() - PREVIEW)?;
        }
        write!(f, " }}")
    }
}

/// Number of elements described by a shape.
pub fn shape_size(shape: &[usize]) -> usize {
    shape.iter().fold(1, |prod, i| prod * i)
}

impl From<Tensor> for Vec<f32> {
    fn from(tensor: Tensor) -> Vec<f32> {
        tensor.data
    }
}

impl ::std::convert::TryFrom<(Vec<usize>, Vec<f32>)> for Tensor {
    type Error = Error;

    fn try_from((shape, data): (Vec<usize>, Vec<f32>)) -> Result<Tensor> {
        Tensor::new(&shape, data)
    }
}
