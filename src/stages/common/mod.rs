//! Provides common neural network stages.
//!
//! For now the stages in common should be described as stages that are typical
//! stages for building neural networks but are not activation or utility stages.
pub use self::convolution::{Convolution, ConvolutionConfig};
pub use self::dense::{Dense, DenseConfig};
pub use self::normalization::{Normalization, NormalizationConfig};
pub use self::padding::{Padding, PaddingConfig};
pub use self::pooling::{Pooling, PoolingConfig, PoolingMode};

pub mod convolution;
pub mod dense;
pub mod normalization;
pub mod padding;
pub mod pooling;

use crate::error::Result;

/// Provides common utilities for Stages that utilize a filter with stride and padding.
///
/// This is used by the Convolution and Pooling stages. Filter, stride and
/// padding are configured with either one value, applied to every spatial
/// dimension, or with one value per spatial dimension.
pub trait FilterStage {
    /// Computes the shape of the spatial dimensions of the filter.
    fn spatial_filter_dims(&self, num_spatial_dims: usize) -> Result<Vec<usize>> {
        broadcast_dims("filter", self.filter_shape(), num_spatial_dims)
    }

    /// Retrieves the stride for the convolution based on `num_spatial_dims`
    /// and copies it to each spatial dimension if only one value was given.
    fn stride_dims(&self, num_spatial_dims: usize) -> Result<Vec<usize>> {
        broadcast_dims("stride", self.stride(), num_spatial_dims)
    }

    /// Retrieves the padding for the convolution based on `num_spatial_dims`
    /// and copies it to each spatial dimension if only one value was given.
    fn padding_dims(&self, num_spatial_dims: usize) -> Result<Vec<usize>> {
        match self.padding().len() {
            0 => Ok(vec![0; num_spatial_dims]),
            _ => broadcast_dims("padding", self.padding(), num_spatial_dims),
        }
    }

    /// The filter_shape that will be used by `spatial_filter_dims`.
    fn filter_shape(&self) -> &[usize];

    /// The stride that will be used by `stride_dims`.
    fn stride(&self) -> &[usize];

    /// The padding that will be used by `padding_dims`.
    fn padding(&self) -> &[usize];

    /// Calculates the spatial output dimensions.
    ///
    /// Fails if the filter doesn't fit into the padded input, or a stride is zero.
    fn calculate_spatial_output_dims(input_dims: &[usize], filter_dims: &[usize], padding: &[usize], stride: &[usize]) -> Result<Vec<usize>> {
        let mut output_dims = Vec::with_capacity(input_dims.len());
        for (i, &input_dim) in input_dims.iter().enumerate() {
            if stride[i] == 0 {
                shape_err!("stride must be positive, got {:?}", stride);
            }
            if filter_dims[i] == 0 {
                shape_err!("filter must be positive, got {:?}", filter_dims);
            }
            let padded = input_dim + 2 * padding[i];
            if filter_dims[i] > padded {
                shape_err!("filter {:?} is larger than the (padded) input {:?}", filter_dims, input_dims);
            }
            output_dims.push((padded - filter_dims[i]) / stride[i] + 1);
        }
        Ok(output_dims)
    }
}

fn broadcast_dims(what: &str, dims: &[usize], num_spatial_dims: usize) -> Result<Vec<usize>> {
    match dims.len() {
        1 => Ok(vec![dims[0]; num_spatial_dims]),
        n if n == num_spatial_dims => Ok(dims.to_owned()),
        _ => shape_err!("{} {:?} needs 1 or {} values", what, dims, num_spatial_dims),
    }
}

/// Check that a per-sample shape is a channels-last image `(height, width, channels)`.
pub fn check_image_shape(input_shape: &[usize]) -> Result<()> {
    if input_shape.len() != 3 {
        shape_err!("expected an input of shape (height, width, channels), got {:?}", input_shape);
    }
    Ok(())
}

/// Offsets and sizes of a channels-last batch of images.
#[derive(Debug, Clone, Copy)]
pub struct ImageDims {
    /// Number of samples
    pub n: usize,
    /// Height
    pub h: usize,
    /// Width
    pub w: usize,
    /// Channels
    pub c: usize,
}

impl ImageDims {
    /// Read the dimensions of a `(batch, height, width, channels)` shape.
    pub fn of(shape: &[usize]) -> ImageDims {
        ImageDims { n: shape[0], h: shape[1], w: shape[2], c: shape[3] }
    }

    /// Flat index of the first channel of pixel `(n, y, x)`.
    pub fn offset(&self, n: usize, y: usize, x: usize) -> usize {
        ((n * self.h + y) * self.w + x) * self.c
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.n * self.h * self.w * self.c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Window;

    impl FilterStage for Window {
        fn filter_shape(&self) -> &[usize] { &[3] }
        fn stride(&self) -> &[usize] { &[2, 1] }
        fn padding(&self) -> &[usize] { &[] }
    }

    #[test]
    fn broadcasts_single_values() {
        assert_eq!(vec![3, 3], Window.spatial_filter_dims(2).unwrap());
        assert_eq!(vec![2, 1], Window.stride_dims(2).unwrap());
        assert_eq!(vec![0, 0], Window.padding_dims(2).unwrap());
        assert!(Window.stride_dims(3).is_err());
    }

    #[test]
    fn spatial_output_dims() {
        let dims = Window::calculate_spatial_output_dims(&[7, 7], &[3, 3], &[0, 0], &[2, 1]).unwrap();
        assert_eq!(vec![3, 5], dims);
        let padded = Window::calculate_spatial_output_dims(&[64, 64], &[7, 7], &[3, 3], &[1, 1]).unwrap();
        assert_eq!(vec![64, 64], padded);
    }

    #[test]
    fn filter_larger_than_input_fails() {
        let err = Window::calculate_spatial_output_dims(&[2, 2], &[3, 3], &[0, 0], &[1, 1]).unwrap_err();
        assert!(err.is_shape());
    }
}
