//! Provides the fundamental units of computation for the [Pipeline][1].
//! [1]: ../pipeline/index.html
//!
//! These stages provide different types of operations to the Tensors
//! that flow through them.
//! The operations provided by the stages can be
//! roughly grouped into three categories:
//!
//! * [__Activation__][mod_activation]</br>
//! Activation Stages provide element-wise operations and produce an output
//! of the same size as their input.
//! It can be seen as a synonym to nonlinear [Activation Functions][2].
//!
//! * [__Common__][mod_common]</br>
//! Common Stages can differ in their connectivity and behavior and are
//! typically all stages which are not covered by activation stages.
//! Examples would be fully connected stages, convolutional stages,
//! pooling stages, normalization, etc.
//!
//! * [__Utility__][mod_utility]</br>
//! Utility Stages only restructure the data, e.g. flattening the feature maps
//! of an image before a fully connected stage.
//!
//! All shapes handled by stages are per-sample and channels-last, i.e. an image
//! is described as `(height, width, channels)`. The batch axis is prepended to
//! every Tensor at runtime.
//!
//! For more information about how these stages work together, see the
//! documentation for the general [Stage module][3].
//!
//! [2]: https://en.wikipedia.org/wiki/Activation_function
//! [3]: ../stage/index.html
//!
//! [mod_activation]: ./activation/index.html
//! [mod_common]: ./common/index.html
//! [mod_utility]: ./utility/index.html

#[allow(unused_import_braces)]
pub use self::activation::{
    Activation,
    ActivationKind,
};

#[allow(unused_import_braces)]
pub use self::common::{
    Convolution, ConvolutionConfig,
    Dense, DenseConfig,
    Normalization, NormalizationConfig,
    Padding, PaddingConfig,
    Pooling, PoolingConfig, PoolingMode,
};

#[allow(unused_import_braces)]
pub use self::utility::{
    Flatten,
    Reshape, ReshapeConfig,
};

pub mod activation;
pub mod common;
pub mod utility;
