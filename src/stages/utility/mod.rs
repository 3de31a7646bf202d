//! Provides various helpful stages, which don't compute anything on the
//! values flowing through them.
//!
//! These stages only change how the values are interpreted, e.g. turning a
//! stack of feature maps into a vector so a [Dense][1] stage can consume it,
//! but obey all the rules of a [Stage][2].
//!
//! [1]: ../common/dense/index.html
//! [2]: ../../stage/index.html
pub use self::flatten::Flatten;
pub use self::reshape::{Reshape, ReshapeConfig};

pub mod flatten;
pub mod reshape;
