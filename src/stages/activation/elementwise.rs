//! Applies an [ActivationKind][1] to every element of the input.
//! [1]: ../enum.ActivationKind.html
use crate::context::Phase;
use crate::error::Result;
use crate::stage::*;
use crate::tensor::Tensor;
use crate::weight::Weight;
use super::ActivationKind;

#[derive(Debug, Clone, Copy)]
/// Activation Stage
pub struct Activation {
    kind: ActivationKind,
}

impl Activation {
    /// Create an Activation stage for the given function.
    pub fn new(kind: ActivationKind) -> Activation {
        Activation { kind: kind }
    }
}

impl IStage for Activation {
    fn calculate_output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        Ok(input_shape.to_owned())
    }
}

impl ComputeOutput for Activation {
    fn compute_output(&self, _weights: &[Weight], input: &Tensor, _phase: Phase) -> Result<Tensor> {
        let kind = self.kind;
        Ok(input.map(|x| kind.apply(x)))
    }
}

impl ComputeInputGradient for Activation {
    fn compute_input_gradient(&self,
                              _weights: &[Weight],
                              _input: &Tensor,
                              output: &Tensor,
                              output_gradient: &Tensor) -> Result<Tensor> {
        let gradient = output.data().iter().zip(output_gradient.data())
            .map(|(&y, &dy)| dy * self.kind.derivative_from_output(y))
            .collect();
        Tensor::new(output.shape(), gradient)
    }
}

impl ComputeParametersGradient for Activation {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_forward() {
        let stage = Activation::new(ActivationKind::Sigmoid);
        let input = Tensor::new(&[1, 3], vec![1f32, 1f32, 2f32]).unwrap();
        let output = stage.compute_output(&[], &input, Phase::Test).unwrap();
        let expected = [0.7310586f32, 0.7310586f32, 0.880797f32];
        for (o, e) in output.data().iter().zip(&expected) {
            assert!((o - e).abs() < 1e-6);
        }
    }

    #[test]
    fn relu_backward_masks_gradient() {
        let stage = Activation::new(ActivationKind::ReLU);
        let input = Tensor::new(&[1, 4], vec![-1f32, 2., -3., 4.]).unwrap();
        let output = stage.compute_output(&[], &input, Phase::Train).unwrap();
        let gradient = Tensor::new(&[1, 4], vec![1f32; 4]).unwrap();
        let input_gradient = stage.compute_input_gradient(&[], &input, &output, &gradient).unwrap();
        assert_eq!(&[0f32, 1., 0., 1.], input_gradient.data());
    }
}
