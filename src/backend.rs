//! Array backends and host/device transfer helpers.
//!
//! The estimation engine is generic over a `burn` [`Backend`]. Data tensors are
//! uploaded once per fit; only the parameter vector goes up and the objective
//! and gradient come back down on each likelihood evaluation.

use burn::prelude::*;
use burn::tensor::ElementConversion;
use ndarray::{Array1, ArrayBase, Data, Dimension};

use crate::errors::{MixedLogitError, Result};

/// Double precision CPU backend used by default.
pub type HostBackend = burn::backend::NdArray<f64>;

/// GPU backend (single precision). Pair with
/// [`NumericGuards::single_precision`](crate::config::NumericGuards::single_precision).
#[cfg(feature = "wgpu")]
pub type AcceleratorBackend = burn::backend::Wgpu;

/// Copies an `ndarray` array of any dimensionality into a rank-`D` tensor on `device`.
///
/// The caller picks `D`; it must equal `arr.ndim()`.
pub fn array_to_tensor<B, S, I, const D: usize>(
    arr: &ArrayBase<S, I>,
    device: &B::Device,
) -> Tensor<B, D>
where
    B: Backend,
    S: Data<Elem = f64>,
    I: Dimension,
{
    debug_assert_eq!(arr.ndim(), D);
    let data: Vec<B::FloatElem> = arr.iter().map(|&v| B::FloatElem::from_elem(v)).collect();
    let td = TensorData::new(data, arr.shape().to_vec());
    Tensor::<B, D>::from_data(td, device)
}

/// Integer index tensor for `select`.
pub fn index_tensor<B: Backend>(indices: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let data: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
    let td = TensorData::new(data, [indices.len()]).convert::<B::IntElem>();
    Tensor::<B, 1, Int>::from_data(td, device)
}

/// Downloads a tensor into a flat host vector (row-major).
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f64>> {
    tensor
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| MixedLogitError::Backend(format!("{e:?}")))
}

/// Downloads a rank-1 tensor into an `ndarray` vector.
pub fn tensor_to_array1<B: Backend>(tensor: Tensor<B, 1>) -> Result<Array1<f64>> {
    Ok(Array1::from(tensor_to_vec(tensor)?))
}

/// Downloads a single-element tensor.
pub fn tensor_to_scalar<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> f64 {
    tensor.into_scalar().elem::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array3};

    type B = HostBackend;

    #[test]
    fn test_round_trip_preserves_layout() {
        let device = Default::default();
        let arr = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| (i * 100 + j * 10 + k) as f64);
        let t: Tensor<B, 3> = array_to_tensor(&arr, &device);
        assert_eq!(t.dims(), [2, 3, 4]);
        let flat = tensor_to_vec(t).unwrap();
        assert_eq!(flat, arr.iter().copied().collect::<Vec<_>>());
    }

    #[test]
    fn test_transposed_view_is_copied_in_logical_order() {
        let device = Default::default();
        let arr = ndarray::array![[1.0, 2.0], [3.0, 4.0]];
        let t: Tensor<B, 2> = array_to_tensor(&arr.t(), &device);
        assert_eq!(tensor_to_vec(t).unwrap(), vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_select_with_index_tensor() {
        let device = Default::default();
        let t: Tensor<B, 1> = array_to_tensor(&arr1(&[10.0, 20.0, 30.0]), &device);
        let picked = t.select(0, index_tensor::<B>(&[2, 0], &device));
        assert_eq!(tensor_to_array1(picked).unwrap(), arr1(&[30.0, 10.0]));
    }

    #[test]
    fn test_scalar_download() {
        let device = Default::default();
        let t = Tensor::<B, 1>::from_floats([1.5, 2.5], &device).sum();
        assert_eq!(tensor_to_scalar(t), 4.0);
    }
}
