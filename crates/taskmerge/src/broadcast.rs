//! Stacking task tensors and broadcasting per-task weights against them.

use ndarray::{Array1, ArrayD, ArrayViewD, Axis};

use crate::{MergeError, Result};

/// Stack task tensors along a new leading task axis.
///
/// Returns an array of shape `[N, ...S]`. Tensors that do not share one
/// shape fail with [`MergeError::Shape`].
pub fn stack_task_tensors(task_tensors: &[ArrayD<f32>]) -> Result<ArrayD<f32>> {
    if task_tensors.is_empty() {
        return Err(MergeError::NotEnoughModels {
            expected: 1,
            actual: 0,
        });
    }

    let views: Vec<ArrayViewD<'_, f32>> = task_tensors.iter().map(|t| t.view()).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}

/// Reshape `weights` so it broadcasts against `task_tensors`.
///
/// Singleton dimensions are appended until the rank of `weights` equals the
/// rank of `task_tensors`; values are untouched. A weight tensor of higher
/// rank than the reference is rejected.
pub fn reshape_weight_task_tensors(
    task_tensors: &ArrayD<f32>,
    weights: &ArrayD<f32>,
) -> Result<ArrayD<f32>> {
    let target_rank = task_tensors.ndim();
    if weights.ndim() > target_rank {
        return Err(MergeError::InvalidArgument(format!(
            "weights have rank {} but task tensors have rank {}",
            weights.ndim(),
            target_rank
        )));
    }

    let mut shape = weights.shape().to_vec();
    shape.resize(target_rank, 1);
    Ok(weights.to_shape(shape)?.into_owned())
}

/// Multiply each task's slice of a stacked task set by its scalar weight.
pub fn weighted_task_tensors(task_tensors: &ArrayD<f32>, weights: &[f32]) -> Result<ArrayD<f32>> {
    let num_tasks = task_tensors.len_of(Axis(0));
    check_weight_count(num_tasks, weights)?;

    let weights = Array1::from(weights.to_vec()).into_dyn();
    let weights = reshape_weight_task_tensors(task_tensors, &weights)?;
    Ok(task_tensors * &weights)
}

pub(crate) fn check_weight_count(num_tasks: usize, weights: &[f32]) -> Result<()> {
    if weights.len() != num_tasks {
        return Err(MergeError::WeightCountMismatch {
            expected: num_tasks,
            actual: weights.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, IxDyn};

    #[test]
    fn test_stack_task_tensors() {
        let t1 = arr1(&[1.0_f32, 2.0]).into_dyn();
        let t2 = arr1(&[3.0_f32, 4.0]).into_dyn();

        let stacked = stack_task_tensors(&[t1, t2]).unwrap();
        assert_eq!(stacked.shape(), &[2, 2]);
        assert_eq!(stacked, arr2(&[[1.0_f32, 2.0], [3.0, 4.0]]).into_dyn());
    }

    #[test]
    fn test_stack_rejects_empty() {
        let result = stack_task_tensors(&[]);
        assert!(matches!(
            result,
            Err(MergeError::NotEnoughModels {
                expected: 1,
                actual: 0
            })
        ));
    }

    #[test]
    fn test_stack_rejects_mismatched_shapes() {
        let t1 = arr1(&[1.0_f32, 2.0]).into_dyn();
        let t2 = arr1(&[3.0_f32, 4.0, 5.0]).into_dyn();

        let result = stack_task_tensors(&[t1, t2]);
        assert!(matches!(result, Err(MergeError::Shape(_))));
    }

    #[test]
    fn test_reshape_appends_singletons() {
        let stacked = ArrayD::<f32>::zeros(IxDyn(&[3, 4, 5]));
        let weights = arr1(&[0.1_f32, 0.2, 0.3]).into_dyn();

        let reshaped = reshape_weight_task_tensors(&stacked, &weights).unwrap();
        assert_eq!(reshaped.shape(), &[3, 1, 1]);
        let values: Vec<f32> = reshaped.iter().copied().collect();
        assert_eq!(values, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_reshape_same_rank_is_identity() {
        let stacked = ArrayD::<f32>::zeros(IxDyn(&[2, 3]));
        let weights = ArrayD::<f32>::ones(IxDyn(&[2, 3]));

        let reshaped = reshape_weight_task_tensors(&stacked, &weights).unwrap();
        assert_eq!(reshaped, weights);
    }

    #[test]
    fn test_reshape_rejects_higher_rank() {
        let stacked = ArrayD::<f32>::zeros(IxDyn(&[2]));
        let weights = ArrayD::<f32>::ones(IxDyn(&[2, 1]));

        let result = reshape_weight_task_tensors(&stacked, &weights);
        assert!(matches!(result, Err(MergeError::InvalidArgument(_))));
    }

    #[test]
    fn test_weighted_task_tensors() {
        let stacked = arr2(&[[1.0_f32, 2.0], [3.0, 4.0]]).into_dyn();

        let weighted = weighted_task_tensors(&stacked, &[2.0, 0.5]).unwrap();
        assert_eq!(weighted, arr2(&[[2.0_f32, 4.0], [1.5, 2.0]]).into_dyn());
    }

    #[test]
    fn test_weighted_task_tensors_checks_count() {
        let stacked = arr2(&[[1.0_f32, 2.0], [3.0, 4.0]]).into_dyn();

        let result = weighted_task_tensors(&stacked, &[1.0]);
        assert!(matches!(
            result,
            Err(MergeError::WeightCountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }
}
