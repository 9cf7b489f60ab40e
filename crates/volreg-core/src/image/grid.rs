use burn::tensor::{Tensor, TensorData, Shape};
use burn::tensor::backend::Backend;

/// Generate a grid of continuous indices for the given image shape.
///
/// `shape` is in tensor order. Returns `[N, D]` with one row per voxel in
/// tensor (row-major) order, each row ordered `(x, y, z)`.
pub fn generate_grid<B, const D: usize>(
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, 2>
where
    B: Backend,
{
    let total: usize = shape.iter().product();
    let mut grid = Vec::with_capacity(total * D);
    let mut counter = [0usize; D];

    for _ in 0..total {
        for d in (0..D).rev() {
            grid.push(counter[d] as f32);
        }
        for d in (0..D).rev() {
            counter[d] += 1;
            if counter[d] < shape[d] {
                break;
            }
            counter[d] = 0;
        }
    }

    Tensor::<B, 1>::from_data(TensorData::new(grid, Shape::new([total * D])), device)
        .reshape([total, D])
}
