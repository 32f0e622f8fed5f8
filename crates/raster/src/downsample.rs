//! Nearest-neighbour downsampling for overview levels.

use crate::types::{map_values, PixelBuffer};

/// Size of a grid after decimation by `factor`, keeping partial edge pixels.
pub fn decimated_size(width: usize, height: usize, factor: usize) -> (usize, usize) {
    (width.div_ceil(factor), height.div_ceil(factor))
}

/// Downsample a row-major grid by `factor` using nearest neighbour.
///
/// Output pixel `(x, y)` is input pixel `(x * factor, y * factor)`, so
/// values (including nodata sentinels) are never blended.
pub fn downsample_nearest<T: Copy>(
    data: &[T],
    width: usize,
    height: usize,
    factor: usize,
) -> (Vec<T>, usize, usize) {
    if factor <= 1 {
        return (data.to_vec(), width, height);
    }

    let (new_width, new_height) = decimated_size(width, height, factor);
    let mut output = Vec::with_capacity(new_width * new_height);

    for out_y in 0..new_height {
        let row = out_y * factor * width;
        for out_x in 0..new_width {
            output.push(data[row + out_x * factor]);
        }
    }

    (output, new_width, new_height)
}

/// [`downsample_nearest`] over any pixel buffer.
pub fn downsample_buffer(
    buffer: &PixelBuffer,
    width: usize,
    height: usize,
    factor: usize,
) -> PixelBuffer {
    map_values!(buffer, values => downsample_nearest(values, width, height, factor).0)
}
