//! Grayscale resize, crop, and tensor packing shared by the ONNX models.

use ndarray::Array4;

/// Mapping from a letterboxed model input back to frame pixels.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Map a point in model-input pixels to frame pixels.
    pub fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// A grayscale image owned for preprocessing.
pub(crate) struct Gray {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

/// Bilinear resize of a grayscale buffer.
pub(crate) fn resize_bilinear(
    src: &[u8],
    width: usize,
    height: usize,
    new_w: usize,
    new_h: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; new_w * new_h];
    if width == 0 || height == 0 || new_w == 0 || new_h == 0 {
        return out;
    }
    let sx = width as f32 / new_w as f32;
    let sy = height as f32 / new_h as f32;

    for y in 0..new_h {
        let src_y = (y as f32 + 0.5) * sy - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
        let y1 = (y0 + 1).min(height - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..new_w {
            let src_x = (x as f32 + 0.5) * sx - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
            let x1 = (x0 + 1).min(width - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            let top = src[y0 * width + x0] as f32 * (1.0 - fx) + src[y0 * width + x1] as f32 * fx;
            let bot = src[y1 * width + x0] as f32 * (1.0 - fx) + src[y1 * width + x1] as f32 * fx;
            out[y * new_w + x] = (top * (1.0 - fy) + bot * fy).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Fit a frame into a `size`×`size` square, preserving aspect ratio.
/// Padding is filled with `pad_value`.
pub(crate) fn letterbox_square(
    frame: &[u8],
    width: usize,
    height: usize,
    size: usize,
    pad_value: u8,
) -> (Gray, Letterbox) {
    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as usize).clamp(1, size);
    let new_h = ((height as f32 * scale).round() as usize).clamp(1, size);
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let resized = resize_bilinear(frame, width, height, new_w, new_h);
    let mut data = vec![pad_value; size * size];
    for y in 0..new_h {
        let dst = (y + pad_y) * size + pad_x;
        data[dst..dst + new_w].copy_from_slice(&resized[y * new_w..(y + 1) * new_w]);
    }

    (
        Gray {
            data,
            width: size,
            height: size,
        },
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

/// Crop a rectangle (clamped to the frame) out of a grayscale buffer.
pub(crate) fn crop(
    frame: &[u8],
    width: usize,
    height: usize,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
) -> Option<Gray> {
    let x0 = (x.floor().max(0.0) as usize).min(width);
    let y0 = (y.floor().max(0.0) as usize).min(height);
    let x1 = ((x + w).ceil().max(0.0) as usize).min(width);
    let y1 = ((y + h).ceil().max(0.0) as usize).min(height);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let cw = x1 - x0;
    let ch = y1 - y0;
    let mut data = Vec::with_capacity(cw * ch);
    for row in y0..y1 {
        data.extend_from_slice(&frame[row * width + x0..row * width + x1]);
    }
    Some(Gray {
        data,
        width: cw,
        height: ch,
    })
}

/// Pack grayscale into an NCHW tensor, replicating Y into three channels.
pub(crate) fn to_nchw(gray: &Gray, mean: f32, std: f32) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, gray.height, gray.width));
    for y in 0..gray.height {
        for x in 0..gray.width {
            let v = (gray.data[y * gray.width + x] as f32 - mean) / std;
            tensor[[0, 0, y, x]] = v;
            tensor[[0, 1, y, x]] = v;
            tensor[[0, 2, y, x]] = v;
        }
    }
    tensor
}

/// Pack grayscale into an NHWC tensor, replicating Y into three channels.
pub(crate) fn to_nhwc(gray: &Gray, mean: f32, std: f32) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, gray.height, gray.width, 3));
    for y in 0..gray.height {
        for x in 0..gray.width {
            let v = (gray.data[y * gray.width + x] as f32 - mean) / std;
            for c in 0..3 {
                tensor[[0, y, x, c]] = v;
            }
        }
    }
    tensor
}
