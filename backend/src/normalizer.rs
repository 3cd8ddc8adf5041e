use image::imageops::{self, FilterType};
use ndarray::{Array4, ArrayView4};
use serde::Deserialize;

use crate::acquisition::DecodedImage;

/// Channel order a classifier was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Axis order the model runtime expects. Tensors are always built NHWC and
/// permuted at the runtime boundary when the model wants NCHW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    ChannelsLast,
    ChannelsFirst,
}

/// Declared input contract of a classifier: spatial size, channel order,
/// tensor layout and whether pixel values are rescaled into [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct InputSpec {
    pub height: u32,
    pub width: u32,
    #[serde(default = "default_channel_order")]
    pub channel_order: ChannelOrder,
    #[serde(default = "default_scale")]
    pub scale: bool,
    #[serde(default = "default_layout")]
    pub layout: TensorLayout,
}

fn default_layout() -> TensorLayout {
    TensorLayout::ChannelsLast
}

fn default_channel_order() -> ChannelOrder {
    ChannelOrder::Bgr
}

fn default_scale() -> bool {
    true
}

impl InputSpec {
    pub fn square(size: u32, channel_order: ChannelOrder) -> Self {
        Self {
            height: size,
            width: size,
            channel_order,
            scale: true,
            layout: TensorLayout::ChannelsLast,
        }
    }

    /// NHWC shape a tensor must have to be fed to this classifier.
    pub fn tensor_shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, 3]
    }
}

/// Batch-of-one NHWC tensor ready for inference.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    data: Array4<f32>,
}

impl NormalizedTensor {
    pub fn shape(&self) -> [usize; 4] {
        let dims = self.data.dim();
        [dims.0, dims.1, dims.2, dims.3]
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Values in logical (row-major NHWC) order.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}

/// Resizes with bilinear filtering, reorders channels and optionally divides
/// by 255. Deterministic for identical input.
pub fn normalize(image: &DecodedImage, spec: &InputSpec) -> NormalizedTensor {
    let resized = imageops::resize(image.as_rgb(), spec.width, spec.height, FilterType::Triangle);
    let [n, h, w, c] = spec.tensor_shape();
    let mut data = Array4::<f32>::zeros((n, h, w, c));

    for (x, y, pixel) in resized.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let ordered = match spec.channel_order {
            ChannelOrder::Rgb => [r, g, b],
            ChannelOrder::Bgr => [b, g, r],
        };
        for (channel, value) in ordered.into_iter().enumerate() {
            let value = f32::from(value);
            data[[0, y as usize, x as usize, channel]] = if spec.scale { value / 255.0 } else { value };
        }
    }

    debug_assert_eq!(data.dim(), (n, h, w, c));
    NormalizedTensor { data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DecodedImage {
        DecodedImage::from_rgb(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn output_matches_declared_shape() {
        let spec = InputSpec::square(224, ChannelOrder::Bgr);
        let tensor = normalize(&gradient(640, 480), &spec);
        assert_eq!(tensor.shape(), [1, 224, 224, 3]);

        let spec = InputSpec::square(150, ChannelOrder::Rgb);
        assert_eq!(normalize(&gradient(20, 90), &spec).shape(), [1, 150, 150, 3]);
    }

    #[test]
    fn normalizing_twice_is_bit_identical() {
        let image = gradient(300, 200);
        let spec = InputSpec::square(150, ChannelOrder::Bgr);
        let first = normalize(&image, &spec).to_vec();
        let second = normalize(&image, &spec).to_vec();
        assert_eq!(
            first.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            second.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn scaled_values_stay_in_unit_range() {
        let image = DecodedImage::from_rgb(RgbImage::from_pixel(10, 10, Rgb([255, 0, 128])));
        let tensor = normalize(&image, &InputSpec::square(4, ChannelOrder::Rgb));
        assert!(tensor.to_vec().iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(tensor.view()[[0, 0, 0, 0]], 1.0);
        assert_eq!(tensor.view()[[0, 0, 0, 1]], 0.0);
    }

    #[test]
    fn bgr_order_swaps_red_and_blue() {
        let image = DecodedImage::from_rgb(RgbImage::from_pixel(8, 8, Rgb([255, 0, 0])));
        let bgr = normalize(&image, &InputSpec::square(8, ChannelOrder::Bgr));
        assert_eq!(bgr.view()[[0, 3, 3, 0]], 0.0);
        assert_eq!(bgr.view()[[0, 3, 3, 2]], 1.0);
    }

    #[test]
    fn layout_defaults_to_channels_last() {
        let spec: InputSpec = serde_yaml::from_str("height: 224\nwidth: 224\n").unwrap();
        assert_eq!(spec.layout, TensorLayout::ChannelsLast);
        assert_eq!(spec.channel_order, ChannelOrder::Bgr);

        let spec: InputSpec =
            serde_yaml::from_str("height: 150\nwidth: 150\nlayout: channels_first\n").unwrap();
        assert_eq!(spec.layout, TensorLayout::ChannelsFirst);
        assert!(serde_yaml::from_str::<InputSpec>("height: 1\nwidth: 1\nlayout: nchw\n").is_err());
    }

    #[test]
    fn unscaled_keeps_raw_values() {
        let image = DecodedImage::from_rgb(RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])));
        let mut spec = InputSpec::square(8, ChannelOrder::Rgb);
        spec.scale = false;
        let tensor = normalize(&image, &spec);
        assert_eq!(tensor.view()[[0, 0, 0, 2]], 30.0);
    }
}
