//! Image preprocessing for the tagger model families.
//!
//! Both families take NHWC float tensors `[batch, size, size, 3]`:
//! - waifu-diffusion: alpha composited on white, padded to a white square,
//!   BGR channel order, values left in `0..=255`
//! - DeepDanbooru: aspect-preserving resize padded with black, RGB channel
//!   order, values scaled to `0..=1`

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use ndarray::Array4;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Composite any alpha channel onto a white background.
pub fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let mut background =
        RgbaImage::from_pixel(rgba.width(), rgba.height(), Rgba([255, 255, 255, 255]));
    imageops::overlay(&mut background, &rgba, 0, 0);
    DynamicImage::ImageRgba8(background).to_rgb8()
}

/// Pad an image to a centered square with the given fill color.
pub fn pad_to_square(image: &RgbImage, fill: Rgb<u8>) -> RgbImage {
    let (w, h) = image.dimensions();
    let side = w.max(h);
    if w == h {
        return image.clone();
    }
    let mut square = RgbImage::from_pixel(side, side, fill);
    imageops::replace(
        &mut square,
        image,
        ((side - w) / 2) as i64,
        ((side - h) / 2) as i64,
    );
    square
}

/// Waifu-diffusion input tensor `[1, size, size, 3]` in BGR order.
pub fn waifu_tensor(image: &DynamicImage, size: u32) -> Array4<f32> {
    let square = pad_to_square(&flatten_alpha(image), WHITE);
    let resized = if square.width() == size {
        square
    } else {
        imageops::resize(&square, size, size, FilterType::CatmullRom)
    };
    to_nhwc(&resized, true, 1.0)
}

/// DeepDanbooru input tensor `[1, size, size, 3]` in RGB order, scaled to `0..=1`.
pub fn danbooru_tensor(image: &DynamicImage, size: u32) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let (w, h) = rgb.dimensions();
    let scale = size as f32 / w.max(h).max(1) as f32;
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, size);
    let resized = imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(size, size, BLACK);
    imageops::replace(
        &mut canvas,
        &resized,
        ((size - new_w) / 2) as i64,
        ((size - new_h) / 2) as i64,
    );
    to_nhwc(&canvas, false, 1.0 / 255.0)
}

fn to_nhwc(image: &RgbImage, bgr: bool, scale: f32) -> Array4<f32> {
    let (w, h) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, h as usize, w as usize, 3));
    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let channels = if bgr { [b, g, r] } else { [r, g, b] };
        for (c, value) in channels.into_iter().enumerate() {
            tensor[[0, y as usize, x as usize, c]] = value as f32 * scale;
        }
    }
    tensor
}
