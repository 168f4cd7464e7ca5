// 该文件是 Kapai （卡牌） 项目的一部分。
// src/detector/preprocess.rs - 帧预处理
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::imageops::{self, FilterType};
use image::RgbaImage;

/// 预处理结果
///
/// 除输入张量外还带着原始尺寸与填充尺寸，
/// 后续把模型坐标映射回原图坐标时需要它们。
pub struct PreprocessedFrame {
  /// NCHW 张量数据，通道值已归一化到 [0, 1]
  pub data: Vec<f32>,
  /// 张量形状 [批次, 通道, 高, 宽]
  pub shape: [usize; 4],
  /// 原始宽度
  pub original_width: u32,
  /// 原始高度
  pub original_height: u32,
  /// 填充后的正方形边长
  pub padded_size: u32,
}

/// 将图像零填充为正方形
///
/// 填充只加在下边和右边，边长为 max(宽, 高)，不拉伸图像本身。
pub fn pad_to_square(image: &RgbaImage) -> RgbaImage {
  let (width, height) = image.dimensions();
  assert!(width > 0 && height > 0, "输入图像尺寸不能为零");

  let max_size = width.max(height);
  if width == height {
    return image.clone();
  }

  // ImageBuffer::new 会将所有像素初始化为零
  let mut padded = RgbaImage::new(max_size, max_size);
  imageops::replace(&mut padded, image, 0, 0);
  padded
}

/// 预处理一帧图像
///
/// 填充为正方形 -> 双线性缩放到模型输入尺寸 -> 除以 255 归一化 ->
/// 添加大小为 1 的批次维度。
pub fn preprocess(image: &RgbaImage, model_width: u32, model_height: u32) -> PreprocessedFrame {
  let (original_width, original_height) = image.dimensions();

  let padded = pad_to_square(image);
  let padded_size = padded.width();

  let resized = imageops::resize(&padded, model_width, model_height, FilterType::Triangle);

  // RGBA -> NCHW，丢弃 alpha 通道
  let plane = (model_width * model_height) as usize;
  let mut data = vec![0f32; 3 * plane];
  let raw = resized.as_raw();
  for idx in 0..plane {
    data[idx] = raw[idx * 4] as f32 / 255.0;
    data[plane + idx] = raw[idx * 4 + 1] as f32 / 255.0;
    data[2 * plane + idx] = raw[idx * 4 + 2] as f32 / 255.0;
  }

  PreprocessedFrame {
    data,
    shape: [1, 3, model_height as usize, model_width as usize],
    original_width,
    original_height,
    padded_size,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgba;

  fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
  }

  #[test]
  fn pad_wide_image_pads_bottom_only() {
    let image = solid(6, 2, 200);
    let padded = pad_to_square(&image);

    assert_eq!(padded.dimensions(), (6, 6));
    // 原图区域保持不变
    for y in 0..2 {
      for x in 0..6 {
        assert_eq!(padded.get_pixel(x, y)[0], 200);
      }
    }
    // 下方填充区域为零
    for y in 2..6 {
      for x in 0..6 {
        assert_eq!(*padded.get_pixel(x, y), Rgba([0, 0, 0, 0]));
      }
    }
  }

  #[test]
  fn pad_tall_image_pads_right_only() {
    let image = solid(2, 5, 90);
    let padded = pad_to_square(&image);

    assert_eq!(padded.dimensions(), (5, 5));
    for y in 0..5 {
      for x in 2..5 {
        assert_eq!(*padded.get_pixel(x, y), Rgba([0, 0, 0, 0]));
      }
      for x in 0..2 {
        assert_eq!(padded.get_pixel(x, y)[0], 90);
      }
    }
  }

  #[test]
  fn pad_square_image_is_identity() {
    let image = solid(4, 4, 10);
    let padded = pad_to_square(&image);
    assert_eq!(padded.dimensions(), (4, 4));
    assert_eq!(padded, image);
  }

  #[test]
  fn preprocess_shape_and_normalization() {
    let image = solid(8, 8, 255);
    let pre = preprocess(&image, 4, 4);

    assert_eq!(pre.shape, [1, 3, 4, 4]);
    assert_eq!(pre.data.len(), 3 * 4 * 4);
    assert_eq!(pre.original_width, 8);
    assert_eq!(pre.original_height, 8);
    assert_eq!(pre.padded_size, 8);

    // 纯白图像的所有通道值都应归一化为 1.0
    for value in &pre.data {
      assert!((value - 1.0).abs() < 1e-6);
    }
  }

  #[test]
  fn preprocess_tracks_padded_size() {
    let image = solid(10, 4, 128);
    let pre = preprocess(&image, 4, 4);

    assert_eq!(pre.padded_size, 10);
    assert_eq!(pre.original_width, 10);
    assert_eq!(pre.original_height, 4);
    // 所有值都在 [0, 1] 内
    for value in &pre.data {
      assert!((0.0..=1.0).contains(value));
    }
  }

  #[test]
  #[should_panic]
  fn preprocess_rejects_empty_input() {
    let image = RgbaImage::new(0, 0);
    let _ = preprocess(&image, 4, 4);
  }
}
