// 该文件是 Kapai （卡牌） 项目的一部分。
// src/output/image_output.rs - 图片输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::{Context, Result};
use image::RgbaImage;

use super::{OutputWriter, Overlay};
use crate::detector::BoundingBox;

/// 图片输出
///
/// 每帧覆盖写同一个文件，文件内容始终是最近渲染的一帧。
pub struct ImageOutput {
  /// 输出路径
  output_path: String,
  /// 叠加层渲染工具
  overlay: Overlay,
}

impl ImageOutput {
  /// 创建一个新的图片输出
  pub fn new(output_path: &str, overlay: Overlay) -> Self {
    Self {
      output_path: output_path.to_string(),
      overlay,
    }
  }
}

impl OutputWriter for ImageOutput {
  fn write_frame(&mut self, image: &RgbaImage, detections: &[BoundingBox]) -> Result<()> {
    let mut output_image = image.clone();
    self.overlay.draw_detections(&mut output_image, detections);

    output_image
      .save(&self.output_path)
      .with_context(|| format!("无法保存图片: {}", self.output_path))?;

    Ok(())
  }

  fn finish(&mut self) -> Result<()> {
    Ok(())
  }
}
