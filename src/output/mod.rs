// 该文件是 Kapai （卡牌） 项目的一部分。
// src/output/mod.rs - 输出模块
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod image_output;
mod overlay;
mod session_record;

pub use image_output::ImageOutput;
pub use overlay::Overlay;
pub use session_record::SessionRecord;

use anyhow::Result;
use image::RgbaImage;

use crate::detector::BoundingBox;

/// 叠加层写入器 trait
pub trait OutputWriter {
  /// 写入一帧及其检测结果
  fn write_frame(&mut self, image: &RgbaImage, detections: &[BoundingBox]) -> Result<()>;

  /// 完成写入
  fn finish(&mut self) -> Result<()>;
}

/// 创建叠加层写入器
///
/// 图片扩展名对应覆盖写单个文件，其余路径视为记录目录。
pub fn create_output_writer(output_path: &str, overlay: Overlay) -> Result<Box<dyn OutputWriter>> {
  let lower = output_path.to_lowercase();

  if lower.ends_with(".jpg")
    || lower.ends_with(".jpeg")
    || lower.ends_with(".png")
    || lower.ends_with(".bmp")
  {
    Ok(Box::new(ImageOutput::new(output_path, overlay)))
  } else {
    Ok(Box::new(SessionRecord::new(output_path, overlay, false)))
  }
}
