// 该文件是 Kapai （卡牌） 项目的一部分。
// src/output/overlay.rs - 检测结果叠加层渲染
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detector::BoundingBox;

/// 边框颜色
const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
/// 标签字体大小
const LABEL_FONT_SIZE: f32 = 16.0;

/// 叠加层渲染工具
///
/// 绘制置信度达到显示阈值的检测框及其标签。
#[derive(Clone)]
pub struct Overlay {
  /// 字体
  font: FontArc,
  /// 字体大小
  font_scale: PxScale,
  /// 显示阈值（百分比）
  min_confidence: f32,
}

impl Overlay {
  /// 从字体文件创建叠加层渲染工具
  pub fn from_font_file(font_path: &Path, min_confidence: f32) -> Result<Self> {
    let font_data = std::fs::read(font_path)
      .with_context(|| format!("无法读取字体文件: {}", font_path.display()))?;
    let font = FontArc::try_from_vec(font_data)
      .with_context(|| format!("无法解析字体文件: {}", font_path.display()))?;

    Ok(Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      min_confidence,
    })
  }

  /// 在图像上绘制检测结果
  pub fn draw_detections(&self, image: &mut RgbaImage, detections: &[BoundingBox]) {
    for detection in detections {
      if detection.confidence < self.min_confidence {
        continue;
      }

      // 取左下与右上角点
      let [x1, y1] = detection.points[0];
      let [x2, y2] = detection.points[2];

      let x = x1.max(0.0) as i32;
      let y = y1.max(0.0) as i32;
      let width = (x2 - x1).min(image.width() as f32 - x1) as u32;
      let height = (y2 - y1).min(image.height() as f32 - y1) as u32;

      if width > 0 && height > 0 {
        let rect = Rect::at(x, y).of_size(width, height);
        draw_hollow_rect_mut(image, rect, BOX_COLOR);

        // 绘制第二个边框以增加可见度
        if x > 0 && y > 0 {
          let inner_rect =
            Rect::at(x + 1, y + 1).of_size(width.saturating_sub(2), height.saturating_sub(2));
          draw_hollow_rect_mut(image, inner_rect, BOX_COLOR);
        }
      }

      let label = format!("{} ({:.1}%)", detection.class, detection.confidence);
      let text_y = (y - 20).max(0);

      draw_text_mut(
        image,
        BOX_COLOR,
        x,
        text_y,
        self.font_scale,
        &self.font,
        &label,
      );
    }
  }
}
