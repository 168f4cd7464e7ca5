// 该文件是 Kapai （卡牌） 项目的一部分。
// src/extract.rs - 卡牌裁剪与导出
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage, imageops};
use thiserror::Error;
use tracing::debug;

use crate::detector::BoundingBox;

#[derive(Error, Debug)]
pub enum ExtractError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  Image(#[from] image::ImageError),
}

/// 裁剪出的卡牌
#[derive(Debug, Clone)]
pub struct ExtractedCard {
  /// 卡牌图像
  pub image: RgbaImage,
  /// 置信度（百分比）
  pub confidence: f32,
  /// 是否被用户选中
  pub selected: bool,
}

/// 从帧中裁剪检测到的卡牌
///
/// 只保留置信度不低于 `min_confidence` 的检测框；
/// 框取左下与右上角点，裁剪区域裁到图像边界内。
pub fn extract_cards(
  frame: &RgbaImage,
  detections: &[BoundingBox],
  min_confidence: f32,
) -> Vec<ExtractedCard> {
  let mut cards = Vec::new();

  for detection in detections {
    if detection.confidence < min_confidence {
      continue;
    }

    let [x1, y1] = detection.points[0];
    let [x2, y2] = detection.points[2];

    let left = x1.max(0.0).floor() as u32;
    let top = y1.max(0.0).floor() as u32;
    let right = (x2.min(frame.width() as f32).ceil() as u32).min(frame.width());
    let bottom = (y2.min(frame.height() as f32).ceil() as u32).min(frame.height());

    if right <= left || bottom <= top {
      debug!("跳过空裁剪区域: ({}, {}) - ({}, {})", x1, y1, x2, y2);
      continue;
    }

    let image = imageops::crop_imm(frame, left, top, right - left, bottom - top).to_image();

    cards.push(ExtractedCard {
      image,
      confidence: detection.confidence,
      selected: false,
    });
  }

  cards
}

/// 返回选中的卡牌；没有选中时返回全部
///
/// 结果带着卡牌在原集合中的索引，导出文件名使用该索引。
pub fn selected_or_all(cards: &[ExtractedCard]) -> Vec<(usize, &ExtractedCard)> {
  let selected: Vec<(usize, &ExtractedCard)> = cards
    .iter()
    .enumerate()
    .filter(|(_, card)| card.selected)
    .collect();

  if selected.is_empty() {
    cards.iter().enumerate().collect()
  } else {
    selected
  }
}

/// 导出文件名: card-{序号}-{置信度}%.png
pub fn card_file_name(index: usize, confidence: f32) -> String {
  format!("card-{}-{:.1}%.png", index + 1, confidence)
}

/// 将卡牌编码为 PNG 字节
pub fn encode_png(card: &ExtractedCard) -> Result<Vec<u8>, ExtractError> {
  let mut buffer = Cursor::new(Vec::new());
  card.image.write_to(&mut buffer, ImageFormat::Png)?;
  Ok(buffer.into_inner())
}

/// 导出卡牌到目录
///
/// 选中的卡牌优先；没有选中时导出全部。返回写出的文件路径。
pub fn export_cards(cards: &[ExtractedCard], directory: &Path) -> Result<Vec<PathBuf>, ExtractError> {
  std::fs::create_dir_all(directory)?;

  let mut paths = Vec::new();
  for (index, card) in selected_or_all(cards) {
    let path = directory.join(card_file_name(index, card.confidence));
    card.image.save(&path)?;
    debug!("导出卡牌: {}", path.display());
    paths.push(path);
  }

  Ok(paths)
}
