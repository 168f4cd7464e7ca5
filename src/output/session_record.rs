// 该文件是 Kapai （卡牌） 项目的一部分。
// src/output/session_record.rs - 扫描会话记录
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use image::RgbaImage;

use super::{OutputWriter, Overlay};
use crate::detector::BoundingBox;

/// 扫描会话记录
///
/// 将带标注的帧按日期分目录保存；
/// 默认跳过没有检测结果的帧。
pub struct SessionRecord {
  /// 记录目录
  directory: PathBuf,
  /// 叠加层渲染工具
  overlay: Overlay,
  /// 帧计数器
  frame_counter: u16,
  /// 是否记录空结果帧
  always: bool,
}

impl SessionRecord {
  /// 创建一个新的会话记录
  pub fn new(directory: &str, overlay: Overlay, always: bool) -> Self {
    Self {
      directory: PathBuf::from(directory),
      overlay,
      frame_counter: 0,
      always,
    }
  }

  fn frame_path(&mut self) -> Result<PathBuf> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));

    std::fs::create_dir_all(&directory)
      .with_context(|| format!("无法创建记录目录: {}", directory.display()))?;

    self.frame_counter = self.frame_counter.wrapping_add(1);
    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_counter
    )))
  }
}

impl OutputWriter for SessionRecord {
  fn write_frame(&mut self, image: &RgbaImage, detections: &[BoundingBox]) -> Result<()> {
    if !self.always && detections.is_empty() {
      return Ok(());
    }

    let path = self.frame_path()?;

    let mut output_image = image.clone();
    self.overlay.draw_detections(&mut output_image, detections);
    output_image
      .save(&path)
      .with_context(|| format!("无法保存记录帧: {}", path.display()))?;

    Ok(())
  }

  fn finish(&mut self) -> Result<()> {
    Ok(())
  }
}
