// 该文件是 Kapai （卡牌） 项目的一部分。
// src/scanner.rs - 扫描循环状态机
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

use anyhow::Result;
use tracing::{debug, info};

use crate::detector::Detect;
use crate::extract::{ExtractedCard, extract_cards, selected_or_all};
use crate::input::Frame;
use crate::output::OutputWriter;

/// 扫描状态
///
/// 预览 -(快门)-> 处理 -(自动)-> 已处理 -(快门)-> 预览。
/// 处理中的快门输入被忽略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
  /// 预览：镜像摄像头画面，不做推理
  Preview,
  /// 处理：对一帧执行检测
  Processing,
  /// 已处理：冻结在检测结果上
  Processed,
}

/// 扫描循环状态机
///
/// 每个到达的帧驱动一次 `tick`，按当前状态分派到对应的处理函数。
pub struct Scanner<'a, D: Detect> {
  /// 检测器
  detector: &'a D,
  /// 当前状态
  state: ScanState,
  /// 显示与裁剪的置信度阈值（百分比）
  min_confidence: f32,
  /// 最近一次处理裁剪出的卡牌
  cards: Vec<ExtractedCard>,
}

impl<'a, D: Detect> Scanner<'a, D> {
  /// 创建一个新的扫描器，初始状态为预览
  pub fn new(detector: &'a D, min_confidence: f32) -> Self {
    Self {
      detector,
      state: ScanState::Preview,
      min_confidence,
      cards: Vec::new(),
    }
  }

  /// 当前状态
  pub fn state(&self) -> ScanState {
    self.state
  }

  /// 最近一次处理裁剪出的卡牌
  pub fn cards(&self) -> &[ExtractedCard] {
    &self.cards
  }

  /// 快门输入
  pub fn tap(&mut self) {
    match self.state {
      ScanState::Preview => {
        info!("快门按下，下一帧开始处理");
        self.state = ScanState::Processing;
      }
      ScanState::Processing => {
        debug!("正在处理，忽略快门输入");
      }
      ScanState::Processed => {
        info!("回到预览");
        self.cards.clear();
        self.state = ScanState::Preview;
      }
    }
  }

  /// 切换卡牌选中状态
  ///
  /// 返回切换后的状态；索引越界时返回 None。
  pub fn toggle_selection(&mut self, index: usize) -> Option<bool> {
    let card = self.cards.get_mut(index)?;
    card.selected = !card.selected;
    Some(card.selected)
  }

  /// 选中的卡牌；没有选中时返回全部
  pub fn selected_or_all(&self) -> Vec<(usize, &ExtractedCard)> {
    selected_or_all(&self.cards)
  }

  /// 处理一帧
  pub fn tick<O: OutputWriter + ?Sized>(&mut self, frame: &Frame, output: &mut O) -> Result<()> {
    match self.state {
      ScanState::Preview => self.tick_preview(frame, output),
      ScanState::Processing => self.tick_processing(frame, output),
      // 冻结在最后渲染的一帧上
      ScanState::Processed => Ok(()),
    }
  }

  fn tick_preview<O: OutputWriter + ?Sized>(&mut self, frame: &Frame, output: &mut O) -> Result<()> {
    output.write_frame(&frame.image, &[])
  }

  fn tick_processing<O: OutputWriter + ?Sized>(
    &mut self,
    frame: &Frame,
    output: &mut O,
  ) -> Result<()> {
    info!("处理第 {} 帧 (时间: {}ms)", frame.index, frame.timestamp_ms);

    let now = std::time::Instant::now();
    let detections = self.detector.detect_single_image(&frame.image)?;
    info!(
      "推理完成，耗时: {:.2?}，共 {} 个候选框",
      now.elapsed(),
      detections.len()
    );

    self.cards = extract_cards(&frame.image, &detections, self.min_confidence);
    info!("裁剪出 {} 张卡牌", self.cards.len());

    output.write_frame(&frame.image, &detections)?;

    self.state = ScanState::Processed;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detector::{BoundingBox, DetectorError};
  use image::{Rgba, RgbaImage};

  struct StubDetector {
    detections: Vec<BoundingBox>,
    fail: bool,
  }

  impl Detect for StubDetector {
    fn detect_single_image(&self, _image: &RgbaImage) -> Result<Vec<BoundingBox>, DetectorError> {
      if self.fail {
        Err(DetectorError::ModelNotReady)
      } else {
        Ok(self.detections.clone())
      }
    }
  }

  #[derive(Default)]
  struct RecordingOutput {
    /// 每次写入时的检测框数量
    writes: Vec<usize>,
  }

  impl OutputWriter for RecordingOutput {
    fn write_frame(&mut self, _image: &RgbaImage, detections: &[BoundingBox]) -> Result<()> {
      self.writes.push(detections.len());
      Ok(())
    }

    fn finish(&mut self) -> Result<()> {
      Ok(())
    }
  }

  fn bbox(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> BoundingBox {
    BoundingBox {
      points: [[x1, y1], [x2, y1], [x2, y2], [x1, y2]],
      confidence,
      class: "pokemon_card".to_string(),
      label: 0,
    }
  }

  fn frame() -> Frame {
    Frame {
      image: RgbaImage::from_pixel(100, 100, Rgba([7, 7, 7, 255])),
      index: 0,
      timestamp_ms: 0,
    }
  }

  #[test]
  fn starts_in_preview_and_mirrors_frames() {
    let detector = StubDetector {
      detections: vec![],
      fail: false,
    };
    let mut output = RecordingOutput::default();
    let mut scanner = Scanner::new(&detector, 50.0);

    assert_eq!(scanner.state(), ScanState::Preview);
    scanner.tick(&frame(), &mut output).unwrap();
    scanner.tick(&frame(), &mut output).unwrap();

    // 预览状态每帧镜像一次，不带检测框
    assert_eq!(output.writes, vec![0, 0]);
    assert_eq!(scanner.state(), ScanState::Preview);
  }

  #[test]
  fn tap_processes_one_frame_then_freezes() {
    let detector = StubDetector {
      detections: vec![bbox(10.0, 10.0, 40.0, 60.0, 92.0), bbox(50.0, 50.0, 70.0, 90.0, 30.0)],
      fail: false,
    };
    let mut output = RecordingOutput::default();
    let mut scanner = Scanner::new(&detector, 50.0);

    scanner.tap();
    assert_eq!(scanner.state(), ScanState::Processing);

    scanner.tick(&frame(), &mut output).unwrap();
    assert_eq!(scanner.state(), ScanState::Processed);
    // 叠加层收到全部候选框，裁剪只保留达到阈值的
    assert_eq!(output.writes, vec![2]);
    assert_eq!(scanner.cards().len(), 1);

    // 已处理状态不再渲染
    scanner.tick(&frame(), &mut output).unwrap();
    assert_eq!(output.writes, vec![2]);
  }

  #[test]
  fn tap_during_processing_is_ignored() {
    let detector = StubDetector {
      detections: vec![],
      fail: false,
    };
    let mut scanner = Scanner::new(&detector, 50.0);

    scanner.tap();
    assert_eq!(scanner.state(), ScanState::Processing);
    scanner.tap();
    assert_eq!(scanner.state(), ScanState::Processing);
  }

  #[test]
  fn tap_after_processing_returns_to_preview() {
    let detector = StubDetector {
      detections: vec![bbox(10.0, 10.0, 40.0, 60.0, 92.0)],
      fail: false,
    };
    let mut output = RecordingOutput::default();
    let mut scanner = Scanner::new(&detector, 50.0);

    scanner.tap();
    scanner.tick(&frame(), &mut output).unwrap();
    assert_eq!(scanner.state(), ScanState::Processed);
    assert_eq!(scanner.cards().len(), 1);

    scanner.tap();
    assert_eq!(scanner.state(), ScanState::Preview);
    assert!(scanner.cards().is_empty());
  }

  #[test]
  fn detection_error_propagates() {
    let detector = StubDetector {
      detections: vec![],
      fail: true,
    };
    let mut output = RecordingOutput::default();
    let mut scanner = Scanner::new(&detector, 50.0);

    scanner.tap();
    assert!(scanner.tick(&frame(), &mut output).is_err());
    // 错误不产生自动状态转换
    assert_eq!(scanner.state(), ScanState::Processing);
  }

  #[test]
  fn selection_toggles_and_falls_back_to_all() {
    let detector = StubDetector {
      detections: vec![
        bbox(0.0, 0.0, 10.0, 10.0, 90.0),
        bbox(20.0, 20.0, 40.0, 50.0, 80.0),
      ],
      fail: false,
    };
    let mut output = RecordingOutput::default();
    let mut scanner = Scanner::new(&detector, 50.0);

    scanner.tap();
    scanner.tick(&frame(), &mut output).unwrap();
    assert_eq!(scanner.cards().len(), 2);

    // 没有选中时返回全部
    assert_eq!(scanner.selected_or_all().len(), 2);

    assert_eq!(scanner.toggle_selection(1), Some(true));
    let picked = scanner.selected_or_all();
    assert_eq!(picked.len(), 1);
    assert_eq!(picked[0].0, 1);

    assert_eq!(scanner.toggle_selection(1), Some(false));
    assert_eq!(scanner.selected_or_all().len(), 2);

    assert_eq!(scanner.toggle_selection(9), None);
  }
}
