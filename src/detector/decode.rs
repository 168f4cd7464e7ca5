// 该文件是 Kapai （卡牌） 项目的一部分。
// src/detector/decode.rs - 预测张量解码
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use super::{
  BoundingBox, CARD_CLASS, DetectorError, MODEL_INPUT_HEIGHT, MODEL_INPUT_WIDTH, PreprocessedFrame,
};

/// 去掉批次维度后的原始预测张量
///
/// 行布局为 [cx, cy, w, h, 目标分数, 类别分数...]，
/// 每行包含 `anchors` 个候选位置。
pub(crate) struct RawPrediction<'a> {
  pub data: &'a [f32],
  pub rows: usize,
  pub anchors: usize,
}

/// 校验输出形状并去掉大小为 1 的批次维度
pub(crate) fn squeeze_batch<'a>(
  shape: &[i64],
  data: &'a [f32],
  num_classes: usize,
) -> Result<RawPrediction<'a>, DetectorError> {
  let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();

  let (rows, anchors) = match dims.as_slice() {
    [1, rows, anchors] => (*rows, *anchors),
    [rows, anchors] => (*rows, *anchors),
    other => {
      return Err(DetectorError::InvalidOutput(format!(
        "预测张量维度不符合预期: {:?}",
        other
      )));
    }
  };

  let expected_rows = 4 + 1 + num_classes;
  if rows != expected_rows {
    return Err(DetectorError::InvalidOutput(format!(
      "预测张量行数应为 {}, 实际为 {}",
      expected_rows, rows
    )));
  }

  if data.len() < rows * anchors {
    return Err(DetectorError::InvalidOutput(format!(
      "预测张量数据不足: 期望 {} 个值, 实际 {} 个",
      rows * anchors,
      data.len()
    )));
  }

  Ok(RawPrediction {
    data,
    rows,
    anchors,
  })
}

/// 解码候选框
///
/// 前 4 行是中心点形式 (cx, cy, w, h)，转换为 [y1, x1, y2, x2] 角点形式；
/// 第 5 行是目标分数；其余行按候选位置取类别 argmax。
pub(crate) fn decode_candidates(pred: &RawPrediction) -> (Vec<[f32; 4]>, Vec<f32>, Vec<u32>) {
  let n = pred.anchors;
  let num_classes = pred.rows - 5;
  let data = pred.data;

  let mut boxes = Vec::with_capacity(n);
  let mut scores = Vec::with_capacity(n);
  let mut classes = Vec::with_capacity(n);

  for i in 0..n {
    let cx = data[i];
    let cy = data[n + i];
    let w = data[2 * n + i];
    let h = data[3 * n + i];

    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    let x2 = x1 + w;
    let y2 = y1 + h;
    boxes.push([y1, x1, y2, x2]);

    scores.push(data[4 * n + i]);

    let mut best_class = 0usize;
    let mut best_score = f32::MIN;
    for c in 0..num_classes {
      let class_score = data[(5 + c) * n + i];
      if class_score > best_score {
        best_score = class_score;
        best_class = c;
      }
    }
    classes.push(best_class as u32);
  }

  (boxes, scores, classes)
}

/// 将保留的模型空间坐标映射回原图像素空间
///
/// 缩放系数的分母是填充后的正方形边长，两轴都化简为
/// 模型坐标 × 填充边长 / 模型输入尺寸。
pub(crate) fn to_original_space(
  keep: &[usize],
  boxes: &[[f32; 4]],
  scores: &[f32],
  classes: &[u32],
  pre: &PreprocessedFrame,
) -> Vec<BoundingBox> {
  let original_width = pre.original_width as f32;
  let original_height = pre.original_height as f32;
  let scale_x = original_width / pre.padded_size as f32;
  let scale_y = original_height / pre.padded_size as f32;
  let model_width = MODEL_INPUT_WIDTH as f32;
  let model_height = MODEL_INPUT_HEIGHT as f32;

  keep
    .iter()
    .map(|&i| {
      let [y1, x1, y2, x2] = boxes[i];

      let orig_x1 = x1 * original_width / model_width / scale_x;
      let orig_y1 = y1 * original_height / model_height / scale_y;
      let orig_x2 = x2 * original_width / model_width / scale_x;
      let orig_y2 = y2 * original_height / model_height / scale_y;

      BoundingBox {
        points: [
          [orig_x1, orig_y1], // 左下
          [orig_x2, orig_y1], // 右下
          [orig_x2, orig_y2], // 右上
          [orig_x1, orig_y2], // 左上
        ],
        confidence: scores[i] * 100.0,
        class: CARD_CLASS.to_string(),
        label: classes[i],
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn frame_1920x1080() -> PreprocessedFrame {
    PreprocessedFrame {
      data: Vec::new(),
      shape: [1, 3, 640, 640],
      original_width: 1920,
      original_height: 1080,
      padded_size: 1920,
    }
  }

  #[test]
  fn squeeze_batch_drops_leading_batch_dimension() {
    let data = vec![0.0f32; 6 * 3];
    let pred = squeeze_batch(&[1, 6, 3], &data, 1).unwrap();
    assert_eq!(pred.rows, 6);
    assert_eq!(pred.anchors, 3);

    let pred = squeeze_batch(&[6, 3], &data, 1).unwrap();
    assert_eq!(pred.rows, 6);
    assert_eq!(pred.anchors, 3);
  }

  #[test]
  fn squeeze_batch_rejects_wrong_row_count() {
    let data = vec![0.0f32; 7 * 3];
    assert!(squeeze_batch(&[1, 7, 3], &data, 1).is_err());
  }

  #[test]
  fn squeeze_batch_rejects_short_data() {
    let data = vec![0.0f32; 5];
    assert!(squeeze_batch(&[1, 6, 3], &data, 1).is_err());
  }

  #[test]
  fn decode_converts_center_form_to_corners() {
    // 单类别、两个候选位置，按行布局 [cx, cy, w, h, 分数, 类别0]
    let data = [
      100.0, 200.0, // cx
      100.0, 200.0, // cy
      40.0, 60.0, // w
      20.0, 30.0, // h
      0.9, 0.3, // 分数
      1.0, 1.0, // 类别 0
    ];
    let pred = RawPrediction {
      data: &data,
      rows: 6,
      anchors: 2,
    };

    let (boxes, scores, classes) = decode_candidates(&pred);
    assert_eq!(boxes.len(), 2);
    // [y1, x1, y2, x2]
    assert_eq!(boxes[0], [90.0, 80.0, 110.0, 120.0]);
    assert_eq!(boxes[1], [185.0, 170.0, 215.0, 230.0]);
    assert_eq!(scores, vec![0.9, 0.3]);
    assert_eq!(classes, vec![0, 0]);
  }

  #[test]
  fn decode_takes_class_argmax() {
    // 三个类别，一个候选位置
    let data = [
      10.0, // cx
      10.0, // cy
      4.0,  // w
      4.0,  // h
      0.8,  // 分数
      0.1,  // 类别 0
      0.7,  // 类别 1
      0.2,  // 类别 2
    ];
    let pred = RawPrediction {
      data: &data,
      rows: 8,
      anchors: 1,
    };

    let (_, _, classes) = decode_candidates(&pred);
    assert_eq!(classes, vec![1]);
  }

  #[test]
  fn full_model_square_maps_to_padded_square() {
    let pre = frame_1920x1080();
    let boxes = [[0.0, 0.0, 640.0, 640.0]];
    let result = to_original_space(&[0], &boxes, &[0.5], &[0], &pre);

    let bbox = &result[0];
    assert!((bbox.points[0][0]).abs() < 1e-3);
    assert!((bbox.points[0][1]).abs() < 1e-3);
    // 整个模型正方形对应的是填充后的正方形，而不是原图
    assert!((bbox.points[2][0] - 1920.0).abs() < 1e-3);
    assert!((bbox.points[2][1] - 1920.0).abs() < 1e-3);
  }

  #[test]
  fn content_region_maps_to_original_dimensions() {
    let pre = frame_1920x1080();
    // 原图内容在模型空间中占据 (0,0)-(640, 640*1080/1920)
    let content_y = 640.0 * 1080.0 / 1920.0;
    let boxes = [[0.0, 0.0, content_y, 640.0]];
    let result = to_original_space(&[0], &boxes, &[0.5], &[0], &pre);

    let bbox = &result[0];
    assert!((bbox.points[2][0] - 1920.0).abs() < 1e-3);
    assert!((bbox.points[2][1] - 1080.0).abs() < 1e-3);
  }

  #[test]
  fn scenario_1920x1080_score_092() {
    let pre = frame_1920x1080();
    // 模型空间角点 (100,100)-(300,400)，分数 0.92
    let boxes = [[100.0, 100.0, 400.0, 300.0]];
    let result = to_original_space(&[0], &boxes, &[0.92], &[0], &pre);

    let bbox = &result[0];
    assert!((bbox.confidence - 92.0).abs() < 1e-4);
    assert_eq!(bbox.class, CARD_CLASS);
    // 两轴的系数都是 padded/640 = 3
    assert!((bbox.points[0][0] - 300.0).abs() < 1e-3); // 左下 x
    assert!((bbox.points[0][1] - 300.0).abs() < 1e-3); // 左下 y
    assert!((bbox.points[1][0] - 900.0).abs() < 1e-3); // 右下 x
    assert!((bbox.points[2][1] - 1200.0).abs() < 1e-3); // 右上 y
  }

  #[test]
  fn corner_points_are_ordered() {
    let pre = frame_1920x1080();
    let boxes = [[30.0, 10.0, 90.0, 50.0]];
    let result = to_original_space(&[0], &boxes, &[0.6], &[2], &pre);

    let bbox = &result[0];
    let [bl, br, tr, tl] = bbox.points;
    // 左下、右下共享 y1；右下、右上共享 x2；左上、左下共享 x1
    assert_eq!(bl[1], br[1]);
    assert_eq!(br[0], tr[0]);
    assert_eq!(tl[0], bl[0]);
    assert_eq!(bbox.label, 2);
  }
}
