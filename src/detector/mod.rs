// 该文件是 Kapai （卡牌） 项目的一部分。
// src/detector/mod.rs - 卡牌检测器
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod decode;
pub mod nms;
pub mod preprocess;

use std::sync::Mutex;

use image::RgbaImage;
use once_cell::sync::OnceCell;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use thiserror::Error;
use tracing::{debug, info};

pub use preprocess::{PreprocessedFrame, pad_to_square, preprocess};

/// 模型输入宽度
pub const MODEL_INPUT_WIDTH: u32 = 640;
/// 模型输入高度
pub const MODEL_INPUT_HEIGHT: u32 = 640;
/// 候选框分数阈值
pub const SCORE_THRESHOLD: f32 = 0.1;
/// NMS IOU 阈值
pub const IOU_THRESHOLD: f32 = 0.1;
/// 最大检测数量
pub const MAX_DETECTIONS: usize = 100;
/// 卡牌类别名称
pub const CARD_CLASS: &str = "pokemon_card";

/// 检测结果边界框
#[derive(Debug, Clone)]
pub struct BoundingBox {
  /// 四个角点，按 左下、右下、右上、左上 顺序（原图像素坐标）
  pub points: [[f32; 2]; 4],
  /// 置信度（百分比，0 - 100）
  pub confidence: f32,
  /// 类别名称
  pub class: String,
  /// 原始类别索引
  pub label: u32,
}

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("模型尚未加载")]
  ModelNotReady,
  #[error("无法加载模型 {path}: {source}")]
  ModelLoad { path: String, source: ort::Error },
  #[error("推理失败: {0}")]
  Inference(#[from] ort::Error),
  #[error("模型输出无效: {0}")]
  InvalidOutput(String),
}

/// 检测接口
pub trait Detect {
  /// 对单张图像执行一次检测
  fn detect_single_image(&self, image: &RgbaImage) -> Result<Vec<BoundingBox>, DetectorError>;
}

struct LoadedModel {
  session: Session,
  input_name: String,
  output_name: String,
}

/// 卡牌检测器
///
/// 模型会在第一次 `load_model` 成功后写入，此后只读。
/// 并发调用 `load_model` 时只有一次真正的加载，
/// 其余调用共享同一结果；加载失败后可以重试。
pub struct CardDetector {
  /// 已加载的模型（至多初始化一次）
  model: OnceCell<Mutex<LoadedModel>>,
  /// 候选框分数阈值
  score_threshold: f32,
  /// NMS IOU 阈值
  iou_threshold: f32,
  /// 最大检测数量
  max_detections: usize,
  /// 类别数量
  num_classes: usize,
}

impl Default for CardDetector {
  fn default() -> Self {
    Self::new(SCORE_THRESHOLD, IOU_THRESHOLD)
  }
}

impl CardDetector {
  /// 创建一个新的卡牌检测器
  pub fn new(score_threshold: f32, iou_threshold: f32) -> Self {
    Self {
      model: OnceCell::new(),
      score_threshold,
      iou_threshold,
      max_detections: MAX_DETECTIONS,
      num_classes: 1,
    }
  }

  /// 设置类别数量
  pub fn with_num_classes(mut self, num_classes: usize) -> Self {
    self.num_classes = num_classes;
    self
  }

  /// 加载模型
  ///
  /// 幂等：已加载时直接返回；加载失败时不保留半初始化状态，
  /// 后续调用会重新加载。
  pub fn load_model(&self, path: &str) -> Result<(), DetectorError> {
    self
      .model
      .get_or_try_init(|| {
        info!("加载模型文件: {}", path);

        let load_err = |e: ort::Error| DetectorError::ModelLoad {
          path: path.to_string(),
          source: e,
        };

        let session = Session::builder()
          .map_err(load_err)?
          .with_optimization_level(GraphOptimizationLevel::Level3)
          .map_err(load_err)?
          .with_intra_threads(2)
          .map_err(load_err)?
          .commit_from_file(path)
          .map_err(load_err)?;

        let input_name = session
          .inputs
          .first()
          .map(|i| i.name.clone())
          .ok_or_else(|| DetectorError::InvalidOutput("模型没有输入张量".to_string()))?;
        let output_name = session
          .outputs
          .first()
          .map(|o| o.name.clone())
          .ok_or_else(|| DetectorError::InvalidOutput("模型没有输出张量".to_string()))?;

        debug!("模型输入: {}, 模型输出: {}", input_name, output_name);
        info!("模型加载完成");

        Ok(Mutex::new(LoadedModel {
          session,
          input_name,
          output_name,
        }))
      })
      .map(|_| ())
  }

  /// 模型是否已加载
  pub fn is_model_loaded(&self) -> bool {
    self.model.get().is_some()
  }
}

impl Detect for CardDetector {
  fn detect_single_image(&self, image: &RgbaImage) -> Result<Vec<BoundingBox>, DetectorError> {
    let model = self.model.get().ok_or(DetectorError::ModelNotReady)?;

    let mut pre = preprocess(image, MODEL_INPUT_WIDTH, MODEL_INPUT_HEIGHT);
    debug!(
      "预处理完成: 原始 {}x{}, 填充 {}x{}",
      pre.original_width, pre.original_height, pre.padded_size, pre.padded_size
    );

    let mut guard = model.lock().unwrap();
    let loaded = &mut *guard;

    let input_data = std::mem::take(&mut pre.data);
    let tensor = Tensor::from_array((pre.shape, input_data.into_boxed_slice()))?;
    let inputs = ort::inputs![loaded.input_name.as_str() => tensor];

    debug!("执行模型推理");
    let outputs = loaded.session.run(inputs)?;
    let (shape, data) = outputs[loaded.output_name.as_str()].try_extract_tensor::<f32>()?;

    let pred = decode::squeeze_batch(shape, data, self.num_classes)?;
    let (boxes, scores, classes) = decode::decode_candidates(&pred);
    let keep = nms::non_max_suppression(
      &boxes,
      &scores,
      self.max_detections,
      self.iou_threshold,
      self.score_threshold,
    );
    let result = decode::to_original_space(&keep, &boxes, &scores, &classes, &pre);

    debug!("检测到 {} 个卡牌候选框", result.len());
    Ok(result)
  }
}
