// 该文件是 Kapai （卡牌） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Parser;
use url::Url;

/// Kapai 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径
  #[arg(long, value_name = "FILE", default_value = "models/cards.onnx")]
  pub model: String,

  /// 输入来源（V4L2 设备路径或图片文件）
  /// 支持格式:
  /// - V4L2: /dev/video0 或 v4l2:///dev/video0
  /// - 图片: *.jpg, *.jpeg, *.png, *.bmp, *.gif, *.webp
  #[arg(long, value_name = "SOURCE", default_value = "/dev/video0")]
  pub input: String,

  /// 叠加层输出（图片文件路径或记录目录）
  #[arg(long, value_name = "OUTPUT", default_value = "overlay.png")]
  pub output: String,

  /// 卡牌导出目录
  #[arg(long, value_name = "DIR", default_value = "cards")]
  pub export_dir: PathBuf,

  /// 标签字体文件路径
  #[arg(
    long,
    value_name = "FILE",
    default_value = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
  )]
  pub font: PathBuf,

  /// 识别服务地址
  #[arg(long, value_name = "URL")]
  pub identify_url: Option<Url>,

  /// 候选框分数阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.1", value_name = "THRESHOLD")]
  pub score_threshold: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.1", value_name = "THRESHOLD")]
  pub iou_threshold: f32,

  /// 显示与裁剪的置信度阈值（百分比）
  #[arg(long, default_value = "50.0", value_name = "PERCENT")]
  pub min_confidence: f32,

  /// 模型类别数量
  #[arg(long, default_value = "1", value_name = "COUNT")]
  pub num_classes: usize,

  /// 摄像头目标宽度
  #[arg(long, default_value = "1920", value_name = "PIXELS")]
  pub capture_width: u32,

  /// 摄像头目标高度
  #[arg(long, default_value = "1920", value_name = "PIXELS")]
  pub capture_height: u32,

  /// 最大处理帧数（0 表示无限制）
  #[arg(long, default_value = "0", value_name = "COUNT")]
  pub max_frames: u64,
}
