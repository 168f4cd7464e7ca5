// 该文件是 Kapai （卡牌） 项目的一部分。
// src/bin/scan_oneshot.rs - 静态图片扫描
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use kapai::detector::{CardDetector, Detect};
use kapai::extract;
use kapai::input::ImageSource;
use kapai::output::{ImageOutput, OutputWriter, Overlay};

/// Kapai 静态扫描参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径
  #[arg(long, value_name = "FILE")]
  pub model: String,

  /// 输入图片
  #[arg(long, value_name = "IMAGE")]
  pub input: String,

  /// 标注输出图片
  #[arg(long, value_name = "OUTPUT", default_value = "annotated.png")]
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

  /// 显示与裁剪的置信度阈值（百分比）
  #[arg(long, default_value = "50.0", value_name = "PERCENT")]
  pub min_confidence: f32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入图片: {}", args.input);

  let detector = CardDetector::default();
  detector.load_model(&args.model)?;

  let mut source = ImageSource::new(&args.input)?;
  let frame = source.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))??;

  info!("开始推理...");
  let now = std::time::Instant::now();
  let detections = detector.detect_single_image(&frame.image)?;
  info!("推理完成，耗时: {:.2?}", now.elapsed());

  for detection in &detections {
    let [x1, y1] = detection.points[0];
    let [x2, y2] = detection.points[2];
    info!(
      "  - {}: {:.1}% at ({:.0}, {:.0}) - ({:.0}, {:.0})",
      detection.class, detection.confidence, x1, y1, x2, y2
    );
  }

  let overlay = Overlay::from_font_file(&args.font, args.min_confidence)?;
  let mut output = ImageOutput::new(&args.output, overlay);
  output.write_frame(&frame.image, &detections)?;
  info!("标注图片已保存: {}", args.output);

  let cards = extract::extract_cards(&frame.image, &detections, args.min_confidence);
  if cards.is_empty() {
    info!("没有达到阈值的卡牌");
  } else {
    let paths = extract::export_cards(&cards, &args.export_dir)?;
    info!("导出 {} 张卡牌到 {}", paths.len(), args.export_dir.display());
  }

  Ok(())
}
