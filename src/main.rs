// 该文件是 Kapai （卡牌） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use kapai::detector::CardDetector;
use kapai::extract;
use kapai::input::create_input_source;
use kapai::output::{Overlay, create_output_writer};
use kapai::scanner::{ScanState, Scanner};
#[cfg(feature = "identify_upload")]
use kapai::upload::IdentifyClient;

/// 用户命令
enum Command {
  /// 快门
  Tap,
  /// 切换卡牌选中状态（从 0 开始的索引）
  Toggle(usize),
  /// 导出卡牌到目录
  Export,
  /// 上传卡牌到识别服务
  Upload,
}

/// 解析标准输入的一行命令
///
/// 空行是快门，数字切换对应卡牌（从 1 开始），
/// s 导出，u 上传。
fn parse_command(line: &str) -> Option<Command> {
  let trimmed = line.trim();
  match trimmed {
    "" | "t" => Some(Command::Tap),
    "s" | "save" => Some(Command::Export),
    "u" | "upload" => Some(Command::Upload),
    _ => trimmed
      .parse::<usize>()
      .ok()
      .filter(|&n| n > 0)
      .map(|n| Command::Toggle(n - 1)),
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("叠加层输出: {}", args.output);
  info!("分数阈值: {}", args.score_threshold);
  info!("NMS 阈值: {}", args.iou_threshold);

  let detector =
    CardDetector::new(args.score_threshold, args.iou_threshold).with_num_classes(args.num_classes);

  info!("正在加载模型...");
  detector.load_model(&args.model)?;

  let mut input = create_input_source(&args.input, args.capture_width, args.capture_height)?;
  info!(
    "输入源已打开: {}x{} {}",
    input.width(),
    input.height(),
    match input.source_type() {
      kapai::input::InputSourceType::Image => "图片",
      kapai::input::InputSourceType::V4l2 => "V4L2 摄像头",
    }
  );

  let overlay = Overlay::from_font_file(&args.font, args.min_confidence)?;
  let mut output = create_output_writer(&args.output, overlay)?;

  #[cfg(feature = "identify_upload")]
  let identify = args.identify_url.clone().map(IdentifyClient::new);

  // 用户命令来自标准输入，每行一个
  let (command_tx, command_rx) = mpsc::channel();
  thread::spawn(move || {
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
      line.clear();
      match stdin.read_line(&mut line) {
        Ok(0) | Err(_) => break,
        Ok(_) => {
          if let Some(command) = parse_command(&line) {
            if command_tx.send(command).is_err() {
              break;
            }
          } else {
            warn!("无法识别的命令: {}", line.trim());
          }
        }
      }
    }
  });

  let running = Arc::new(AtomicBool::new(true));
  {
    let running = running.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");
  }

  let mut scanner = Scanner::new(&detector, args.min_confidence);

  info!("开始扫描（回车快门，数字切换选中，s 导出，u 上传，Ctrl-C 退出）");

  let mut frame_count = 0u64;
  // 每帧一次迭代；下一次迭代严格在上一次完整结束后开始
  while running.load(Ordering::SeqCst) {
    let Some(frame) = input.next() else {
      info!("输入源结束");
      break;
    };
    let frame = frame?;

    if args.max_frames > 0 && frame_count >= args.max_frames {
      info!("已达到最大帧数限制: {}", args.max_frames);
      break;
    }

    while let Ok(command) = command_rx.try_recv() {
      match command {
        Command::Tap => scanner.tap(),
        Command::Toggle(index) => match scanner.toggle_selection(index) {
          Some(true) => info!("卡牌 {} 已选中", index + 1),
          Some(false) => info!("卡牌 {} 取消选中", index + 1),
          None => warn!("没有第 {} 张卡牌", index + 1),
        },
        Command::Export => {
          if scanner.state() != ScanState::Processed || scanner.cards().is_empty() {
            warn!("当前没有可导出的卡牌");
          } else {
            match extract::export_cards(scanner.cards(), &args.export_dir) {
              Ok(paths) => info!("导出 {} 张卡牌到 {}", paths.len(), args.export_dir.display()),
              Err(e) => error!("导出失败: {}", e),
            }
          }
        }
        Command::Upload => {
          #[cfg(feature = "identify_upload")]
          match identify.as_ref() {
            Some(client) => {
              let cards = scanner.selected_or_all();
              if cards.is_empty() {
                warn!("没有可上传的卡牌");
              } else {
                // 上传失败不影响后续扫描
                match client.upload_cards(&cards) {
                  Ok(response) => info!(
                    "识别服务响应:\n{}",
                    serde_json::to_string_pretty(&response).unwrap_or_else(|_| response.to_string())
                  ),
                  Err(e) => error!("上传失败: {}", e),
                }
              }
            }
            None => warn!("未配置识别服务地址（--identify-url）"),
          }

          #[cfg(not(feature = "identify_upload"))]
          warn!("未启用识别上传支持（identify_upload）");
        }
      }
    }

    scanner.tick(&frame, output.as_mut())?;
    frame_count += 1;
  }

  output.finish()?;
  info!("扫描结束，共处理 {} 帧", frame_count);

  Ok(())
}
