// 该文件是 Kapai （卡牌） 项目的一部分。
// src/upload.rs - 识别服务上传
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::extract::{ExtractError, ExtractedCard, encode_png};

#[derive(Error, Debug)]
pub enum UploadError {
  #[error("上传请求失败: {0}")]
  Network(#[source] reqwest::Error),
  #[error("识别服务返回错误状态 {status}: {body}")]
  Status { status: StatusCode, body: String },
  #[error("识别服务响应不是有效的 JSON: {0}")]
  InvalidJson(#[from] serde_json::Error),
  #[error("卡牌编码失败: {0}")]
  Encode(#[from] ExtractError),
}

/// 表单中一张卡牌对应的两个部分
struct CardPart {
  image_name: String,
  file_name: String,
  confidence_name: String,
  confidence_value: String,
  png: Vec<u8>,
}

/// 组装上传表单的各个部分
///
/// 每张卡牌一个图片部分 `card-{i}` 和一个文本部分 `confidence-{i}`，
/// 序号按上传集合内的位置计，与卡牌在原集合中的索引无关。
fn card_parts(cards: &[(usize, &ExtractedCard)]) -> Result<Vec<CardPart>, UploadError> {
  cards
    .iter()
    .enumerate()
    .map(|(i, (_, card))| {
      Ok(CardPart {
        image_name: format!("card-{}", i),
        file_name: format!("card-{}.png", i),
        confidence_name: format!("confidence-{}", i),
        confidence_value: format!("{}", card.confidence),
        png: encode_png(card)?,
      })
    })
    .collect()
}

/// 远程识别服务客户端
pub struct IdentifyClient {
  endpoint: Url,
  client: Client,
}

impl IdentifyClient {
  /// 创建一个新的识别服务客户端
  pub fn new(endpoint: Url) -> Self {
    Self {
      endpoint,
      client: Client::new(),
    }
  }

  /// 上传卡牌到识别服务
  ///
  /// 响应按原样返回 JSON，不检查内容格式。
  pub fn upload_cards(
    &self,
    cards: &[(usize, &ExtractedCard)],
  ) -> Result<serde_json::Value, UploadError> {
    info!("上传 {} 张卡牌到 {}", cards.len(), self.endpoint);

    let mut form = Form::new();
    for part in card_parts(cards)? {
      let image = Part::bytes(part.png)
        .file_name(part.file_name)
        .mime_str("image/png")
        .map_err(UploadError::Network)?;
      form = form
        .part(part.image_name, image)
        .text(part.confidence_name, part.confidence_value);
    }

    let response = self
      .client
      .post(self.endpoint.clone())
      .multipart(form)
      .send()
      .map_err(UploadError::Network)?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().unwrap_or_default();
      return Err(UploadError::Status { status, body });
    }

    let body = response.text().map_err(UploadError::Network)?;
    debug!("识别服务响应: {}", body);

    Ok(serde_json::from_str(&body)?)
  }
}
