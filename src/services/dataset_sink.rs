//! 数据集推送服务 - 业务能力层
//!
//! 一次推送一整批记录；推送失败由调用方报告，不在这里重试

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SinkError;
use crate::models::record::Record;

/// 结构化数据集输出端
#[async_trait]
pub trait DatasetSink: Send + Sync {
    async fn push(&self, batch: &[Record]) -> Result<(), SinkError>;
}

/// 远程数据集：POST 一个 JSON 数组
pub struct HttpDatasetSink {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpDatasetSink {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token,
        }
    }
}

#[async_trait]
impl DatasetSink for HttpDatasetSink {
    async fn push(&self, batch: &[Record]) -> Result<(), SinkError> {
        let mut request = self.client.post(&self.endpoint).json(batch);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Dataset(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Dataset(format!("HTTP {}: {}", status, body)));
        }

        debug!("已推送 {} 条记录到数据集", batch.len());
        Ok(())
    }
}

/// 本地数据集：每条记录一行 JSON
pub struct JsonlDatasetSink {
    path: PathBuf,
}

impl JsonlDatasetSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DatasetSink for JsonlDatasetSink {
    async fn push(&self, batch: &[Record]) -> Result<(), SinkError> {
        let mut content = String::new();
        for record in batch {
            let line = serde_json::to_string(record).map_err(|e| SinkError::Dataset(e.to_string()))?;
            content.push_str(&line);
            content.push('\n');
        }

        let file_error = |source| SinkError::File {
            path: self.path.display().to_string(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(file_error)?;
        file.write_all(content.as_bytes()).map_err(file_error)?;

        debug!("已写入 {} 条记录到 {}", batch.len(), self.path.display());
        Ok(())
    }
}
