//! 导出缓冲区 - 编排层
//!
//! 累积记录，达到批次大小时自动刷新；运行结束时再无条件刷新一次。
//! 每次刷新都把同一批记录写到两个输出端，一个失败不影响另一个。

use std::sync::Arc;

use tracing::{error, info};

use crate::error::SinkError;
use crate::models::record::Record;
use crate::services::dataset_sink::DatasetSink;
use crate::services::file_sink::FileSink;

/// 默认批次大小
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// 单次刷新的结果
#[derive(Debug)]
pub struct FlushReport {
    pub records: usize,
    pub dataset: Result<(), SinkError>,
    pub file: Result<(), SinkError>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.dataset.is_ok() && self.file.is_ok()
    }
}

/// 导出缓冲区
pub struct ExportBuffer {
    capacity: usize,
    records: Vec<Record>,
    dataset: Arc<dyn DatasetSink>,
    file: Arc<dyn FileSink>,
    flushes: usize,
    sink_failures: usize,
}

impl ExportBuffer {
    pub fn new(capacity: usize, dataset: Arc<dyn DatasetSink>, file: Arc<dyn FileSink>) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Vec::with_capacity(capacity),
            dataset,
            file,
            flushes: 0,
            sink_failures: 0,
        }
    }

    /// 追加一条记录，缓冲区满时自动刷新
    pub async fn append(&mut self, record: Record) -> Option<FlushReport> {
        self.records.push(record);
        if self.records.len() >= self.capacity {
            return self.flush().await;
        }
        None
    }

    /// 把缓冲区中的记录整批写到两个输出端后清空；缓冲区为空时不写
    pub async fn flush(&mut self) -> Option<FlushReport> {
        if self.records.is_empty() {
            return None;
        }
        let batch = std::mem::take(&mut self.records);
        self.flushes += 1;
        info!("📤 第 {} 次刷新: {} 条记录", self.flushes, batch.len());

        let dataset = self.dataset.push(&batch).await;
        if let Err(e) = &dataset {
            error!("❌ 数据集写入失败 ({} 条): {}", batch.len(), e);
            self.sink_failures += 1;
        }

        let file = self.file.append(&batch);
        if let Err(e) = &file {
            error!("❌ 文件写入失败 ({} 条): {}", batch.len(), e);
            self.sink_failures += 1;
        }

        Some(FlushReport {
            records: batch.len(),
            dataset,
            file,
        })
    }

    /// 尚未刷新的记录数
    pub fn pending(&self) -> usize {
        self.records.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 已执行的刷新次数
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// 输出端写入失败的次数
    pub fn sink_failures(&self) -> usize {
        self.sink_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        batches: Mutex<Vec<Vec<Record>>>,
        fail: bool,
    }

    #[async_trait]
    impl DatasetSink for Recorder {
        async fn push(&self, batch: &[Record]) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Dataset("503".into()));
            }
            self.batches.lock().unwrap().push(batch.to_vec());
            Ok(())
        }
    }

    impl FileSink for Recorder {
        fn append(&self, batch: &[Record]) -> Result<(), SinkError> {
            self.batches.lock().unwrap().push(batch.to_vec());
            Ok(())
        }
    }

    fn record(n: usize) -> Record {
        Record {
            document_number: format!("DOC-{}", n),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_auto_flush_at_capacity() {
        let dataset = Arc::new(Recorder::default());
        let file = Arc::new(Recorder::default());
        let mut buffer = ExportBuffer::new(DEFAULT_BATCH_SIZE, dataset.clone(), file.clone());

        for n in 1..=12 {
            buffer.append(record(n)).await;
            assert!(buffer.pending() < DEFAULT_BATCH_SIZE);
        }
        assert_eq!(buffer.flushes(), 1);
        assert_eq!(buffer.pending(), 2);

        let report = buffer.flush().await.unwrap();
        assert_eq!(report.records, 2);
        assert!(report.is_clean());
        assert!(buffer.flush().await.is_none());

        let dataset_batches = dataset.batches.lock().unwrap();
        let file_batches = file.batches.lock().unwrap();
        assert_eq!(*dataset_batches, *file_batches);
        assert_eq!(dataset_batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![10, 2]);
    }

    #[tokio::test]
    async fn test_failed_dataset_does_not_block_file() {
        let dataset = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let file = Arc::new(Recorder::default());
        let mut buffer = ExportBuffer::new(2, dataset, file.clone());

        buffer.append(record(1)).await;
        let report = buffer.append(record(2)).await.unwrap();
        assert!(report.dataset.is_err());
        assert!(report.file.is_ok());
        assert_eq!(buffer.sink_failures(), 1);
        assert_eq!(buffer.pending(), 0);
        assert_eq!(file.batches.lock().unwrap()[0], vec![record(1), record(2)]);
    }
}
