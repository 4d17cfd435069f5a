//! 图片产物服务 - 业务能力层
//!
//! - `ImageComposer`：把一组按顺序截取的页面合成为一个产物
//! - `ImageStore`：按层级键保存产物，并给出访问链接

use std::io::{Cursor, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::SinkError;
use crate::models::image_set::DocumentImageSet;

/// 图片合成
pub trait ImageComposer: Send + Sync {
    fn compose(&self, set: &DocumentImageSet) -> std::io::Result<Vec<u8>>;
}

/// 把页面截图按顺序打包为 zip（`page_001.png`, `page_002.png`, ...）
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipComposer;

impl ImageComposer for ZipComposer {
    fn compose(&self, set: &DocumentImageSet) -> std::io::Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        // PNG 本身已压缩
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for (idx, page) in set.pages.iter().enumerate() {
            writer
                .start_file(page_name(idx + 1), options)
                .map_err(std::io::Error::other)?;
            writer.write_all(page)?;
        }

        let cursor = writer.finish().map_err(std::io::Error::other)?;
        Ok(cursor.into_inner())
    }
}

/// 产物内第 `n` 页（从 1 开始）的文件名
pub fn page_name(n: usize) -> String {
    format!("page_{:03}.png", n)
}

/// 图片产物存储
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), SinkError>;

    fn url_for(&self, key: &str) -> String;
}

/// 本地目录存储：`<root>/<key>.zip`，链接为 `<base_url>/<key>.zip`
pub struct LocalImageStore {
    root: PathBuf,
    base_url: String,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in key.split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path.set_extension("zip");
        path
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), SinkError> {
        let path = self.path_for(key);
        let file_error = |source| SinkError::File {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(file_error)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(file_error)?;

        debug!("图片产物已保存: {} ({} 字节)", path.display(), bytes.len());
        Ok(())
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}.zip", self.base_url, key.trim_matches('/'))
    }
}
