use chrono::NaiveDate;

/// 同一行（或同一行中某个文件夹）按查看器顺序截取的页面图像
///
/// 捕获完成后立即合成为一个产物并丢弃，不在内存中保留。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentImageSet {
    /// 行号（从 1 开始）
    pub row: usize,
    /// 文件夹序号（从 1 开始），直接查看器为 `None`
    pub folder: Option<usize>,
    /// 页面截图，按查看器顺序
    pub pages: Vec<Vec<u8>>,
}

impl DocumentImageSet {
    pub fn new(row: usize, folder: Option<usize>) -> Self {
        Self {
            row,
            folder,
            pages: Vec::new(),
        }
    }

    pub fn push(&mut self, page: Vec<u8>) {
        self.pages.push(page);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// 产物键：`<运行日期>/row_<行号>[_<文档标识>][/folder_<n>]`
    ///
    /// 行号保证同一次运行内唯一，文档标识只用于辨认。
    pub fn artifact_key(&self, run_date: NaiveDate, document_id: &str) -> String {
        let mut key = format!("{}/row_{:04}", run_date.format("%Y-%m-%d"), self.row);
        let id = sanitize(document_id);
        if !id.is_empty() {
            key.push('_');
            key.push_str(&id);
        }
        if let Some(folder) = self.folder {
            key.push_str(&format!("/folder_{:02}", folder));
        }
        key
    }
}

/// 只保留字母数字、连字符和下划线
fn sanitize(id: &str) -> String {
    id.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
