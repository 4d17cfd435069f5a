//! 结果表格的列映射
//!
//! 每次运行只解析一次。每个角色按"精确 → 前缀 → 子串"的顺序匹配表头，
//! 已被前面角色占用的列不再参与匹配。

use std::collections::HashMap;

/// 文件号列的候选表头
pub const FILE_NUMBER_HEADERS: &[&str] = &["file number", "instrument number", "document number", "instrument"];
/// 文件日期列的候选表头
pub const FILE_DATE_HEADERS: &[&str] = &["file date", "record date", "recording date"];
/// 图片列的候选表头
pub const IMAGE_HEADERS: &[&str] = &["image", "view"];
/// 文档类型列的候选表头
pub const DOCUMENT_TYPE_HEADERS: &[&str] = &["type", "document type", "doc type", "instrument type"];
pub const BOOK_HEADERS: &[&str] = &["book"];
pub const PAGE_HEADERS: &[&str] = &["page"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultGrid {
    /// 规范化后的表头
    pub headers: Vec<String>,
    pub row_count: usize,
    pub file_number: Option<usize>,
    pub file_date: Option<usize>,
    pub image: Option<usize>,
    pub document_type: Option<usize>,
    pub book: Option<usize>,
    pub page: Option<usize>,
}

impl ResultGrid {
    pub fn resolve<S: AsRef<str>>(headers: &[S], row_count: usize) -> Self {
        let headers: Vec<String> = headers.iter().map(|h| normalize(h.as_ref())).collect();
        let mut claimed = Vec::new();
        let mut claim = |candidates: &[&str]| {
            let col = best_match(&headers, candidates, &claimed);
            claimed.extend(col);
            col
        };

        let file_number = claim(FILE_NUMBER_HEADERS);
        let file_date = claim(FILE_DATE_HEADERS);
        let image = claim(IMAGE_HEADERS);
        let document_type = claim(DOCUMENT_TYPE_HEADERS);
        let book = claim(BOOK_HEADERS);
        let page = claim(PAGE_HEADERS);

        Self {
            headers,
            row_count,
            file_number,
            file_date,
            image,
            document_type,
            book,
            page,
        }
    }

    /// 没有图片列时，无论配置如何都不抓取图片
    pub fn images_available(&self) -> bool {
        self.image.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// 表头 → 列号（用于日志）
    pub fn mapping(&self) -> HashMap<&str, usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect()
    }
}

/// 在未占用的列中查找：所有候选的精确匹配优先，其次前缀，最后子串
fn best_match(headers: &[String], candidates: &[&str], claimed: &[usize]) -> Option<usize> {
    let tiers: [fn(&str, &str) -> bool; 3] = [
        |h, c| h == c,
        |h, c| h.starts_with(c) && h[c.len()..].starts_with(' '),
        |h, c| h.contains(c),
    ];
    tiers.iter().find_map(|matches| {
        candidates.iter().find_map(|candidate| {
            headers
                .iter()
                .enumerate()
                .find(|(idx, h)| !claimed.contains(idx) && matches(h, candidate))
                .map(|(idx, _)| idx)
        })
    })
}

/// 规范化表头：合并空白、小写，`#` / `no` / `no.` 统一为 `number`
fn normalize(header: &str) -> String {
    let lowered = header.to_lowercase().replace('#', " # ");
    let mut words: Vec<&str> = Vec::new();
    for word in lowered.split_whitespace() {
        let word = match word {
            "#" | "no" | "no." | "num" | "nbr" => "number",
            other => other,
        };
        if words.last() != Some(&word) {
            words.push(word);
        }
    }
    words.join(" ")
}
