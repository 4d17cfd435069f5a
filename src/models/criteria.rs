//! 检索条件
//!
//! `SearchCriteria` 在任何远程交互之前就已经校验完成，并且不可变。
//! 十种检索模式互斥：模式本身是带数据的枚举，所以"恰好一个模式生效"由类型保证。

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 检索模式标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    DateRange,
    Name,
    DocumentType,
    Municipality,
    Subdivision,
    SectionTownshipRange,
    InstrumentNumber,
    BookPage,
    Microfiche,
    Pre1980Number,
}

/// 表单提交方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStyle {
    /// 直接提交表单（POST），结果页加载较慢
    FormPost,
    /// 点击专用的检索按钮
    ButtonClick,
}

/// 详情页的打开方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailNavigation {
    /// 当前页跳转，完成后后退
    SamePage,
    /// 新标签打开，完成后关闭
    NewTab,
    /// 该模式没有详情页
    None,
}

/// 直接从结果表格单元格读取的额外字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectCells {
    None,
    TypeBookPage,
    TypeInstrument,
}

impl ModeKind {
    pub const ALL: [ModeKind; 10] = [
        ModeKind::DateRange,
        ModeKind::Name,
        ModeKind::DocumentType,
        ModeKind::Municipality,
        ModeKind::Subdivision,
        ModeKind::SectionTownshipRange,
        ModeKind::InstrumentNumber,
        ModeKind::BookPage,
        ModeKind::Microfiche,
        ModeKind::Pre1980Number,
    ];

    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            ModeKind::DateRange => "date_range",
            ModeKind::Name => "name",
            ModeKind::DocumentType => "document_type",
            ModeKind::Municipality => "municipality",
            ModeKind::Subdivision => "subdivision",
            ModeKind::SectionTownshipRange => "section_township_range",
            ModeKind::InstrumentNumber => "instrument_number",
            ModeKind::BookPage => "book_page",
            ModeKind::Microfiche => "microfiche",
            ModeKind::Pre1980Number => "pre1980_number",
        }
    }

    /// 是否需要人机验证
    pub fn requires_challenge(self) -> bool {
        matches!(self, ModeKind::DateRange | ModeKind::InstrumentNumber)
    }

    pub fn submit_style(self) -> SubmitStyle {
        match self {
            ModeKind::DateRange
            | ModeKind::Name
            | ModeKind::DocumentType
            | ModeKind::InstrumentNumber
            | ModeKind::BookPage => SubmitStyle::FormPost,
            ModeKind::Municipality
            | ModeKind::Subdivision
            | ModeKind::SectionTownshipRange
            | ModeKind::Microfiche
            | ModeKind::Pre1980Number => SubmitStyle::ButtonClick,
        }
    }

    pub fn detail_navigation(self) -> DetailNavigation {
        match self {
            ModeKind::Microfiche | ModeKind::Pre1980Number => DetailNavigation::None,
            _ => match self.submit_style() {
                SubmitStyle::FormPost => DetailNavigation::SamePage,
                SubmitStyle::ButtonClick => DetailNavigation::NewTab,
            },
        }
    }

    pub fn direct_cells(self) -> DirectCells {
        match self {
            ModeKind::Microfiche => DirectCells::TypeBookPage,
            ModeKind::Pre1980Number => DirectCells::TypeInstrument,
            _ => DirectCells::None,
        }
    }

    /// 从字符串解析模式（接受 snake_case 或空格 / 连字符分隔）
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace([' ', '-', '/'], "_");
        Self::ALL.into_iter().find(|kind| kind.name() == normalized)
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 日期区间（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// 门户表单使用的日期格式
    pub fn start_text(&self) -> String {
        self.start.format("%m/%d/%Y").to_string()
    }

    pub fn end_text(&self) -> String {
        self.end.format("%m/%d/%Y").to_string()
    }
}

/// 检索模式及其必填字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchMode {
    DateRange {
        range: DateRange,
    },
    Name {
        name: String,
        range: Option<DateRange>,
    },
    DocumentType {
        document_types: Vec<String>,
        range: Option<DateRange>,
    },
    Municipality {
        municipality: String,
    },
    Subdivision {
        subdivision: String,
        lot: Option<String>,
        block: Option<String>,
    },
    SectionTownshipRange {
        section: String,
        township: String,
        range: String,
    },
    InstrumentNumber {
        instrument_number: String,
    },
    BookPage {
        book: String,
        page: String,
    },
    Microfiche {
        microfiche: String,
    },
    Pre1980Number {
        number: String,
    },
}

impl SearchMode {
    pub fn kind(&self) -> ModeKind {
        match self {
            SearchMode::DateRange { .. } => ModeKind::DateRange,
            SearchMode::Name { .. } => ModeKind::Name,
            SearchMode::DocumentType { .. } => ModeKind::DocumentType,
            SearchMode::Municipality { .. } => ModeKind::Municipality,
            SearchMode::Subdivision { .. } => ModeKind::Subdivision,
            SearchMode::SectionTownshipRange { .. } => ModeKind::SectionTownshipRange,
            SearchMode::InstrumentNumber { .. } => ModeKind::InstrumentNumber,
            SearchMode::BookPage { .. } => ModeKind::BookPage,
            SearchMode::Microfiche { .. } => ModeKind::Microfiche,
            SearchMode::Pre1980Number { .. } => ModeKind::Pre1980Number,
        }
    }
}

/// 导出方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    /// 只导出数据，不抓取图片
    #[default]
    DataOnly,
    /// 保存图片，但不在记录中写入链接
    ImagesOnly,
    /// 保存图片并把链接写入记录
    All,
}

impl ExportMode {
    pub fn captures_images(self) -> bool {
        matches!(self, ExportMode::ImagesOnly | ExportMode::All)
    }

    pub fn records_links(self) -> bool {
        self == ExportMode::All
    }
}

/// 已校验的检索条件
///
/// 索引类型和排序方式已经翻译成门户内部代码。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    pub mode: SearchMode,
    /// 门户内部的索引类型代码
    pub index_codes: Vec<String>,
    /// 门户内部的排序表达式
    pub sort_expression: Option<String>,
    pub export_mode: ExportMode,
    /// 只在显式设置时限制处理行数
    pub max_rows: Option<usize>,
}

impl SearchCriteria {
    pub fn kind(&self) -> ModeKind {
        self.mode.kind()
    }
}
