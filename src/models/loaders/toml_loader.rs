//! 运行输入加载
//!
//! 从 TOML 文件读取检索描述，并在任何远程交互之前校验为 `SearchCriteria`。

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tokio::fs;
use tracing::info;

use crate::error::ConfigError;
use crate::models::criteria::{DateRange, ExportMode, ModeKind, SearchCriteria, SearchMode};
use crate::services::form_filler::FormFiller;

/// TOML 中的检索描述（未校验）
///
/// ```toml
/// mode = "date_range"
/// start_date = "2024-01-01"
/// end_date = "2024-01-31"
/// index_types = ["Deeds", "Mortgages"]
/// sort_order = "Recording Date (Ascending)"
/// export_mode = "all"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunInput {
    pub mode: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub name: Option<String>,
    pub document_types: Vec<String>,
    pub municipality: Option<String>,
    pub subdivision: Option<String>,
    pub lot: Option<String>,
    pub block: Option<String>,
    pub section: Option<String>,
    pub township: Option<String>,
    pub range: Option<String>,
    pub instrument_number: Option<String>,
    pub book: Option<String>,
    pub page: Option<String>,
    pub microfiche: Option<String>,
    pub pre1980_number: Option<String>,
    pub index_types: Vec<String>,
    pub sort_order: Option<String>,
    pub export_mode: ExportMode,
    pub max_rows: Option<usize>,
}

impl RunInput {
    pub fn from_toml_str(content: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.to_string(),
            source,
        })
    }

    /// 校验必填字段和选项，翻译成门户内部代码
    pub fn into_criteria(self) -> Result<SearchCriteria, ConfigError> {
        let kind = ModeKind::parse(&self.mode).ok_or_else(|| ConfigError::InvalidOption {
            field: "mode".to_string(),
            value: self.mode.clone(),
        })?;

        let mode = self.build_mode(kind)?;
        let filler = FormFiller::for_mode(kind);

        let index_codes = self
            .index_types
            .iter()
            .map(|name| FormFiller::translate_index_type(name).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;

        let sort_expression = match self.sort_order.as_deref().map(str::trim) {
            Some(display) if !display.is_empty() => Some(filler.translate_sort(display)?.to_string()),
            _ => None,
        };

        if self.max_rows == Some(0) {
            return Err(ConfigError::InvalidOption {
                field: "max_rows".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(SearchCriteria {
            mode,
            index_codes,
            sort_expression,
            export_mode: self.export_mode,
            max_rows: self.max_rows,
        })
    }

    fn build_mode(&self, kind: ModeKind) -> Result<SearchMode, ConfigError> {
        let required = |field: &str, value: &Option<String>| -> Result<String, ConfigError> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ConfigError::MissingField {
                    mode: kind.to_string(),
                    field: field.to_string(),
                })
        };
        let optional = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let mode = match kind {
            ModeKind::DateRange => SearchMode::DateRange {
                range: self.date_range(kind)?.ok_or_else(|| ConfigError::MissingField {
                    mode: kind.to_string(),
                    field: "start_date".to_string(),
                })?,
            },
            ModeKind::Name => SearchMode::Name {
                name: required("name", &self.name)?,
                range: self.date_range(kind)?,
            },
            ModeKind::DocumentType => {
                let document_types: Vec<String> = self
                    .document_types
                    .iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                if document_types.is_empty() {
                    return Err(ConfigError::MissingField {
                        mode: kind.to_string(),
                        field: "document_types".to_string(),
                    });
                }
                SearchMode::DocumentType {
                    document_types,
                    range: self.date_range(kind)?,
                }
            }
            ModeKind::Municipality => SearchMode::Municipality {
                municipality: required("municipality", &self.municipality)?,
            },
            ModeKind::Subdivision => SearchMode::Subdivision {
                subdivision: required("subdivision", &self.subdivision)?,
                lot: optional(&self.lot),
                block: optional(&self.block),
            },
            ModeKind::SectionTownshipRange => SearchMode::SectionTownshipRange {
                section: required("section", &self.section)?,
                township: required("township", &self.township)?,
                range: required("range", &self.range)?,
            },
            ModeKind::InstrumentNumber => SearchMode::InstrumentNumber {
                instrument_number: required("instrument_number", &self.instrument_number)?,
            },
            ModeKind::BookPage => SearchMode::BookPage {
                book: required("book", &self.book)?,
                page: required("page", &self.page)?,
            },
            ModeKind::Microfiche => SearchMode::Microfiche {
                microfiche: required("microfiche", &self.microfiche)?,
            },
            ModeKind::Pre1980Number => SearchMode::Pre1980Number {
                number: required("pre1980_number", &self.pre1980_number)?,
            },
        };
        Ok(mode)
    }

    /// 两个日期都缺失时返回 `None`；只给一个或起止颠倒都是配置错误
    fn date_range(&self, kind: ModeKind) -> Result<Option<DateRange>, ConfigError> {
        let start = self.start_date.as_deref().map(str::trim).filter(|v| !v.is_empty());
        let end = self.end_date.as_deref().map(str::trim).filter(|v| !v.is_empty());
        match (start, end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => {
                let range = DateRange {
                    start: parse_date("start_date", start)?,
                    end: parse_date("end_date", end)?,
                };
                if range.start > range.end {
                    return Err(ConfigError::InvalidOption {
                        field: "start_date".to_string(),
                        value: format!("{} > {}", start, end),
                    });
                }
                Ok(Some(range))
            }
            (None, Some(_)) => Err(ConfigError::MissingField {
                mode: kind.to_string(),
                field: "start_date".to_string(),
            }),
            (Some(_), None) => Err(ConfigError::MissingField {
                mode: kind.to_string(),
                field: "end_date".to_string(),
            }),
        }
    }
}

/// 接受 `YYYY-MM-DD` 或 `MM/DD/YYYY`
fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%m/%d/%Y"))
        .map_err(|_| ConfigError::InvalidOption {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// 从 TOML 文件加载并校验检索条件
pub async fn load_search_criteria(path: &Path) -> Result<SearchCriteria, ConfigError> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::ReadFailed {
            path: display.clone(),
            source,
        })?;

    let criteria = RunInput::from_toml_str(&content, &display)?.into_criteria()?;
    info!(
        "✓ 已加载检索条件: 模式 {}, 导出方式 {:?}",
        criteria.kind(),
        criteria.export_mode
    );
    Ok(criteria)
}
