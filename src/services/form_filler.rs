//! 检索表单填充 - 业务能力层
//!
//! 每种检索模式一个表单布局，统一通过 `FormFiller::fill()` 填写。
//! 面向用户的选项名称（索引类型、排序方式）通过静态表翻译成门户内部代码，
//! 两类表单的排序表达式并不相同。

use phf::phf_map;
use tracing::debug;

use crate::error::{ConfigError, SessionResult};
use crate::infrastructure::{PortalPage, Scope};
use crate::models::criteria::{ModeKind, SearchCriteria, SearchMode, SubmitStyle};

/// 索引类型名称 → 门户代码
pub static INDEX_TYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "OFFICIAL RECORDS" => "OR",
    "DEEDS" => "DE",
    "MORTGAGES" => "MO",
    "PLATS" => "PL",
    "CONDOMINIUMS" => "CN",
    "MARRIAGE LICENSES" => "ML",
    "LIENS" => "LN",
    "MISCELLANEOUS" => "MS",
};

/// 表单提交类模式的排序方式 → 排序表达式
pub static RECORDS_SORT_ORDERS: phf::Map<&'static str, &'static str> = phf_map! {
    "RECORDING DATE (ASCENDING)" => "RecordDate ASC",
    "RECORDING DATE (DESCENDING)" => "RecordDate DESC",
    "NAME" => "PartyName ASC",
    "INSTRUMENT NUMBER" => "InstrumentNumber ASC",
    "BOOK/PAGE" => "Book ASC, Page ASC",
};

/// 按钮检索类模式（地籍类）的排序方式 → 排序表达式
pub static LEGAL_SORT_ORDERS: phf::Map<&'static str, &'static str> = phf_map! {
    "RECORDING DATE (ASCENDING)" => "rec_date asc",
    "RECORDING DATE (DESCENDING)" => "rec_date desc",
    "INSTRUMENT NUMBER" => "inst_num asc",
    "LEGAL DESCRIPTION" => "legal_desc asc",
};

/// 直接提交检索表单的脚本
pub const SUBMIT_FORM_SCRIPT: &str =
    r#"const form = doc.querySelector("form#searchForm"); form.submit(); return null;"#;

/// 单个模式的表单布局
#[derive(Debug)]
pub struct FormLayout {
    /// 侧边栏标签
    pub tab: &'static str,
    /// 标志性输入框，出现即表示该模式表单已挂载
    pub signature: &'static str,
    /// 结果表格
    pub results_table: &'static str,
    /// 索引类型多选框（没有则忽略索引类型）
    pub index_types: Option<&'static str>,
    pub sort_order: &'static str,
    /// 按钮检索类模式使用的检索按钮
    pub search_button: &'static str,
}

const RECORDS_TABLE: &str = "#tblRecordsResults";
const LEGAL_TABLE: &str = "#tblLegalResults";

const fn records_layout(tab: &'static str, signature: &'static str) -> FormLayout {
    FormLayout {
        tab,
        signature,
        results_table: RECORDS_TABLE,
        index_types: Some("#lstIndexTypes"),
        sort_order: "#ddlSortOrder",
        search_button: "#btnRecordsSearch",
    }
}

const fn legal_layout(tab: &'static str, signature: &'static str) -> FormLayout {
    FormLayout {
        tab,
        signature,
        results_table: LEGAL_TABLE,
        index_types: None,
        sort_order: "#ddlLegalSortOrder",
        search_button: "#btnLegalSearch",
    }
}

static DATE_RANGE: FormLayout = records_layout("#tabDateRange", "#txtStartDate");
static NAME: FormLayout = records_layout("#tabName", "#txtPartyName");
static DOCUMENT_TYPE: FormLayout = records_layout("#tabDocType", "#lstDocTypes");
static INSTRUMENT_NUMBER: FormLayout = records_layout("#tabInstrument", "#txtInstrumentNumber");
static BOOK_PAGE: FormLayout = records_layout("#tabBookPage", "#txtBook");
static MUNICIPALITY: FormLayout = legal_layout("#tabMunicipality", "#ddlMunicipality");
static SUBDIVISION: FormLayout = legal_layout("#tabSubdivision", "#txtSubdivision");
static SECTION_TOWNSHIP_RANGE: FormLayout = legal_layout("#tabSTR", "#txtSection");
static MICROFICHE: FormLayout = legal_layout("#tabMicrofiche", "#txtMicrofiche");
static PRE_1980: FormLayout = legal_layout("#tabPre1980", "#txtPre1980Number");

/// 实际填写的字段（用于日志）
pub type AppliedValues = Vec<(&'static str, String)>;

/// 表单填充能力
#[derive(Debug, Clone, Copy)]
pub struct FormFiller {
    kind: ModeKind,
}

impl FormFiller {
    pub fn for_mode(kind: ModeKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ModeKind {
        self.kind
    }

    pub fn layout(&self) -> &'static FormLayout {
        match self.kind {
            ModeKind::DateRange => &DATE_RANGE,
            ModeKind::Name => &NAME,
            ModeKind::DocumentType => &DOCUMENT_TYPE,
            ModeKind::Municipality => &MUNICIPALITY,
            ModeKind::Subdivision => &SUBDIVISION,
            ModeKind::SectionTownshipRange => &SECTION_TOWNSHIP_RANGE,
            ModeKind::InstrumentNumber => &INSTRUMENT_NUMBER,
            ModeKind::BookPage => &BOOK_PAGE,
            ModeKind::Microfiche => &MICROFICHE,
            ModeKind::Pre1980Number => &PRE_1980,
        }
    }

    fn sort_table(&self) -> &'static phf::Map<&'static str, &'static str> {
        match self.kind.submit_style() {
            SubmitStyle::FormPost => &RECORDS_SORT_ORDERS,
            SubmitStyle::ButtonClick => &LEGAL_SORT_ORDERS,
        }
    }

    /// 把排序方式的显示名称翻译成本模式的排序表达式
    pub fn translate_sort(&self, display: &str) -> Result<&'static str, ConfigError> {
        self.sort_table()
            .get(normalize(display).as_str())
            .copied()
            .ok_or_else(|| ConfigError::InvalidOption {
                field: format!("sort_order ({})", self.kind),
                value: display.to_string(),
            })
    }

    /// 把索引类型名称翻译成门户代码
    pub fn translate_index_type(name: &str) -> Result<&'static str, ConfigError> {
        INDEX_TYPES
            .get(normalize(name).as_str())
            .copied()
            .ok_or_else(|| ConfigError::InvalidOption {
                field: "index_types".to_string(),
                value: name.to_string(),
            })
    }

    /// 填写本模式的表单字段和共享选项
    pub async fn fill(
        &self,
        page: &dyn PortalPage,
        criteria: &SearchCriteria,
    ) -> SessionResult<AppliedValues> {
        let scope = Scope::Main;
        let layout = self.layout();
        let mut applied: AppliedValues = Vec::new();

        let mut text = |selector: &'static str, value: String| {
            applied.push((selector, value));
        };

        match &criteria.mode {
            SearchMode::DateRange { range } => {
                text("#txtStartDate", range.start_text());
                text("#txtEndDate", range.end_text());
            }
            SearchMode::Name { name, range } => {
                text("#txtPartyName", name.clone());
                if let Some(range) = range {
                    text("#txtNameStartDate", range.start_text());
                    text("#txtNameEndDate", range.end_text());
                }
            }
            SearchMode::DocumentType { range, .. } => {
                if let Some(range) = range {
                    text("#txtDocTypeStartDate", range.start_text());
                    text("#txtDocTypeEndDate", range.end_text());
                }
            }
            SearchMode::Municipality { .. } => {}
            SearchMode::Subdivision {
                subdivision,
                lot,
                block,
            } => {
                text("#txtSubdivision", subdivision.clone());
                if let Some(lot) = lot {
                    text("#txtLot", lot.clone());
                }
                if let Some(block) = block {
                    text("#txtBlock", block.clone());
                }
            }
            SearchMode::SectionTownshipRange {
                section,
                township,
                range,
            } => {
                text("#txtSection", section.clone());
                text("#txtTownship", township.clone());
                text("#txtRange", range.clone());
            }
            SearchMode::InstrumentNumber { instrument_number } => {
                text("#txtInstrumentNumber", instrument_number.clone());
            }
            SearchMode::BookPage { book, page } => {
                text("#txtBook", book.clone());
                text("#txtPage", page.clone());
            }
            SearchMode::Microfiche { microfiche } => {
                text("#txtMicrofiche", microfiche.clone());
            }
            SearchMode::Pre1980Number { number } => {
                text("#txtPre1980Number", number.clone());
            }
        }

        for (selector, value) in &applied {
            page.locate(&scope, *selector).fill(value).await?;
        }

        // 单选 / 多选字段
        match &criteria.mode {
            SearchMode::DocumentType { document_types, .. } => {
                page.locate(&scope, "#lstDocTypes")
                    .select_options(document_types)
                    .await?;
                applied.push(("#lstDocTypes", document_types.join(",")));
            }
            SearchMode::Municipality { municipality } => {
                page.locate(&scope, "#ddlMunicipality")
                    .select_options(std::slice::from_ref(municipality))
                    .await?;
                applied.push(("#ddlMunicipality", municipality.clone()));
            }
            _ => {}
        }

        if let Some(index_selector) = layout.index_types {
            if !criteria.index_codes.is_empty() {
                page.locate(&scope, index_selector)
                    .select_options(&criteria.index_codes)
                    .await?;
                applied.push((index_selector, criteria.index_codes.join(",")));
            }
        } else if !criteria.index_codes.is_empty() {
            debug!("检索模式 {} 没有索引类型选项，忽略", self.kind);
        }

        if let Some(sort) = &criteria.sort_expression {
            page.locate(&scope, layout.sort_order)
                .select_options(std::slice::from_ref(sort))
                .await?;
            applied.push((layout.sort_order, sort.clone()));
        }

        Ok(applied)
    }

    /// 提交表单：表单提交类模式直接 POST，其余点击检索按钮
    pub async fn submit(&self, page: &dyn PortalPage) -> SessionResult<()> {
        match self.kind.submit_style() {
            SubmitStyle::FormPost => {
                page.evaluate(&Scope::Main, SUBMIT_FORM_SCRIPT).await?;
            }
            SubmitStyle::ButtonClick => {
                page.locate(&Scope::Main, self.layout().search_button)
                    .click()
                    .await?;
            }
        }
        Ok(())
    }
}

fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}
