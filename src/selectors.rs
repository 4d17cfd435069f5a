//! 门户页面的选择器
//!
//! 各检索模式自己的表单选择器放在 `services::form_filler` 中。

/// 落地页与入口
pub mod landing {
    /// 使用条款"同意"按钮
    pub const ACCEPT_TERMS: &str = "#btnAcceptTerms";
    /// 进入检索区域的入口
    pub const SEARCH_ENTRY: &str = "#lnkSearchRecords";
    /// 检索区域加载完成的标志（侧边栏）
    pub const SIDEBAR: &str = "#searchSidebar";
}

/// 提交后的结果提示
pub mod outcome {
    /// 验证码错误提示
    pub const INCORRECT_VERIFICATION: &str = "#lblCaptchaError";
    /// 结果数量超过上限提示
    pub const RESULT_LIMIT: &str = "#lblResultLimit";
}

/// 人机验证
pub mod captcha {
    /// 显式提示的验证码图片，按优先级排列
    pub const IMAGE_HINTS: &[&str] = &[
        "img#imgCaptcha",
        "img.captcha-image",
        "img[alt*='captcha' i]",
        "img[id*='captcha' i]",
        "img[src*='captcha' i]",
    ];
    /// 显式提示的验证码输入框，按优先级排列
    pub const INPUT_HINTS: &[&str] = &[
        "input#txtCaptcha",
        "input[name*='captcha' i]",
        "input[id*='captcha' i]",
        "input[placeholder*='code' i]",
    ];
    /// 通用启发式找到图片后打上的标记
    pub const HEURISTIC_IMAGE: &str = "img[data-captcha-candidate='1']";
    /// 通用启发式找到输入框后打上的标记
    pub const HEURISTIC_INPUT: &str = "input[data-captcha-input='1']";
}

/// 结果表格
pub mod grid {
    pub fn header_cells(table: &str) -> String {
        format!("{} thead th", table)
    }

    pub fn rows(table: &str) -> String {
        format!("{} tbody tr", table)
    }

    /// 第 `row` 行（从 1 开始）
    pub fn row(table: &str, row: usize) -> String {
        format!("{} tbody tr:nth-of-type({})", table, row)
    }

    /// 第 `row` 行第 `col` 列（列号从 0 开始）
    pub fn cell(table: &str, row: usize, col: usize) -> String {
        format!("{} > td:nth-of-type({})", self::row(table, row), col + 1)
    }

    pub fn detail_link(table: &str, row: usize) -> String {
        format!("{} a.detail-link", self::row(table, row))
    }

    /// 图片列中的触发元素
    pub fn image_trigger(table: &str, row: usize, image_col: usize) -> String {
        format!("{} a", cell(table, row, image_col))
    }
}

/// 详情页
pub mod detail {
    /// 详情区域加载完成的标志
    pub const CONTAINER: &str = "#documentDetail";
    pub const ROWS: &str = "#documentDetail .detail-row";

    pub fn label(row: usize) -> String {
        format!("{} .detail-label", self::row(row))
    }

    pub fn value(row: usize) -> String {
        format!("{} .detail-value", self::row(row))
    }

    fn row(row: usize) -> String {
        format!("{}:nth-of-type({})", ROWS, row)
    }
}

/// 文档查看器
pub mod viewer {
    /// 直接查看器中的页面图像
    pub const PAGE_IMAGE: &str = "#viewerPageImage";
    /// 翻页按钮
    pub const NEXT_PAGE: &str = "#btnNextPage";
    /// 翻页按钮的禁用状态
    pub const NEXT_DISABLED: &str = "#btnNextPage.disabled, #btnNextPage[disabled]";
    /// 页码提示，如 "Page 2 of 5"
    pub const PAGE_INDICATOR: &str = "#lblPageNumber";
    /// 中间的文件夹选择列表
    pub const FOLDER_ROWS: &str = "#folderList tr.folder-row";
    /// 从文件夹查看器返回列表
    pub const BACK_TO_FOLDERS: &str = "#btnBackToFolders";
}
