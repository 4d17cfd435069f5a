use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::browser::BrowserMode;
use crate::error::ConfigError;
use crate::utils::retry::RetryPolicy;

/// 各类等待时间
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timings {
    /// 单个元素的等待时间
    pub element_wait: Duration,
    /// 表单提交类模式等待结果表格
    pub results_wait_form: Duration,
    /// 按钮检索类模式等待结果表格
    pub results_wait_direct: Duration,
    /// 提交后检查结果提示前的停顿
    pub outcome_settle: Duration,
    /// 查找查看器 frame 的轮询策略
    pub viewer_poll: RetryPolicy,
    /// 等待页面图像就绪的轮询策略
    pub page_ready_poll: RetryPolicy,
    /// 翻页后等待图像刷新
    pub page_advance_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            element_wait: Duration::from_secs(15),
            results_wait_form: Duration::from_secs(120),
            results_wait_direct: Duration::from_secs(30),
            outcome_settle: Duration::from_millis(1500),
            viewer_poll: RetryPolicy::new(20, Duration::from_secs(1)),
            page_ready_poll: RetryPolicy::new(10, Duration::from_millis(500)),
            page_advance_delay: Duration::from_millis(800),
        }
    }
}

impl Timings {
    /// 所有等待归零（测试用）
    pub fn instant() -> Self {
        Self {
            element_wait: Duration::ZERO,
            results_wait_form: Duration::ZERO,
            results_wait_direct: Duration::ZERO,
            outcome_settle: Duration::ZERO,
            viewer_poll: RetryPolicy::immediate(3),
            page_ready_poll: RetryPolicy::immediate(2),
            page_advance_delay: Duration::ZERO,
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器来源
    pub browser_mode: BrowserMode,
    /// 门户首页
    pub portal_url: String,
    /// 检索条件 TOML 文件
    pub input_file: String,
    /// 分隔文件输出路径
    pub output_csv: String,
    /// 图片产物根目录
    pub image_dir: PathBuf,
    /// 图片产物的公开访问前缀
    pub image_base_url: String,
    // --- 数据集 ---
    /// 未配置时回退为本地 JSON Lines 文件
    pub dataset_endpoint: Option<String>,
    pub dataset_token: Option<String>,
    pub dataset_jsonl: String,
    // --- 验证码服务 ---
    pub solver_endpoint: String,
    pub solver_key: Option<String>,
    // --- 运行参数 ---
    /// 导出批次大小
    pub batch_size: usize,
    /// 整体检索的最大尝试次数
    pub max_search_attempts: u32,
    /// 两次检索尝试之间的间隔
    pub attempt_delay: Duration,
    /// 每处理多少行释放一次残留页面
    pub release_interval: usize,
    /// 输出日志文件
    pub output_log_file: String,
    pub timings: Timings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_mode: BrowserMode::Headless { executable: None },
            portal_url: "https://records.example-county.gov/".to_string(),
            input_file: "search.toml".to_string(),
            output_csv: "records.csv".to_string(),
            image_dir: PathBuf::from("images"),
            image_base_url: "http://localhost:8080/images".to_string(),
            dataset_endpoint: None,
            dataset_token: None,
            dataset_jsonl: "dataset.jsonl".to_string(),
            solver_endpoint: "https://2captcha.com".to_string(),
            solver_key: None,
            batch_size: 10,
            max_search_attempts: 3,
            attempt_delay: Duration::from_secs(5),
            release_interval: 10,
            output_log_file: "output.txt".to_string(),
            timings: Timings::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            browser_mode: browser_mode_from_env(default.browser_mode),
            portal_url: std::env::var("PORTAL_URL").unwrap_or(default.portal_url),
            input_file: std::env::var("INPUT_FILE").unwrap_or(default.input_file),
            output_csv: std::env::var("OUTPUT_CSV").unwrap_or(default.output_csv),
            image_dir: std::env::var("IMAGE_DIR").map(PathBuf::from).unwrap_or(default.image_dir),
            image_base_url: std::env::var("IMAGE_BASE_URL").unwrap_or(default.image_base_url),
            dataset_endpoint: non_empty_var("DATASET_ENDPOINT"),
            dataset_token: non_empty_var("DATASET_TOKEN"),
            dataset_jsonl: std::env::var("DATASET_JSONL").unwrap_or(default.dataset_jsonl),
            solver_endpoint: std::env::var("SOLVER_ENDPOINT").unwrap_or(default.solver_endpoint),
            solver_key: non_empty_var("SOLVER_API_KEY"),
            batch_size: parsed_var("BATCH_SIZE", default.batch_size),
            max_search_attempts: parsed_var("MAX_SEARCH_ATTEMPTS", default.max_search_attempts),
            attempt_delay: Duration::from_secs(parsed_var("ATTEMPT_DELAY_SECS", default.attempt_delay.as_secs())),
            release_interval: parsed_var("RELEASE_INTERVAL", default.release_interval),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            timings: default.timings,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// 解析数值型环境变量，无法解析时警告并使用默认值
fn parsed_var<T: FromStr>(name: &str, default: T) -> T {
    let Ok(raw) = std::env::var(name) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            let err = ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value: raw,
                expected_type: std::any::type_name::<T>().to_string(),
            };
            warn!("⚠️ {}，使用默认值", err);
            default
        }
    }
}

/// `BROWSER_MODE=connect` 时连接 `BROWSER_DEBUG_PORT`，否则启动无头浏览器
fn browser_mode_from_env(default: BrowserMode) -> BrowserMode {
    match std::env::var("BROWSER_MODE").ok().as_deref() {
        Some("connect") => BrowserMode::Connect {
            port: parsed_var("BROWSER_DEBUG_PORT", 9222),
        },
        Some("headless") => BrowserMode::Headless {
            executable: non_empty_var("CHROME_EXECUTABLE").map(PathBuf::from),
        },
        _ => match default {
            BrowserMode::Headless { .. } => BrowserMode::Headless {
                executable: non_empty_var("CHROME_EXECUTABLE").map(PathBuf::from),
            },
            other => other,
        },
    }
}
