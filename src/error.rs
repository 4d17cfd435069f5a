use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器 / 会话相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] SessionError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 检索阶段错误
    #[error("检索错误: {0}")]
    Search(#[from] SearchError),
    /// 单行提取错误
    #[error("行处理错误: {0}")]
    Row(#[from] RowError),
    /// 输出端错误
    #[error("输出错误: {0}")]
    Sink(#[from] SinkError),
    /// 检索阶段终止，未进入行处理
    #[error("运行终止: {0}")]
    Aborted(String),
}

/// 会话（浏览器页面）操作错误
///
/// 超时和"找不到元素"在行级 / 步骤级都是可恢复的。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// 等待元素超时
    #[error("等待 {selector} 超时 ({timeout:?})")]
    Timeout { selector: String, timeout: Duration },
    /// 元素不存在
    #[error("找不到元素: {selector}")]
    NotFound { selector: String },
    /// 导航失败
    #[error("导航到 {url} 失败: {message}")]
    Navigation { url: String, message: String },
    /// 执行脚本失败
    #[error("执行脚本失败: {0}")]
    Script(String),
    /// 浏览器启动 / 连接 / 页面创建失败
    #[error("浏览器操作失败: {0}")]
    Browser(String),
}

impl SessionError {
    pub fn not_found(selector: impl Into<String>) -> Self {
        SessionError::NotFound {
            selector: selector.into(),
        }
    }

    pub fn timeout(selector: impl Into<String>, timeout: Duration) -> Self {
        SessionError::Timeout {
            selector: selector.into(),
            timeout,
        }
    }
}

/// 配置错误，全部在任何远程交互之前检出
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 检索模式缺少必填字段
    #[error("检索模式 {mode} 缺少必填字段 {field}")]
    MissingField { mode: String, field: String },
    /// 不允许的选项值
    #[error("字段 {field} 的取值 '{value}' 不被允许")]
    InvalidOption { field: String, value: String },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 未配置验证码服务密钥
    #[error("检索模式 {mode} 需要验证码，但未配置验证码服务密钥")]
    MissingSolverCredential { mode: String },
    /// 读取运行输入失败
    #[error("读取运行输入失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 验证码服务错误
#[derive(Debug, Error)]
pub enum ChallengeError {
    /// 页面上找不到验证码图片
    #[error("找不到验证码图片")]
    ImageNotFound,
    /// 请求验证码服务失败
    #[error("验证码服务请求失败: {0}")]
    Request(String),
    /// 服务返回了错误
    #[error("验证码服务拒绝: {0}")]
    Rejected(String),
    /// 等待识别结果超时
    #[error("等待验证码结果超时 ({0:?})")]
    Timeout(Duration),
}

/// 检索阶段错误
#[derive(Debug, Error)]
pub enum SearchError {
    /// 配置错误（不会重试）
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// 验证码未能识别
    #[error("验证码未识别: {0}")]
    ChallengeUnsolved(#[from] ChallengeError),
    /// 验证码连续两次被判定错误
    #[error("验证码被连续拒绝 {0} 次")]
    VerificationRejected(u32),
    /// 结果数量超过门户上限，查询范围过宽
    #[error("结果数量超过上限: {0}")]
    ResultLimitExceeded(String),
    /// 会话层错误（可重试）
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl SearchError {
    /// 致命错误直接终止运行，不再发起新的检索尝试
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SearchError::Session(_))
    }
}

/// 单行提取错误，由行级边界统一转换为失败计数
#[derive(Debug, Error)]
pub enum RowError {
    #[error(transparent)]
    Session(#[from] SessionError),
    /// 轮询结束仍未找到文档查看器
    #[error("找不到文档查看器 (已尝试 {attempts} 次)")]
    ViewerNotFound { attempts: u32 },
    /// 查看器中没有可打开的链接
    #[error("图片入口没有可用的链接")]
    ViewerLinkMissing,
    /// 图片合成或保存失败
    #[error("图片保存失败 ({key}): {message}")]
    ImageSave { key: String, message: String },
}

/// 输出端错误
#[derive(Debug, Error)]
pub enum SinkError {
    /// 数据集推送失败
    #[error("数据集推送失败: {0}")]
    Dataset(String),
    /// 写入分隔文件失败
    #[error("写入文件失败 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for SessionError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        SessionError::Script(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Script(format!("无法解析脚本返回值: {}", err))
    }
}

impl From<reqwest::Error> for ChallengeError {
    fn from(err: reqwest::Error) -> Self {
        ChallengeError::Request(err.to_string())
    }
}

// ========== Result 类型别名 ==========

/// 会话操作结果类型
pub type SessionResult<T> = Result<T, SessionError>;
