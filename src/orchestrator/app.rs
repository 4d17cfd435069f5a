//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：初始化日志文件、加载并校验检索条件
//! 2. **组装协作者**：浏览器启动器、验证码服务、三个输出端
//! 3. **运行**：交给 `PipelineDriver`，输出最终统计
//!
//! 检索条件在任何远程交互之前就校验完毕，配置错误直接返回。

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::browser::ChromeLauncher;
use crate::config::Config;
use crate::error::ConfigError;
use crate::models::criteria::SearchCriteria;
use crate::models::loaders::load_search_criteria;
use crate::models::outcome::RunOutcome;
use crate::orchestrator::export_buffer::ExportBuffer;
use crate::orchestrator::pipeline::PipelineDriver;
use crate::services::{
    ChallengeSolver, DatasetSink, DelimitedFileSink, HttpChallengeSolver, HttpDatasetSink, JsonlDatasetSink,
    LocalImageStore, ZipComposer,
};
use crate::utils::logging;
use crate::utils::retry::RetryPolicy;
use crate::workflow::{RowExtractor, SearchOrchestrator};

/// 应用主结构
pub struct App {
    config: Config,
    criteria: SearchCriteria,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::init_log_file(&config.output_log_file)?;
        logging::log_startup(&config);

        let criteria = load_search_criteria(Path::new(&config.input_file))
            .await
            .with_context(|| format!("无法加载检索条件: {}", config.input_file))?;

        if criteria.kind().requires_challenge() && config.solver_key.is_none() {
            return Err(ConfigError::MissingSolverCredential {
                mode: criteria.kind().to_string(),
            }
            .into());
        }

        Ok(Self { config, criteria })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunOutcome> {
        let mut pipeline = self.build_pipeline();
        let outcome = pipeline.run(&self.criteria).await;

        logging::print_final_stats(&outcome, pipeline.buffer().sink_failures(), &self.config.output_log_file);
        Ok(outcome)
    }

    fn build_pipeline(&self) -> PipelineDriver {
        let config = &self.config;

        let solver: Option<Arc<dyn ChallengeSolver>> = config.solver_key.as_ref().map(|key| {
            Arc::new(HttpChallengeSolver::new(&config.solver_endpoint, key)) as Arc<dyn ChallengeSolver>
        });

        let search = SearchOrchestrator::new(
            Arc::new(ChromeLauncher::from_config(config)),
            solver,
            &config.portal_url,
            config.timings.clone(),
        );

        let extractor = RowExtractor::new(
            self.criteria.kind(),
            self.criteria.export_mode,
            config.timings.clone(),
            Arc::new(ZipComposer),
            Arc::new(LocalImageStore::new(&config.image_dir, &config.image_base_url)),
            chrono::Local::now().date_naive(),
        );

        let dataset: Arc<dyn DatasetSink> = match &config.dataset_endpoint {
            Some(endpoint) => {
                info!("📡 数据集输出: {}", endpoint);
                Arc::new(HttpDatasetSink::new(endpoint, config.dataset_token.clone()))
            }
            None => {
                warn!("⚠️ 未配置数据集地址，写入本地文件 {}", config.dataset_jsonl);
                Arc::new(JsonlDatasetSink::new(&config.dataset_jsonl))
            }
        };
        let buffer = ExportBuffer::new(
            config.batch_size,
            dataset,
            Arc::new(DelimitedFileSink::new(&config.output_csv)),
        );

        PipelineDriver::new(
            search,
            extractor,
            buffer,
            RetryPolicy::new(config.max_search_attempts, config.attempt_delay),
            config.release_interval,
        )
    }
}
