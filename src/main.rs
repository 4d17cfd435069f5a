use anyhow::Result;
use land_records_export::utils::logging;
use land_records_export::models::RunStatus;
use land_records_export::{App, AppError, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();

    // 初始化并运行应用
    let outcome = App::initialize(config).await?.run().await?;

    if let RunStatus::Fatal(reason) = outcome.status {
        return Err(AppError::Aborted(reason).into());
    }
    Ok(())
}
