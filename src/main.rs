//! # Internal Trust 主程序
//!
//! 加载配置、连接数据库并运行迁移，构建应用上下文后等待退出信号。

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use internal_trust::{
    Result, TrustError,
    app::AppContext,
    config, database, lerror, linfo,
    logging::{self, LogComponent, LogStage},
};

/// 内部服务信任基础设施
#[derive(Debug, Parser)]
#[command(name = "internal-trust", version, about)]
struct Cli {
    /// 配置文件路径，缺省按 RUST_ENV 选择 config/config.{env}.toml
    #[arg(short, long, env = "INTERNAL_TRUST_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// 日志级别（RUST_LOG 优先）
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 只运行数据库迁移后退出
    #[arg(long)]
    migrate_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统
    logging::init_logging(Some(&cli.log_level));

    if let Err(e) = run(cli).await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_failed",
            &format!("服务运行失败: {e}")
        );
        return Err(e);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = match cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    let config = Arc::new(config);

    let db = database::init_database(&config.database).await?;
    database::run_migrations(&db).await?;

    if cli.migrate_only {
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "migrate_only",
            "数据库迁移完成，退出"
        );
        db.close().await?;
        return Ok(());
    }

    let context = AppContext::build(config, db)?;
    context.start().await;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_started",
        &format!(
            "服务已启动: identities={}, outbound_enabled={}",
            context.credentials.identities().len(),
            context.config.outbound.enabled
        )
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| TrustError::internal_with_source("等待退出信号失败", e))?;

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "signal_received",
        "收到退出信号，开始关闭"
    );
    context.shutdown().await
}
