//! CI Webhook Notifier CLI
//!
//! 读取构建快照（JSON），按 webhook 配置生成并投递 MessageCard 通知

use anyhow::Result;
use ci_webhook_notifier::{
    BuildNotifier, BuildSnapshot, CardAssembler, DispatchBatch, HttpTransport, MessageParameters,
    NotifierConfig, NotifyError, SendResult, TokenMacroExpander, WebhookDispatcher,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "cwn")]
#[command(about = "CI Webhook Notifier - 构建通知卡片投递到 webhook")]
#[command(version)]
struct Cli {
    /// 配置文件路径 (默认: ~/.config/ci-webhook-notifier/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// 只打印要发送的内容，不实际发送
    #[arg(long, global = true)]
    dry_run: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 构建开始通知
    Started {
        /// 构建快照文件
        #[arg(long)]
        build: PathBuf,
        /// 当前处于 pre-build 阶段
        #[arg(long)]
        pre_build: bool,
    },
    /// 构建完成通知
    Completed {
        /// 构建快照文件
        #[arg(long)]
        build: PathBuf,
    },
    /// 发送自定义消息
    Message {
        /// 构建快照文件
        #[arg(long)]
        build: PathBuf,
        /// 消息文本
        #[arg(long)]
        message: Option<String>,
        /// 状态文本 ("started" 时发送开始卡片)
        #[arg(long)]
        status: Option<String>,
        /// 主题色覆盖 (如 FF0000)
        #[arg(long)]
        color: Option<String>,
        /// 未配置 webhook 时使用的地址
        #[arg(long)]
        webhook_url: Option<String>,
    },
    /// 打印卡片 JSON，不发送
    Card {
        /// 构建快照文件
        #[arg(long)]
        build: PathBuf,
        /// 卡片类型
        #[arg(long, value_enum, default_value = "completed")]
        event: CardEvent,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CardEvent {
    Started,
    Completed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ci_webhook_notifier=info,cwn=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Card { build, event } => {
            let build = BuildSnapshot::load(&build)?;
            let assembler = CardAssembler::new(&build);
            let card = match event {
                CardEvent::Started => assembler.started_card(),
                CardEvent::Completed => assembler.completed_card(),
            };
            println!("{}", serde_json::to_string_pretty(&card)?);
        }
        Commands::Started { build, pre_build } => {
            let notifier = create_notifier(cli.config.as_deref(), cli.dry_run)?;
            let build = BuildSnapshot::load(&build)?;
            let outcome = notifier.on_build_started(&build, pre_build);
            finish(outcome).await;
        }
        Commands::Completed { build } => {
            let notifier = create_notifier(cli.config.as_deref(), cli.dry_run)?;
            let build = BuildSnapshot::load(&build)?;
            let outcome = notifier.on_build_completed(&build);
            finish(outcome).await;
        }
        Commands::Message {
            build,
            message,
            status,
            color,
            webhook_url,
        } => {
            let notifier = create_notifier(cli.config.as_deref(), cli.dry_run)?;
            let build = BuildSnapshot::load(&build)?;
            let params = MessageParameters {
                message,
                status,
                color,
                webhook_url,
            };
            let outcome = notifier.on_custom_message(&build, &params);
            finish(outcome).await;
        }
    }

    Ok(())
}

fn create_notifier(config_path: Option<&Path>, dry_run: bool) -> Result<BuildNotifier<HttpTransport>> {
    let config = NotifierConfig::load_from(config_path)?;
    let dispatcher = WebhookDispatcher::new(HttpTransport::new()?, config.max_concurrent_dispatches)
        .with_max_queued(config.max_queued_dispatches)
        .with_dry_run(dry_run || config.dry_run);

    Ok(BuildNotifier::new(
        config.webhooks,
        dispatcher,
        Box::new(TokenMacroExpander::new()),
    ))
}

/// 等待所有投递结束；通知失败不影响构建结果，因此只记录日志
async fn finish(outcome: Result<DispatchBatch, NotifyError>) {
    let batch = match outcome {
        Ok(batch) => batch,
        Err(e) => {
            error!(error = %e, "Notification not sent");
            return;
        }
    };

    if batch.is_empty() {
        info!("No webhook to notify");
        return;
    }

    for (webhook, result) in batch.join().await {
        match result {
            SendResult::Sent => info!(webhook = %webhook, "Sent"),
            SendResult::Skipped(reason) => info!(webhook = %webhook, reason = %reason, "Skipped"),
            SendResult::Failed(reason) => warn!(webhook = %webhook, reason = %reason, "Failed"),
        }
    }
}
