//! bookflow 命令行入口
//!
//! 用法：`bookflow [home | chapter:<id> | block:<chapter>:<block>]`
//! 提交一次导航，等待内容水合完成（或失败通知出现），打印状态与任务列表后退出。
//! 配置文件可用环境变量 BOOKFLOW_CONFIG 指定。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use bookflow::config::load_config;
use bookflow::core::{ShutdownManager, ShutdownReason};
use bookflow::store::{Action, StateContainer};

fn parse_route(raw: &str) -> anyhow::Result<Action> {
    let parts: Vec<&str> = raw.split(':').collect();
    let action = match parts.as_slice() {
        ["home"] => Action::RouteHome,
        ["chapter", chapter] => Action::RouteChapter {
            chapter: chapter.to_string(),
        },
        ["block", chapter, block] => Action::RouteBlock {
            chapter: chapter.to_string(),
            block: block.to_string(),
        },
        _ => bail!("Unknown route '{}', expected home | chapter:<id> | block:<chapter>:<block>", raw),
    };
    Ok(action)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config(std::env::var_os("BOOKFLOW_CONFIG").map(PathBuf::from))
        .context("Failed to load config")?;
    bookflow::observability::init(&cfg.log.filter);

    let route = std::env::args().nth(1).unwrap_or_else(|| "home".to_string());
    let action = parse_route(&route)?;

    let app = bookflow::app::start(&cfg).context("Failed to start engine")?;
    let shutdown = Arc::new(ShutdownManager::from_token(app.engine.token()));
    shutdown.install_signal_handlers();

    let mut state_rx = app.store.watch();
    app.store.submit(action);

    let settled = async {
        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow_and_update();
            if !state.content.is_dehydrated() || !state.notifications.is_empty() {
                break;
            }
        }
    };
    let limit = Duration::from_secs(cfg.api.timeout_secs + 1);
    tokio::select! {
        res = tokio::time::timeout(limit, settled) => {
            if res.is_err() {
                tracing::warn!("Timed out waiting for content after {:?}", limit);
            }
        }
        _ = shutdown.wait_for_shutdown() => {
            tracing::info!("Interrupted before content settled");
        }
    }

    let state = app.store.read();
    println!("{}", serde_json::to_string_pretty(&state).context("Failed to encode state")?);
    if let Ok(tasks) = app.engine.tasks().await {
        for t in tasks {
            println!("{:>10}  {:<22} {:?}", t.id.to_string(), t.name, t.status);
        }
    }

    shutdown.shutdown(ShutdownReason::UserInitiated);
    app.engine.shutdown().await;
    Ok(())
}
