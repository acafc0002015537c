//! browser-pilot CLI
//!
//! 入口：初始化日志、加载配置、启动 Chrome，运行一个任务并打印结果。

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use browser_pilot::agent::{create_llm_from_config, default_confirmer};
use browser_pilot::guard::{AutoConfirm, Confirmer};
use browser_pilot::tools::ChromeBrowser;
use browser_pilot::{load_config, observability, BrowserAgent};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pilot", version, about = "LLM-driven browser agent")]
struct Cli {
    /// Задача на естественном языке (если не указана, читается из stdin)
    task: Option<String>,

    /// Дополнительный файл конфигурации (TOML)
    #[arg(long, env = "PILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Лимит шагов
    #[arg(long)]
    max_turns: Option<usize>,

    /// Подтверждать опасные действия автоматически
    #[arg(long)]
    yes: bool,
}

fn read_task() -> anyhow::Result<String> {
    print!("Введите задачу: ");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read task from stdin")?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.clone()).context("Failed to load config")?;
    if let Some(max_turns) = cli.max_turns {
        cfg.agent.max_turns = max_turns;
    }

    let task = match cli.task {
        Some(task) => task,
        None => tokio::task::spawn_blocking(read_task)
            .await
            .context("stdin task panicked")??,
    };
    if task.is_empty() {
        anyhow::bail!("Пустая задача");
    }

    let browser = Arc::new(
        ChromeBrowser::launch(&cfg.browser).context("Failed to launch browser")?,
    );
    let confirmer: Box<dyn Confirmer> = if cli.yes {
        Box::new(AutoConfirm(true))
    } else {
        default_confirmer(&cfg.confirm)
    };

    let llm = create_llm_from_config(&cfg);
    let agent = BrowserAgent::from_config(&cfg, llm, browser.clone(), confirmer);
    let result = match agent {
        Ok(agent) => {
            let outcome = agent.run_task(&task).await;
            let (prompt, completion, total) = agent.token_usage();
            tracing::info!(prompt, completion, total, "token usage");
            Ok(outcome)
        }
        Err(e) => Err(e),
    };

    // 无论结果如何都关闭浏览器
    browser.close();

    let outcome = result.context("Failed to create agent")?;
    println!("\n{}", outcome);
    Ok(())
}
