//! 危险动作确认通道
//!
//! Confirmer 在任务循环中阻塞等待用户的明确决定；控制台实现循环提问直到答案可归一化为「是/否」。

use std::io::{self, BufRead, Write};

use async_trait::async_trait;

use crate::config::ConfirmSection;
use crate::react::ActionDescriptor;

/// 用户回答归一化结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Unrecognized,
}

/// 是/否词表（可本地化，来自 [confirm] 配置段）
#[derive(Debug, Clone)]
pub struct Vocabulary {
    yes: Vec<String>,
    no: Vec<String>,
}

impl Vocabulary {
    pub fn new(yes: Vec<String>, no: Vec<String>) -> Self {
        Self {
            yes: yes.into_iter().map(|w| w.trim().to_lowercase()).collect(),
            no: no.into_iter().map(|w| w.trim().to_lowercase()).collect(),
        }
    }

    pub fn from_config(section: &ConfirmSection) -> Self {
        Self::new(section.yes.clone(), section.no.clone())
    }

    pub fn normalize(&self, input: &str) -> Answer {
        let input = input.trim().to_lowercase();
        if self.yes.iter().any(|w| *w == input) {
            Answer::Yes
        } else if self.no.iter().any(|w| *w == input) {
            Answer::No
        } else {
            Answer::Unrecognized
        }
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::from_config(&ConfirmSection::default())
    }
}

/// 确认通道：返回 true 表示用户允许执行
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, action: &ActionDescriptor) -> bool;
}

/// 固定答复（无人值守 / 测试）
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn confirm(&self, action: &ActionDescriptor) -> bool {
        tracing::info!(tool = %action.name(), approved = self.0, "auto confirmation");
        self.0
    }
}

/// 控制台确认：打印动作与参数，读取 stdin 直到得到是/否；EOF 或读取失败视为拒绝
pub struct ConsoleConfirmer {
    vocabulary: Vocabulary,
}

impl ConsoleConfirmer {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }
}

/// 从任意输入源读取回答，直到可归一化；输入耗尽返回 false
fn ask<R: BufRead, W: Write>(vocabulary: &Vocabulary, mut input: R, mut out: W) -> bool {
    loop {
        let _ = write!(out, "\nРазрешить? (да/нет): ");
        let _ = out.flush();
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match vocabulary.normalize(&line) {
            Answer::Yes => return true,
            Answer::No => return false,
            Answer::Unrecognized => {
                let _ = writeln!(out, "Пожалуйста, введите 'да' или 'нет'");
            }
        }
    }
}

#[async_trait]
impl Confirmer for ConsoleConfirmer {
    async fn confirm(&self, action: &ActionDescriptor) -> bool {
        println!("\n{}", "=".repeat(60));
        println!("⚠️  ВНИМАНИЕ! Агент хочет выполнить: {}", action.name());
        println!("Детали: {}", action.arguments_text());
        println!("{}", "=".repeat(60));

        let vocabulary = self.vocabulary.clone();
        let approved = tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            ask(&vocabulary, stdin.lock(), io::stdout())
        })
        .await
        .unwrap_or(false);
        tracing::info!(tool = %action.name(), approved, "console confirmation");
        approved
    }
}
