//! REPL 模式（交互式 Shell）
//!
//! 专用输入线程 + mpsc 通道：rustyline 在自己的线程里阻塞读取，保留历史记录，不阻塞 tokio。

use anyhow::Result;
use eim_driver::{BridgeConfig, SessionHandle};
use eim_protocol::Pin;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;

use super::oneshot::{connect, run_block};
use crate::commands::Verb;

const HISTORY_FILE: &str = ".eim_history";

/// Shell 中读取的默认等待时间
const SHELL_READ_WAIT: Duration = Duration::from_millis(500);

/// 启动输入线程
fn spawn_input() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel::<String>(10);

    thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            },
        };
        rl.load_history(HISTORY_FILE).ok(); // 首次运行没有历史

        loop {
            match rl.readline("eim> ") {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line.as_str());

                    let exit = line == "exit" || line == "quit";
                    if tx.blocking_send(line).is_err() || exit {
                        break;
                    }
                },
                Err(ReadlineError::Interrupted) => {
                    println!("^C（输入 exit 退出）");
                },
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                },
            }
        }

        rl.save_history(HISTORY_FILE).ok();
    });

    rx
}

/// 运行 REPL 模式
pub async fn run_repl(config: BridgeConfig) -> Result<()> {
    let handle = connect(&config).await?;
    let mut input = spawn_input();

    println!("EIM CLI v{} - 交互式 Shell", env!("CARGO_PKG_VERSION"));
    println!("输入 'help' 查看帮助，'exit' 退出");
    println!();

    while let Some(line) = input.recv().await {
        match line.as_str() {
            "exit" | "quit" => break,
            "help" => print_help(),
            "shutdown" => {
                handle.shutdown().await?;
                println!("✅ 已发送 quit!，会话结束");
                break;
            },
            _ => {
                // 单条命令失败不退出 Shell
                if let Err(e) = handle_command(&line, &handle, &config).await {
                    eprintln!("❌ {}", e);
                }
            },
        }

        if handle.is_closed() {
            println!("⚠️  会话已结束");
            break;
        }
    }

    println!("👋 再见！");
    Ok(())
}

async fn handle_command(line: &str, handle: &SessionHandle, config: &BridgeConfig) -> Result<()> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((&name, rest)) = parts.split_first() else {
        return Ok(());
    };

    if name == "mode" {
        let [pin] = rest else {
            anyhow::bail!("用法: mode <D13|A0>");
        };
        let pin = parse_pin(pin)?;
        println!("{}: {}", pin, handle.pin_mode(pin).await?);
        return Ok(());
    }

    let verb = Verb::from_name(name).ok_or_else(|| anyhow::anyhow!("未知命令: {}", name))?;
    let block = verb.to_block(rest, &config.board)?;
    run_block(handle, block, SHELL_READ_WAIT).await
}

/// 解析 `D13` / `A0` 形式的引脚
fn parse_pin(text: &str) -> Result<Pin> {
    let upper = text.to_ascii_uppercase();
    let (make, index): (fn(u8) -> Pin, &str) = match upper.split_at_checked(1) {
        Some(("D", index)) => (Pin::digital, index),
        Some(("A", index)) => (Pin::analog, index),
        _ => anyhow::bail!("无效的引脚: {}（例如 D13、A0）", text),
    };
    let index: u8 = index
        .parse()
        .map_err(|_| anyhow::anyhow!("无效的引脚: {}（例如 D13、A0）", text))?;
    Ok(make(index))
}

fn print_help() {
    println!("可用命令:");
    for verb in [
        Verb::Led,
        Verb::Pwm,
        Verb::Servo,
        Verb::ReadAnalog,
        Verb::ReadButton,
    ] {
        println!("  {}", verb.usage());
    }
    println!("  mode <D13|A0>        查询引脚的登记模式");
    println!("  shutdown             发送 quit! 并结束会话");
    println!("  help                 显示帮助");
    println!("  exit                 退出");
}
