//! 配置管理命令
//!
//! 配置文件默认位于 `<config_dir>/eim-bridge/config.toml`，不存在时使用默认配置。

use anyhow::{Context, Result};
use clap::Subcommand;
use eim_driver::BridgeConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// 默认配置文件路径
pub fn default_config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("eim-bridge");
    path.push("config.toml");
    Ok(path)
}

/// 加载配置
///
/// 显式指定的文件必须存在；默认位置的文件缺失时返回默认配置。
pub fn load_config(explicit: Option<&Path>) -> Result<BridgeConfig> {
    if let Some(path) = explicit {
        return BridgeConfig::load_from_file(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()));
    }

    let path = default_config_file()?;
    if !path.exists() {
        return Ok(BridgeConfig::default());
    }
    BridgeConfig::load_from_file(&path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示生效的配置（TOML）
    Show,

    /// 显示默认配置文件路径
    Path,

    /// 在默认位置写入一份默认配置
    Init {
        /// 覆盖已有文件
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(self, config: &BridgeConfig) -> Result<()> {
        match self {
            ConfigCommand::Show => {
                print!("{}", config.to_toml_string()?);
                Ok(())
            },

            ConfigCommand::Path => {
                println!("{}", default_config_file()?.display());
                Ok(())
            },

            ConfigCommand::Init { force } => Self::init_(force),
        }
    }

    fn init_(force: bool) -> Result<()> {
        let path = default_config_file()?;
        if path.exists() && !force {
            anyhow::bail!("配置文件已存在: {}（使用 --force 覆盖）", path.display());
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("创建配置目录失败")?;
        }

        fs::write(&path, BridgeConfig::default().to_toml_string()?)
            .context("写入配置文件失败")?;
        println!("✅ 已写入默认配置: {}", path.display());
        Ok(())
    }
}
