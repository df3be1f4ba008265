//! Runtime configuration: environment first, command-line flags on top.

use std::path::PathBuf;

use anyhow::{Context, bail};
use shopledger_store::OverpaymentPolicy;

pub const DB_ENV: &str = "SHOPLEDGER_DB";
pub const EXPORT_DIR_ENV: &str = "SHOPLEDGER_EXPORT_DIR";
pub const OVERPAYMENT_ENV: &str = "SHOPLEDGER_OVERPAYMENT";

const APP_DIR: &str = "shopledger";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub export_dir: PathBuf,
    pub overpayment: OverpaymentPolicy,
}

/// Values given on the command line; each one wins over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db_path: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub overpayment: Option<String>,
}

impl Config {
    pub fn load(overrides: Overrides) -> anyhow::Result<Self> {
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary variable source.
    pub fn resolve(
        overrides: Overrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = match overrides.db_path.or_else(|| var(DB_ENV).map(PathBuf::from)) {
            Some(path) => path,
            None => {
                let path = default_db_path()?;
                tracing::debug!(path = %path.display(), "{DB_ENV} not set; using default store location");
                path
            }
        };

        let export_dir = match overrides
            .export_dir
            .or_else(|| var(EXPORT_DIR_ENV).map(PathBuf::from))
        {
            Some(dir) => dir,
            None => default_export_dir()?,
        };

        let overpayment = match overrides.overpayment.or_else(|| var(OVERPAYMENT_ENV)) {
            Some(raw) => match OverpaymentPolicy::parse(&raw) {
                Some(policy) => policy,
                None => bail!("invalid overpayment policy {raw:?}; expected \"allow\" or \"reject\""),
            },
            None => OverpaymentPolicy::default(),
        };

        Ok(Self {
            db_path,
            export_dir,
            overpayment,
        })
    }
}

/// `{data_dir}/shopledger/store.db`.
fn default_db_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;
    Ok(base.join(APP_DIR).join("store.db"))
}

/// `{download_dir}/shopledger`, or `{home}/shopledger` without one.
fn default_export_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::download_dir()
        .or_else(dirs::home_dir)
        .context("failed to resolve a download or home directory for exports")?;
    Ok(base.join(APP_DIR))
}
