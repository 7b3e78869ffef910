use std::env;

use anyhow::Result;

#[derive(Debug, Clone)]
pub struct Config {
    pub history_path: String,
    pub bind_addr: String,
    pub result_url: String,
    pub sync_cron: String,
    pub nav_timeout_secs: u64,
}

pub fn load() -> Result<Config> {
    Ok(Config {
        history_path: env::var("LOTTO_HISTORY_PATH")
            .unwrap_or_else(|_| "data/lotto_full_history.csv".to_string()),
        bind_addr: env::var("LOTTO_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string()),
        result_url: env::var("LOTTO_RESULT_URL")
            .unwrap_or_else(|_| "https://www.dhlottery.co.kr/gameResult.do?method=byWin".to_string()),
        sync_cron: env::var("LOTTO_SYNC_CRON").unwrap_or_else(|_| "0 0 21 * * Sat".to_string()),
        nav_timeout_secs: env::var("LOTTO_NAV_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60),
    })
}
