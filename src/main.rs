//! `shelfwatch [config.json]`
//!
//! Loads the configuration, runs one collection session and prints the
//! summary. Ctrl-C cancels between pages.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use shelfwatch_lib::infrastructure::config::defaults;
use shelfwatch_lib::infrastructure::{init_logging_with_config, ConfigManager};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| defaults::CONFIG_FILE.to_string());

    let config = ConfigManager::new(config_path).load_config().await?;
    init_logging_with_config(&config.logging)?;

    let cancellation_token = CancellationToken::new();
    let ctrl_c_token = cancellation_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received; stopping after the current page");
            ctrl_c_token.cancel();
        }
    });

    match shelfwatch_lib::run(config, cancellation_token).await {
        Ok(summary) => {
            println!("{summary}");
            Ok(())
        }
        Err(e) => {
            error!("Collection aborted: {:#}", e);
            Err(e)
        }
    }
}
