use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use log::info;
use tokio_util::sync::CancellationToken;

use northstar_tracker::{
    config::TrackerConfig, db::Database, scheduler::LogNotifier, Scheduler, SessionController,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let data_dir = std::env::var("NORTHSTAR_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));

    let config = TrackerConfig::load(&data_dir.join("tracker.json"))?;
    let database = Database::new(data_dir.join("northstar.sqlite3"))?;
    let controller = SessionController::new(database);

    info!("NorthStar scheduler starting up");

    let cancel = CancellationToken::new();
    let scheduler = Arc::new(Scheduler::new(controller, config, Arc::new(LogNotifier)));
    let handles = scheduler.spawn(cancel.clone());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    cancel.cancel();

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
