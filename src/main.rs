use std::sync::Arc;

use anyhow::Result;
use clap::{Arg, Command};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tarr_annunciator::audio::{AudioSink, RodioSink, Volume};
use tarr_annunciator::catalog::CatalogStore;
use tarr_annunciator::config::Config;
use tarr_annunciator::lightning::LightningMonitor;
use tarr_annunciator::queue::{AnnouncementManager, AnnouncementQueue};
use tarr_annunciator::scheduler::CronScheduler;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("tarr-annunciator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Train-station announcement appliance")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Sets a custom config file"),
        )
        .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load_or_default(matches.get_one::<String>("config"))?;
    info!(
        mp3_dir = %config.paths.mp3_dir,
        json_dir = %config.paths.json_dir,
        "configuration loaded"
    );

    // Catalogs
    let catalogs = Arc::new(CatalogStore::new(config.paths.json_dir()));
    catalogs.reload().await?;

    // Audio — a missing output device disables playback but not the service:
    // submissions still succeed and dispatched items are marked failed.
    let volume = Volume::new(config.audio.volume);
    let sink: Option<Box<dyn AudioSink>> = match RodioSink::new(volume.clone()) {
        Ok(sink) => Some(Box::new(sink)),
        Err(e) => {
            warn!(error = %e, "audio initialization failed, running with audio disabled");
            None
        }
    };

    // Queue + submission facade
    let queue = Arc::new(AnnouncementQueue::start(sink, config.queue.max_history)?);
    let manager = Arc::new(AnnouncementManager::new(
        Arc::clone(&queue),
        Arc::clone(&catalogs),
        config.paths.mp3_dir(),
        volume,
    ));

    // Cron scheduler
    let scheduler = Arc::new(CronScheduler::new(Arc::clone(&manager)));
    let cron = catalogs.load_cron().await?;
    scheduler.reload(&cron);
    scheduler.start();

    // Lightning monitor
    let monitor = if config.lightning.enabled {
        let monitor = Arc::new(LightningMonitor::new(
            Arc::clone(&manager),
            Arc::clone(&catalogs),
            config.paths.xml_dir(),
            config.lightning.monitor_config(),
        ));
        monitor.start();
        Some(monitor)
    } else {
        None
    };

    info!(
        audio_available = queue.audio_available(),
        "annunciator ready"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    if let Some(monitor) = &monitor {
        monitor.stop();
    }
    scheduler.stop();
    queue.stop();

    Ok(())
}
