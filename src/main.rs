use log::{error, info};
use regolith_display_control::{
    osd::{LogRenderer, OsdManager},
    settings::Settings,
    ControlServer, DisplayManager,
};
use std::{error::Error, future::pending, sync::Arc};
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();
    let settings = Settings::from_env();
    info!("Storing output records in {}", settings.data_dir.display());

    let osd = OsdManager::new(LogRenderer, settings.osd_timeout);
    let manager = DisplayManager::new(settings, osd).await.map_err(|e| {
        error!(
            "Unable to connect to sway ipc interface. Make sure sway is running and SWAYSOCK is set"
        );
        e
    })?;
    let manager_ref = Arc::new(Mutex::new(manager));

    // bring the session back to what was last remembered for this arrangement
    if let Err(e) = manager_ref.lock().await.restore().await {
        error!("{e}");
    }

    let server = ControlServer::new(Arc::clone(&manager_ref));
    let _connection = server.run_server().await?;

    pending::<()>().await;
    Ok(())
}
