pub mod config;
pub mod control;
pub mod error;
pub mod identity;
pub mod modes;
pub mod osd;
pub mod output;
pub mod resolver;
pub mod settings;

use config::Config;
use control::{Control, ControlConfig, OutputRetention};
use error::{ControlError, Result};
use log::{info, warn};
use osd::{LogRenderer, OsdManager};
use output::Output;
use settings::Settings;
use std::sync::Arc;
use swayipc_async::Connection;
use tokio::sync::Mutex;
use zbus::{dbus_interface, fdo, ConnectionBuilder};
use zvariant::{DeserializeDict, SerializeDict, Type};

pub const BUS_NAME: &str = "org.regolith.DisplayControl";
pub const OBJECT_PATH: &str = "/org/regolith/DisplayControl";

/// Remembers and restores output settings of the running sway session.
pub struct DisplayManager {
    settings: Settings,
    sway_connection: Connection,
    osd: OsdManager<LogRenderer>,
}

/// DBus Interface for providing bindings
pub struct ControlServer {
    manager: Arc<Mutex<DisplayManager>>,
}

#[derive(Debug, Clone, PartialEq, SerializeDict, DeserializeDict, Type)]
#[zvariant(signature = "dict")]
pub struct OutputState {
    name: Option<String>,
    identity: Option<String>,
    retention: Option<String>,
    #[zvariant(rename = "display-name")]
    display_name: Option<String>,
    #[zvariant(rename = "is-duplicate")]
    duplicate: Option<bool>,
    #[zvariant(rename = "is-enabled")]
    enabled: Option<bool>,
}

impl OutputState {
    pub fn new(control: &ControlConfig, output: &Output) -> OutputState {
        let identity = output.identity();
        OutputState {
            name: Some(output.name().to_owned()),
            display_name: output.descriptor().display_name(),
            retention: Some(control.get_output_retention(output).to_string()),
            duplicate: Some(control.is_duplicate(&identity)),
            enabled: Some(output.is_enabled()),
            identity: Some(identity.to_string()),
        }
    }
}

fn failed(e: ControlError) -> fdo::Error {
    fdo::Error::Failed(e.to_string())
}

#[dbus_interface(name = "org.regolith.DisplayControl")]
impl ControlServer {
    pub async fn get_outputs(&self) -> fdo::Result<Vec<OutputState>> {
        info!("Received 'GetOutputs' request");
        self.manager.lock().await.outputs_state().await.map_err(failed)
    }

    pub async fn get_output_retention(&self, output_name: String) -> fdo::Result<String> {
        let retention = self
            .manager
            .lock()
            .await
            .output_retention(&output_name)
            .await
            .map_err(failed)?;
        Ok(retention.to_string())
    }

    pub async fn set_output_retention(
        &self,
        output_name: String,
        retention: String,
    ) -> fdo::Result<bool> {
        info!("Setting retention of {output_name} to {retention}");
        let retention = OutputRetention::from_name(&retention);
        self.manager
            .lock()
            .await
            .set_output_retention(&output_name, retention)
            .await
            .map_err(failed)
    }

    pub async fn save(&self) -> fdo::Result<bool> {
        self.manager.lock().await.save().await.map_err(failed)
    }

    pub async fn restore(&self) -> fdo::Result<bool> {
        let restored = self.manager.lock().await.restore().await.map_err(failed)?;
        Ok(restored > 0)
    }

    pub async fn show_output_identifiers(&self) -> fdo::Result<()> {
        self.manager
            .lock()
            .await
            .show_output_identifiers()
            .await
            .map_err(failed)
    }

    pub async fn show_osd(&self, icon: String, text: String) -> fdo::Result<()> {
        self.manager
            .lock()
            .await
            .show_osd(&icon, &text)
            .await
            .map_err(failed)
    }

    pub async fn show_action_selector(&self) -> fdo::Result<String> {
        let output = self
            .manager
            .lock()
            .await
            .show_action_selector()
            .await
            .map_err(failed)?;
        Ok(output.unwrap_or_default())
    }
}

impl ControlServer {
    pub fn new(manager: Arc<Mutex<DisplayManager>>) -> ControlServer {
        ControlServer { manager }
    }

    pub async fn run_server(self) -> Result<zbus::Connection> {
        info!("Starting display control service");
        let connection = ConnectionBuilder::session()?
            .name(BUS_NAME)?
            .serve_at(OBJECT_PATH, self)?
            .build()
            .await?;
        Ok(connection)
    }
}

impl DisplayManager {
    pub async fn new(settings: Settings, osd: OsdManager<LogRenderer>) -> Result<DisplayManager> {
        let sway_connection = Connection::new().await?;
        Ok(DisplayManager {
            settings,
            sway_connection,
            osd,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn current_config(&mut self) -> Result<Config> {
        let outputs = self.sway_connection.get_outputs().await?;
        Ok(Config::from_sway(&outputs))
    }

    fn find_output(config: &Config, name: &str) -> Result<Output> {
        config
            .output(name)
            .cloned()
            .ok_or_else(|| ControlError::OutputNotFound(name.to_owned()))
    }

    pub async fn outputs_state(&mut self) -> Result<Vec<OutputState>> {
        let config = self.current_config().await?;
        let control = ControlConfig::new(&self.settings.data_dir, config);
        Ok(control
            .config()
            .connected_outputs()
            .map(|output| OutputState::new(&control, output))
            .collect())
    }

    pub async fn output_retention(&mut self, name: &str) -> Result<OutputRetention> {
        let config = self.current_config().await?;
        let output = Self::find_output(&config, name)?;
        let control = ControlConfig::new(&self.settings.data_dir, config);
        Ok(control.get_output_retention(&output))
    }

    /// Changes where `name` is remembered and stores its current settings there.
    pub async fn set_output_retention(
        &mut self,
        name: &str,
        retention: OutputRetention,
    ) -> Result<bool> {
        let config = self.current_config().await?;
        let output = Self::find_output(&config, name)?;
        let mut control = ControlConfig::new(&self.settings.data_dir, config);
        control.set_output_retention(&output, retention);
        let stored = resolver::store_output(&self.settings.data_dir, &mut control, &output);
        Ok(control.write_file() && stored)
    }

    /// Remembers the current state of every connected output.
    pub async fn save(&mut self) -> Result<bool> {
        let config = self.current_config().await?;
        let mut control = ControlConfig::new(&self.settings.data_dir, config.clone());
        let mut ok = true;
        for output in config.connected_outputs() {
            ok &= resolver::store_output(&self.settings.data_dir, &mut control, output);
        }
        ok &= control.write_file();
        info!("Saved arrangement {}", config.connected_outputs_hash());
        Ok(ok)
    }

    /// Applies remembered settings to the connected outputs. Returns how many
    /// outputs had something to restore.
    pub async fn restore(&mut self) -> Result<usize> {
        let config = self.current_config().await?;
        let control = ControlConfig::new(&self.settings.data_dir, config.clone());
        let mut restored = 0;
        for output in config.connected_outputs() {
            let data_dir = &self.settings.data_dir;
            let Some(settings) = resolver::restore_output(data_dir, &control, output) else {
                continue;
            };
            for cmd in settings.sway_commands(output.name(), output.modes()) {
                let outcomes = self.sway_connection.run_command(&cmd).await?;
                for outcome in outcomes {
                    if let Err(e) = outcome {
                        warn!("Command '{cmd}' failed: {e}");
                    }
                }
            }
            restored += 1;
        }
        info!("Restored {restored} output(s)");
        Ok(restored)
    }

    pub async fn show_output_identifiers(&mut self) -> Result<()> {
        let config = self.current_config().await?;
        self.osd.show_output_identifiers(&config);
        Ok(())
    }

    pub async fn show_osd(&mut self, icon: &str, text: &str) -> Result<()> {
        let config = self.current_config().await?;
        self.osd.show_osd(&config, icon, text);
        Ok(())
    }

    pub async fn show_action_selector(&mut self) -> Result<Option<String>> {
        let config = self.current_config().await?;
        Ok(self.osd.show_action_selector(&config))
    }
}
