//! On-screen display coordination.
//!
//! Drawing popups is left to an [`OsdRenderer`]. The manager decides which outputs
//! get one and keeps them cached per output name until they have been idle for the
//! configured timeout.

use crate::config::Config;
use crate::output::Output;
use log::{debug, info};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;

pub trait Osd: Send + 'static {
    fn show_output_identifier(&mut self, output: &Output);
    fn show_generic_osd(&mut self, icon: &str, text: &str);
    fn show_action_selector(&mut self);
}

pub trait OsdRenderer {
    type Popup: Osd;
    fn create(&mut self, output: &Output) -> Self::Popup;
}

struct IdleEntry<T> {
    value: T,
    last_access: Instant,
}

type Entries<T> = Arc<Mutex<HashMap<String, IdleEntry<T>>>>;

fn lock<T>(entries: &Entries<T>) -> MutexGuard<'_, HashMap<String, IdleEntry<T>>> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Map of values dropped once they have not been touched for `timeout`.
/// One deadline task covers the whole map and is pushed back by [`IdleCache::arm`].
pub struct IdleCache<T: Send + 'static> {
    entries: Entries<T>,
    timeout: Duration,
    deadline: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> IdleCache<T> {
    pub fn new(timeout: Duration) -> IdleCache<T> {
        IdleCache {
            entries: Arc::new(Mutex::new(HashMap::new())),
            timeout,
            deadline: None,
        }
    }

    /// Runs `visit` on the value for `key`, creating it first if needed.
    pub fn touch<C, V>(&mut self, key: &str, create: C, visit: V)
    where
        C: FnOnce() -> T,
        V: FnOnce(&mut T),
    {
        let mut entries = lock(&self.entries);
        let entry = entries.entry(key.to_owned()).or_insert_with(|| IdleEntry {
            value: create(),
            last_access: Instant::now(),
        });
        entry.last_access = Instant::now();
        visit(&mut entry.value);
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.entries).contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        lock(&self.entries).clear();
    }

    /// (Re)starts the idle deadline. Must be called from within a tokio runtime.
    pub fn arm(&mut self) {
        self.cancel();
        let entries = Arc::clone(&self.entries);
        let timeout = self.timeout;
        self.deadline = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let mut entries = lock(&entries);
            let before = entries.len();
            entries.retain(|_, entry| entry.last_access.elapsed() < timeout);
            debug!("Dropped {} idle osd(s)", before - entries.len());
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.deadline.take() {
            handle.abort();
        }
    }
}

impl<T: Send + 'static> Drop for IdleCache<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn is_visible(output: &Output) -> bool {
    output.is_connected() && output.is_enabled() && output.current_mode().is_some()
}

/// Output to put the action selector on: the primary one, else the only enabled
/// one, else the largest visible one, else the first enabled one.
pub fn action_selector_output(config: &Config) -> Option<&Output> {
    if let Some(primary) = config.primary_output() {
        return Some(primary);
    }
    let mut enabled = config.outputs().iter().filter(|o| o.is_connected() && o.is_enabled());
    if let (Some(only), None) = (enabled.clone().next(), enabled.clone().nth(1)) {
        return Some(only);
    }
    let mut largest: Option<&Output> = None;
    for output in config.outputs().iter().filter(|o| is_visible(o)) {
        let area = output.current_mode().map_or(0, |m| m.area());
        let largest_area = largest.and_then(Output::current_mode).map_or(0, |m| m.area());
        if largest.is_none() || area > largest_area {
            largest = Some(output);
        }
    }
    largest.or_else(|| enabled.next())
}

/// Session-wide OSD coordinator, owned by the daemon.
pub struct OsdManager<R: OsdRenderer> {
    renderer: R,
    osds: IdleCache<R::Popup>,
}

impl<R: OsdRenderer> OsdManager<R> {
    pub fn new(renderer: R, idle_timeout: Duration) -> OsdManager<R> {
        OsdManager {
            renderer,
            osds: IdleCache::new(idle_timeout),
        }
    }

    pub fn osds(&self) -> &IdleCache<R::Popup> {
        &self.osds
    }

    pub fn show_output_identifiers(&mut self, config: &Config) {
        for output in config.outputs().iter().filter(|o| is_visible(o)) {
            let renderer = &mut self.renderer;
            self.osds.touch(
                output.name(),
                || renderer.create(output),
                |osd| osd.show_output_identifier(output),
            );
        }
        self.osds.arm();
    }

    pub fn show_osd(&mut self, config: &Config, icon: &str, text: &str) {
        self.osds.clear();
        for output in config.outputs().iter().filter(|o| is_visible(o)) {
            let renderer = &mut self.renderer;
            self.osds.touch(
                output.name(),
                || renderer.create(output),
                |osd| osd.show_generic_osd(icon, text),
            );
        }
        self.osds.arm();
    }

    /// Shows the action selector and returns the output it went to.
    pub fn show_action_selector(&mut self, config: &Config) -> Option<String> {
        self.osds.clear();
        let Some(output) = action_selector_output(config) else {
            debug!("Found no usable outputs");
            return None;
        };
        let renderer = &mut self.renderer;
        self.osds.touch(
            output.name(),
            || renderer.create(output),
            |osd| osd.show_action_selector(),
        );
        self.osds.arm();
        Some(output.name().to_owned())
    }
}

/// Renderer that only reports what would be shown.
#[derive(Debug, Default)]
pub struct LogRenderer;

#[derive(Debug)]
pub struct LogOsd {
    output: String,
}

impl Osd for LogOsd {
    fn show_output_identifier(&mut self, output: &Output) {
        info!("[osd {}] {}", self.output, output.label());
    }

    fn show_generic_osd(&mut self, icon: &str, text: &str) {
        info!("[osd {}] {icon}: {text}", self.output);
    }

    fn show_action_selector(&mut self) {
        info!("[osd {}] display action selector", self.output);
    }
}

impl OsdRenderer for LogRenderer {
    type Popup = LogOsd;

    fn create(&mut self, output: &Output) -> LogOsd {
        LogOsd {
            output: output.name().to_owned(),
        }
    }
}
