use crate::capture::{CaptureRequest, FourCc};
use crate::control::Trigger;
use crate::log_warn;
use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

const SCHEMA_VERSION: i32 = 1;
const APP_DIR_NAME: &str = "DisplayBridge";

pub const VK_ESCAPE: u16 = 0x1B;
pub const VK_F: u16 = 0x46;
pub const VK_V: u16 = 0x56;

/// Virtual-key codes bound to each hotkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBindings {
    pub toggle_overlay: u16,
    pub toggle_vsync: u16,
    pub exit: u16,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            toggle_overlay: VK_F,
            toggle_vsync: VK_V,
            exit: VK_ESCAPE,
        }
    }
}

impl KeyBindings {
    pub fn key_for(&self, trigger: Trigger) -> u16 {
        match trigger {
            Trigger::ToggleOverlay => self.toggle_overlay,
            Trigger::ToggleVsync => self.toggle_vsync,
            Trigger::Exit => self.exit,
        }
    }

    /// First pair of hotkeys sharing a key, if any. Unbound (zero) keys are
    /// ignored.
    pub fn find_duplicate(&self) -> Option<(Trigger, Trigger)> {
        for (i, a) in Trigger::ALL.iter().enumerate() {
            for b in &Trigger::ALL[i + 1..] {
                let key = self.key_for(*a);
                if key != 0 && key == self.key_for(*b) {
                    return Some((*a, *b));
                }
            }
        }
        None
    }

    /// These bindings, or the defaults if two hotkeys share a key.
    pub fn validated(self) -> Self {
        match self.find_duplicate() {
            Some((a, b)) => {
                log_warn!(
                    "{} and {} are both bound to key 0x{:02X}; using default bindings",
                    a.label(),
                    b.label(),
                    self.key_for(a)
                );
                Self::default()
            }
            None => self,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub device_index: usize,
    #[serde(default = "default_capture_width")]
    pub capture_width: u32,
    #[serde(default = "default_capture_height")]
    pub capture_height: u32,
    #[serde(default = "default_capture_fps")]
    pub capture_fps: u32,
    #[serde(default = "default_pixel_format")]
    pub pixel_format: FourCc,

    #[serde(default)]
    pub key_bindings: KeyBindings,

    #[serde(default)]
    pub vsync_enabled: bool,
    #[serde(default)]
    pub overlay_visible: bool,

    #[serde(default = "default_log_retention_count")]
    pub log_retention_count: usize,
}

fn default_capture_width() -> u32 {
    1920
}

fn default_capture_height() -> u32 {
    1080
}

fn default_capture_fps() -> u32 {
    60
}

fn default_pixel_format() -> FourCc {
    FourCc::YUY2
}

fn default_log_retention_count() -> usize {
    10
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            device_index: 0,
            capture_width: default_capture_width(),
            capture_height: default_capture_height(),
            capture_fps: default_capture_fps(),
            pixel_format: default_pixel_format(),
            key_bindings: KeyBindings::default(),
            vsync_enabled: false,
            overlay_visible: false,
            log_retention_count: default_log_retention_count(),
        }
    }
}

impl AppState {
    pub fn capture_request(&self) -> CaptureRequest {
        CaptureRequest {
            device: self.device_index,
            width: self.capture_width,
            height: self.capture_height,
            fps: self.capture_fps,
            fourcc: self.pixel_format,
        }
    }
}

enum WriteCommand {
    Update(AppState),
    Shutdown,
}

/// Settings persisted as a JSON blob in a small SQLite key/value store.
///
/// Reads are served from memory; writes are handed to a background thread so
/// callers never block on disk.
pub struct StateManager {
    app_data_dir: PathBuf,
    state: Arc<RwLock<AppState>>,
    write_sender: Sender<WriteCommand>,
    write_thread: Mutex<Option<thread::JoinHandle<()>>>,
    load_problem: Option<String>,
}

impl StateManager {
    /// Opens the store in the per-user data directory.
    pub fn new() -> Result<Self> {
        Self::open(default_data_dir())
    }

    pub fn open(app_data_dir: impl Into<PathBuf>) -> Result<Self> {
        let app_data_dir = app_data_dir.into();
        let db_path = app_data_dir.join("state.db");

        std::fs::create_dir_all(&app_data_dir)
            .with_context(|| format!("Failed to create data directory {}", app_data_dir.display()))?;

        let conn = Connection::open(&db_path).context("Failed to open database")?;
        Self::init_database(&conn)?;

        let (initial_state, load_problem) = Self::load_state(&conn);
        drop(conn);
        let state = Arc::new(RwLock::new(initial_state));

        let (write_sender, write_receiver) = unbounded();

        let write_thread = thread::Builder::new()
            .name("state-writer".to_string())
            .spawn(move || Self::write_worker(db_path, write_receiver))
            .context("Failed to spawn state writer")?;

        Ok(Self {
            app_data_dir,
            state,
            write_sender,
            write_thread: Mutex::new(Some(write_thread)),
            load_problem,
        })
    }

    fn init_database(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
            .ok();

        if current_version.is_none() {
            conn.execute("INSERT INTO schema_version (version) VALUES (?1)", params![SCHEMA_VERSION])?;
        }

        Ok(())
    }

    /// Stored state, or the defaults plus the reason the stored JSON was
    /// rejected. The store is usually opened before the logger exists, so
    /// the reason is handed back instead of logged here.
    fn load_state(conn: &Connection) -> (AppState, Option<String>) {
        let json_str: Option<String> = conn
            .query_row("SELECT value FROM state WHERE key = 'app_state'", [], |row| row.get(0))
            .ok();

        match json_str {
            Some(json) => match serde_json::from_str(&json) {
                Ok(state) => (state, None),
                Err(e) => (AppState::default(), Some(e.to_string())),
            },
            None => (AppState::default(), None),
        }
    }

    fn write_worker(db_path: PathBuf, receiver: Receiver<WriteCommand>) {
        let conn = match Connection::open(&db_path) {
            Ok(c) => c,
            Err(e) => {
                crate::log_error!("Failed to open database in write worker: {}", e);
                return;
            }
        };

        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");

        while let Ok(cmd) = receiver.recv() {
            match cmd {
                WriteCommand::Update(state) => {
                    if let Ok(json) = serde_json::to_string(&state) {
                        if let Err(e) = conn.execute(
                            "INSERT OR REPLACE INTO state (key, value) VALUES ('app_state', ?1)",
                            params![json],
                        ) {
                            crate::log_error!("Failed to write state: {}", e);
                        }
                    }
                }
                WriteCommand::Shutdown => {
                    break;
                }
            }
        }

        let _ = conn.pragma_update(None, "wal_checkpoint", "TRUNCATE");
    }

    pub fn app_data_dir(&self) -> &Path {
        &self.app_data_dir
    }

    /// Why the stored settings were discarded at open, if they were.
    pub fn load_problem(&self) -> Option<&str> {
        self.load_problem.as_deref()
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.app_data_dir.join("logs")
    }

    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        f(&self.state.read())
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.state.write();
        f(&mut state);
        let _ = self.write_sender.send(WriteCommand::Update(state.clone()));
    }

    /// Stored key bindings, or the defaults if they conflict.
    pub fn key_bindings(&self) -> KeyBindings {
        self.read(|s| s.key_bindings).validated()
    }

    /// Drains pending writes and stops the writer. Later calls are no-ops.
    pub fn shutdown(&self) {
        let _ = self.write_sender.send(WriteCommand::Shutdown);
        if let Some(handle) = self.write_thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StateManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// `%APPDATA%` on Windows, the XDG config directory elsewhere, and the temp
/// directory if neither is set.
pub fn default_data_dir() -> PathBuf {
    let base = std::env::var_os("APPDATA")
        .or_else(|| std::env::var_os("XDG_CONFIG_HOME"))
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(std::env::temp_dir);
    base.join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bindings_are_f_v_escape() {
        let keys = KeyBindings::default();
        assert_eq!(keys.key_for(Trigger::ToggleOverlay), b'F' as u16);
        assert_eq!(keys.key_for(Trigger::ToggleVsync), b'V' as u16);
        assert_eq!(keys.key_for(Trigger::Exit), 0x1B);
        assert_eq!(keys.find_duplicate(), None);
    }

    #[test]
    fn conflicting_bindings_fall_back_to_defaults() {
        let keys = KeyBindings {
            toggle_overlay: VK_V,
            toggle_vsync: VK_V,
            exit: VK_ESCAPE,
        };
        assert_eq!(keys.find_duplicate(), Some((Trigger::ToggleOverlay, Trigger::ToggleVsync)));
        assert_eq!(keys.validated(), KeyBindings::default());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let state: AppState = serde_json::from_str(r#"{"vsync_enabled": true}"#).unwrap();
        assert!(state.vsync_enabled);
        assert_eq!(state.capture_request(), CaptureRequest::default());
        assert_eq!(state.log_retention_count, 10);
    }
}
