//! Cross-device state and command exchange over a [`SharedStore`].
//!
//! Keys are namespaced by run so that concurrent runs sharing one store do
//! not see each other:
//!
//! | entry              | key                                                 |
//! |--------------------|-----------------------------------------------------|
//! | device state       | `<run>/multiplayer/<device>`                        |
//! | pending command    | `<run>/multiplayer/<device>_command`                |
//! | auxiliary string   | `<run>/aux/<name>`                                  |
//! | mirrored log entry | `<run>/log/<device>/<n>`                            |
//! | master generation  | `<run>/multiplayer/<master>/generation`             |
//! | helper joined      | `<run>/multiplayer/<master>/<gen>/helpers/<device>` |
//! | master started     | `<run>/multiplayer/<master>/<gen>/run`              |
//!
//! Reads never fail: an absent key, or a backend error, yields [`NOT_FOUND`].
//!
//! ## Master/helper registration
//!
//! A master bumps its generation counter when it starts waiting for helpers.
//! Helpers join the current generation only while it has not started yet, and
//! the master counts joins under its own generation alone. Entries left by an
//! earlier run under the same run id therefore never satisfy a new wait. A
//! master that sees its generation change under it has a competing master.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};

use crate::store::{SharedStore, StoreError, NOT_FOUND};

/// State value a device announces when it is ready to proceed.
pub const READY: &str = "ready";

/// Handle to the shared store bound to one run and one local device.
#[derive(Clone)]
pub struct SyncClient {
    store: Arc<dyn SharedStore>,
    run_id: String,
    device: String,
}

impl fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncClient")
            .field("run_id", &self.run_id)
            .field("device", &self.device)
            .finish()
    }
}

impl SyncClient {
    pub fn new(
        store: Arc<dyn SharedStore>,
        run_id: impl Into<String>,
        device: impl Into<String>,
    ) -> Self {
        Self {
            store,
            run_id: run_id.into(),
            device: device.into(),
        }
    }

    /// Id of the device this client writes for.
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state_key(&self, device: &str) -> String {
        format!("{}/multiplayer/{}", self.run_id, device)
    }

    pub fn command_key(&self, device: &str) -> String {
        format!("{}/multiplayer/{}_command", self.run_id, device)
    }

    pub fn aux_key(&self, name: &str) -> String {
        format!("{}/aux/{}", self.run_id, name)
    }

    pub fn log_key(&self, index: u64) -> String {
        format!("{}/log/{}/{}", self.run_id, self.device, index)
    }

    pub fn read_state(&self, device: &str) -> String {
        self.read_key(&self.state_key(device))
    }

    pub fn write_state(&self, device: &str, value: &str) -> Result<(), StoreError> {
        self.write_key(&self.state_key(device), value)
    }

    pub fn read_command(&self, device: &str) -> String {
        self.read_key(&self.command_key(device))
    }

    pub fn write_command(&self, device: &str, value: &str) -> Result<(), StoreError> {
        self.write_key(&self.command_key(device), value)
    }

    pub fn read_string(&self, name: &str) -> String {
        self.read_key(&self.aux_key(name))
    }

    pub fn write_string(&self, name: &str, value: &str) -> Result<(), StoreError> {
        self.write_key(&self.aux_key(name), value)
    }

    pub fn generation_key(&self, master: &str) -> String {
        format!("{}/multiplayer/{}/generation", self.run_id, master)
    }

    fn helpers_prefix(&self, master: &str, generation: u64) -> String {
        format!("{}/multiplayer/{}/{}/helpers/", self.run_id, master, generation)
    }

    fn start_key(&self, master: &str, generation: u64) -> String {
        format!("{}/multiplayer/{}/{}/run", self.run_id, master, generation)
    }

    /// Current generation of `master`, or `None` before it ever registered.
    pub fn read_generation(&self, master: &str) -> Option<u64> {
        self.read_key(&self.generation_key(master)).parse().ok()
    }

    /// Opens a fresh generation for this device as master.
    ///
    /// # Returns
    ///
    /// The new generation number; joins from earlier generations are ignored.
    pub fn register_master(&self) -> Result<u64, StoreError> {
        let generation = self.read_generation(&self.device).unwrap_or(0) + 1;
        self.write_key(&self.generation_key(&self.device), &generation.to_string())?;
        Ok(generation)
    }

    /// Joins `master`'s `generation` as this device.
    pub fn register_helper(&self, master: &str, generation: u64) -> Result<(), StoreError> {
        let key = format!("{}{}", self.helpers_prefix(master, generation), self.device);
        self.write_key(&key, READY)
    }

    /// Devices that joined `master`'s `generation`, in name order.
    pub fn joined_helpers(&self, master: &str, generation: u64) -> Result<Vec<String>, StoreError> {
        let prefix = self.helpers_prefix(master, generation);
        let entries = self.store.scan(&prefix)?;
        debug!(prefix = %prefix, joined = entries.len(), "store scan");
        Ok(entries
            .into_iter()
            .filter_map(|(key, _)| key.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    /// Starts this device's `generation` and announces it [`READY`].
    pub fn start_generation(&self, generation: u64) -> Result<(), StoreError> {
        self.write_key(&self.start_key(&self.device, generation), "1")?;
        self.write_state(&self.device, READY)
    }

    pub fn is_started(&self, master: &str, generation: u64) -> bool {
        self.read_key(&self.start_key(master, generation)) == "1"
    }

    /// Raw read with the sentinel substituted for an absent or unreadable key.
    pub fn read_key(&self, key: &str) -> String {
        match self.store.read(key) {
            Ok(Some(value)) => {
                debug!(key, value = %value, "store read");
                value
            }
            Ok(None) => {
                debug!(key, "store read: absent");
                NOT_FOUND.to_string()
            }
            Err(e) => {
                error!(key, error = %e, "store read failed");
                NOT_FOUND.to_string()
            }
        }
    }

    pub fn write_key(&self, key: &str, value: &str) -> Result<(), StoreError> {
        debug!(key, value, "store write");
        self.store.write(key, value)
    }
}
