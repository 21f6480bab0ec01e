//! # autopilot-core
//!
//! Engine for scripted UI test automation.
//!
//! A script is a queue of actions replayed against a running application one
//! frame at a time. Actions inject synthetic touches and key presses, wait for
//! UI state, assert on what they observe, and coordinate with other devices
//! taking part in the same run through a shared key/value store.
//!
//! ## Modules
//!
//! - [`transform`] - Virtual/physical coordinate mapping
//! - [`action`] - The action state machine and the per-tick [`action::Context`]
//! - [`actions`] - Touch, keyboard, wait, assert, multitouch, scroll and sync actions
//! - [`scheduler`] - FIFO queue advanced once per tick
//! - [`engine`] - Owns a run: UI, session, touches, store client and scheduler
//! - [`builder`] - Scripting surface that turns calls into queued actions
//! - [`controls`] - The UI collaborator trait; [`scene`] implements it from JSON
//! - [`store`] / [`sync`] - Shared store backends and cross-device primitives
//! - [`session`] - Report sink with JSON Lines persistence
//! - [`config`] - Settings in `~/.autopilot/config.json`
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use autopilot_core::builder::ScriptBuilder;
//! use autopilot_core::config::AutopilotConfig;
//! use autopilot_core::engine::Engine;
//! use autopilot_core::scene::Scene;
//! use autopilot_core::scheduler::TickOutcome;
//! use autopilot_core::session::Session;
//! use autopilot_core::store::MemoryStore;
//! use autopilot_core::sync::SyncClient;
//!
//! let scene = Scene::from_json(r#"{"screens": [{"name": "Main", "children": [
//!     {"name": "Title", "type": "text", "text": "Hello",
//!      "frame": {"x": 0, "y": 0, "width": 100, "height": 20}}]}]}"#).unwrap();
//! let config = AutopilotConfig::default();
//! let sync = SyncClient::new(Arc::new(MemoryStore::new()), "run", &config.device);
//!
//! let mut script = ScriptBuilder::new(&config);
//! script.assert_text("title", "Hello", "Title");
//!
//! let mut engine = Engine::new("hello", scene, Session::new("hello", "master"), sync, config);
//! engine.load(script.finish());
//! assert_eq!(engine.run_fixed(1.0 / 60.0, 100), TickOutcome::Finished);
//! assert!(engine.session().summary().passed());
//! ```

pub mod action;
pub mod actions;
pub mod builder;
pub mod config;
pub mod controls;
pub mod engine;
pub mod geometry;
pub mod input;
pub mod scene;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod sync;
pub mod transform;
