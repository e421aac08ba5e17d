#![warn(clippy::all, missing_docs)]

//! Core logic for the GTANext launcher.
//!
//! This crate hosts the game registry and its persistence, prerequisite
//! and executable detection, loader status and installation, process
//! launch, runtime probes and the call surface shared by the terminal UI
//! and JSON callers.

pub mod api;
pub mod config;
pub mod detection;
pub mod environment;
pub mod error;
pub mod launch;
pub mod loaders;
pub mod metadata;
pub mod models;
pub mod prerequisites;
pub mod registry;

pub use api::{ApiResponse, Backend, FilePicker, HeadlessPicker};
pub use config::AppConfig;
pub use error::{RegistryError, RegistryResult};
pub use models::{GameRecord, GameRef, GameStatus, GameType};
pub use registry::{GameRegistry, GameUpdate, NewGame};
