//! forgetube-core - task orchestration and timeline synchronization for the
//! topic → narrated video pipeline.

pub mod api;
pub mod assembly;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod stage;
pub mod state;
pub mod subtitle;
pub mod timeline;
