//! Agent CLI triggers
//!
//! - [`process`]: shared subprocess runner (timeout, stderr patterns, cleanup)
//! - [`cli`]: the generic [`CliTrigger`] over a per-kind [`CliProtocol`]
//! - [`claude`], [`codex`], [`gemini`]: one protocol per agent CLI
//! - [`factory`]: [`CliTriggerFactory`], selecting the protocol by kind

pub mod activity;
pub mod claude;
pub mod cli;
pub mod codex;
pub mod factory;
pub mod gemini;
pub mod process;

pub use cli::{CliProtocol, CliTrigger, OutputParser, ParsedOutput};
pub use factory::CliTriggerFactory;
pub use process::{ProcessRunner, TriggerSettings};
