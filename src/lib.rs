//! Meeting audio to transcript and structured minutes.
//!
//! Uploads become tasks in a [`task::TaskRegistry`]; a [`pipeline::TaskMachine`]
//! stores the audio, transcribes it and summarizes it through the
//! [`gateway`] traits, while the [`api`] exposes progress and results.

pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod global;
pub mod pipeline;
pub mod storage;
pub mod task;
