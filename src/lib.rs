//! # stem-studio
//!
//! Interactive audio stem separation: upload a track, run it through a
//! pretrained source-separation model, download the stems. The library
//! holds the whole pipeline (decoding, model management, windowed ONNX
//! inference, stem reorganization, WAV encoding) plus the axum front-end;
//! `src/bin/stem-studio.rs` wires it to a CLI.

pub mod core;
pub mod error;
pub mod io;
pub mod model;
pub mod organizer;
pub mod pipeline;
pub mod types;
pub mod web;

pub use crate::{
    error::{Result, StemError},
    io::progress::set_download_progress,
    model::{load_model, manager::ensure_model, Separator},
    organizer::{organize, ACCOMPANIMENT},
    pipeline::{split_buffer, split_file, split_upload, StemArtifact, StemFile},
    types::{AudioBuffer, SeparationResult, StemConfig, StemMapping, VOCALS},
    web::{serve, ServeOptions},
};
