// SPDX-FileCopyrightText: 2025 kifab contributors
// SPDX-License-Identifier: Apache-2.0

//! kifab - Fabrication export pipeline for KiCad boards
//!
//! Plots Gerbers, drill files, paste DXFs, assembly drawings and review
//! sets through a [`backend::CadBackend`], collects BOM and placement data,
//! and packs every deliverable into a named archive.

pub mod ancillary;
pub mod archive;
pub mod backend;
pub mod board;
pub mod bom;
pub mod config;
pub mod drill;
pub mod error;
pub mod gerber;
pub mod jobfile;
pub mod kicad;
pub mod layers;
pub mod pipeline;
pub mod plan;
pub mod plot;
pub mod position;
pub mod progress;
pub mod render;
pub mod schematic;
pub mod settings;
pub mod sexpr;

pub use backend::CadBackend;
pub use error::{FabError, Result};
pub use pipeline::{PipelineSummary, RezonitExport, RezonitOptions};
