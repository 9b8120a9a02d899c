//! Vendor export presets
//!
//! Each fabrication vendor expects slightly different Gerber and drill
//! conventions. A preset is an immutable [`ExportSettings`] value built by an
//! explicit constructor and passed by reference into the exporters.

use crate::error::{FabError, Result};

/// Excellon zero handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZerosFormat {
    Decimal,
    SuppressLeading,
    SuppressTrailing,
    KeepZeros,
}

impl ZerosFormat {
    /// Value accepted by `kicad-cli pcb export drill --excellon-zeros-format`
    pub fn as_str(&self) -> &'static str {
        match self {
            ZerosFormat::Decimal => "decimal",
            ZerosFormat::SuppressLeading => "suppressleading",
            ZerosFormat::SuppressTrailing => "suppresstrailing",
            ZerosFormat::KeepZeros => "keep",
        }
    }
}

/// Plot and drill options of one vendor profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSettings {
    pub use_protel_extensions: bool,
    pub use_aux_origin: bool,
    pub exclude_edge_layer: bool,
    pub minimal_header: bool,
    pub no_suffix: bool,
    pub merge_npth: bool,
    pub zeros_format: ZerosFormat,
    pub subtract_mask_from_silk: bool,
    pub create_job_file: bool,
    pub use_x2_format: bool,
    pub gen_drill_map_pdf: bool,
    pub gen_drill_report: bool,
}

impl ExportSettings {
    pub fn rezonit() -> Self {
        Self {
            use_protel_extensions: false,
            use_aux_origin: true,
            exclude_edge_layer: true,
            minimal_header: false,
            no_suffix: false,
            merge_npth: true,
            zeros_format: ZerosFormat::Decimal,
            subtract_mask_from_silk: false,
            create_job_file: false,
            use_x2_format: true,
            gen_drill_map_pdf: false,
            gen_drill_report: false,
        }
    }

    pub fn jlcpcb() -> Self {
        Self {
            use_protel_extensions: true,
            use_aux_origin: true,
            exclude_edge_layer: true,
            minimal_header: false,
            no_suffix: false,
            merge_npth: true,
            zeros_format: ZerosFormat::Decimal,
            subtract_mask_from_silk: true,
            create_job_file: true,
            use_x2_format: true,
            gen_drill_map_pdf: true,
            gen_drill_report: true,
        }
    }

    pub fn pcbway() -> Self {
        Self {
            use_protel_extensions: true,
            use_aux_origin: false,
            exclude_edge_layer: true,
            minimal_header: true,
            no_suffix: true,
            merge_npth: false,
            zeros_format: ZerosFormat::SuppressLeading,
            subtract_mask_from_silk: false,
            create_job_file: false,
            use_x2_format: false,
            gen_drill_map_pdf: false,
            gen_drill_report: false,
        }
    }

    pub fn oshpark() -> Self {
        Self {
            use_protel_extensions: true,
            use_aux_origin: false,
            exclude_edge_layer: true,
            minimal_header: false,
            no_suffix: false,
            merge_npth: true,
            zeros_format: ZerosFormat::Decimal,
            subtract_mask_from_silk: false,
            create_job_file: false,
            use_x2_format: false,
            gen_drill_map_pdf: false,
            gen_drill_report: false,
        }
    }

    /// Look a preset up by its command-line name
    pub fn by_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "rezonit" => Ok(Self::rezonit()),
            "jlcpcb" => Ok(Self::jlcpcb()),
            "pcbway" => Ok(Self::pcbway()),
            "oshpark" => Ok(Self::oshpark()),
            _ => Err(FabError::UnknownPreset {
                name: name.to_string(),
            }
            .into()),
        }
    }
}

/// Names accepted by [`ExportSettings::by_name`]
pub const PRESET_NAMES: [&str; 4] = ["rezonit", "jlcpcb", "pcbway", "oshpark"];
