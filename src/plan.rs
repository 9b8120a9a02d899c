//! Plot plans
//!
//! A plot plan lists which layers to export and in what order. Every entry
//! carries the file suffix and a free-form comment embedded in the output.

use crate::layers::Layer;

/// One layer of a plot plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotPlanEntry {
    pub name: String,
    pub layer: Layer,
    pub comment: String,
}

impl PlotPlanEntry {
    pub fn new(name: &str, layer: Layer, comment: &str) -> Self {
        Self {
            name: name.to_string(),
            layer,
            comment: comment.to_string(),
        }
    }
}

/// Ordered list of layers to plot
pub type PlotPlan = Vec<PlotPlanEntry>;

/// Whether a plan plots any copper layer
pub fn has_copper(plan: &[PlotPlanEntry]) -> bool {
    plan.iter().any(|entry| entry.layer.is_copper())
}

/// Layers Rezonit expects, also used for the review set
pub fn rezonit_plan() -> PlotPlan {
    vec![
        PlotPlanEntry::new("CuTop", Layer::FrontCopper, "Top layer"),
        PlotPlanEntry::new("CuBottom", Layer::BackCopper, "Bottom layer"),
        PlotPlanEntry::new("PasteBottom", Layer::BackPaste, "Paste Bottom"),
        PlotPlanEntry::new("PasteTop", Layer::FrontPaste, "Paste top"),
        PlotPlanEntry::new("SilkTop", Layer::FrontSilkscreen, "Silk top"),
        PlotPlanEntry::new("SilkBottom", Layer::BackSilkscreen, "Silk bottom"),
        PlotPlanEntry::new("MaskBottom", Layer::BackMask, "Mask bottom"),
        PlotPlanEntry::new("MaskTop", Layer::FrontMask, "Mask top"),
        PlotPlanEntry::new("EdgeCuts", Layer::EdgeCuts, "Edges"),
        PlotPlanEntry::new("CmtUser", Layer::CommentsUser, "V-CUT"),
    ]
}

/// Default plan of the standalone gerber command
pub fn full_plan() -> PlotPlan {
    rezonit_plan()
}

/// Paste stencils plus outline, exported as DXF
pub fn paste_dxf_plan() -> PlotPlan {
    vec![
        PlotPlanEntry::new("PasteBottom", Layer::BackPaste, "Paste Bottom"),
        PlotPlanEntry::new("PasteTop", Layer::FrontPaste, "Paste top"),
        PlotPlanEntry::new("EdgeCuts", Layer::EdgeCuts, "Edges"),
    ]
}

/// Fabrication layers making up the assembly drawing
pub fn assembly_plan() -> PlotPlan {
    vec![
        PlotPlanEntry::new("FabTop", Layer::FrontFab, "Fab"),
        PlotPlanEntry::new("FabBot", Layer::BackFab, "Fab"),
    ]
}
