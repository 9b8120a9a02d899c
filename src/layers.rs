//! Board layers referenced by plot plans
//!
//! Maps the layers kifab exports to their KiCad canonical names, the Protel
//! style file extensions and the Gerber X2 file functions used in job files.

use std::fmt;
use std::ops::Range;

/// A physical board layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    // Copper layers
    FrontCopper,
    InnerCopper(u8), // 1-based inner index
    BackCopper,

    // Technical layers
    BackPaste,
    FrontPaste,
    FrontSilkscreen,
    BackSilkscreen,
    BackMask,
    FrontMask,

    // Documentation layers
    EdgeCuts,
    CommentsUser,
    FrontFab,
    BackFab,
}

impl Layer {
    /// Whether this is a copper layer. Copper layers plot with NPTH pads skipped.
    pub fn is_copper(&self) -> bool {
        matches!(
            self,
            Layer::FrontCopper | Layer::InnerCopper(_) | Layer::BackCopper
        )
    }

    /// KiCad canonical layer name as accepted by `kicad-cli --layers`
    pub fn kicad_name(&self) -> String {
        match self {
            Layer::FrontCopper => "F.Cu".to_string(),
            Layer::InnerCopper(n) => format!("In{}.Cu", n),
            Layer::BackCopper => "B.Cu".to_string(),
            Layer::BackPaste => "B.Paste".to_string(),
            Layer::FrontPaste => "F.Paste".to_string(),
            Layer::FrontSilkscreen => "F.SilkS".to_string(),
            Layer::BackSilkscreen => "B.SilkS".to_string(),
            Layer::BackMask => "B.Mask".to_string(),
            Layer::FrontMask => "F.Mask".to_string(),
            Layer::EdgeCuts => "Edge.Cuts".to_string(),
            Layer::CommentsUser => "Cmts.User".to_string(),
            Layer::FrontFab => "F.Fab".to_string(),
            Layer::BackFab => "B.Fab".to_string(),
        }
    }

    /// Protel style Gerber extension (without the dot)
    pub fn protel_extension(&self) -> String {
        match self {
            Layer::FrontCopper => "gtl".to_string(),
            Layer::InnerCopper(n) => format!("g{}", n + 1),
            Layer::BackCopper => "gbl".to_string(),
            Layer::BackPaste => "gbp".to_string(),
            Layer::FrontPaste => "gtp".to_string(),
            Layer::FrontSilkscreen => "gto".to_string(),
            Layer::BackSilkscreen => "gbo".to_string(),
            Layer::BackMask => "gbs".to_string(),
            Layer::FrontMask => "gts".to_string(),
            Layer::EdgeCuts => "gm1".to_string(),
            Layer::CommentsUser => "cmts".to_string(),
            Layer::FrontFab => "gta".to_string(),
            Layer::BackFab => "gba".to_string(),
        }
    }

    /// Gerber X2 `.FileFunction` value for this layer on a board with
    /// `copper_layers` copper layers
    pub fn file_function(&self, copper_layers: u8) -> String {
        match self {
            Layer::FrontCopper => "Copper,L1,Top".to_string(),
            Layer::InnerCopper(n) => format!("Copper,L{},Inr", n + 1),
            Layer::BackCopper => format!("Copper,L{},Bot", copper_layers.max(1)),
            Layer::BackPaste => "Paste,Bot".to_string(),
            Layer::FrontPaste => "Paste,Top".to_string(),
            Layer::FrontSilkscreen => "Legend,Top".to_string(),
            Layer::BackSilkscreen => "Legend,Bot".to_string(),
            Layer::BackMask => "Soldermask,Bot".to_string(),
            Layer::FrontMask => "Soldermask,Top".to_string(),
            Layer::EdgeCuts => "Profile,NP".to_string(),
            Layer::CommentsUser => "Other,Comment".to_string(),
            Layer::FrontFab => "AssemblyDrawing,Top".to_string(),
            Layer::BackFab => "AssemblyDrawing,Bot".to_string(),
        }
    }

    /// Solder masks are negative images
    pub fn is_negative(&self) -> bool {
        matches!(self, Layer::FrontMask | Layer::BackMask)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kicad_name())
    }
}

/// Inner copper indices of a board with `copper_layer_count` copper layers,
/// i.e. `1..=copper_layer_count-2`
pub fn inner_copper_indices(copper_layer_count: u8) -> Range<u8> {
    1..copper_layer_count.saturating_sub(1)
}
