//! Bill of materials
//!
//! Components sharing every key field end up in one BOM line. Lines keep the
//! order in which their first component was seen.

use crate::error::{Result, ResultExt};
use crate::schematic::ComponentFields;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Reference prefixes that never go to the BOM: power flags, power symbols
/// and test points
const SKIPPED_PREFIXES: &[&str] = &["#PWR", "#FL", "TP"];

const HEADER: [&str; 10] = [
    "Item#",
    "Reference",
    "Qty",
    "Value",
    "Manufacturer",
    "Part Number",
    "Description",
    "Footprint",
    "DNF",
    "Price",
];

/// Grouping key of a BOM line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BomKey {
    pub value: Option<String>,
    pub manufacturer: Option<String>,
    pub part_number: Option<String>,
    pub description: Option<String>,
    pub footprint: Option<String>,
    pub dnf: Option<String>,
    pub price: Option<String>,
}

impl BomKey {
    pub fn from_component<C: ComponentFields + ?Sized>(component: &C) -> Self {
        let field = |key: &str| component.field(key).map(str::to_string);
        Self {
            value: field("Value"),
            manufacturer: field("Mfr."),
            part_number: field("Prt. number"),
            description: field("Value modifier"),
            footprint: field("Footprint"),
            dnf: field("fit_field"),
            price: field("Price"),
        }
    }
}

/// Grouped references, in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bom {
    groups: IndexMap<BomKey, Vec<String>>,
}

impl Bom {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> impl Iterator<Item = (&BomKey, &[String])> {
        self.groups.iter().map(|(key, refs)| (key, refs.as_slice()))
    }

    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.groups.values().flatten().map(String::as_str)
    }

    fn add(&mut self, key: BomKey, reference: &str) {
        self.groups
            .entry(key)
            .or_default()
            .push(reference.to_string());
    }

    /// Keep only references in `placed` and drop lines left empty
    pub fn retain_placed(&mut self, placed: &HashSet<String>) {
        for references in self.groups.values_mut() {
            references.retain(|reference| placed.contains(reference));
        }
        self.groups.retain(|_, references| !references.is_empty());
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(HEADER)?;

        for (item, (key, references)) in self.groups.iter().enumerate() {
            let cell = |value: &Option<String>| value.clone().unwrap_or_default();
            csv.write_record([
                (item + 1).to_string(),
                references.join(","),
                references.len().to_string(),
                cell(&key.value),
                cell(&key.manufacturer),
                cell(&key.part_number),
                cell(&key.description),
                cell(&key.footprint),
                cell(&key.dnf),
                cell(&key.price),
            ])?;
        }

        csv.flush()?;
        Ok(())
    }

    pub fn write_csv_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).with_path_context("create BOM file", path)?;
        self.write_csv(file)
            .with_path_context("write BOM file", path)?;
        info!("Wrote BOM with {} line(s) to {}", self.len(), path.display());
        Ok(())
    }
}

fn is_skipped(reference: &str) -> bool {
    SKIPPED_PREFIXES
        .iter()
        .any(|prefix| reference.starts_with(prefix))
}

/// Group schematic components into BOM lines. Secondary units, power and
/// test point symbols, ignored references and components not in the BOM
/// are left out.
pub fn collect_bom<C: ComponentFields>(components: &[C], ignore: &HashSet<String>) -> Bom {
    let mut bom = Bom::default();

    for component in components {
        let reference = component.reference();
        if component.unit() != 1
            || is_skipped(reference)
            || ignore.contains(reference)
            || !component.in_bom()
        {
            continue;
        }
        bom.add(BomKey::from_component(component), reference);
    }

    debug!("Collected {} BOM line(s)", bom.len());
    bom
}
