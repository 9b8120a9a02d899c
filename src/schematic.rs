//! Schematic components
//!
//! Components come from the schematic and carry free-form fields. Exporters
//! only access them through [`ComponentFields`].

use std::collections::HashMap;

/// Capability lookup of component metadata by field name
pub trait ComponentFields {
    fn reference(&self) -> &str;

    /// Symbol unit, 1 for single-unit symbols
    fn unit(&self) -> u32;

    /// Whether the component is marked to appear in the BOM
    fn in_bom(&self) -> bool;

    /// Field value by name, `None` when absent
    fn field(&self, key: &str) -> Option<&str>;
}

/// A symbol instance read from a schematic
#[derive(Debug, Clone, PartialEq)]
pub struct SchematicComponent {
    pub reference: String,
    pub unit: u32,
    pub in_bom: bool,
    pub fields: HashMap<String, String>,
}

impl SchematicComponent {
    pub fn new(reference: &str) -> Self {
        Self {
            reference: reference.to_string(),
            unit: 1,
            in_bom: true,
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: &str) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_unit(mut self, unit: u32) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_in_bom(mut self, in_bom: bool) -> Self {
        self.in_bom = in_bom;
        self
    }
}

impl ComponentFields for SchematicComponent {
    fn reference(&self) -> &str {
        &self.reference
    }

    fn unit(&self) -> u32 {
        self.unit
    }

    fn in_bom(&self) -> bool {
        self.in_bom
    }

    fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}
