//! Two-level stock classification: sectors with named fields.
//!
//! Sector and field ids address sparse arrays; a stock carries at most one
//! field per sector.

use super::sref::SRef;

pub const MAX_SECTORS: usize = 3;
pub const MAX_FIELDS: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct SectorField {
    pub id: usize,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sector {
    pub id: usize,
    pub name: String,
    fields: Vec<Option<String>>,
}

impl Sector {
    pub fn new(id: usize, name: &str) -> Self {
        Sector {
            id,
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn field_name(&self, field_id: usize) -> Option<&str> {
        self.fields.get(field_id).and_then(|f| f.as_deref())
    }

    pub fn has_field(&self, field_id: usize) -> bool {
        self.field_name(field_id).is_some()
    }

    /// Creates or renames the field.
    pub fn set_field(&mut self, field_id: usize, name: &str) {
        if self.fields.len() <= field_id {
            self.fields.resize(field_id + 1, None);
        }
        self.fields[field_id] = Some(name.to_string());
    }

    pub fn fields(&self) -> Vec<SectorField> {
        self.fields
            .iter()
            .enumerate()
            .filter_map(|(id, name)| {
                name.as_ref().map(|name| SectorField {
                    id,
                    name: name.clone(),
                })
            })
            .collect()
    }
}

/// Sector tags of one stock, indexed by sector id.
#[derive(Debug, Clone, PartialEq)]
pub struct StockSectors {
    pub sref: SRef,
    pub fields: [Option<usize>; MAX_SECTORS],
}

impl StockSectors {
    pub fn new(sref: SRef) -> Self {
        StockSectors {
            sref,
            fields: [None; MAX_SECTORS],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::MarketId;

    #[test]
    fn fields_are_sparse() {
        let mut sector = Sector::new(0, "Industry");
        sector.set_field(3, "Tech");
        sector.set_field(1, "Energy");

        assert!(sector.has_field(1));
        assert!(!sector.has_field(2));
        assert!(!sector.has_field(10));
        let fields = sector.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0], SectorField { id: 1, name: "Energy".into() });
        assert_eq!(fields[1], SectorField { id: 3, name: "Tech".into() });
    }

    #[test]
    fn set_field_renames() {
        let mut sector = Sector::new(0, "Industry");
        sector.set_field(0, "Tech");
        sector.set_field(0, "Software");
        assert_eq!(sector.field_name(0), Some("Software"));
        assert_eq!(sector.fields().len(), 1);
    }

    #[test]
    fn stock_sectors_start_empty() {
        let mut tags = StockSectors::new(SRef::new(MarketId::Nyse, "KO"));
        assert!(tags.is_empty());
        tags.fields[2] = Some(4);
        assert!(!tags.is_empty());
    }
}
