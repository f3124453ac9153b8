//! DMR ID <-> callsign resolution

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info};

use crate::error::Result;

/// Resolves identities between the numeric DMR world and callsign-based YSF
pub trait IdLookup {
    /// DMR ID for `callsign`, 0 when unknown
    fn find_id(&self, callsign: &str) -> u32;

    /// Callsign for `id`, the decimal ID when unknown
    fn find_callsign(&self, id: u32) -> String;
}

/// Table loaded from a DMR ID file (`id callsign [name ...]` per line)
#[derive(Debug, Default, Clone)]
pub struct DmrIdTable {
    by_id: HashMap<u32, String>,
    by_callsign: HashMap<String, u32>,
}

impl DmrIdTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let table = Self::parse(&text);
        info!("DmrIdTable: loaded {} ids from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse the file contents. Fields may be separated by whitespace, commas,
    /// tabs or semicolons; lines that do not start with a numeric ID are skipped.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line
                .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
                .filter(|f| !f.is_empty());
            let (Some(id), Some(callsign)) = (fields.next(), fields.next()) else {
                debug!("DmrIdTable: line {} has too few fields", n + 1);
                continue;
            };
            match id.parse::<u32>() {
                Ok(id) => table.insert(id, callsign),
                Err(_) => debug!("DmrIdTable: line {} has no numeric id", n + 1),
            }
        }
        table
    }

    pub fn insert(&mut self, id: u32, callsign: &str) {
        let callsign = callsign.trim().to_ascii_uppercase();
        self.by_callsign.entry(callsign.clone()).or_insert(id);
        self.by_id.insert(id, callsign);
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl IdLookup for DmrIdTable {
    fn find_id(&self, callsign: &str) -> u32 {
        // YSF callsigns may carry a "-suffix" or "/suffix"
        let base = callsign
            .trim()
            .split(['-', '/', ' '])
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        self.by_callsign.get(&base).copied().unwrap_or(0)
    }

    fn find_callsign(&self, id: u32) -> String {
        self.by_id
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
# RADIO_ID,CALLSIGN,FIRST_NAME
2345001,m0abc,Alice
2345002\tG4XYZ\tBob Smith
3100001;W1AW;ARRL
not-a-number,N0CALL

2345003
";

    #[test]
    fn test_parse_mixed_separators() {
        let table = DmrIdTable::parse(SAMPLE);
        assert_eq!(table.len(), 3);
        assert_eq!(table.find_callsign(2345001), "M0ABC");
        assert_eq!(table.find_callsign(2345002), "G4XYZ");
        assert_eq!(table.find_id("W1AW"), 3100001);
    }

    #[test]
    fn test_unknown_fallbacks() {
        let table = DmrIdTable::parse(SAMPLE);
        assert_eq!(table.find_id("N0CALL"), 0);
        assert_eq!(table.find_callsign(9999999), "9999999");
    }

    #[test]
    fn test_callsign_suffix_ignored() {
        let table = DmrIdTable::parse(SAMPLE);
        assert_eq!(table.find_id("m0abc-7"), 2345001);
        assert_eq!(table.find_id("G4XYZ/P"), 2345002);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("crossmode-ids-{}.csv", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        drop(file);

        let table = DmrIdTable::load(&path).unwrap();
        assert_eq!(table.len(), 3);
        std::fs::remove_file(&path).unwrap();

        assert!(DmrIdTable::load(&path).is_err());
    }
}
