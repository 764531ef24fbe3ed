//! Codec for the legacy `additional_supplier_ids` column.
//!
//! Historical data stores the list three different ways: a JSON array of id
//! strings, a comma-separated string, or a single bare id. All reads go
//! through [`decode`]; all writes go through [`encode`], which always emits
//! a JSON array of canonical UUID strings, order-preserving and de-duplicated.

use uuid::Uuid;

pub fn decode(raw: Option<&str>) -> Vec<Uuid> {
    let raw = match raw {
        Some(s) if !s.trim().is_empty() => s.trim(),
        _ => return Vec::new(),
    };

    let candidates: Vec<String> = if raw.starts_with('[') {
        match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
            Ok(values) => values
                .into_iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            Err(_) => Vec::new(),
        }
    } else if raw.contains(',') {
        raw.split(',').map(|s| s.trim().to_string()).collect()
    } else {
        vec![raw.to_string()]
    };

    let mut seen = Vec::new();
    for candidate in candidates {
        if let Ok(id) = Uuid::parse_str(candidate.trim()) {
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
    }
    seen
}

pub fn encode(ids: &[Uuid]) -> Option<String> {
    if ids.is_empty() {
        return None;
    }
    let mut seen: Vec<Uuid> = Vec::new();
    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    let strings: Vec<String> = seen.iter().map(|id| id.to_string()).collect();
    serde_json::to_string(&strings).ok()
}
