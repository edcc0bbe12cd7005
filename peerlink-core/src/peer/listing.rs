//! Parsing of peer item listings.
//!
//! Peers answer `GET /Items` either with a bare array or with an envelope
//! `{ "Items": [...], "TotalRecordCount": n }`. Field names are matched
//! without regard to case.

use peerlink_model::RemoteCatalogItem;
use peerlink_model::catalog::UNNAMED_ITEM;
use serde_json::{Map, Value};

use crate::error::PeerError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogListing {
    pub items: Vec<RemoteCatalogItem>,
    /// `TotalRecordCount` from the envelope, when present.
    pub total_record_count: Option<u64>,
    /// Entries dropped for lacking a usable identifier.
    pub skipped: usize,
}

fn field<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object.get(name).or_else(|| {
        object
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// True for the all-zero GUID, dashed or not.
fn is_empty_guid(id: &str) -> bool {
    let digits: Vec<u8> = id
        .bytes()
        .filter(|b| !matches!(b, b'-' | b'{' | b'}'))
        .collect();
    digits.len() == 32 && digits.iter().all(|b| *b == b'0')
}

fn resolve_id(value: Option<&Value>) -> Option<String> {
    let id = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    if id.is_empty() || is_empty_guid(&id) {
        None
    } else {
        Some(id)
    }
}

fn parse_item(value: &Value) -> Option<RemoteCatalogItem> {
    let object = value.as_object()?;
    let remote_id = resolve_id(field(object, "Id"))?;
    let display_name = non_blank_str(field(object, "Name"))
        .unwrap_or(UNNAMED_ITEM)
        .to_string();
    let media_kind = non_blank_str(field(object, "Type")).map(str::to_string);

    Some(RemoteCatalogItem {
        remote_id,
        display_name,
        media_kind,
    })
}

fn collect(entries: &[Value], total_record_count: Option<u64>) -> CatalogListing {
    let mut listing = CatalogListing {
        items: Vec::with_capacity(entries.len()),
        total_record_count,
        skipped: 0,
    };

    for entry in entries {
        match parse_item(entry) {
            Some(item) => listing.items.push(item),
            None => listing.skipped += 1,
        }
    }

    listing
}

/// Parses a peer's `/Items` response body.
pub fn parse_catalog(body: &[u8]) -> Result<CatalogListing, PeerError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| PeerError::MalformedResponse(err.to_string()))?;

    match &value {
        Value::Array(entries) => Ok(collect(entries, None)),
        Value::Object(envelope) => {
            let total = field(envelope, "TotalRecordCount").and_then(Value::as_u64);
            match field(envelope, "Items") {
                Some(Value::Array(entries)) => Ok(collect(entries, total)),
                Some(Value::Null) | None => Ok(CatalogListing {
                    total_record_count: total,
                    ..CatalogListing::default()
                }),
                Some(_) => Err(PeerError::MalformedResponse(
                    "envelope field 'Items' is not an array".into(),
                )),
            }
        }
        _ => Err(PeerError::MalformedResponse(
            "expected a JSON array or an items envelope".into(),
        )),
    }
}
