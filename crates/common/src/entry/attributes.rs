use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Loosely typed metadata as reported by a backend
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Attributes of an entry.
///
/// Every field is optional: an unset attribute is unknown, which is not the
///  same thing as zero (a zero size is a perfectly valid size).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    atime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mtime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ctime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crtime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<JsonObject>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atime(&self) -> Option<DateTime<Utc>> {
        self.atime
    }

    pub fn mtime(&self) -> Option<DateTime<Utc>> {
        self.mtime
    }

    pub fn ctime(&self) -> Option<DateTime<Utc>> {
        self.ctime
    }

    pub fn crtime(&self) -> Option<DateTime<Utc>> {
        self.crtime
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn mode(&self) -> Option<u32> {
        self.mode
    }

    pub fn meta(&self) -> Option<&JsonObject> {
        self.meta.as_ref()
    }

    pub fn set_atime(&mut self, t: DateTime<Utc>) -> &mut Self {
        self.atime = Some(t);
        self
    }

    pub fn set_mtime(&mut self, t: DateTime<Utc>) -> &mut Self {
        self.mtime = Some(t);
        self
    }

    pub fn set_ctime(&mut self, t: DateTime<Utc>) -> &mut Self {
        self.ctime = Some(t);
        self
    }

    pub fn set_crtime(&mut self, t: DateTime<Utc>) -> &mut Self {
        self.crtime = Some(t);
        self
    }

    /// Set all four timestamps at once, as backends that only know one
    ///  creation or modification time usually do.
    pub fn set_all_times(&mut self, t: DateTime<Utc>) -> &mut Self {
        self.set_atime(t).set_mtime(t).set_ctime(t).set_crtime(t)
    }

    pub fn set_size(&mut self, size: u64) -> &mut Self {
        self.size = Some(size);
        self
    }

    pub fn set_mode(&mut self, mode: u32) -> &mut Self {
        self.mode = Some(mode);
        self
    }

    pub fn set_meta(&mut self, meta: JsonObject) -> &mut Self {
        self.meta = Some(meta);
        self
    }

    /// Serialize the known attributes, leaving unknown ones out
    pub fn to_json(&self) -> JsonObject {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => JsonObject::new(),
        }
    }
}

/// Decode a metadata blob into a typed structure. Fields of the blob that
///  `T` does not name are ignored; fields `T` requires must be present.
pub fn decode_metadata<T: DeserializeOwned>(meta: &JsonObject) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::Value::Object(meta.clone()))
}
