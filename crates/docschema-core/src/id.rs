use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Key used by the store-native JSON form of an id: `{"$oid": "<hex>"}`.
pub const OID_KEY: &str = "$oid";

static PROCESS_UNIQUE: LazyLock<[u8; 5]> = LazyLock::new(rand::random);
static COUNTER: LazyLock<AtomicU32> = LazyLock::new(|| AtomicU32::new(rand::random()));

/// Twelve byte document identifier, rendered as 24 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 12]);

/// Error returned when text is not a 24-hex-character id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid object id: {0}")]
pub struct ParseObjectIdError(pub String);

impl ObjectId {
    /// Generate a new id: seconds since epoch, process bytes, then a counter.
    pub fn new() -> Self {
        let seconds = chrono::Utc::now().timestamp() as u32;
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_UNIQUE);
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Parse the 24-hex-character text form.
    pub fn parse_str(text: &str) -> Result<Self, ParseObjectIdError> {
        if text.len() != 24 {
            return Err(ParseObjectIdError(text.to_string()));
        }
        let decoded = hex::decode(text).map_err(|_| ParseObjectIdError(text.to_string()))?;
        let mut bytes = [0u8; 12];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Store-native JSON form.
    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert(OID_KEY.to_string(), Value::String(self.to_hex()));
        Value::Object(map)
    }

    /// Read an id from its store-native JSON form.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        if map.len() != 1 {
            return None;
        }
        map.get(OID_KEY)
            .and_then(Value::as_str)
            .and_then(|hex| Self::parse_str(hex).ok())
    }

    /// Read an id from either the native form or the plain hex string form.
    pub fn from_loose_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Self::parse_str(text.trim()).ok(),
            other => Self::from_value(other),
        }
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = ParseObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        id.to_value()
    }
}

#[derive(Serialize, Deserialize)]
struct NativeId {
    #[serde(rename = "$oid")]
    oid: String,
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NativeId { oid: self.to_hex() }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let native = NativeId::deserialize(deserializer)?;
        Self::parse_str(&native.oid).map_err(serde::de::Error::custom)
    }
}
