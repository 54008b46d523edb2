use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::Collection;

/// A stored record: its collection, its key and its JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEnvelope {
    /// The collection the record lives in.
    pub collection: Collection,

    /// Primary key, unique within the collection.
    pub id: String,

    /// The record itself.
    pub body: serde_json::Value,
}

impl RecordEnvelope {
    /// Creates an envelope from a raw JSON body.
    pub fn new(collection: Collection, id: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            collection,
            id: id.into(),
            body,
        }
    }

    /// Creates an envelope by serializing `record`.
    pub fn from_record<T: Serialize>(
        collection: Collection,
        id: impl Into<String>,
        record: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(collection, id, serde_json::to_value(record)?))
    }

    /// Deserializes the body into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }
}
