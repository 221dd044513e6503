//! ABOUTME: MongoDB wire protocol pool - find/count/aggregate over BSON documents
//! ABOUTME: Extended-JSON `$oid` markers are normalized to native ObjectId before the call goes out

use orbit_core::GatewayError;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MongoQueryType {
    Find,
    Count,
    Aggregate,
}

pub struct MongoClient {
    name: String,
    client: mongodb::Client,
    database: String,
}

impl MongoClient {
    pub async fn connect(name: impl Into<String>, uri: &str, database: impl Into<String>) -> Result<Self, GatewayError> {
        let client = mongodb::Client::with_uri_str(uri)
            .await
            .map_err(|e| GatewayError::backend("mongo", e.to_string()))?;
        Ok(Self { name: name.into(), client, database: database.into() })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn find(
        &self,
        collection: &str,
        filter: bson::Document,
        projection: Option<bson::Document>,
        sort: Option<bson::Document>,
        limit: Option<i64>,
        skip: Option<i64>,
        max_limit: i64,
    ) -> Result<Vec<Value>, GatewayError> {
        let coll: mongodb::Collection<bson::Document> =
            self.client.database(&self.database).collection(collection);

        let mut options = mongodb::options::FindOptions::default();
        options.projection = projection;
        options.sort = sort;
        options.limit = Some(limit.unwrap_or(max_limit).min(max_limit));
        options.skip = skip.map(|s| s.max(0) as u64);

        let mut cursor = coll
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| GatewayError::backend(&self.name, e.to_string()))?;

        use futures::stream::TryStreamExt;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(|e| GatewayError::backend(&self.name, e.to_string()))? {
            out.push(document_to_json(doc));
        }
        Ok(out)
    }

    pub async fn count(&self, collection: &str, filter: bson::Document) -> Result<i64, GatewayError> {
        let coll: mongodb::Collection<bson::Document> =
            self.client.database(&self.database).collection(collection);
        let count = coll
            .count_documents(filter)
            .await
            .map_err(|e| GatewayError::backend(&self.name, e.to_string()))?;
        Ok(count as i64)
    }

    pub async fn aggregate(&self, collection: &str, pipeline: Vec<bson::Document>) -> Result<Vec<Value>, GatewayError> {
        let coll: mongodb::Collection<bson::Document> =
            self.client.database(&self.database).collection(collection);
        let mut cursor = coll
            .aggregate(pipeline)
            .await
            .map_err(|e| GatewayError::backend(&self.name, e.to_string()))?;

        use futures::stream::TryStreamExt;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(|e| GatewayError::backend(&self.name, e.to_string()))? {
            out.push(document_to_json(doc));
        }
        Ok(out)
    }

    pub async fn health_check(&self) -> Result<(), GatewayError> {
        self.client
            .database(&self.database)
            .run_command(bson::doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| GatewayError::backend(&self.name, e.to_string()))
    }
}

/// Converts extended-JSON `{"$oid": "..."}` markers anywhere in `value`
/// into native `bson::oid::ObjectId`s before the filter/pipeline is sent.
#[must_use]
pub fn normalize_extended_json(value: &Value) -> bson::Bson {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(hex)) = map.get("$oid") {
                    if let Ok(oid) = bson::oid::ObjectId::parse_str(hex) {
                        return bson::Bson::ObjectId(oid);
                    }
                }
            }
            let mut doc = bson::Document::new();
            for (k, v) in map {
                doc.insert(k.clone(), normalize_extended_json(v));
            }
            bson::Bson::Document(doc)
        }
        Value::Array(items) => bson::Bson::Array(items.iter().map(normalize_extended_json).collect()),
        Value::String(s) => bson::Bson::String(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                bson::Bson::Int64(i)
            } else {
                bson::Bson::Double(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::Bool(b) => bson::Bson::Boolean(*b),
        Value::Null => bson::Bson::Null,
    }
}

/// JSON value -> BSON document, for a JSON object specifically (filters,
/// projections, sort specs are always objects at the top level).
pub fn json_to_document(value: &Value) -> bson::Document {
    match normalize_extended_json(value) {
        bson::Bson::Document(doc) => doc,
        _ => bson::Document::new(),
    }
}

/// Normalizes a `sort` value from either accepted shape -
/// `[{field: direction}, ...]` or `[(field, direction), ...]` - into the
/// driver's single document form.
#[must_use]
pub fn normalize_sort(value: &Value) -> Option<bson::Document> {
    let array = value.as_array()?;
    let mut doc = bson::Document::new();
    for entry in array {
        match entry {
            Value::Object(map) => {
                for (field, dir) in map {
                    doc.insert(field.clone(), dir.as_i64().unwrap_or(1));
                }
            }
            Value::Array(pair) if pair.len() == 2 => {
                if let Some(field) = pair[0].as_str() {
                    doc.insert(field.to_string(), pair[1].as_i64().unwrap_or(1));
                }
            }
            _ => {}
        }
    }
    Some(doc)
}

fn document_to_json(doc: bson::Document) -> Value {
    bson_to_json(bson::Bson::Document(doc))
}

fn bson_to_json(value: bson::Bson) -> Value {
    match value {
        bson::Bson::Double(d) => serde_json::Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null),
        bson::Bson::String(s) => Value::String(s),
        bson::Bson::Array(arr) => Value::Array(arr.into_iter().map(bson_to_json).collect()),
        bson::Bson::Document(doc) => {
            let mut map = serde_json::Map::new();
            for (k, v) in doc {
                map.insert(k, bson_to_json(v));
            }
            Value::Object(map)
        }
        bson::Bson::Boolean(b) => Value::Bool(b),
        bson::Bson::Null => Value::Null,
        bson::Bson::Int32(i) => Value::Number(i.into()),
        bson::Bson::Int64(i) => Value::Number(i.into()),
        bson::Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        bson::Bson::DateTime(dt) => Value::String(dt.try_to_rfc3339_string().unwrap_or_default()),
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extended_json_oid_marker_becomes_native_object_id() {
        let oid = bson::oid::ObjectId::new();
        let value = json!({ "_id": { "$oid": oid.to_hex() } });
        let doc = json_to_document(&value);
        assert_eq!(doc.get_object_id("_id").unwrap(), oid);
    }

    #[test]
    fn normalize_sort_accepts_dict_shape() {
        let value = json!([{ "created_at": -1 }]);
        let sort = normalize_sort(&value).unwrap();
        assert_eq!(sort.get_i64("created_at").unwrap(), -1);
    }

    #[test]
    fn normalize_sort_accepts_pair_shape() {
        let value = json!([["created_at", -1]]);
        let sort = normalize_sort(&value).unwrap();
        assert_eq!(sort.get_i64("created_at").unwrap(), -1);
    }
}
