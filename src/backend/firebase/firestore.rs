use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use super::FirebaseBackend;
use crate::backend::{BackendError, Document, DocumentStore, Fields};

const LIST_PAGE_SIZE: &str = "300";

impl FirebaseBackend {
    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.firestore_base, collection)
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.firestore_base, collection, id)
    }
}

#[async_trait]
impl DocumentStore for FirebaseBackend {
    #[instrument(skip(self))]
    async fn list(&self, collection: &str) -> Result<Vec<Document>, BackendError> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.collection_url(collection))
                .query(&[("pageSize", LIST_PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page = self.execute(request).await?;
            if let Some(entries) = page.get("documents").and_then(Value::as_array) {
                for entry in entries {
                    documents.push(decode_document(entry)?);
                }
            }

            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|token| !token.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }

        debug!(count = documents.len(), "Listed documents");
        Ok(documents)
    }

    #[instrument(skip(self))]
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, BackendError> {
        match self.execute(self.client.get(self.document_url(collection, id))).await {
            Ok(value) => decode_document(&value).map(Some),
            Err(BackendError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, value))]
    async fn query_eq(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Document>, BackendError> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field },
                        "op": "EQUAL",
                        "value": encode_value(value),
                    }
                }
            }
        });

        let url = format!("{}:runQuery", self.firestore_base);
        let results = self.execute(self.client.post(url).json(&body)).await?;

        // One entry per match; entries without `document` only carry a read time
        results
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.get("document"))
                    .map(decode_document)
                    .collect()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    #[instrument(skip(self, fields))]
    async fn insert(&self, collection: &str, fields: Fields) -> Result<String, BackendError> {
        let body = json!({ "fields": encode_fields(&fields) });
        let created = self
            .execute(self.client.post(self.collection_url(collection)).json(&body))
            .await?;

        let document = decode_document(&created)?;
        debug!(id = %document.id, "Created document");
        Ok(document.id)
    }

    #[instrument(skip(self, fields))]
    async fn put(&self, collection: &str, id: &str, fields: Fields) -> Result<(), BackendError> {
        let body = json!({ "fields": encode_fields(&fields) });
        self.execute(self.client.patch(self.document_url(collection, id)).json(&body))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, fields))]
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), BackendError> {
        let mut params: Vec<(&str, &str)> = fields
            .keys()
            .map(|key| ("updateMask.fieldPaths", key.as_str()))
            .collect();
        params.push(("currentDocument.exists", "true"));

        let body = json!({ "fields": encode_fields(&fields) });
        self.execute(
            self.client
                .patch(self.document_url(collection, id))
                .query(&params)
                .json(&body),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        self.execute(self.client.delete(self.document_url(collection, id)))
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let url = format!("{}:listCollectionIds", self.firestore_base);
        self.execute(self.client.post(url).json(&json!({ "pageSize": 1 })))
            .await?;
        Ok(())
    }
}

/// Turn a Firestore document resource into a `Document`; the id is the last
/// segment of its resource name.
fn decode_document(resource: &Value) -> Result<Document, BackendError> {
    let name = resource
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::InvalidResponse("document without name".to_string()))?;
    let id = name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BackendError::InvalidResponse(format!("malformed document name: {}", name)))?;

    let fields = match resource.get("fields") {
        Some(fields) => decode_fields(fields)?,
        None => Fields::new(),
    };

    Ok(Document {
        id: id.to_string(),
        fields,
    })
}

fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), encode_value(value)))
            .collect(),
    )
}

fn decode_fields(fields: &Value) -> Result<Fields, BackendError> {
    let map = fields
        .as_object()
        .ok_or_else(|| BackendError::InvalidResponse("fields is not an object".to_string()))?;

    map.iter()
        .map(|(key, value)| Ok((key.clone(), decode_value(value)?)))
        .collect()
}

/// Plain JSON to Firestore's typed value representation
fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // Integers travel as strings
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

fn decode_value(value: &Value) -> Result<Value, BackendError> {
    let (kind, inner) = value
        .as_object()
        .and_then(|map| map.iter().next())
        .ok_or_else(|| BackendError::InvalidResponse(format!("untyped value: {}", value)))?;

    let decoded = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" | "doubleValue" => inner.clone(),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            parsed
                .map(Value::from)
                .ok_or_else(|| BackendError::InvalidResponse(format!("bad integer: {}", inner)))?
        }
        "arrayValue" => {
            let items = match inner.get("values").and_then(Value::as_array) {
                Some(values) => values.iter().map(decode_value).collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            Value::Array(items)
        }
        "mapValue" => match inner.get("fields") {
            Some(fields) => Value::Object(decode_fields(fields)?),
            None => Value::Object(Map::new()),
        },
        "geoPointValue" => inner.clone(),
        other => {
            return Err(BackendError::InvalidResponse(format!("unknown value type: {}", other)));
        }
    };

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::firebase::test_support::backend_for;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOCS: &str = "/v1/projects/demo/databases/(default)/documents";

    fn resource(id: &str, name: &str, email: &str) -> Value {
        json!({
            "name": format!("projects/demo/databases/(default)/documents/users/{}", id),
            "fields": {
                "name": { "stringValue": name },
                "email": { "stringValue": email },
                "role": { "stringValue": "regular" }
            },
            "createTime": "2024-01-01T00:00:00Z",
            "updateTime": "2024-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_value_codec_covers_nested_types() {
        let plain = json!({
            "name": "Ana",
            "age": 31,
            "score": 4.5,
            "active": true,
            "avatar": null,
            "tags": ["a", "b"],
            "address": { "city": "Lima" }
        });
        let encoded = encode_fields(plain.as_object().unwrap());

        assert_eq!(encoded["age"], json!({ "integerValue": "31" }));
        assert_eq!(encoded["avatar"], json!({ "nullValue": null }));
        assert_eq!(encoded["address"]["mapValue"]["fields"]["city"], json!({ "stringValue": "Lima" }));

        let decoded = decode_fields(&encoded).unwrap();
        assert_eq!(Value::Object(decoded), plain);
    }

    #[test]
    fn test_decode_timestamp_as_string() {
        let decoded = decode_value(&json!({ "timestampValue": "2024-05-01T10:00:00Z" })).unwrap();
        assert_eq!(decoded, json!("2024-05-01T10:00:00Z"));
        assert!(decode_value(&json!({ "mysteryValue": 1 })).is_err());
    }

    #[tokio::test]
    async fn test_list_follows_page_tokens() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/users", DOCS)))
            .and(query_param("pageToken", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "documents": [resource("b", "Luis", "luis@x.com")]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/users", DOCS)))
            .and(query_param("key", "test-key"))
            .and(header("authorization", "Bearer service-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "documents": [resource("a", "Ana", "ana@x.com")],
                "nextPageToken": "next"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let documents = backend_for(&server).list("users").await.unwrap();
        let ids: Vec<_> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(documents[0].fields["email"], "ana@x.com");
    }

    #[tokio::test]
    async fn test_empty_collection_lists_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/users", DOCS)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        assert!(backend_for(&server).list("users").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_document_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/users/missing", DOCS)))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": 404, "message": "Document not found", "status": "NOT_FOUND" }
            })))
            .mount(&server)
            .await;

        assert!(backend_for(&server).get("users", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_returns_generated_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/users", DOCS)))
            .and(body_json(json!({
                "fields": { "name": { "stringValue": "Ana" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(resource("gen123", "Ana", "")))
            .mount(&server)
            .await;

        let mut fields = Fields::new();
        fields.insert("name".to_string(), json!("Ana"));
        let id = backend_for(&server).insert("users", fields).await.unwrap();
        assert_eq!(id, "gen123");
    }

    #[tokio::test]
    async fn test_update_sends_field_mask_and_precondition() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{}/users/a", DOCS)))
            .and(query_param("updateMask.fieldPaths", "name"))
            .and(query_param("currentDocument.exists", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(resource("a", "Ana María", "ana@x.com")))
            .expect(1)
            .mount(&server)
            .await;

        let mut fields = Fields::new();
        fields.insert("name".to_string(), json!("Ana María"));
        backend_for(&server).update("users", "a", fields).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{}/users/gone", DOCS)))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": 404, "message": "No document to update", "status": "NOT_FOUND" }
            })))
            .mount(&server)
            .await;

        let error = backend_for(&server)
            .update("users", "gone", Fields::new())
            .await
            .unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_query_eq_skips_read_time_entries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:runQuery", DOCS)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "document": resource("a", "Ana", "ana@x.com"), "readTime": "2024-01-01T00:00:00Z" },
                { "readTime": "2024-01-01T00:00:00Z" }
            ])))
            .mount(&server)
            .await;

        let found = backend_for(&server)
            .query_eq("users", "email", &json!("ana@x.com"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
    }

    #[tokio::test]
    async fn test_server_errors_map_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("{}/users/a", DOCS)))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let error = backend_for(&server).delete("users", "a").await.unwrap_err();
        assert!(matches!(error, BackendError::Unavailable(_)));
    }
}
