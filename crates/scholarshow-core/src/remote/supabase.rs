//! Supabase (`PostgREST`) document store.
//!
//! Documents live in a single `documents` table keyed by
//! `(collection, id)` with a `jsonb` payload; merges go through the
//! `merge_document` RPC so the server applies `data || patch` and stamps
//! `updated_at`. See `sql/supabase_documents.sql`.

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{DocumentPath, DocumentStore, StoredDocument};
use crate::auth::AccessTokenCell;
use crate::error::{Error, Result};
use crate::util::{compact_text, is_http_url};

/// SQL that provisions the table and RPC this store expects.
pub const SUPABASE_SCHEMA_SQL: &str = include_str!("../../sql/supabase_documents.sql");

#[derive(Clone)]
pub struct SupabaseDocumentStore {
    rest_url: String,
    anon_key: String,
    access_token: AccessTokenCell,
    client: Client,
}

impl SupabaseDocumentStore {
    pub fn new(
        url: impl AsRef<str>,
        anon_key: impl Into<String>,
        access_token: AccessTokenCell,
    ) -> Result<Self> {
        let rest_url = normalize_rest_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(Error::Invalid(
                "Supabase anon key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            rest_url,
            anon_key,
            access_token,
            client: Client::builder().build()?,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .access_token
            .get()
            .unwrap_or_else(|| self.anon_key.clone());
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .header("Accept", "application/json")
    }

    fn path_filters(path: &DocumentPath) -> [(&'static str, String); 2] {
        [
            ("collection", format!("eq.{}", path.collection)),
            ("id", format!("eq.{}", path.id)),
        ]
    }
}

impl DocumentStore for SupabaseDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<StoredDocument>> {
        let response = self
            .authorized(self.client.get(format!("{}/documents", self.rest_url)))
            .query(&Self::path_filters(path))
            .query(&[("select", "data,created_at,updated_at")])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response, path).await?;

        let mut rows = response.json::<Vec<DocumentRow>>().await?;
        let Some(row) = rows.pop() else {
            return Ok(None);
        };

        let fields = match row.data {
            Value::Object(fields) => fields,
            other => {
                tracing::warn!("Document {} has a non-object payload: {}", path, other);
                Map::new()
            }
        };

        Ok(Some(StoredDocument {
            path: path.clone(),
            fields,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn merge(&self, path: &DocumentPath, fields: Map<String, Value>) -> Result<()> {
        let payload = serde_json::json!({
            "p_collection": path.collection,
            "p_id": path.id,
            "p_patch": Value::Object(fields),
        });
        let response = self
            .authorized(
                self.client
                    .post(format!("{}/rpc/merge_document", self.rest_url))
                    .json(&payload),
            )
            .send()
            .await?;
        check_status(response, path).await?;
        Ok(())
    }

    async fn create(&self, collection: &str, fields: Map<String, Value>) -> Result<String> {
        let id = Uuid::now_v7().simple().to_string();
        let path = DocumentPath::new(collection, id.clone());
        let payload = serde_json::json!({
            "collection": collection,
            "id": id,
            "data": Value::Object(fields),
        });
        let response = self
            .authorized(
                self.client
                    .post(format!("{}/documents", self.rest_url))
                    .header("Prefer", "return=minimal")
                    .json(&payload),
            )
            .send()
            .await?;
        check_status(response, &path).await?;
        Ok(id)
    }

    async fn delete(&self, path: &DocumentPath) -> Result<()> {
        let response = self
            .authorized(self.client.delete(format!("{}/documents", self.rest_url)))
            .query(&Self::path_filters(path))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response, path).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DocumentRow {
    data: Value,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
    hint: Option<String>,
}

async fn check_status(response: Response, path: &DocumentPath) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = parse_api_error(status, &body);
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::PermissionDenied(format!("Access to {path} was denied: {message}"))
        }
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            Error::Unavailable(message)
        }
        _ => Error::Remote(format!("{path}: {message}")),
    })
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.hint) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

/// Normalize a Supabase project URL into its REST endpoint.
pub fn normalize_rest_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Invalid("Supabase URL must not be empty".to_string()));
    }
    if !is_http_url(trimmed) {
        return Err(Error::Invalid(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    }
    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}
