//! Azure DNS record set accessor.

use super::{ARecord, ClientSecretCredential, ETag, RecordSet, ZoneRecordAccessor, ZoneRef};
use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Azure Resource Manager accessor for A record sets.
#[derive(Debug)]
pub struct AzureDnsAccessor {
    client: reqwest::Client,
    credential: ClientSecretCredential,
    base_url: String,
    api_version: String,
}

#[derive(Debug, Deserialize)]
struct RecordSetResource {
    name: String,
    #[serde(default)]
    etag: Option<String>,
    #[serde(default)]
    properties: RecordSetProperties,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordSetProperties {
    #[serde(rename = "TTL", default, skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    #[serde(default, skip_serializing)]
    fqdn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<HashMap<String, String>>,
    #[serde(rename = "ARecords", default)]
    a_records: Vec<ARecord>,
}

#[derive(Debug, Serialize)]
struct RecordSetUpdate<'a> {
    properties: &'a RecordSetProperties,
}

impl AzureDnsAccessor {
    /// Create a new accessor against `base_url` (the Resource Manager endpoint).
    pub fn new(
        credential: ClientSecretCredential,
        base_url: String,
        api_version: String,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            credential,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version,
        })
    }

    /// Accessor for the Resource Manager endpoint named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            ClientSecretCredential::from_config(config)?,
            config.management_endpoint.clone(),
            config.api_version.clone(),
        )
    }

    /// The credential used to authorize requests.
    pub fn credential(&self) -> &ClientSecretCredential {
        &self.credential
    }

    fn record_set_url(&self, zone: &ZoneRef, record_name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/dnsZones/{}/A/{}",
            self.base_url, zone.subscription_id, zone.resource_group, zone.zone_name, record_name
        )
    }

    /// Parse a record set response, or map the failure status to an error.
    async fn read_record_set(
        &self,
        response: reqwest::Response,
        zone: &ZoneRef,
        record_name: &str,
        etag: Option<&ETag>,
    ) -> Result<RecordSet> {
        let status = response.status();

        if status.is_success() {
            let header_etag = response
                .headers()
                .get(reqwest::header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let resource: RecordSetResource = response.json().await?;
            let etag = resource.etag.or(header_etag).ok_or_else(|| {
                Error::Serialization(format!(
                    "record set {} in zone {} was returned without an etag",
                    record_name, zone.zone_name
                ))
            })?;

            return Ok(RecordSet {
                name: resource.name,
                fqdn: resource.properties.fqdn,
                ttl: resource.properties.ttl,
                metadata: resource.properties.metadata.unwrap_or_default(),
                a_records: resource.properties.a_records,
                etag: ETag(etag),
            });
        }

        if status == StatusCode::UNAUTHORIZED {
            self.credential.invalidate().await;
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = parse_error_body(&body);

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authorization(message),
            StatusCode::NOT_FOUND
                if matches!(
                    code.as_deref(),
                    Some("ParentResourceNotFound") | Some("ResourceGroupNotFound")
                ) =>
            {
                Error::ZoneNotFound {
                    zone: zone.zone_name.clone(),
                }
            }
            StatusCode::NOT_FOUND => Error::RecordSetNotFound {
                zone: zone.zone_name.clone(),
                record: record_name.to_string(),
            },
            StatusCode::PRECONDITION_FAILED => Error::PreconditionFailed {
                zone: zone.zone_name.clone(),
                record: record_name.to_string(),
                etag: etag.map(|e| e.to_string()).unwrap_or_default(),
            },
            other => Error::Provider {
                status: other.as_u16(),
                message,
            },
        })
    }
}

/// Extract `(code, message)` from an ARM error body.
fn parse_error_body(body: &str) -> (Option<String>, String) {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) if body.trim().is_empty() => return (None, "Unknown error".to_string()),
        Err(_) => return (None, body.trim().to_string()),
    };

    let error = value.get("error").unwrap_or(&value);
    let code = error
        .get("code")
        .and_then(|c| c.as_str())
        .map(str::to_string);
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .or_else(|| code.clone())
        .unwrap_or_else(|| "Unknown error".to_string());

    (code, message)
}

#[async_trait]
impl ZoneRecordAccessor for AzureDnsAccessor {
    async fn fetch(&self, zone: &ZoneRef, record_name: &str) -> Result<RecordSet> {
        let token = self.credential.token().await?;
        let url = self.record_set_url(zone, record_name);

        let response = self
            .client
            .get(&url)
            .query(&[("api-version", self.api_version.as_str())])
            .bearer_auth(token)
            .send()
            .await?;

        self.read_record_set(response, zone, record_name, None).await
    }

    async fn update(
        &self,
        zone: &ZoneRef,
        record_name: &str,
        record_set: &RecordSet,
        etag: &ETag,
    ) -> Result<RecordSet> {
        let token = self.credential.token().await?;
        let url = self.record_set_url(zone, record_name);

        let properties = RecordSetProperties {
            ttl: record_set.ttl,
            fqdn: None,
            metadata: if record_set.metadata.is_empty() {
                None
            } else {
                Some(record_set.metadata.clone())
            },
            a_records: record_set.a_records.clone(),
        };

        let response = self
            .client
            .patch(&url)
            .query(&[("api-version", self.api_version.as_str())])
            .bearer_auth(token)
            .header(reqwest::header::IF_MATCH, etag.as_str())
            .json(&RecordSetUpdate {
                properties: &properties,
            })
            .send()
            .await?;

        self.read_record_set(response, zone, record_name, Some(etag))
            .await
    }
}
