//! Configuration management for dynip.
//!
//! Settings are layered, later layers winning: built-in defaults, a TOML file,
//! an optional `local.settings.json` (`Values` object), then environment
//! variables. The last two use the application-setting key names
//! (`DynamicDnsDomain`, `DnsZoneNames`, ...).

use crate::error::{Error, Result};
use crate::providers::ZoneRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default cadence: every 30 seconds.
pub const DEFAULT_SCHEDULE: &str = "*/30 * * * * *";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Hostname whose address is published in every managed zone.
    #[serde(default)]
    pub dynamic_dns_domain: String,

    /// Resource group holding the DNS zones.
    #[serde(default)]
    pub resource_group_name: String,

    /// Managed DNS zones, processed in order.
    #[serde(default)]
    pub dns_zone_names: Vec<String>,

    /// A record set name inside each zone (e.g. "home" or "@").
    #[serde(default)]
    pub record_set_name: String,

    /// Azure subscription id.
    #[serde(default)]
    pub subscription_id: String,

    /// Azure AD tenant id.
    #[serde(default)]
    pub tenant_id: String,

    /// Service principal (application) id.
    #[serde(default)]
    pub client_id: String,

    /// Service principal secret (or environment variable name if prefixed with $).
    #[serde(default)]
    pub client_secret: String,

    /// Six-field cron expression (seconds first) for the timer trigger.
    #[serde(default = "default_schedule")]
    pub schedule_expression: String,

    /// Azure Resource Manager endpoint.
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,

    /// Azure AD authority host.
    #[serde(default = "default_authority_host")]
    pub authority_host: String,

    /// DNS management API version.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_schedule() -> String {
    DEFAULT_SCHEDULE.to_string()
}

fn default_management_endpoint() -> String {
    "https://management.azure.com".to_string()
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_api_version() -> String {
    "2018-05-01".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dynamic_dns_domain: String::new(),
            resource_group_name: String::new(),
            dns_zone_names: Vec::new(),
            record_set_name: String::new(),
            subscription_id: String::new(),
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            schedule_expression: default_schedule(),
            management_endpoint: default_management_endpoint(),
            authority_host: default_authority_host(),
            api_version: default_api_version(),
        }
    }
}

/// Azure Functions style settings file.
#[derive(Debug, Deserialize)]
struct LocalSettings {
    #[serde(rename = "Values", default)]
    values: HashMap<String, serde_json::Value>,
}

impl Config {
    /// Load configuration from a specific path.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Overlay the `Values` of a `local.settings.json` file.
    pub fn with_local_settings(mut self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: LocalSettings = serde_json::from_str(&content)?;

        let values: HashMap<String, String> = settings
            .values
            .into_iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect();

        self.apply_settings(|key| values.get(key).cloned());
        Ok(self)
    }

    /// Overlay process environment variables.
    pub fn with_environment(mut self) -> Self {
        self.apply_settings(|key| std::env::var(key).ok());
        self
    }

    /// Overlay settings from a key lookup. Blank values are treated as unset.
    pub fn apply_settings<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DynamicDnsDomain") {
            self.dynamic_dns_domain = v.trim().to_string();
        }
        if let Some(v) = get("ResourceGroupName") {
            self.resource_group_name = v.trim().to_string();
        }
        // Single-zone deployments only set DnsZoneName.
        if let Some(v) = get("DnsZoneNames").or_else(|| get("DnsZoneName")) {
            self.dns_zone_names = parse_zone_names(&v);
        }
        if let Some(v) = get("RecordSetName") {
            self.record_set_name = v.trim().to_string();
        }
        if let Some(v) = get("SubscriptionId").or_else(|| get("SubscriptoinId")) {
            self.subscription_id = v.trim().to_string();
        }
        if let Some(v) = get("TenantId") {
            self.tenant_id = v.trim().to_string();
        }
        if let Some(v) = get("ClientId") {
            self.client_id = v.trim().to_string();
        }
        if let Some(v) = get("Secret") {
            self.client_secret = v;
        }
        if let Some(v) = get("ScheduleExpression") {
            self.schedule_expression = v.trim().to_string();
        }
    }

    /// Check that every required setting is present.
    ///
    /// All missing settings are reported in one error.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("DynamicDnsDomain", self.dynamic_dns_domain.is_empty()),
            ("ResourceGroupName", self.resource_group_name.is_empty()),
            ("DnsZoneNames", self.dns_zone_names.is_empty()),
            ("RecordSetName", self.record_set_name.is_empty()),
            ("SubscriptionId", self.subscription_id.is_empty()),
            ("TenantId", self.tenant_id.is_empty()),
            ("ClientId", self.client_id.is_empty()),
            ("Secret", self.client_secret.is_empty()),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, is_missing)| *is_missing)
            .map(|(key, _)| *key)
            .collect();

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        Ok(())
    }

    /// Zone references for every configured zone name.
    pub fn zone_refs(&self) -> Vec<ZoneRef> {
        self.dns_zone_names
            .iter()
            .map(|zone| ZoneRef {
                subscription_id: self.subscription_id.clone(),
                resource_group: self.resource_group_name.clone(),
                zone_name: zone.clone(),
            })
            .collect()
    }

    /// The client secret with `$VAR` references resolved.
    pub fn resolved_client_secret(&self) -> String {
        resolve_env(&self.client_secret)
    }

    /// Generate example configuration.
    pub fn example() -> Self {
        Self {
            dynamic_dns_domain: "myhome.dyndns.example.net".to_string(),
            resource_group_name: "dns-rg".to_string(),
            dns_zone_names: vec!["example.com".to_string(), "example.org".to_string()],
            record_set_name: "home".to_string(),
            subscription_id: "00000000-0000-0000-0000-000000000000".to_string(),
            tenant_id: "your-tenant-id".to_string(),
            client_id: "your-client-id".to_string(),
            client_secret: "$DYNIP_CLIENT_SECRET".to_string(),
            ..Self::default()
        }
    }
}

/// Split a comma-separated zone list, dropping blanks.
pub fn parse_zone_names(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|zone| !zone.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve environment variable references (values starting with $).
fn resolve_env(value: &str) -> String {
    if let Some(var_name) = value.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| {
            tracing::warn!("Environment variable {} not set", var_name);
            value.to_string()
        })
    } else {
        value.to_string()
    }
}
