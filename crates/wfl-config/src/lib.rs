//! Layered YAML configuration for the fulfillment ledger.
//!
//! Config is assembled from an ordered list of YAML documents (base first,
//! overrides later). The merged document is canonicalized to JSON and hashed
//! so two operators can compare effective configs by a single hex string.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// Environment override for the ledger database URL. Wins over any value in
/// the YAML layers.
pub const ENV_DB_URL: &str = "WFL_DATABASE_URL";

const DEFAULT_DB_URL: &str = "sqlite://wfl.db";
const DEFAULT_POLL_INTERVAL_MS: u64 = 650;
const DEFAULT_COLLAB_TIMEOUT_MS: u64 = 10_000;

/// Effective configuration after layering, env overrides, and defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WflConfig {
    pub database_url: String,
    /// Account / owner the collaborator session acts as.
    pub owner_id: Option<String>,
    pub poll_interval_ms: u64,
    pub collaborator_timeout_ms: u64,
}

impl WflConfig {
    /// Tick interval for the banner poller. Embedding applications pass this
    /// into the poller's config; the operator CLI has no long-running
    /// session of its own.
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    /// Upper bound on one collaborator call, for the session and poller.
    pub fn collaborator_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.collaborator_timeout_ms)
    }
}

impl Default for WflConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DB_URL.to_string(),
            owner_id: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            collaborator_timeout_ms: DEFAULT_COLLAB_TIMEOUT_MS,
        }
    }
}

/// Raw (all-optional) shape of the merged YAML document. Missing fields fall
/// back to [`WflConfig::default`].
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    database_url: Option<String>,
    owner_id: Option<String>,
    poll_interval_ms: Option<u64>,
    collaborator_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config: WflConfig,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    // Merge YAML docs in order: earlier docs are base, later docs override.
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    let raw: RawConfig =
        serde_json::from_value(merged.clone()).context("config shape invalid")?;
    let defaults = WflConfig::default();
    let mut config = WflConfig {
        database_url: raw.database_url.unwrap_or(defaults.database_url),
        owner_id: raw.owner_id,
        poll_interval_ms: raw.poll_interval_ms.unwrap_or(defaults.poll_interval_ms),
        collaborator_timeout_ms: raw
            .collaborator_timeout_ms
            .unwrap_or(defaults.collaborator_timeout_ms),
    };

    if let Ok(url) = std::env::var(ENV_DB_URL) {
        if !url.trim().is_empty() {
            tracing::debug!(env = ENV_DB_URL, "database url overridden from environment");
            config.database_url = url;
        }
    }

    // The hash covers the merged document, not the env override, so the same
    // files hash identically on every machine.
    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).context("canonical json serialize failed")
}

// serde_json::Map preserves insertion order; sort keys explicitly so layer
// ordering cannot change the hash of an equivalent document.
fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), sort_keys(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
