//! Deterministic pod template checksums
//!
//! Two template instances must produce the same checksum across process
//! restarts and toolchain upgrades, so the hash runs over a canonical JSON
//! rendering (recursively sorted object keys) rather than over struct
//! serialization order, and uses SHA-256 rather than `DefaultHasher`.

use std::fmt::Write;

use aws_lc_rs::digest;
use k8s_openapi::api::core::v1::{Affinity, PodTemplateSpec};
use serde::Serialize;
use serde_json::Value;

use shoal_common::crd::MemberTemplate;
use shoal_common::{Error, Result};

/// Checksum one pod template.
pub fn template_checksum(template: &PodTemplateSpec) -> Result<String> {
    checksum_of(template, "PodTemplateSpec")
}

/// Checksum a pod's affinity stanza; `None` hashes as JSON null, so an
/// absent affinity is distinguishable from an empty one.
pub fn affinity_checksum(affinity: Option<&Affinity>) -> Result<String> {
    checksum_of(&affinity, "Affinity")
}

/// Build a checksummed template from a pod template.
pub fn new_template(pod_template: PodTemplateSpec) -> Result<MemberTemplate> {
    let checksum = template_checksum(&pod_template)?;
    Ok(MemberTemplate {
        pod_template,
        checksum,
    })
}

fn checksum_of<T: Serialize>(value: &T, kind: &str) -> Result<String> {
    let value = serde_json::to_value(value)
        .map_err(|e| Error::serialization_for_kind(kind, e.to_string()))?;
    let mut canonical = String::new();
    write_canonical(&value, &mut canonical)
        .map_err(|e| Error::serialization_for_kind(kind, e.to_string()))?;
    let hash = digest::digest(&digest::SHA256, canonical.as_bytes());
    Ok(hash
        .as_ref()
        .iter()
        .fold(String::with_capacity(64), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        }))
}

fn write_canonical(value: &Value, out: &mut String) -> serde_json::Result<()> {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[*key], out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        leaf => out.push_str(&serde_json::to_string(leaf)?),
    }
    Ok(())
}
