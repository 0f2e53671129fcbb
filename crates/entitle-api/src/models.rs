// Wire models for the /connect API.
//
// Field names follow the server's JSON; optional decorations default so the
// same structs cover both the minimal payloads sent by this client and the
// fully annotated objects the server returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registerable unit identified by the identifier/version/arch triple.
///
/// The server decorates products it returns with availability and the
/// extension tree; those fields are ignored when a product is used as a
/// request parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Product {
    pub identifier: String,
    pub version: String,
    pub arch: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// Free products activate without a regcode.
    #[serde(default)]
    pub free: bool,

    /// Only proxy servers (RMT/SMT) send this; the upstream server omits it
    /// and omission means available.
    #[serde(default = "default_true")]
    pub available: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Product>,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// Build a product from its triplet parts.
    pub fn new(identifier: &str, version: &str, arch: &str) -> Self {
        Self {
            identifier: identifier.to_owned(),
            version: version.to_owned(),
            arch: arch.to_owned(),
            ..Self::default()
        }
    }

    /// The `identifier/version/arch` triple; product equality is defined
    /// over this key.
    pub fn triplet(&self) -> String {
        format!("{}/{}/{}", self.identifier, self.version, self.arch)
    }

    /// Query-string parameters for GET endpoints taking a product.
    pub(crate) fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("identifier", self.identifier.clone()),
            ("version", self.version.clone()),
            ("arch", self.arch.clone()),
        ];
        if let Some(release_type) = &self.release_type {
            query.push(("release_type", release_type.clone()));
        }
        query
    }

    /// Flatten the extension tree depth-first.
    pub fn extensions_list(&self) -> Vec<&Product> {
        let mut list = Vec::new();
        for ext in &self.extensions {
            list.push(ext);
            list.extend(ext.extensions_list());
        }
        list
    }
}

impl PartialEq for Product {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
            && self.version == other.version
            && self.arch == other.arch
    }
}

impl Eq for Product {}

/// Result of activating a product: the repository service to consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub product: Product,
    /// Name of the service this activation replaces, if any. Set during
    /// product migrations so the caller can retire the old service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obsoleted_service_name: Option<String>,
}

/// A server-side activation record binding a product to the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regcode: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub service: Service,
}

impl Activation {
    /// Triplet of the activated product, for joining against installed
    /// product lists.
    pub fn triplet(&self) -> String {
        self.service.product.triplet()
    }
}

/// An ordered sequence of products forming one valid migration target.
pub type MigrationPath = Vec<Product>;

/// A repository entry from the installer-updates endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub autorefresh: bool,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
}

/// System metadata sent on announce and update calls.
///
/// The caller supplies this as structured data; the client does not collect
/// hardware information itself.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distro_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Raw cloud instance data, passed through verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_data: Option<String>,
    /// Hardware details as an opaque JSON object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hwinfo: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_equality_is_the_triplet() {
        let mut a = Product::new("SLES", "15.6", "x86_64");
        let b = Product::new("SLES", "15.6", "x86_64");
        a.friendly_name = Some("SUSE Linux Enterprise Server 15 SP6".into());
        a.free = true;
        assert_eq!(a, b);
        assert_ne!(a, Product::new("SLES", "15.5", "x86_64"));
    }

    #[test]
    fn available_defaults_to_true_when_omitted() {
        let product: Product =
            serde_json::from_str(r#"{"identifier": "sle-ha", "version": "15.6", "arch": "x86_64"}"#)
                .expect("decode");
        assert!(product.available);

        let unavailable: Product = serde_json::from_str(
            r#"{"identifier": "sle-ha", "version": "15.6", "arch": "x86_64", "available": false}"#,
        )
        .expect("decode");
        assert!(!unavailable.available);
    }

    #[test]
    fn extensions_flatten_depth_first() {
        let tree: Product = serde_json::from_value(serde_json::json!({
            "identifier": "SLES", "version": "15.6", "arch": "x86_64",
            "extensions": [
                {
                    "identifier": "sle-module-basesystem", "version": "15.6", "arch": "x86_64",
                    "extensions": [
                        {"identifier": "sle-module-desktop", "version": "15.6", "arch": "x86_64"}
                    ]
                },
                {"identifier": "sle-ha", "version": "15.6", "arch": "x86_64"}
            ]
        }))
        .expect("decode");

        let flat: Vec<_> = tree.extensions_list().iter().map(|p| p.identifier.clone()).collect();
        assert_eq!(
            flat,
            ["sle-module-basesystem", "sle-module-desktop", "sle-ha"]
        );
    }
}
