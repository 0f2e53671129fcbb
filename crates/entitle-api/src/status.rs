// Status queries and the per-product status aggregation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::{Auth, RegistrationClient};
use crate::error::Error;
use crate::models::{Activation, Product};

/// Registration state of one installed product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationStatus {
    #[serde(rename = "Registered")]
    Registered,
    #[serde(rename = "Not Registered")]
    NotRegistered,
}

/// One row of the status report: an installed product joined against its
/// server-side activation, if any.
#[derive(Debug, Clone, Serialize)]
pub struct ProductStatus {
    pub identifier: String,
    pub version: String,
    pub arch: String,
    pub status: RegistrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl RegistrationClient {
    /// All activation records the server holds for this system.
    pub async fn system_activations(&self) -> Result<Vec<Activation>, Error> {
        self.get("/connect/systems/activations", &[], Auth::System)
            .await
    }

    /// The products currently activated for this system.
    pub async fn activated_products(&self) -> Result<Vec<Product>, Error> {
        let activations = self.system_activations().await?;
        Ok(activations
            .into_iter()
            .map(|activation| activation.service.product)
            .collect())
    }

    /// Join a caller-supplied installed-product list against the server's
    /// activation records.
    ///
    /// An unregistered system (missing credentials) is not an error here:
    /// every product simply reports `NotRegistered`.
    pub async fn product_statuses(
        &self,
        installed: &[Product],
    ) -> Result<Vec<ProductStatus>, Error> {
        let activations = match self.system_activations().await {
            Ok(activations) => activations,
            Err(Error::MissingCredentialsFile { .. }) => Vec::new(),
            Err(err) => return Err(err),
        };

        let by_triplet: HashMap<String, Activation> = activations
            .into_iter()
            .map(|activation| (activation.triplet(), activation))
            .collect();

        Ok(installed
            .iter()
            .map(|product| build_status(product, by_triplet.get(&product.triplet())))
            .collect())
    }
}

fn build_status(product: &Product, activation: Option<&Activation>) -> ProductStatus {
    let mut status = ProductStatus {
        identifier: product.identifier.clone(),
        version: product.version.clone(),
        arch: product.arch.clone(),
        status: RegistrationStatus::NotRegistered,
        name: None,
        regcode: None,
        starts_at: None,
        expires_at: None,
    };
    if let Some(activation) = activation {
        status.status = RegistrationStatus::Registered;
        if activation.regcode.is_some() {
            status.name = Some(activation.name.clone());
            status.regcode = activation.regcode.clone();
            status.starts_at = activation.starts_at;
            status.expires_at = activation.expires_at;
        }
    }
    status
}

#[cfg(test)]
mod tests {
    use crate::models::Service;

    use super::*;

    fn activation(triplet: (&str, &str, &str), regcode: Option<&str>) -> Activation {
        Activation {
            name: "SUSE Tests".into(),
            status: "ACTIVE".into(),
            regcode: regcode.map(str::to_owned),
            kind: None,
            starts_at: None,
            expires_at: None,
            service: Service {
                id: 42,
                name: "Service_42".into(),
                url: "https://updates.example.com/service/42".into(),
                product: Product::new(triplet.0, triplet.1, triplet.2),
                obsoleted_service_name: None,
            },
        }
    }

    #[test]
    fn activated_product_reports_registered() {
        let product = Product::new("SLES", "15.6", "x86_64");
        let activation = activation(("SLES", "15.6", "x86_64"), Some("REG-123"));

        let status = build_status(&product, Some(&activation));
        assert_eq!(status.status, RegistrationStatus::Registered);
        assert_eq!(status.regcode.as_deref(), Some("REG-123"));
        assert_eq!(status.name.as_deref(), Some("SUSE Tests"));
    }

    #[test]
    fn free_activation_omits_subscription_details() {
        let product = Product::new("sle-module-basesystem", "15.6", "x86_64");
        let activation = activation(("sle-module-basesystem", "15.6", "x86_64"), None);

        let status = build_status(&product, Some(&activation));
        assert_eq!(status.status, RegistrationStatus::Registered);
        assert!(status.regcode.is_none());
        assert!(status.name.is_none());
    }

    #[test]
    fn unactivated_product_reports_not_registered() {
        let product = Product::new("sle-ha", "15.6", "x86_64");
        let status = build_status(&product, None);
        assert_eq!(status.status, RegistrationStatus::NotRegistered);
    }
}
