// Product lifecycle operations: activate, migrate, deactivate, resolve,
// synchronize.

use reqwest::Method;
use serde::Serialize;

use crate::client::{Auth, RegistrationClient};
use crate::error::Error;
use crate::models::{Product, Service};

#[derive(Serialize)]
struct ActivationRequest<'a> {
    identifier: &'a str,
    version: &'a str,
    arch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    release_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

#[derive(Serialize)]
struct SynchronizeRequest<'a> {
    products: &'a [Product],
}

impl RegistrationClient {
    /// Activate a product, yielding the repository service to consume.
    ///
    /// A regcode is required unless the product is free. Re-activating an
    /// already-active product is idempotent: the server returns the
    /// existing service rather than creating a second activation.
    pub async fn activate_product(
        &self,
        product: &Product,
        regcode: Option<&str>,
        email: Option<&str>,
    ) -> Result<Service, Error> {
        let payload = ActivationRequest {
            identifier: &product.identifier,
            version: &product.version,
            arch: &product.arch,
            release_type: product.release_type.as_deref(),
            token: regcode,
            email,
        };
        self.request(Method::POST, "/connect/systems/products", &payload, Auth::System)
            .await
    }

    /// Migrate an active product to a different version without consuming
    /// a new regcode. Only versions reachable under the original
    /// entitlement are accepted by the server.
    pub async fn upgrade_product(&self, product: &Product) -> Result<Service, Error> {
        self.request(Method::PUT, "/connect/systems/products", product, Auth::System)
            .await
    }

    /// Same operation as [`Self::upgrade_product`]; the direction of the
    /// version change makes no difference on the wire.
    pub async fn downgrade_product(&self, product: &Product) -> Result<Service, Error> {
        self.upgrade_product(product).await
    }

    /// Retire a product activation. Returns the service that should be
    /// removed from the system.
    pub async fn deactivate_product(&self, product: &Product) -> Result<Service, Error> {
        self.request(
            Method::DELETE,
            "/connect/systems/products",
            product,
            Auth::System,
        )
        .await
    }

    /// Resolve a product's full extension tree from the server.
    /// Read-only; safe to retry.
    pub async fn show_product(&self, product: &Product) -> Result<Product, Error> {
        self.get("/connect/systems/products", &product.to_query(), Auth::System)
            .await
    }

    /// Reconcile the full locally-installed product set with the server,
    /// removing activations for products no longer installed locally.
    ///
    /// Ordering contract: when used during a migration, call this only
    /// after every individual downgrade has completed; synchronizing in
    /// between can deactivate entitlements that are still needed.
    pub async fn synchronize(&self, products: &[Product]) -> Result<Vec<Product>, Error> {
        self.request(
            Method::POST,
            "/connect/systems/products/synchronize",
            &SynchronizeRequest { products },
            Auth::System,
        )
        .await
    }
}
