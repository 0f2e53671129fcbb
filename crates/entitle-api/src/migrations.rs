// Migration-path queries and installer-update repositories. Pure reads;
// nothing here mutates server state.

use reqwest::Method;
use serde::Serialize;

use crate::client::{Auth, RegistrationClient};
use crate::error::Error;
use crate::models::{MigrationPath, Product, Repository};

#[derive(Serialize)]
struct MigrationsRequest<'a> {
    installed_products: &'a [Product],
}

#[derive(Serialize)]
struct OfflineMigrationsRequest<'a> {
    installed_products: &'a [Product],
    target_base_product: &'a Product,
}

impl RegistrationClient {
    /// Compute the valid online upgrade sequences for the given installed
    /// product set.
    pub async fn system_migrations(
        &self,
        installed: &[Product],
    ) -> Result<Vec<MigrationPath>, Error> {
        self.request(
            Method::POST,
            "/connect/systems/products/migrations",
            &MigrationsRequest {
                installed_products: installed,
            },
            Auth::System,
        )
        .await
    }

    /// Compute the migration paths toward a specific target base product
    /// (offline upgrade scenario).
    pub async fn system_offline_migrations(
        &self,
        installed: &[Product],
        target_base: &Product,
    ) -> Result<Vec<MigrationPath>, Error> {
        self.request(
            Method::POST,
            "/connect/systems/products/offline_migrations",
            &OfflineMigrationsRequest {
                installed_products: installed,
                target_base_product: target_base,
            },
            Auth::System,
        )
        .await
    }

    /// Repositories carrying installer self-updates for the product.
    /// Unauthenticated read.
    pub async fn list_installer_updates(
        &self,
        product: &Product,
    ) -> Result<Vec<Repository>, Error> {
        self.get(
            "/connect/repositories/installer",
            &product.to_query(),
            Auth::None,
        )
        .await
    }
}
