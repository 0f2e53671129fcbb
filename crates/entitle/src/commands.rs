//! Command handlers: bridge CLI args to the registration client.

use owo_colors::OwoColorize;

use entitle_api::{
    Certificate, FingerprintAlgorithm, Product, RegistrationClient, SystemInfo, TrustStore,
    credentials,
};

use crate::cli::{CertCommand, GlobalOpts, RegisterArgs, StatusArgs};
use crate::error::CliError;

// ── status ──────────────────────────────────────────────────────────

pub async fn status(
    client: &RegistrationClient,
    args: StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(installed_path) = args.installed {
        let raw = std::fs::read_to_string(installed_path)?;
        let installed: Vec<Product> = serde_json::from_str(&raw)?;
        let statuses = client.product_statuses(&installed).await?;

        if global.json {
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        } else {
            for status in &statuses {
                let state = match status.status {
                    entitle_api::RegistrationStatus::Registered => {
                        format!("{}", "Registered".green())
                    }
                    entitle_api::RegistrationStatus::NotRegistered => {
                        format!("{}", "Not Registered".yellow())
                    }
                };
                println!(
                    "{}/{}/{}  {state}",
                    status.identifier, status.version, status.arch
                );
                if let Some(expires_at) = status.expires_at {
                    println!("    expires: {expires_at}");
                }
            }
        }
        return Ok(());
    }

    let activations = client.system_activations().await?;
    if global.json {
        println!("{}", serde_json::to_string_pretty(&activations)?);
    } else if activations.is_empty() {
        println!("No activations.");
    } else {
        for activation in &activations {
            println!("{}  {}", activation.triplet(), activation.status);
        }
    }
    Ok(())
}

// ── register ────────────────────────────────────────────────────────

pub async fn register(
    client: &RegistrationClient,
    args: RegisterArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let system = SystemInfo {
        hostname: args.hostname,
        ..SystemInfo::default()
    };

    // Announce only when the system has no identity yet; re-running
    // register on an announced system goes straight to activation.
    if client.credentials().is_err() {
        let creds = client
            .announce(&args.regcode, &system, args.distro_target.as_deref())
            .await?;
        credentials::write(
            &creds.login,
            &creds.password,
            None,
            client.credentials_path(),
        )?;
        eprintln!("System announced as {}", creds.login);
    }

    client
        .update_system(&system, args.distro_target.as_deref())
        .await?;

    if let Some(triplet) = &args.product {
        let product = parse_triplet(triplet)?;
        let service = client
            .activate_product(&product, Some(&args.regcode), args.email.as_deref())
            .await?;

        if global.json {
            println!("{}", serde_json::to_string_pretty(&service)?);
        } else {
            println!("Activated {}", product.triplet());
            println!("    service: {} ({})", service.name, service.url);
        }
    }

    if !global.json {
        println!("{}", "Successfully registered system".green().bold());
    }
    Ok(())
}

fn parse_triplet(raw: &str) -> Result<Product, CliError> {
    let parts: Vec<&str> = raw.split('/').collect();
    match parts.as_slice() {
        [identifier, version, arch]
            if !identifier.is_empty() && !version.is_empty() && !arch.is_empty() =>
        {
            Ok(Product::new(identifier, version, arch))
        }
        _ => Err(CliError::Validation {
            field: "product".into(),
            reason: format!("expected IDENTIFIER/VERSION/ARCH, got '{raw}'"),
        }),
    }
}

// ── deregister ──────────────────────────────────────────────────────

pub async fn deregister(client: &RegistrationClient, global: &GlobalOpts) -> Result<(), CliError> {
    client.deregister_system().await?;

    let path = client.credentials_path();
    if path.exists() {
        std::fs::remove_file(path)?;
    }

    if global.json {
        println!("{{}}");
    } else {
        println!("{}", "Successfully deregistered system".green().bold());
    }
    Ok(())
}

// ── cert ────────────────────────────────────────────────────────────

pub fn cert(command: CertCommand, global: &GlobalOpts) -> Result<(), CliError> {
    match command {
        CertCommand::Fingerprint { file } => {
            let cert = load_certificate(&file)?;
            let sha1 = cert.fingerprint(FingerprintAlgorithm::Sha1);
            let sha256 = cert.fingerprint(FingerprintAlgorithm::Sha256);
            if global.json {
                println!(
                    "{}",
                    serde_json::json!({ "sha1": sha1, "sha256": sha256 })
                );
            } else {
                println!("SHA1:   {sha1}");
                println!("SHA256: {sha256}");
            }
        }
        CertCommand::Import { file } => {
            let cert = load_certificate(&file)?;
            TrustStore::new().import(&cert).map_err(CliError::from)?;
            if !global.json {
                println!("Certificate imported; trust store updated.");
            }
        }
    }
    Ok(())
}

fn load_certificate(path: &std::path::Path) -> Result<Certificate, CliError> {
    let blob = std::fs::read(path)?;
    Certificate::parse(&blob).map_err(CliError::from)
}
