//! Seed the product catalog from a YAML file.
//!
//! The file is a list of products using the same field names as the API:
//!
//! ```yaml
//! - name: Toxic Hoodie
//!   price: 64.50
//!   description: Brushed fleece, oversized fit
//!   category: hoodies
//!   stock: 12
//!   mainImage: https://res.cloudinary.com/oxytoxin/hoodie.jpg
//!   colors: [black, acid green]
//! ```
//!
//! Products whose name already exists (case-insensitive) are skipped.

use std::path::Path;

use oxytoxin_api::db::ProductRepository;
use oxytoxin_api::models::product::NewProduct;
use tracing::{error, info};

use super::connect;

/// Outcome of a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub inserted: usize,
    pub skipped: usize,
    pub removed: u64,
}

/// Parse and normalize a catalog file's contents.
///
/// # Errors
///
/// Returns the YAML error, or one message per product with a blank
/// required field.
pub fn parse_catalog(content: &str) -> Result<Vec<NewProduct>, Box<dyn std::error::Error>> {
    let raw: Vec<NewProduct> = serde_yaml::from_str(content)?;

    let mut products = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();
    for (index, product) in raw.into_iter().enumerate() {
        let name = product.name.clone();
        match product.normalize() {
            Ok(product) => products.push(product),
            Err(field) => errors.push(format!("entry {} ({name}): {field} is required", index + 1)),
        }
    }

    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    Ok(products)
}

/// Seed products from a YAML file.
///
/// # Arguments
///
/// * `file_path` - Path to the catalog YAML file
/// * `replace` - If true, delete the existing catalog first
///
/// # Errors
///
/// Returns an error if the file cannot be read or validated, or if
/// database operations fail.
pub async fn products(file_path: &str, replace: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    // Validate before connecting to the database
    let content = tokio::fs::read_to_string(path).await?;
    let catalog = parse_catalog(&content)?;
    info!(products = catalog.len(), "Parsed catalog");

    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);

    let mut result = SeedResult::default();
    if replace {
        result.removed = repo.delete_all().await?;
        info!(removed = result.removed, "Existing catalog removed");
    }

    for product in &catalog {
        if repo.insert_if_absent(product).await? {
            result.inserted += 1;
        } else {
            result.skipped += 1;
        }
    }

    info!("Seeding complete!");
    info!("  Products inserted: {}", result.inserted);
    info!("  Products skipped (already exist): {}", result.skipped);

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use oxytoxin_core::Price;

    use super::*;

    #[test]
    fn test_parse_catalog() {
        let products = parse_catalog(
            r"
- name: ' Toxic Hoodie '
  price: 64.50
  description: Brushed fleece
  category: hoodies
  stock: 12
  mainImage: https://cdn.example.com/hoodie.jpg
  colors: [black, acid green]
- name: Venom Tee
  price: 25
  description: Heavyweight cotton
  category: tees
  stock: 0
  mainImage: https://cdn.example.com/tee.jpg
",
        )
        .unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "Toxic Hoodie");
        assert_eq!(products[0].price, Price::from_cents(6450));
        assert_eq!(products[1].colors, Vec::<String>::new());
    }

    #[test]
    fn test_parse_catalog_reports_blank_fields() {
        let err = parse_catalog(
            r"
- name: Venom Tee
  price: 25
  description: ''
  category: tees
  stock: 1
  mainImage: https://cdn.example.com/tee.jpg
",
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "1 validation errors found");
    }

    #[test]
    fn test_parse_catalog_rejects_bad_yaml() {
        assert!(parse_catalog("name: not a list").is_err());
    }
}
