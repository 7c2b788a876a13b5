use std::path::Path;
use thiserror::Error;

use crate::core::StoreError;
use crate::models::NewOffer;
use crate::services::store::CatalogWriter;

/// Errors that can occur while seeding the catalog
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse seed file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to store seed offers: {0}")]
    Store(#[from] StoreError),
}

/// Parse a JSON array of offers from disk
pub async fn load_seed_file(path: impl AsRef<Path>) -> Result<Vec<NewOffer>, SeedError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    let bytes = tokio::fs::read(path).await.map_err(|source| SeedError::Io {
        path: display.clone(),
        source,
    })?;

    serde_json::from_slice(&bytes).map_err(|source| SeedError::Parse {
        path: display,
        source,
    })
}

/// Load the seed file into the catalog, returning the number of offers added
pub async fn seed_catalog(
    catalog: &dyn CatalogWriter,
    path: impl AsRef<Path>,
) -> Result<usize, SeedError> {
    let offers = load_seed_file(&path).await?;
    let stored = catalog.insert_offers(offers).await?;

    tracing::info!(
        "Seeded {} scholarships from {}",
        stored.len(),
        path.as_ref().display()
    );

    Ok(stored.len())
}
