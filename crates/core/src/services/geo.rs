//! Postal code to audience option resolution.
//!
//! Resolution walks an ordered chain of [`PostalResolver`]s: the Berlin
//! district table first, then the national dataset. Each resolver may decline
//! or fail on its own; failures are logged and the chain moves on. A code that
//! no resolver maps yields no assignment.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use kiezpoll_common::{AppError, AppResult};
use kiezpoll_db::{
    entities::{audience_category, audience_option},
    repositories::{AudienceRepository, PostalMappingRepository, UpsertOutcome},
};
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::csv_table::CsvTable;

/// Column holding the postal code in the national dataset.
pub const NATIONAL_CODE_COLUMN: &str = "Plz";
/// Column holding the region name in the national dataset.
pub const NATIONAL_REGION_COLUMN: &str = "Bundesland";

/// A (category, option) pair by name, as produced by a resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoMatch {
    pub category: String,
    pub option: String,
}

impl GeoMatch {
    #[must_use]
    pub fn new(category: impl Into<String>, option: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            option: option.into(),
        }
    }
}

/// A resolved match materialised as stored rows.
#[derive(Debug, Clone)]
pub struct ResolvedOption {
    pub category: audience_category::Model,
    pub option: audience_option::Model,
}

/// One tier of postal code lookup.
#[async_trait]
pub trait PostalResolver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Map a normalised (digits only) code. `Ok(None)` declines.
    async fn resolve(&self, code: &str) -> AppResult<Option<GeoMatch>>;
}

/// Keep only ASCII digits. Returns `None` when nothing is left.
#[must_use]
pub fn normalize_postal_code(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Fine-grained tier: the stored Berlin postal code table.
#[derive(Clone)]
pub struct DistrictTableResolver {
    postal_repo: PostalMappingRepository,
    audience_repo: AudienceRepository,
}

impl DistrictTableResolver {
    #[must_use]
    pub const fn new(postal_repo: PostalMappingRepository, audience_repo: AudienceRepository) -> Self {
        Self {
            postal_repo,
            audience_repo,
        }
    }
}

#[async_trait]
impl PostalResolver for DistrictTableResolver {
    fn name(&self) -> &'static str {
        "district-table"
    }

    async fn resolve(&self, code: &str) -> AppResult<Option<GeoMatch>> {
        let Some(mapping) = self.postal_repo.find_by_code(code).await? else {
            return Ok(None);
        };
        let Some(option) = self.audience_repo.find_option_by_id(&mapping.option_id).await? else {
            tracing::warn!(code = %code, option_id = %mapping.option_id, "Postal mapping points at a missing option");
            return Ok(None);
        };

        let in_district_category = self
            .audience_repo
            .find_categories_by_ids(std::slice::from_ref(&option.category_id))
            .await?
            .first()
            .is_some_and(|c| c.name == audience_category::BERLIN_BEZIRK);

        if !in_district_category {
            // Re-point the mapping at the option of the same name under the
            // district category.
            let category = self
                .audience_repo
                .find_or_create_category(audience_category::BERLIN_BEZIRK)
                .await?;
            let canonical = self
                .audience_repo
                .find_or_create_option(&category.id, &option.name)
                .await?;
            if self.postal_repo.upsert(code, &canonical.id).await? == UpsertOutcome::Updated {
                tracing::warn!(
                    code = %code,
                    from = %option.id,
                    to = %canonical.id,
                    "Re-pointed postal mapping at canonical district option"
                );
            }
        }

        Ok(Some(GeoMatch::new(
            audience_category::BERLIN_BEZIRK,
            option.name,
        )))
    }
}

/// Coarse tier: the national postal code CSV.
///
/// The file is read and indexed on the first lookup that succeeds in loading
/// it; a failed load is retried on the next lookup.
#[derive(Debug, Clone)]
pub struct NationalDatasetResolver {
    path: PathBuf,
    regions: Arc<OnceCell<HashMap<String, String>>>,
}

impl NationalDatasetResolver {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            regions: Arc::new(OnceCell::new()),
        }
    }

    async fn load(&self) -> AppResult<HashMap<String, String>> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AppError::ExternalService(format!(
                "Cannot read national dataset {}: {e}",
                self.path.display()
            ))
        })?;
        let regions = index_regions(&contents)?;
        tracing::info!(path = %self.path.display(), codes = regions.len(), "Loaded national postal dataset");
        Ok(regions)
    }
}

#[async_trait]
impl PostalResolver for NationalDatasetResolver {
    fn name(&self) -> &'static str {
        "national-dataset"
    }

    async fn resolve(&self, code: &str) -> AppResult<Option<GeoMatch>> {
        let regions = self.regions.get_or_try_init(|| self.load()).await?;

        Ok(regions
            .get(code)
            .map(|region| GeoMatch::new(audience_category::BUNDESLAND, region.clone())))
    }
}

/// Index national dataset contents by postal code.
///
/// The first row for a code decides; a code whose first row has an empty
/// region is left out.
pub fn index_regions(contents: &str) -> AppResult<HashMap<String, String>> {
    let table = CsvTable::parse(contents);
    let (Some(code_idx), Some(region_idx)) = (
        table.column(NATIONAL_CODE_COLUMN),
        table.column(NATIONAL_REGION_COLUMN),
    ) else {
        return Err(AppError::ExternalService(format!(
            "National dataset lacks {NATIONAL_CODE_COLUMN}/{NATIONAL_REGION_COLUMN} columns"
        )));
    };

    let mut regions = HashMap::new();
    for row in table.rows() {
        let Some(code) = row.get(code_idx).map(|c| c.trim()) else {
            continue;
        };
        if code.is_empty() {
            continue;
        }
        let region = row.get(region_idx).map_or("", |r| r.trim());
        regions
            .entry(code.to_string())
            .or_insert_with(|| region.to_string());
    }
    regions.retain(|_, region| !region.is_empty());

    Ok(regions)
}

/// Ordered resolver chain plus materialisation of the winning match.
#[derive(Clone)]
pub struct GeoLookupService {
    resolvers: Vec<Arc<dyn PostalResolver>>,
    audience_repo: AudienceRepository,
}

impl GeoLookupService {
    /// Create a service over an explicit resolver chain.
    #[must_use]
    pub fn new(resolvers: Vec<Arc<dyn PostalResolver>>, audience_repo: AudienceRepository) -> Self {
        Self {
            resolvers,
            audience_repo,
        }
    }

    /// District table first, national dataset second when a path is configured.
    #[must_use]
    pub fn with_default_chain(
        postal_repo: PostalMappingRepository,
        audience_repo: AudienceRepository,
        national_dataset_path: Option<PathBuf>,
    ) -> Self {
        let mut resolvers: Vec<Arc<dyn PostalResolver>> = vec![Arc::new(
            DistrictTableResolver::new(postal_repo, audience_repo.clone()),
        )];
        if let Some(path) = national_dataset_path {
            resolvers.push(Arc::new(NationalDatasetResolver::new(path)));
        }
        Self::new(resolvers, audience_repo)
    }

    /// Walk the chain for a raw code. Never fails.
    pub async fn resolve(&self, raw: &str) -> Option<GeoMatch> {
        let code = normalize_postal_code(raw)?;

        for resolver in &self.resolvers {
            match resolver.resolve(&code).await {
                Ok(Some(found)) => {
                    tracing::debug!(code = %code, resolver = resolver.name(), option = %found.option, "Postal code resolved");
                    return Some(found);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(code = %code, resolver = resolver.name(), error = %e, "Postal resolver failed");
                }
            }
        }

        tracing::debug!(code = %code, "Postal code not found in any source");
        None
    }

    /// Resolve a raw code and look up or create the category and option it
    /// names. Storage failures degrade to `None`.
    pub async fn resolve_postal(&self, raw: &str) -> Option<ResolvedOption> {
        let found = self.resolve(raw).await?;

        match self.materialize(&found).await {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                tracing::warn!(category = %found.category, option = %found.option, error = %e, "Failed to materialise resolved option");
                None
            }
        }
    }

    async fn materialize(&self, found: &GeoMatch) -> AppResult<ResolvedOption> {
        let category = self
            .audience_repo
            .find_or_create_category(&found.category)
            .await?;
        let option = self
            .audience_repo
            .find_or_create_option(&category.id, &found.option)
            .await?;
        Ok(ResolvedOption { category, option })
    }
}
