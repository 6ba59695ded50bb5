//! Loading the Berlin district table.

use std::path::Path;

use kiezpoll_common::{AppError, AppResult};
use kiezpoll_db::{
    entities::audience_category,
    repositories::{AudienceRepository, PostalMappingRepository, UpsertOutcome},
};
use serde::Serialize;

use super::geo::normalize_postal_code;
use crate::csv_table::CsvTable;

/// Built-in sample of Berlin postal codes and their districts.
pub const SAMPLE_DISTRICTS: &[(&str, &str)] = &[
    ("10115", "Mitte"),
    ("10243", "Friedrichshain-Kreuzberg"),
    ("10405", "Pankow"),
    ("10785", "Mitte"),
    ("10969", "Friedrichshain-Kreuzberg"),
    ("12043", "Neukölln"),
    ("13053", "Lichtenberg"),
    ("13507", "Reinickendorf"),
    ("14052", "Charlottenburg-Wilmersdorf"),
    ("14163", "Steglitz-Zehlendorf"),
];

/// Counters for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Rows with both a code and a district name.
    pub rows: usize,
    pub created: usize,
    pub updated: usize,
}

/// Extract `(postal_code, bezirk_name)` pairs, skipping incomplete rows.
pub fn district_rows(contents: &str) -> AppResult<Vec<(String, String)>> {
    let table = CsvTable::parse(contents);
    let (Some(code_idx), Some(name_idx)) =
        (table.column("postal_code"), table.column("bezirk_name"))
    else {
        return Err(AppError::Validation(
            "District CSV needs postal_code and bezirk_name columns".to_string(),
        ));
    };

    Ok(table
        .rows()
        .filter_map(|row| {
            let code = normalize_postal_code(row.get(code_idx)?)?;
            let name = row.get(name_idx)?.trim();
            (!name.is_empty()).then(|| (code, name.to_string()))
        })
        .collect())
}

/// Postal code import service.
#[derive(Clone)]
pub struct PostalImportService {
    postal_repo: PostalMappingRepository,
    audience_repo: AudienceRepository,
}

impl PostalImportService {
    /// Create a new import service.
    #[must_use]
    pub const fn new(postal_repo: PostalMappingRepository, audience_repo: AudienceRepository) -> Self {
        Self {
            postal_repo,
            audience_repo,
        }
    }

    /// Import a `postal_code,bezirk_name` CSV. With `clear`, existing
    /// mappings are removed first.
    pub async fn import_csv(&self, path: &Path, clear: bool) -> AppResult<ImportSummary> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Validation(format!("Cannot read district CSV {}: {e}", path.display()))
        })?;
        let rows = district_rows(&contents)?;
        self.import_rows(&rows, clear).await
    }

    /// Import the built-in sample.
    pub async fn import_sample(&self) -> AppResult<ImportSummary> {
        let rows: Vec<(String, String)> = SAMPLE_DISTRICTS
            .iter()
            .map(|(code, name)| ((*code).to_string(), (*name).to_string()))
            .collect();
        self.import_rows(&rows, false).await
    }

    async fn import_rows(&self, rows: &[(String, String)], clear: bool) -> AppResult<ImportSummary> {
        if clear {
            let removed = self.postal_repo.delete_all().await?;
            tracing::info!(removed, "Cleared postal mappings");
        }

        let category = self
            .audience_repo
            .find_or_create_category(audience_category::BERLIN_BEZIRK)
            .await?;

        let mut summary = ImportSummary::default();
        for (code, name) in rows {
            let option = self
                .audience_repo
                .find_or_create_option(&category.id, name)
                .await?;
            match self.postal_repo.upsert(code, &option.id).await? {
                UpsertOutcome::Created => summary.created += 1,
                UpsertOutcome::Updated => summary.updated += 1,
                UpsertOutcome::Unchanged => {}
            }
            summary.rows += 1;
        }

        tracing::info!(rows = summary.rows, created = summary.created, updated = summary.updated, "Imported postal mappings");
        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use kiezpoll_db::entities::{audience_option, postal_mapping};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    #[test]
    fn test_district_rows_skip_blank() {
        let rows = district_rows("postal_code,bezirk_name\n10115,Mitte\n,Pankow\n10405,\n 10 243 ,Friedrichshain-Kreuzberg\n").unwrap();

        assert_eq!(
            rows,
            vec![
                ("10115".to_string(), "Mitte".to_string()),
                ("10243".to_string(), "Friedrichshain-Kreuzberg".to_string()),
            ]
        );
    }

    #[test]
    fn test_district_rows_require_columns() {
        assert!(district_rows("plz,name\n10115,Mitte\n").is_err());
    }

    #[test]
    fn test_sample_is_berlin() {
        assert_eq!(SAMPLE_DISTRICTS.len(), 10);
        assert!(SAMPLE_DISTRICTS.iter().all(|(code, _)| code.len() == 5 && code.starts_with('1')));
    }

    #[tokio::test]
    async fn test_import_rows_counts() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // category lookup
            .append_query_results([[audience_category::Model {
                id: "cat".to_string(),
                name: audience_category::BERLIN_BEZIRK.to_string(),
            }]])
            // 10115 -> Mitte: new mapping
            .append_query_results([[audience_option::Model {
                id: "o-mitte".to_string(),
                category_id: "cat".to_string(),
                name: "Mitte".to_string(),
            }]])
            .append_query_results([Vec::<postal_mapping::Model>::new()])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            // 10405 -> Pankow: already mapped
            .append_query_results([[audience_option::Model {
                id: "o-pankow".to_string(),
                category_id: "cat".to_string(),
                name: "Pankow".to_string(),
            }]])
            .append_query_results([[postal_mapping::Model {
                code: "10405".to_string(),
                option_id: "o-pankow".to_string(),
            }]])
            .into_connection();
        let db = Arc::new(db);
        let service = PostalImportService::new(
            PostalMappingRepository::new(db.clone()),
            AudienceRepository::new(db),
        );

        let summary = service
            .import_rows(
                &[
                    ("10115".to_string(), "Mitte".to_string()),
                    ("10405".to_string(), "Pankow".to_string()),
                ],
                false,
            )
            .await
            .unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                rows: 2,
                created: 1,
                updated: 0
            }
        );
    }

    #[tokio::test]
    async fn test_import_csv_missing_file() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = PostalImportService::new(
            PostalMappingRepository::new(db.clone()),
            AudienceRepository::new(db),
        );

        let result = service
            .import_csv(Path::new("/nonexistent/berlin_postal_codes.csv"), false)
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
