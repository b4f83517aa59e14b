//! Diagnosis catalog loader.
//!
//! The catalog is a JSON object mapping a suggestion-group key to a pair of parallel arrays, the
//! clinical codes and the display names:
//!
//! ```json
//! {"Diabetes": [["E11", "E10"], ["Type 2 diabetes", "Type 1 diabetes"]]}
//! ```
//!
//! Each key becomes one [`SuggestionGroup`] whose id and name are the key. Key order is kept.
//! Entries without a usable code get a deterministic fallback id, see
//! [`dxg_uuid::fallback_diagnosis_id`].

use crate::constants::HTTP_TIMEOUT_SECS;
use crate::model::{Diagnosis, SuggestionGroup};
use crate::{GroupingError, GroupingResult};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Deserialize)]
struct CatalogEntry(Vec<Value>, Vec<String>);

/// Parses catalog JSON into suggestion groups, in document order.
///
/// # Errors
///
/// Returns `CatalogParse` if the document is not an object of `[codes, names]` pairs.
pub fn parse_catalog(raw: &str) -> GroupingResult<Vec<SuggestionGroup>> {
    let document: serde_json::Map<String, Value> =
        serde_json::from_str(raw).map_err(GroupingError::CatalogParse)?;

    let mut groups = Vec::with_capacity(document.len());
    for (key, value) in document {
        let CatalogEntry(codes, names) =
            serde_json::from_value(value).map_err(GroupingError::CatalogParse)?;

        if codes.len() != names.len() {
            tracing::warn!(
                "catalog entry '{}' has {} codes but {} names; using names",
                key,
                codes.len(),
                names.len()
            );
        }

        let diagnoses = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| {
                let id = codes
                    .get(index)
                    .and_then(code_text)
                    .unwrap_or_else(|| dxg_uuid::fallback_diagnosis_id(&key, &name, index));
                Diagnosis::new(id, name)
            })
            .collect();

        groups.push(SuggestionGroup {
            id: key.clone(),
            name: key,
            diagnoses,
        });
    }

    Ok(groups)
}

fn code_text(code: &Value) -> Option<String> {
    let text = match code {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Loads the catalog from a local file or an `http(s)://` URL.
///
/// # Errors
///
/// - `CatalogRead` if the file cannot be read
/// - `CatalogFetch` if the URL cannot be fetched or answers with a non-success status
/// - `CatalogParse` if the content is not a valid catalog
pub async fn load_catalog(source: &str) -> GroupingResult<Vec<SuggestionGroup>> {
    let raw = if source.starts_with("http://") || source.starts_with("https://") {
        fetch_catalog(source).await?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .map_err(GroupingError::CatalogRead)?
    };

    let groups = parse_catalog(&raw)?;
    tracing::info!(
        "loaded {} suggestion groups from {}",
        groups.len(),
        source
    );
    Ok(groups)
}

async fn fetch_catalog(url: &str) -> GroupingResult<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .map_err(|e| GroupingError::CatalogFetch(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_connect() {
            GroupingError::CatalogFetch(format!("cannot connect to {}", url))
        } else if e.is_timeout() {
            GroupingError::CatalogFetch(format!(
                "request timed out after {}s",
                HTTP_TIMEOUT_SECS
            ))
        } else {
            GroupingError::CatalogFetch(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(GroupingError::CatalogFetch(format!(
            "{} answered with status {}",
            url, status
        )));
    }

    response
        .text()
        .await
        .map_err(|e| GroupingError::CatalogFetch(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_single_group() {
        let groups = parse_catalog(r#"{"g1": [["C1","C2"], ["Diabetes","Glaucoma"]]}"#).unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, "g1");
        assert_eq!(groups[0].name, "g1");
        assert_eq!(
            groups[0].diagnoses,
            vec![Diagnosis::new("C1", "Diabetes"), Diagnosis::new("C2", "Glaucoma")]
        );
    }

    #[test]
    fn test_key_order_is_preserved() {
        let groups = parse_catalog(
            r#"{"Zoster": [["B02"], ["Shingles"]], "Asthma": [["J45"], ["Asthma"]], "Mood": [[], []]}"#,
        )
        .unwrap();

        let keys: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(keys, vec!["Zoster", "Asthma", "Mood"]);
        assert!(groups[2].diagnoses.is_empty());
    }

    #[test]
    fn test_missing_codes_get_stable_fallback_ids() {
        let raw = r#"{"g7": [["E11", null, "  "], ["Diabetes", "Type 2 Diabetes", "Foot ulcer"]]}"#;
        let first = parse_catalog(raw).unwrap();
        let second = parse_catalog(raw).unwrap();

        let ids: Vec<&str> = first[0].diagnoses.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["E11", "gen-g7-type-2-diabetes-1", "gen-g7-foot-ulcer-2"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_names_drive_mismatched_lengths() {
        let groups = parse_catalog(r#"{"g": [["A1", "A2", "A3"], ["Alpha"]]}"#).unwrap();
        assert_eq!(groups[0].diagnoses, vec![Diagnosis::new("A1", "Alpha")]);

        let groups = parse_catalog(r#"{"g": [["A1"], ["Alpha", "Beta"]]}"#).unwrap();
        assert_eq!(groups[0].diagnoses[1].id, "gen-g-beta-1");
    }

    #[test]
    fn test_numeric_codes_are_accepted() {
        let groups = parse_catalog(r#"{"g": [[250, "E11"], ["Diabetes", "Type 2"]]}"#).unwrap();
        assert_eq!(groups[0].diagnoses[0].id, "250");
    }

    #[test]
    fn test_malformed_catalog_is_rejected() {
        assert!(matches!(
            parse_catalog("[1, 2]"),
            Err(GroupingError::CatalogParse(_))
        ));
        assert!(matches!(
            parse_catalog(r#"{"g": ["only one array"]}"#),
            Err(GroupingError::CatalogParse(_))
        ));
    }

    #[tokio::test]
    async fn test_load_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"Eye": [["H40"], ["Glaucoma"]]}}"#).unwrap();

        let groups = load_catalog(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(groups[0].diagnoses[0].name, "Glaucoma");

        let missing = load_catalog("/definitely/not/here.json").await;
        assert!(matches!(missing, Err(GroupingError::CatalogRead(_))));
    }

    #[tokio::test]
    async fn test_load_catalog_over_http() {
        use axum::{http::StatusCode, routing::get, Router};

        let app = Router::new()
            .route("/catalog.json", get(|| async { r#"{"Eye": [["H40"], ["Glaucoma"]]}"# }))
            .route("/broken.json", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let groups = load_catalog(&format!("http://{}/catalog.json", addr))
            .await
            .unwrap();
        assert_eq!(groups[0].id, "Eye");

        let broken = load_catalog(&format!("http://{}/broken.json", addr)).await;
        assert!(matches!(broken, Err(GroupingError::CatalogFetch(_))));
    }
}
