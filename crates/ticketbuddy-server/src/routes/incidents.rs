use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use ticketbuddy_storage::IncidentQuery;

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/incidents", get(list_incidents))
}

/// Build the store filter from raw query parameters. Unusable `limit` and
/// `since` values are ignored rather than rejected.
fn incident_query(params: &HashMap<String, String>) -> IncidentQuery {
    let service = params
        .get("service")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let limit = params
        .get("limit")
        .and_then(|l| l.trim().parse::<i64>().ok())
        .filter(|l| *l > 0);

    let since = params.get("since").and_then(|s| {
        DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true))
    });

    IncidentQuery {
        service,
        limit,
        since,
    }
}

/// GET /incidents?service=&limit=&since=
async fn list_incidents(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let incidents = state.store.incidents().list(&incident_query(&params)).await?;
    Ok(Json(json!({ "incidents": incidents })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let query = incident_query(&params(&[("limit", "-3"), ("since", "yesterday")]));
        assert_eq!(query.limit, None);
        assert_eq!(query.since, None);

        let query = incident_query(&params(&[("limit", "abc")]));
        assert_eq!(query.limit, None);
    }

    #[test]
    fn test_since_is_normalised_to_utc_millis() {
        let query = incident_query(&params(&[
            ("service", "checkout"),
            ("limit", "500"),
            ("since", "2024-05-01T12:00:00+02:00"),
        ]));
        assert_eq!(query.service.as_deref(), Some("checkout"));
        assert_eq!(query.effective_limit(), 200);
        assert_eq!(query.since.as_deref(), Some("2024-05-01T10:00:00.000Z"));
    }
}
