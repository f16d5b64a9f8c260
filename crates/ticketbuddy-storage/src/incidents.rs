//! Incident repository. Incidents are append-only.

use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row};
use ticketbuddy_core::{Incident, Severity};

use crate::error::{Result, StorageError};

/// Default number of incidents returned by [`IncidentsRepo::list`].
pub const DEFAULT_LIMIT: i64 = 50;

/// Upper bound on the number of incidents returned.
pub const MAX_LIMIT: i64 = 200;

/// Filter for [`IncidentsRepo::list`].
#[derive(Debug, Clone, Default)]
pub struct IncidentQuery {
    pub service: Option<String>,
    /// Clamped to `1..=200`; defaults to 50
    pub limit: Option<i64>,
    /// Only incidents created at or after this RFC 3339 timestamp
    pub since: Option<String>,
}

impl IncidentQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Repository for incident rows.
pub struct IncidentsRepo {
    pool: SqlitePool,
}

impl IncidentsRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, incident: &Incident) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO incidents (ticketId, service, severity, summary, recommendedFix, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&incident.ticket_id)
        .bind(&incident.service)
        .bind(incident.severity.as_str())
        .bind(&incident.summary)
        .bind(&incident.recommended_fix)
        .bind(&incident.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Incidents matching `query`, newest first.
    pub async fn list(&self, query: &IncidentQuery) -> Result<Vec<Incident>> {
        let mut sql = QueryBuilder::<Sqlite>::new(
            "SELECT ticketId, service, severity, summary, recommendedFix, created_at \
             FROM incidents WHERE 1 = 1",
        );

        if let Some(service) = &query.service {
            sql.push(" AND service = ").push_bind(service.clone());
        }
        if let Some(since) = &query.since {
            sql.push(" AND created_at >= ").push_bind(since.clone());
        }

        sql.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(query.effective_limit());

        let rows = sql.build().fetch_all(&self.pool).await?;
        rows.iter().map(map_row).collect()
    }
}

fn map_row(row: &SqliteRow) -> Result<Incident> {
    let severity: String = row.try_get("severity")?;
    Ok(Incident {
        ticket_id: row.try_get("ticketId")?,
        service: row.try_get("service")?,
        severity: severity
            .parse::<Severity>()
            .map_err(|e| StorageError::Corrupt(e.to_string()))?,
        summary: row.try_get("summary")?,
        recommended_fix: row.try_get("recommendedFix")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    fn incident(id: &str, service: &str, created_at: &str) -> Incident {
        Incident {
            ticket_id: id.to_string(),
            service: service.to_string(),
            severity: Severity::High,
            summary: "Checkout failing".to_string(),
            recommended_fix: "Rollback".to_string(),
            created_at: created_at.to_string(),
        }
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let store = Store::in_memory().await.unwrap();
        let repo = store.incidents();
        repo.create(&incident("INC-1", "checkout", "2024-05-01T10:00:00.000Z"))
            .await
            .unwrap();
        repo.create(&incident("INC-2", "search", "2024-05-02T10:00:00.000Z"))
            .await
            .unwrap();
        repo.create(&incident("INC-3", "checkout", "2024-05-03T10:00:00.000Z"))
            .await
            .unwrap();

        let all = repo.list(&IncidentQuery::default()).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|i| i.ticket_id.as_str()).collect();
        assert_eq!(ids, vec!["INC-3", "INC-2", "INC-1"]);

        let checkout = repo
            .list(&IncidentQuery {
                service: Some("checkout".to_string()),
                since: Some("2024-05-02T00:00:00.000Z".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(checkout.len(), 1);
        assert_eq!(checkout[0].ticket_id, "INC-3");
    }

    #[tokio::test]
    async fn test_limit_is_clamped() {
        assert_eq!(IncidentQuery::default().effective_limit(), 50);
        let big = IncidentQuery {
            limit: Some(5000),
            ..Default::default()
        };
        assert_eq!(big.effective_limit(), 200);
        let zero = IncidentQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.effective_limit(), 1);

        let store = Store::in_memory().await.unwrap();
        let repo = store.incidents();
        for i in 0..3 {
            repo.create(&incident(
                &format!("INC-{}", i),
                "checkout",
                &format!("2024-05-0{}T10:00:00.000Z", i + 1),
            ))
            .await
            .unwrap();
        }
        let limited = repo
            .list(&IncidentQuery {
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }
}
