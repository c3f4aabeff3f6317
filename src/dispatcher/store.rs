use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, SqlitePool};
use uuid::Uuid;

use crate::time::format_utc;
use crate::types::WebhookSubscription;

#[derive(Debug)]
pub enum StoreError {
    Db(sqlx::Error),
    NotFound(String),
    Parse(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Db(err) => write!(f, "database error: {err}"),
            StoreError::NotFound(message) => write!(f, "not found: {message}"),
            StoreError::Parse(message) => write!(f, "invalid stored data: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub profile_id: String,
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListSubscriptionsParams {
    pub profile_id: Option<String>,
    pub active: Option<bool>,
    pub limit: i64,
}

/// Counter and gate state of a subscription right after a health update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthUpdate {
    pub failure_count: i64,
    pub is_active: bool,
}

const SUBSCRIPTION_COLUMNS: &str = "id, profile_id, url, secret, events, is_active, \
    last_success_at, last_failure_at, failure_count, created_at";

pub async fn create_subscription(
    pool: &SqlitePool,
    new: &NewSubscription,
) -> Result<WebhookSubscription, StoreError> {
    let id = Uuid::new_v4();
    let created_at = format_utc(Utc::now());
    let events = serde_json::to_string(&new.events)
        .map_err(|err| StoreError::Parse(format!("invalid events: {err}")))?;

    sqlx::query(
        r#"
        INSERT INTO webhook_subscriptions (
            id,
            profile_id,
            url,
            secret,
            events,
            is_active,
            failure_count,
            created_at
        )
        VALUES (?, ?, ?, ?, ?, 1, 0, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&new.profile_id)
    .bind(&new.url)
    .bind(&new.secret)
    .bind(&events)
    .bind(&created_at)
    .execute(pool)
    .await?;

    Ok(WebhookSubscription {
        id,
        profile_id: new.profile_id.clone(),
        url: new.url.clone(),
        secret: new.secret.clone(),
        events: new.events.clone(),
        is_active: true,
        last_success_at: None,
        last_failure_at: None,
        failure_count: 0,
        created_at,
    })
}

pub async fn get_subscription(
    pool: &SqlitePool,
    id: Uuid,
) -> Result<WebhookSubscription, StoreError> {
    let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM webhook_subscriptions WHERE id = ?"
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::NotFound("subscription not found".to_string()))?;

    row.try_into()
}

pub async fn list_subscriptions(
    pool: &SqlitePool,
    params: &ListSubscriptionsParams,
) -> Result<Vec<WebhookSubscription>, StoreError> {
    let mut query = QueryBuilder::new(format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM webhook_subscriptions WHERE 1 = 1"
    ));

    if let Some(profile_id) = &params.profile_id {
        query.push(" AND profile_id = ");
        query.push_bind(profile_id.clone());
    }
    if let Some(active) = params.active {
        query.push(" AND is_active = ");
        query.push_bind(active);
    }

    query.push(" ORDER BY created_at ASC, id ASC LIMIT ");
    query.push_bind(params.limit);

    let rows: Vec<SubscriptionRow> = query.build_query_as().fetch_all(pool).await?;
    rows.into_iter().map(SubscriptionRow::try_into).collect()
}

/// Active subscriptions of `profile_id` whose event set contains `event_type`.
pub async fn list_matching_subscriptions(
    pool: &SqlitePool,
    profile_id: &str,
    event_type: &str,
) -> Result<Vec<WebhookSubscription>, StoreError> {
    let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
        r#"
        SELECT {SUBSCRIPTION_COLUMNS}
        FROM webhook_subscriptions s
        WHERE s.profile_id = ?
          AND s.is_active = 1
          AND EXISTS (
              SELECT 1 FROM json_each(s.events) WHERE json_each.value = ?
          )
        ORDER BY s.created_at ASC, s.id ASC
        "#
    ))
    .bind(profile_id)
    .bind(event_type)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(SubscriptionRow::try_into).collect()
}

/// Current gate state, read fresh so a concurrent auto-disable is seen.
pub async fn subscription_is_active(pool: &SqlitePool, id: Uuid) -> Result<bool, StoreError> {
    sqlx::query_scalar::<_, bool>("SELECT is_active FROM webhook_subscriptions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("subscription not found".to_string()))
}

/// Reset the failure counter after a delivered event.
///
/// Never touches `is_active`: an auto-disabled subscription stays disabled.
pub async fn record_delivery_success(
    pool: &SqlitePool,
    id: Uuid,
    at: DateTime<Utc>,
) -> Result<HealthUpdate, StoreError> {
    let row = sqlx::query_as::<_, HealthRow>(
        r#"
        UPDATE webhook_subscriptions
        SET failure_count = 0,
            last_success_at = ?
        WHERE id = ?
        RETURNING failure_count, is_active
        "#,
    )
    .bind(format_utc(at))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::NotFound("subscription not found".to_string()))?;

    Ok(row.into())
}

/// Count one exhausted delivery and close the gate at `threshold`.
///
/// Increment and gate run in one statement so concurrent deliveries to the
/// same subscriber cannot lose updates.
pub async fn record_delivery_failure(
    pool: &SqlitePool,
    id: Uuid,
    at: DateTime<Utc>,
    threshold: u32,
) -> Result<HealthUpdate, StoreError> {
    let row = sqlx::query_as::<_, HealthRow>(
        r#"
        UPDATE webhook_subscriptions
        SET failure_count = failure_count + 1,
            last_failure_at = ?,
            is_active = CASE
                WHEN failure_count + 1 >= ? THEN 0
                ELSE is_active
            END
        WHERE id = ?
        RETURNING failure_count, is_active
        "#,
    )
    .bind(format_utc(at))
    .bind(i64::from(threshold))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::NotFound("subscription not found".to_string()))?;

    Ok(row.into())
}

/// Manual re-enable of an auto-disabled subscription.
pub async fn reenable_subscription(
    pool: &SqlitePool,
    id: Uuid,
) -> Result<WebhookSubscription, StoreError> {
    let updated = sqlx::query(
        r#"
        UPDATE webhook_subscriptions
        SET is_active = 1,
            failure_count = 0
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::NotFound("subscription not found".to_string()));
    }

    get_subscription(pool, id).await
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    profile_id: String,
    url: String,
    secret: String,
    events: String,
    is_active: bool,
    last_success_at: Option<String>,
    last_failure_at: Option<String>,
    failure_count: i64,
    created_at: String,
}

impl TryFrom<SubscriptionRow> for WebhookSubscription {
    type Error = StoreError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let events: Vec<String> = serde_json::from_str(&row.events)
            .map_err(|err| StoreError::Parse(format!("invalid events JSON: {err}")))?;

        Ok(WebhookSubscription {
            id: Uuid::parse_str(&row.id)
                .map_err(|err| StoreError::Parse(format!("invalid subscription id: {err}")))?,
            profile_id: row.profile_id,
            url: row.url,
            secret: row.secret,
            events,
            is_active: row.is_active,
            last_success_at: row.last_success_at,
            last_failure_at: row.last_failure_at,
            failure_count: row.failure_count,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HealthRow {
    failure_count: i64,
    is_active: bool,
}

impl From<HealthRow> for HealthUpdate {
    fn from(row: HealthRow) -> Self {
        Self {
            failure_count: row.failure_count,
            is_active: row.is_active,
        }
    }
}
