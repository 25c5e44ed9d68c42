//! Usage statistics over chat sessions, for the admin analytics pages.
//!
//! Every query accepts an optional inclusive day range on the session's
//! creation time. Exports render the same rows as CSV.

use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

pub const BROWSER_LIMIT: i64 = 10;
pub const DAILY_WINDOW_DAYS: i64 = 30;

/// Inclusive range of calendar days (UTC), either end optional.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Parses a `YYYY-MM-DD` day, `None` when malformed.
    pub fn parse_day(raw: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
    }

    fn start_ts(&self) -> Option<i64> {
        self.start
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp())
    }

    /// First second after the end day.
    fn end_ts(&self) -> Option<i64> {
        self.end
            .and_then(|d| d.succ_opt())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp())
    }

    fn push_filters(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(start) = self.start_ts() {
            qb.push(" AND created_at >= ").push_bind(start);
        }
        if let Some(end) = self.end_ts() {
            qb.push(" AND created_at < ").push_bind(end);
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CountryStat {
    pub country: String,
    pub country_name: Option<String>,
    pub sessions_count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeviceStat {
    pub device_type: String,
    pub sessions_count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BrowserStat {
    pub browser: String,
    pub sessions_count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyStat {
    pub date: String,
    pub sessions: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneralStats {
    pub total_sessions: i64,
    pub unique_users: i64,
    pub anonymous_sessions: i64,
    pub daily_stats: Vec<DailyStat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub general: GeneralStats,
    pub countries: Vec<CountryStat>,
    pub devices: Vec<DeviceStat>,
    pub browsers: Vec<BrowserStat>,
}

pub async fn country_stats(pool: &SqlitePool, range: &DateRange) -> Result<Vec<CountryStat>> {
    let mut qb = QueryBuilder::new(
        "SELECT country, MAX(country_name) AS country_name, COUNT(*) AS sessions_count
         FROM ai_chat_sessions WHERE country IS NOT NULL",
    );
    range.push_filters(&mut qb);
    qb.push(" GROUP BY country ORDER BY sessions_count DESC, country");

    let rows = qb.build().fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|row| CountryStat {
            country: row.get("country"),
            country_name: row.get("country_name"),
            sessions_count: row.get("sessions_count"),
        })
        .collect())
}

pub async fn device_stats(pool: &SqlitePool, range: &DateRange) -> Result<Vec<DeviceStat>> {
    let mut qb = QueryBuilder::new(
        "SELECT device_type, COUNT(*) AS sessions_count
         FROM ai_chat_sessions WHERE device_type IS NOT NULL",
    );
    range.push_filters(&mut qb);
    qb.push(" GROUP BY device_type ORDER BY sessions_count DESC, device_type");

    let rows = qb.build().fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|row| DeviceStat {
            device_type: row.get("device_type"),
            sessions_count: row.get("sessions_count"),
        })
        .collect())
}

pub async fn browser_stats(pool: &SqlitePool, range: &DateRange) -> Result<Vec<BrowserStat>> {
    let mut qb = QueryBuilder::new(
        "SELECT browser, COUNT(*) AS sessions_count
         FROM ai_chat_sessions WHERE browser IS NOT NULL",
    );
    range.push_filters(&mut qb);
    qb.push(" GROUP BY browser ORDER BY sessions_count DESC, browser LIMIT ")
        .push_bind(BROWSER_LIMIT);

    let rows = qb.build().fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|row| BrowserStat {
            browser: row.get("browser"),
            sessions_count: row.get("sessions_count"),
        })
        .collect())
}

/// Totals over the range plus sessions per day for the last 30 days.
pub async fn general_stats(pool: &SqlitePool, range: &DateRange) -> Result<GeneralStats> {
    let mut qb = QueryBuilder::new(
        "SELECT COUNT(*) AS total_sessions,
                COUNT(DISTINCT user_id) AS unique_users,
                COALESCE(SUM(CASE WHEN user_id IS NULL THEN 1 ELSE 0 END), 0) AS anonymous_sessions
         FROM ai_chat_sessions WHERE 1 = 1",
    );
    range.push_filters(&mut qb);
    let totals = qb.build().fetch_one(pool).await?;

    let since = (Utc::now() - Duration::days(DAILY_WINDOW_DAYS)).timestamp();
    let daily_stats = sqlx::query(
        "SELECT DATE(created_at, 'unixepoch') AS date, COUNT(*) AS sessions
         FROM ai_chat_sessions WHERE created_at >= ?
         GROUP BY date ORDER BY date",
    )
    .bind(since)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| DailyStat {
        date: row.get("date"),
        sessions: row.get("sessions"),
    })
    .collect();

    Ok(GeneralStats {
        total_sessions: totals.get("total_sessions"),
        unique_users: totals.get("unique_users"),
        anonymous_sessions: totals.get("anonymous_sessions"),
        daily_stats,
    })
}

pub async fn overview(pool: &SqlitePool, range: &DateRange) -> Result<Overview> {
    Ok(Overview {
        general: general_stats(pool, range).await?,
        countries: country_stats(pool, range).await?,
        devices: device_stats(pool, range).await?,
        browsers: browser_stats(pool, range).await?,
    })
}

// ============ Export ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    General,
    Countries,
    Devices,
    Browsers,
}

impl ExportKind {
    /// Unknown names fall back to the general report.
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("countries") => ExportKind::Countries,
            Some("devices") => ExportKind::Devices,
            Some("browsers") => ExportKind::Browsers,
            _ => ExportKind::General,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ExportKind::General => "analytics_general.csv",
            ExportKind::Countries => "analytics_countries.csv",
            ExportKind::Devices => "analytics_devices.csv",
            ExportKind::Browsers => "analytics_browsers.csv",
        }
    }
}

/// CSV with a header row. The general report lists the daily sessions.
pub async fn export_csv(pool: &SqlitePool, kind: ExportKind, range: &DateRange) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    match kind {
        ExportKind::General => {
            let stats = general_stats(pool, range).await?;
            write_rows(&mut writer, &stats.daily_stats)?;
        }
        ExportKind::Countries => write_rows(&mut writer, &country_stats(pool, range).await?)?,
        ExportKind::Devices => write_rows(&mut writer, &device_stats(pool, range).await?)?,
        ExportKind::Browsers => write_rows(&mut writer, &browser_stats(pool, range).await?)?,
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

fn write_rows<T: Serialize>(writer: &mut csv::Writer<Vec<u8>>, rows: &[T]) -> Result<()> {
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::create_session;
    use crate::testing::test_pool;
    use crate::tracking::TrackingData;

    fn tracked(country: &str, device: &str, browser: &str) -> TrackingData {
        TrackingData {
            country: Some(country.into()),
            country_name: crate::tracking::country_name(country).map(str::to_string),
            device_type: Some(device.into()),
            browser: Some(browser.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn groups_sessions() {
        let (_tmp, pool) = test_pool().await;
        create_session(&pool, None, &tracked("CI", "mobile", "Chrome"))
            .await
            .unwrap();
        create_session(&pool, None, &tracked("CI", "desktop", "Firefox"))
            .await
            .unwrap();
        create_session(&pool, None, &tracked("FR", "mobile", "Chrome"))
            .await
            .unwrap();
        create_session(&pool, None, &TrackingData::default())
            .await
            .unwrap();

        let range = DateRange::default();
        let countries = country_stats(&pool, &range).await.unwrap();
        assert_eq!(countries.len(), 2);
        assert_eq!(countries[0].country, "CI");
        assert_eq!(countries[0].sessions_count, 2);
        assert_eq!(countries[0].country_name.as_deref(), Some("Côte d'Ivoire"));

        let devices = device_stats(&pool, &range).await.unwrap();
        assert_eq!(devices[0].device_type, "mobile");
        assert_eq!(devices[0].sessions_count, 2);

        let general = general_stats(&pool, &range).await.unwrap();
        assert_eq!(general.total_sessions, 4);
        assert_eq!(general.unique_users, 0);
        assert_eq!(general.anonymous_sessions, 4);
        assert_eq!(general.daily_stats.iter().map(|d| d.sessions).sum::<i64>(), 4);
    }

    #[tokio::test]
    async fn range_excludes_other_days() {
        let (_tmp, pool) = test_pool().await;
        create_session(&pool, None, &tracked("CI", "mobile", "Chrome"))
            .await
            .unwrap();

        let range = DateRange {
            start: DateRange::parse_day("2001-01-01"),
            end: DateRange::parse_day("2001-12-31"),
        };
        assert!(country_stats(&pool, &range).await.unwrap().is_empty());
        assert_eq!(general_stats(&pool, &range).await.unwrap().total_sessions, 0);
    }

    #[tokio::test]
    async fn csv_has_header_row() {
        let (_tmp, pool) = test_pool().await;
        create_session(&pool, None, &tracked("SN", "tablet", "Safari"))
            .await
            .unwrap();

        let csv = export_csv(&pool, ExportKind::Browsers, &DateRange::default())
            .await
            .unwrap();
        assert_eq!(csv, "browser,sessions_count\nSafari,1\n");
        assert_eq!(ExportKind::from_name(Some("nope")), ExportKind::General);
    }
}
