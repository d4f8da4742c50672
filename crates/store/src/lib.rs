//! Embedded SQLite persistence for crawl intelligence, domain policy lists
//! and the on-disk alert trail.

use std::collections::HashSet;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

use onionwatch_core::Page;

mod risk;

pub use risk::calculate_risk_score;

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExportFilters {
    pub domain: Option<String>,
    pub min_risk: Option<u8>,
    pub has_crypto: bool,
    pub has_secrets: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopDomain {
    pub domain: String,
    pub pages: i64,
    pub risk: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Stats {
    pub total: i64,
    pub success: i64,
    pub domains: i64,
    pub with_secrets: i64,
    pub with_crypto: i64,
    pub with_emails: i64,
    pub avg_risk: f64,
    pub max_risk: i64,
    pub total_size_mb: f64,
    pub top_domains: Vec<TopDomain>,
    pub unread_alerts: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlertRow {
    pub id: i64,
    pub alert_type: String,
    pub message: String,
    pub url: String,
    pub domain: String,
    pub severity: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DomainListEntry {
    pub id: i64,
    pub domain: String,
    pub list_type: String,
    pub reason: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DomainLists {
    pub blacklist: Vec<DomainListEntry>,
    pub whitelist: Vec<DomainListEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HighRiskSite {
    pub url: String,
    pub domain: String,
    pub title: String,
    pub risk_score: u8,
    pub cryptos: serde_json::Value,
    pub emails: Vec<String>,
    pub secrets_found: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimelineBucket {
    pub date: String,
    pub total: i64,
    pub success: i64,
    pub domains: i64,
}

/// Columns that may be missing from an older on-disk schema, and the DDL
/// fragment to add them. Mirrors `database.py::_init_db`'s additive
/// migration loop: never rename or narrow an existing column.
const ADDITIVE_COLUMNS: &[(&str, &str)] = &[
    ("language", "TEXT DEFAULT ''"),
    ("keywords", "TEXT DEFAULT '[]'"),
    ("category", "TEXT DEFAULT ''"),
    ("tags", "TEXT DEFAULT '[]'"),
    ("risk_score", "INTEGER DEFAULT 0"),
    ("last_crawl", "TIMESTAMP DEFAULT CURRENT_TIMESTAMP"),
    ("onion_links", "TEXT DEFAULT '[]'"),
    ("phones", "TEXT DEFAULT '[]'"),
    ("has_pgp", "INTEGER DEFAULT 0"),
];

impl Store {
    pub async fn new(database_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{database_path}"))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .context("connecting to sqlite database")?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!(path = database_path, "store ready");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("../migrations/001_init.sql"))
            .execute(&self.pool)
            .await?;

        let existing: HashSet<String> = sqlx::query("PRAGMA table_info(intel)")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| row.get::<String, _>("name"))
            .collect();

        for (col, ddl) in ADDITIVE_COLUMNS {
            if !existing.contains(*col) {
                let stmt = format!("ALTER TABLE intel ADD COLUMN {col} {ddl}");
                // SQLite refuses to add a column twice under concurrent
                // migration attempts; ignore, don't propagate.
                let _ = sqlx::query(&stmt).execute(&self.pool).await;
            }
        }

        info!("schema migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upsert a crawled page, recomputing its risk score server-side, and
    /// drop a convenience row into `alerts` for high-risk or secret-bearing
    /// pages — the persisted trail that backs AlertManager's own in-memory
    /// history.
    pub async fn save_page(&self, page: &Page) -> Result<()> {
        let risk_score = calculate_risk_score(page);

        sqlx::query(
            r#"INSERT INTO intel
                (url, domain, title, status, depth, content_length, tech_stack,
                 secrets_found, ip_leaks, emails, comments, cryptos, socials,
                 json_data, onion_links, phones, has_pgp, language, keywords,
                 category, tags, risk_score, last_crawl)
               VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,CURRENT_TIMESTAMP)
               ON CONFLICT(url) DO UPDATE SET
                 domain=excluded.domain, title=excluded.title, status=excluded.status,
                 depth=excluded.depth, content_length=excluded.content_length,
                 tech_stack=excluded.tech_stack, secrets_found=excluded.secrets_found,
                 ip_leaks=excluded.ip_leaks, emails=excluded.emails,
                 comments=excluded.comments, cryptos=excluded.cryptos,
                 socials=excluded.socials, json_data=excluded.json_data,
                 onion_links=excluded.onion_links, phones=excluded.phones,
                 has_pgp=excluded.has_pgp, language=excluded.language,
                 keywords=excluded.keywords, category=excluded.category,
                 tags=excluded.tags, risk_score=excluded.risk_score,
                 last_crawl=CURRENT_TIMESTAMP"#,
        )
        .bind(&page.url)
        .bind(&page.domain)
        .bind(&page.title)
        .bind(page.status as i64)
        .bind(page.depth as i64)
        .bind(page.content_length as i64)
        .bind(serde_json::to_string(&page.tech_stack)?)
        .bind(serde_json::to_string(&page.secrets)?)
        .bind(serde_json::to_string(&page.ip_leaks)?)
        .bind(serde_json::to_string(&page.emails)?)
        .bind(serde_json::to_string(&page.comments)?)
        .bind(serde_json::to_string(&page.cryptos)?)
        .bind(serde_json::to_string(&page.socials)?)
        .bind(serde_json::to_string(&page.json_data)?)
        .bind(serde_json::to_string(&page.onion_links)?)
        .bind(serde_json::to_string(&page.phones)?)
        .bind(page.has_pgp as i64)
        .bind(&page.language)
        .bind(serde_json::to_string(&page.keywords)?)
        .bind(&page.category)
        .bind(serde_json::to_string(&page.tags)?)
        .bind(risk_score as i64)
        .execute(&self.pool)
        .await?;

        if risk_score >= 70 {
            self.create_alert(
                "high_risk",
                &format!("High-risk site detected: {}", page.domain),
                &page.url,
                &page.domain,
                "danger",
            )
            .await?;
        } else if !page.secrets.is_empty() {
            self.create_alert(
                "secret_found",
                &format!("Secret found on {}", page.domain),
                &page.url,
                &page.domain,
                "warning",
            )
            .await?;
        }

        Ok(())
    }

    async fn create_alert(
        &self,
        alert_type: &str,
        message: &str,
        url: &str,
        domain: &str,
        severity: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO alerts (type, message, url, domain, severity) VALUES (?,?,?,?,?)",
        )
        .bind(alert_type)
        .bind(message)
        .bind(url)
        .bind(domain)
        .bind(severity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn visited_urls(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT url FROM intel")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("url"))
            .collect())
    }

    pub async fn pending_urls(&self, limit: i64) -> Result<Vec<(String, u32)>> {
        let rows = sqlx::query(
            "SELECT url, depth FROM intel WHERE status = 0 OR status >= 400
             ORDER BY depth ASC, found_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>("url"), row.get::<i64, _>("depth") as u32))
            .collect())
    }

    pub async fn successful_urls_for_recrawl(
        &self,
        min_depth: u32,
        limit: i64,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT url FROM intel WHERE status = 200 AND depth >= ?
             ORDER BY found_at DESC LIMIT ?",
        )
        .bind(min_depth as i64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|row| row.get::<String, _>("url")).collect())
    }

    pub async fn get_stats(&self) -> Result<Stats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) as total,
                SUM(CASE WHEN status = 200 THEN 1 ELSE 0 END) as success,
                COUNT(DISTINCT domain) as domains,
                SUM(CASE WHEN secrets_found != '{}' THEN 1 ELSE 0 END) as with_secrets,
                SUM(CASE WHEN cryptos != '{}' THEN 1 ELSE 0 END) as with_crypto,
                SUM(CASE WHEN emails != '[]' THEN 1 ELSE 0 END) as with_emails,
                AVG(risk_score) as avg_risk,
                MAX(risk_score) as max_risk,
                SUM(content_length) as total_size
             FROM intel",
        )
        .fetch_one(&self.pool)
        .await?;

        let top_rows = sqlx::query(
            "SELECT domain, COUNT(*) as pages, AVG(risk_score) as risk
             FROM intel WHERE status = 200
             GROUP BY domain ORDER BY pages DESC LIMIT 10",
        )
        .fetch_all(&self.pool)
        .await?;
        let top_domains = top_rows
            .into_iter()
            .map(|r| TopDomain {
                domain: r.get("domain"),
                pages: r.get("pages"),
                risk: (r.get::<Option<f64>, _>("risk").unwrap_or(0.0) * 10.0).round() / 10.0,
            })
            .collect();

        let unread_alerts: i64 = sqlx::query("SELECT COUNT(*) as c FROM alerts WHERE read = 0")
            .fetch_one(&self.pool)
            .await
            .map(|r| r.get("c"))
            .unwrap_or(0);

        let total_size: i64 = row.try_get::<Option<i64>, _>("total_size").ok().flatten().unwrap_or(0);

        Ok(Stats {
            total: row.try_get("total").unwrap_or(0),
            success: row.try_get::<Option<i64>, _>("success").ok().flatten().unwrap_or(0),
            domains: row.try_get("domains").unwrap_or(0),
            with_secrets: row.try_get::<Option<i64>, _>("with_secrets").ok().flatten().unwrap_or(0),
            with_crypto: row.try_get::<Option<i64>, _>("with_crypto").ok().flatten().unwrap_or(0),
            with_emails: row.try_get::<Option<i64>, _>("with_emails").ok().flatten().unwrap_or(0),
            avg_risk: (row.try_get::<Option<f64>, _>("avg_risk").ok().flatten().unwrap_or(0.0) * 10.0).round() / 10.0,
            max_risk: row.try_get::<Option<i64>, _>("max_risk").ok().flatten().unwrap_or(0),
            total_size_mb: (total_size as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0,
            top_domains,
            unread_alerts,
        })
    }

    pub async fn blacklist_add(&self, domain: &str, reason: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO domain_lists (domain, list_type, reason) VALUES (?, 'blacklist', ?)
             ON CONFLICT(domain) DO UPDATE SET list_type='blacklist', reason=excluded.reason",
        )
        .bind(domain)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn whitelist_add(&self, domain: &str, reason: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO domain_lists (domain, list_type, reason) VALUES (?, 'whitelist', ?)
             ON CONFLICT(domain) DO UPDATE SET list_type='whitelist', reason=excluded.reason",
        )
        .bind(domain)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn blacklist_remove(&self, domain: &str) -> Result<()> {
        sqlx::query("DELETE FROM domain_lists WHERE domain = ?")
            .bind(domain)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn is_blacklisted(&self, domain: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 as present FROM domain_lists WHERE domain = ? AND list_type = 'blacklist'",
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn domain_lists(&self) -> Result<DomainLists> {
        let rows = sqlx::query("SELECT * FROM domain_lists ORDER BY added_at DESC")
            .fetch_all(&self.pool)
            .await?;
        let mut lists = DomainLists::default();
        for row in rows {
            let entry = DomainListEntry {
                id: row.get("id"),
                domain: row.get("domain"),
                list_type: row.get("list_type"),
                reason: row.get("reason"),
                added_at: row.get("added_at"),
            };
            if entry.list_type == "blacklist" {
                lists.blacklist.push(entry);
            } else {
                lists.whitelist.push(entry);
            }
        }
        Ok(lists)
    }

    pub async fn get_alerts(&self, limit: i64, unread_only: bool) -> Result<Vec<AlertRow>> {
        let query = if unread_only {
            "SELECT * FROM alerts WHERE read = 0 ORDER BY created_at DESC LIMIT ?"
        } else {
            "SELECT * FROM alerts ORDER BY created_at DESC LIMIT ?"
        };
        let rows = sqlx::query(query).bind(limit).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| AlertRow {
                id: row.get("id"),
                alert_type: row.get("type"),
                message: row.get("message"),
                url: row.get("url"),
                domain: row.get("domain"),
                severity: row.get("severity"),
                read: row.get::<i64, _>("read") != 0,
                created_at: row.get("created_at"),
            })
            .collect())
    }

    pub async fn mark_alerts_read(&self, ids: Option<&[i64]>) -> Result<()> {
        match ids {
            Some(ids) if !ids.is_empty() => {
                let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                let stmt = format!("UPDATE alerts SET read = 1 WHERE id IN ({placeholders})");
                let mut q = sqlx::query(&stmt);
                for id in ids {
                    q = q.bind(id);
                }
                q.execute(&self.pool).await?;
            }
            _ => {
                sqlx::query("UPDATE alerts SET read = 1")
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn clear_alerts(&self) -> Result<()> {
        sqlx::query("DELETE FROM alerts").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn high_risk_sites(&self, min_score: u8, limit: i64) -> Result<Vec<HighRiskSite>> {
        let rows = sqlx::query(
            "SELECT url, domain, title, risk_score, cryptos, emails, secrets_found
             FROM intel WHERE status = 200 AND risk_score >= ?
             ORDER BY risk_score DESC LIMIT ?",
        )
        .bind(min_score as i64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let cryptos: String = row.get("cryptos");
                let emails: String = row.get("emails");
                let secrets: String = row.get("secrets_found");
                Ok(HighRiskSite {
                    url: row.get("url"),
                    domain: row.get("domain"),
                    title: row.get("title"),
                    risk_score: row.get::<i64, _>("risk_score") as u8,
                    cryptos: serde_json::from_str(&cryptos).unwrap_or_default(),
                    emails: serde_json::from_str(&emails).unwrap_or_default(),
                    secrets_found: serde_json::from_str(&secrets).unwrap_or_default(),
                })
            })
            .collect()
    }

    pub async fn timeline_stats(&self, days: i64) -> Result<Vec<TimelineBucket>> {
        let modifier = format!("-{days} days");
        let rows = sqlx::query(
            "SELECT DATE(found_at) as date, COUNT(*) as total,
                SUM(CASE WHEN status = 200 THEN 1 ELSE 0 END) as success,
                COUNT(DISTINCT domain) as domains
             FROM intel WHERE found_at >= DATE('now', ?)
             GROUP BY DATE(found_at) ORDER BY date DESC",
        )
        .bind(modifier)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| TimelineBucket {
                date: row.get("date"),
                total: row.get("total"),
                success: row.try_get::<Option<i64>, _>("success").ok().flatten().unwrap_or(0),
                domains: row.get("domains"),
            })
            .collect())
    }

    /// Delete (or, with `anonymize`, null out sensitive columns on) rows
    /// older than `days`. Returns the number of rows affected.
    pub async fn purge(&self, days: i64, anonymize: bool) -> Result<u64> {
        let modifier = format!("-{days} days");
        if anonymize {
            let result = sqlx::query(
                "UPDATE intel SET emails='[]', secrets_found='{}', cryptos='{}',
                    socials='{}', phones='[]', ip_leaks='[]'
                 WHERE found_at < DATE('now', ?)",
            )
            .bind(modifier)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        } else {
            let result = sqlx::query("DELETE FROM intel WHERE found_at < DATE('now', ?)")
                .bind(modifier)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }
    }

    pub async fn vacuum(&self) -> Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    /// Queue a validated seed URL for crawling. A no-op if the URL is
    /// already known (queued, in-progress, or already crawled).
    pub async fn queue_seed(&self, url: &str, domain: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO intel (url, domain, status, depth) VALUES (?, ?, 0, 0)",
        )
        .bind(url)
        .bind(domain)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Toggle a dashboard-assigned label (`important` | `false_positive`)
    /// on a page's `tags`, reusing the additive `tags` column rather than
    /// adding dedicated boolean columns.
    pub async fn mark_intel(&self, url: &str, label: &str, value: bool) -> Result<bool> {
        let row = sqlx::query("SELECT tags FROM intel WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(false);
        };
        let raw: String = row.get("tags");
        let mut tags: Vec<String> = serde_json::from_str(&raw).unwrap_or_default();
        tags.retain(|t| t != label);
        if value {
            tags.push(label.to_string());
        }
        sqlx::query("UPDATE intel SET tags = ? WHERE url = ?")
            .bind(serde_json::to_string(&tags)?)
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    /// Most recently crawled pages, newest first — the dashboard's default
    /// "recent activity" read.
    pub async fn recent_pages(&self, limit: i64) -> Result<Vec<HighRiskSite>> {
        let rows = sqlx::query(
            "SELECT url, domain, title, risk_score, cryptos, emails, secrets_found
             FROM intel WHERE status = 200
             ORDER BY last_crawl DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                let cryptos: String = row.get("cryptos");
                let emails: String = row.get("emails");
                let secrets: String = row.get("secrets_found");
                Ok(HighRiskSite {
                    url: row.get("url"),
                    domain: row.get("domain"),
                    title: row.get("title"),
                    risk_score: row.get::<i64, _>("risk_score") as u8,
                    cryptos: serde_json::from_str(&cryptos).unwrap_or_default(),
                    emails: serde_json::from_str(&emails).unwrap_or_default(),
                    secrets_found: serde_json::from_str(&secrets).unwrap_or_default(),
                })
            })
            .collect()
    }

    pub async fn export_json(&self, path: &str, filters: &ExportFilters) -> Result<usize> {
        let mut query = String::from("SELECT * FROM intel WHERE status = 200");
        if filters.domain.is_some() {
            query.push_str(" AND domain LIKE ?");
        }
        if filters.min_risk.is_some() {
            query.push_str(" AND risk_score >= ?");
        }
        if filters.has_crypto {
            query.push_str(" AND cryptos != '{}'");
        }
        if filters.has_secrets {
            query.push_str(" AND secrets_found != '{}'");
        }

        let mut q = sqlx::query(&query);
        if let Some(domain) = &filters.domain {
            q = q.bind(format!("%{domain}%"));
        }
        if let Some(min_risk) = filters.min_risk {
            q = q.bind(min_risk as i64);
        }
        let rows = q.fetch_all(&self.pool).await?;
        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let page = row_to_json(row);
            results.push(page);
        }

        tokio::fs::write(path, serde_json::to_string_pretty(&results)?).await?;
        Ok(results.len())
    }

    pub async fn export_csv(&self, path: &str, include_all: bool) -> Result<usize> {
        let query = if include_all {
            "SELECT * FROM intel ORDER BY found_at DESC"
        } else {
            "SELECT * FROM intel WHERE status = 200 AND (
                secrets_found != '{}' OR cryptos != '{}' OR socials != '{}' OR emails != '[]'
             ) ORDER BY risk_score DESC"
        };
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let mut out = String::from("URL,Domain,Title,Status,Risk Score,Emails,Crypto,Secrets,Socials,Found At\n");
        for row in &rows {
            let emails: Vec<String> = serde_json::from_str(&row.get::<String, _>("emails")).unwrap_or_default();
            let cryptos: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(&row.get::<String, _>("cryptos")).unwrap_or_default();
            let secrets: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(&row.get::<String, _>("secrets_found")).unwrap_or_default();
            let socials: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(&row.get::<String, _>("socials")).unwrap_or_default();

            let title: String = row.get("title");
            let crypto_summary = cryptos
                .iter()
                .map(|(k, v)| format!("{k}:{}", v.as_array().map(|a| a.len()).unwrap_or(0)))
                .collect::<Vec<_>>()
                .join("; ");

            out.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{}\n",
                csv_escape(&row.get::<String, _>("url")),
                csv_escape(&row.get::<String, _>("domain")),
                csv_escape(&title.chars().take(100).collect::<String>()),
                row.get::<i64, _>("status"),
                row.get::<i64, _>("risk_score"),
                csv_escape(&emails.iter().take(5).cloned().collect::<Vec<_>>().join("; ")),
                csv_escape(&crypto_summary),
                csv_escape(&secrets.keys().cloned().collect::<Vec<_>>().join("; ")),
                csv_escape(&socials.keys().cloned().collect::<Vec<_>>().join("; ")),
                row.get::<DateTime<Utc>, _>("found_at"),
            ));
        }

        tokio::fs::write(path, out).await?;
        Ok(rows.len())
    }

    pub async fn export_emails(&self, path: &str) -> Result<usize> {
        let rows = sqlx::query(
            "SELECT DISTINCT domain, emails FROM intel WHERE emails != '[]' AND status = 200",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_domain: std::collections::BTreeMap<String, std::collections::BTreeSet<String>> =
            Default::default();
        let mut all = HashSet::new();
        for row in rows {
            let domain: String = row.get("domain");
            let emails: Vec<String> = serde_json::from_str(&row.get::<String, _>("emails")).unwrap_or_default();
            for email in emails {
                all.insert(email.clone());
                by_domain.entry(domain.clone()).or_default().insert(email);
            }
        }

        let mut out = format!(
            "# Emails - {}\n# Total: {} emails\n\n",
            Utc::now().format("%Y-%m-%d %H:%M"),
            all.len()
        );
        for (domain, emails) in &by_domain {
            out.push_str(&format!("\n## {domain}\n"));
            for email in emails {
                out.push_str(email);
                out.push('\n');
            }
        }

        tokio::fs::write(path, out).await?;
        Ok(all.len())
    }

    pub async fn export_crypto(&self, path: &str) -> Result<usize> {
        let rows = sqlx::query("SELECT cryptos FROM intel WHERE cryptos != '{}' AND status = 200")
            .fetch_all(&self.pool)
            .await?;

        let mut by_coin: std::collections::BTreeMap<String, std::collections::BTreeSet<String>> =
            Default::default();
        for row in rows {
            let cryptos: std::collections::HashMap<String, Vec<String>> =
                serde_json::from_str(&row.get::<String, _>("cryptos")).unwrap_or_default();
            for (coin, addresses) in cryptos {
                let entry = by_coin.entry(coin).or_default();
                for addr in addresses {
                    entry.insert(addr);
                }
            }
        }

        let mut out = format!("# Crypto Addresses - {}\n", Utc::now().format("%Y-%m-%d %H:%M"));
        let mut total = 0;
        for (coin, addresses) in &by_coin {
            if addresses.is_empty() {
                continue;
            }
            out.push_str(&format!("\n## {coin} ({})\n", addresses.len()));
            for addr in addresses {
                out.push_str(addr);
                out.push('\n');
            }
            total += addresses.len();
        }

        tokio::fs::write(path, out).await?;
        Ok(total)
    }
}

fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn row_to_json(row: &sqlx::sqlite::SqliteRow) -> serde_json::Value {
    let json_fields = [
        "tech_stack",
        "secrets_found",
        "ip_leaks",
        "emails",
        "comments",
        "cryptos",
        "socials",
        "json_data",
        "onion_links",
        "phones",
        "keywords",
        "tags",
    ];
    let mut map = serde_json::Map::new();
    map.insert("url".into(), row.get::<String, _>("url").into());
    map.insert("domain".into(), row.get::<String, _>("domain").into());
    map.insert("title".into(), row.get::<String, _>("title").into());
    map.insert("status".into(), row.get::<i64, _>("status").into());
    map.insert("depth".into(), row.get::<i64, _>("depth").into());
    map.insert("risk_score".into(), row.get::<i64, _>("risk_score").into());
    map.insert("language".into(), row.get::<String, _>("language").into());
    map.insert("category".into(), row.get::<String, _>("category").into());
    map.insert(
        "has_pgp".into(),
        (row.get::<i64, _>("has_pgp") != 0).into(),
    );
    map.insert(
        "found_at".into(),
        row.get::<DateTime<Utc>, _>("found_at").to_rfc3339().into(),
    );
    for field in json_fields {
        let raw: String = row.get(field);
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null);
        map.insert(field.to_string(), value);
    }
    serde_json::Value::Object(map)
}
