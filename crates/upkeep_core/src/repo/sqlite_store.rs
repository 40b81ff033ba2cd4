//! SQLite-backed maintenance store.
//!
//! # Responsibility
//! - Implement `MaintenanceStore` and `CatalogRepository` over the migrated
//!   schema.
//! - Enforce task deduplication with the `(asset_id, template_id,
//!   due_period)` unique index, treating conflicts as `AlreadyExists`.
//!
//! # Invariants
//! - Read paths never mask invalid persisted state. Scheduler reads set a
//!   malformed row aside as a `RejectedRecord` and keep its siblings;
//!   catalog reads fail with `InvalidData`.
//! - Dates are stored as `YYYY-MM-DD`, timestamps as RFC 3339 text.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::{open_db, open_db_in_memory};
use crate::model::account::{Account, AccountId};
use crate::model::asset::{Asset, AssetId, AssetOwner};
use crate::model::{normalize_tag, ValidationError};
use crate::model::task::{DuePeriod, MaintenanceTask, TaskId, TaskStatus};
use crate::model::template::{
    LeadTime, LeadTimeUnit, MaintenanceTemplate, TemplateId, TemplateScope,
};
use crate::repo::catalog::CatalogRepository;
use crate::repo::store::{
    InsertOutcome, Loaded, MaintenanceStore, RecordKind, StoreError, StoreResult,
};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

const OWNED_ASSETS_CTE: &str = "WITH RECURSIVE owned(id) AS (
    SELECT id FROM assets WHERE account_id = ?1
    UNION
    SELECT child.id
    FROM assets child
    INNER JOIN owned parent ON child.parent_id = parent.id
)";

const TASK_SELECT_SQL: &str = "SELECT
    id,
    account_id,
    asset_id,
    template_id,
    title,
    due_on,
    due_period,
    visible_from,
    status,
    created_at
FROM maintenance_tasks";

pub struct SqliteMaintenanceStore {
    conn: Mutex<Connection>,
}

impl SqliteMaintenanceStore {
    /// Wraps a connection that already has the latest schema applied.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        let version = current_user_version(&conn)?;
        if version != latest_version() {
            return Err(StoreError::InvalidData(format!(
                "schema version {version} does not match expected {}",
                latest_version()
            )));
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a database file, applying migrations first.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::try_new(open_db(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    /// Locks and returns the underlying connection.
    ///
    /// Callers issuing raw SQL must keep to the current schema.
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

impl MaintenanceStore for SqliteMaintenanceStore {
    fn account_exists(&self, account_id: AccountId) -> StoreResult<bool> {
        let conn = self.conn.lock();
        account_exists(&conn, account_id)
    }

    fn find_templates_for_account(
        &self,
        account_id: AccountId,
    ) -> StoreResult<Loaded<MaintenanceTemplate>> {
        let conn = self.conn.lock();
        let account_text = account_id.to_string();

        let mut classes: HashMap<String, Vec<String>> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT tac.template_id, tac.asset_class
                 FROM template_asset_classes tac
                 INNER JOIN maintenance_templates t ON t.id = tac.template_id
                 WHERE t.account_id IS NULL OR t.account_id = ?1
                 ORDER BY tac.asset_class ASC;",
            )?;
            let mut rows = stmt.query([account_text.as_str()])?;
            while let Some(row) = rows.next()? {
                let template_id: String = row.get(0)?;
                classes.entry(template_id).or_default().push(row.get(1)?);
            }
        }

        let mut stmt = conn.prepare(
            "SELECT
                id,
                account_id,
                name,
                category,
                interval_months,
                lead_time_amount,
                lead_time_unit
             FROM maintenance_templates
             WHERE account_id IS NULL OR account_id = ?1
             ORDER BY name ASC, id ASC;",
        )?;
        let mut rows = stmt.query([account_text.as_str()])?;
        let mut templates = Loaded::default();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get("id")?;
            let asset_classes = classes.remove(&id_text).unwrap_or_default();
            let decoded = parse_template_row(row, asset_classes);
            templates.push_decoded(RecordKind::Template, &id_text, decoded)?;
        }
        Ok(templates)
    }

    fn find_assets_for_account(&self, account_id: AccountId) -> StoreResult<Loaded<Asset>> {
        let conn = self.conn.lock();
        let account_text = account_id.to_string();

        // A malformed service date poisons only the asset that owns it.
        let mut service_dates: HashMap<String, StoreResult<Vec<(String, NaiveDate)>>> =
            HashMap::new();
        {
            let mut stmt = conn.prepare(&format!(
                "{OWNED_ASSETS_CTE}
                 SELECT sd.asset_id, sd.category, sd.serviced_on
                 FROM asset_service_dates sd
                 INNER JOIN owned o ON o.id = sd.asset_id;"
            ))?;
            let mut rows = stmt.query([account_text.as_str()])?;
            while let Some(row) = rows.next()? {
                let asset_id: String = row.get(0)?;
                let category: String = row.get(1)?;
                let serviced_on = parse_date(
                    &row.get::<_, String>(2)?,
                    "asset_service_dates.serviced_on",
                );
                let entry = service_dates
                    .entry(asset_id)
                    .or_insert_with(|| Ok(Vec::new()));
                match serviced_on {
                    Ok(serviced_on) => {
                        if let Ok(dates) = entry {
                            dates.push((category, serviced_on));
                        }
                    }
                    Err(err) => *entry = Err(err),
                }
            }
        }

        let mut stmt = conn.prepare(&format!(
            "{OWNED_ASSETS_CTE}
             SELECT
                a.id,
                a.account_id,
                a.parent_id,
                a.asset_class,
                a.name,
                a.acquired_on,
                a.created_on
             FROM assets a
             INNER JOIN owned o ON o.id = a.id
             ORDER BY a.id ASC;"
        ))?;
        let mut rows = stmt.query([account_text.as_str()])?;
        let mut assets = Loaded::default();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get("id")?;
            let dates = service_dates.remove(&id_text).unwrap_or_else(|| Ok(Vec::new()));
            let decoded = parse_asset_row(row).and_then(|mut asset| {
                asset.last_serviced = dates?.into_iter().collect();
                Ok(asset)
            });
            assets.push_decoded(RecordKind::Asset, &id_text, decoded)?;
        }
        Ok(assets)
    }

    fn find_existing_tasks(&self, account_id: AccountId) -> StoreResult<Loaded<MaintenanceTask>> {
        let conn = self.conn.lock();
        query_tasks(&conn, account_id, None)
    }

    fn insert_task_if_absent(&self, task: &MaintenanceTask) -> StoreResult<InsertOutcome> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "INSERT INTO maintenance_tasks (
                id,
                account_id,
                asset_id,
                template_id,
                title,
                due_on,
                due_period,
                visible_from,
                status,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(asset_id, template_id, due_period) DO NOTHING;",
            params![
                task.id.to_string(),
                task.account_id.to_string(),
                task.asset_id.to_string(),
                task.template_id.to_string(),
                task.title.as_str(),
                format_date(task.due_on),
                task.due_period.key(),
                format_date(task.visible_from),
                task.status.as_str(),
                task.created_at.to_rfc3339(),
            ],
        )?;

        Ok(if changed == 0 {
            InsertOutcome::AlreadyExists
        } else {
            InsertOutcome::Inserted
        })
    }
}

impl CatalogRepository for SqliteMaintenanceStore {
    fn create_account(&self, account: &Account) -> StoreResult<AccountId> {
        account.validate()?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO accounts (id, name) VALUES (?1, ?2);",
            params![account.id.to_string(), account.name.trim()],
        )?;
        Ok(account.id)
    }

    fn create_asset(&self, asset: &Asset) -> StoreResult<AssetId> {
        asset.validate()?;
        let mut conn = self.conn.lock();

        let (account_id, parent_id) = match asset.owner {
            AssetOwner::Account(account_id) => {
                if !account_exists(&conn, account_id)? {
                    return Err(StoreError::NotFound {
                        entity: "account",
                        id: account_id,
                    });
                }
                (Some(account_id.to_string()), None)
            }
            AssetOwner::Parent(parent_id) => {
                if !asset_exists(&conn, parent_id)? {
                    return Err(StoreError::NotFound {
                        entity: "asset",
                        id: parent_id,
                    });
                }
                (None, Some(parent_id.to_string()))
            }
        };

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO assets (
                id,
                account_id,
                parent_id,
                asset_class,
                name,
                acquired_on,
                created_on
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                asset.id.to_string(),
                account_id,
                parent_id,
                normalize_tag(&asset.asset_class),
                asset.name.trim(),
                asset.acquired_on.map(format_date),
                asset.created_on.map(format_date),
            ],
        )?;
        for (category, serviced_on) in &asset.last_serviced {
            tx.execute(
                "INSERT INTO asset_service_dates (asset_id, category, serviced_on)
                 VALUES (?1, ?2, ?3);",
                params![
                    asset.id.to_string(),
                    normalize_tag(category),
                    format_date(*serviced_on)
                ],
            )?;
        }
        tx.commit()?;

        Ok(asset.id)
    }

    fn record_service(
        &self,
        asset_id: AssetId,
        category: &str,
        serviced_on: NaiveDate,
    ) -> StoreResult<()> {
        let category = normalize_tag(category);
        if category.is_empty() {
            return Err(ValidationError::BlankField("category").into());
        }

        let conn = self.conn.lock();
        if !asset_exists(&conn, asset_id)? {
            return Err(StoreError::NotFound {
                entity: "asset",
                id: asset_id,
            });
        }
        conn.execute(
            "INSERT INTO asset_service_dates (asset_id, category, serviced_on)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(asset_id, category) DO UPDATE SET serviced_on = excluded.serviced_on;",
            params![asset_id.to_string(), category, format_date(serviced_on)],
        )?;
        Ok(())
    }

    fn create_template(&self, template: &MaintenanceTemplate) -> StoreResult<TemplateId> {
        template.validate()?;
        let mut conn = self.conn.lock();

        let account_id = match template.scope {
            TemplateScope::Global => None,
            TemplateScope::Account(account_id) => {
                if !account_exists(&conn, account_id)? {
                    return Err(StoreError::NotFound {
                        entity: "account",
                        id: account_id,
                    });
                }
                Some(account_id.to_string())
            }
        };

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO maintenance_templates (
                id,
                account_id,
                name,
                category,
                interval_months,
                lead_time_amount,
                lead_time_unit
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                template.id.to_string(),
                account_id,
                template.name.trim(),
                normalize_tag(&template.category),
                template.interval_months,
                template.lead_time.map(|lead| lead.amount),
                template.lead_time.map(|lead| lead_time_unit_to_db(lead.unit)),
            ],
        )?;
        for class in &template.asset_classes {
            tx.execute(
                "INSERT OR IGNORE INTO template_asset_classes (template_id, asset_class)
                 VALUES (?1, ?2);",
                params![template.id.to_string(), normalize_tag(class)],
            )?;
        }
        tx.commit()?;

        Ok(template.id)
    }

    fn list_tasks(
        &self,
        account_id: AccountId,
        status: Option<TaskStatus>,
    ) -> StoreResult<Vec<MaintenanceTask>> {
        let conn = self.conn.lock();
        let loaded = query_tasks(&conn, account_id, status)?;
        match loaded.rejected.into_iter().next() {
            Some(rejected) => Err(StoreError::InvalidData(rejected.reason)),
            None => Ok(loaded.records),
        }
    }

    fn set_task_status(
        &self,
        account_id: AccountId,
        task_id: TaskId,
        status: TaskStatus,
    ) -> StoreResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE maintenance_tasks SET status = ?1 WHERE id = ?2 AND account_id = ?3;",
            params![
                status.as_str(),
                task_id.to_string(),
                account_id.to_string()
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "task",
                id: task_id,
            });
        }
        Ok(())
    }
}

fn account_exists(conn: &Connection, account_id: AccountId) -> StoreResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM accounts WHERE id = ?1;",
            [account_id.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn asset_exists(conn: &Connection, asset_id: AssetId) -> StoreResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM assets WHERE id = ?1;",
            [asset_id.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn query_tasks(
    conn: &Connection,
    account_id: AccountId,
    status: Option<TaskStatus>,
) -> StoreResult<Loaded<MaintenanceTask>> {
    let mut stmt = conn.prepare(&format!(
        "{TASK_SELECT_SQL}
         WHERE account_id = ?1
           AND (?2 IS NULL OR status = ?2)
         ORDER BY due_on ASC, id ASC;"
    ))?;
    let mut rows = stmt.query(params![
        account_id.to_string(),
        status.map(TaskStatus::as_str)
    ])?;
    let mut tasks = Loaded::default();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get("id")?;
        let decoded = parse_task_row(row);
        tasks.push_decoded(RecordKind::Task, &id_text, decoded)?;
    }
    Ok(tasks)
}

fn parse_template_row(
    row: &Row<'_>,
    asset_classes: Vec<String>,
) -> StoreResult<MaintenanceTemplate> {
    let id = parse_uuid(&row.get::<_, String>("id")?, "maintenance_templates.id")?;
    let scope = match row.get::<_, Option<String>>("account_id")? {
        Some(value) => TemplateScope::Account(parse_uuid(
            &value,
            "maintenance_templates.account_id",
        )?),
        None => TemplateScope::Global,
    };

    let amount = row.get::<_, Option<u32>>("lead_time_amount")?;
    let unit = row.get::<_, Option<String>>("lead_time_unit")?;
    let lead_time = match (amount, unit.as_deref()) {
        (Some(amount), Some(unit)) => Some(LeadTime {
            amount,
            unit: parse_lead_time_unit(unit).ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "invalid lead time unit `{unit}` in maintenance_templates.lead_time_unit"
                ))
            })?,
        }),
        (None, None) => None,
        _ => {
            return Err(StoreError::InvalidData(format!(
                "template {id} has a partial lead time"
            )));
        }
    };

    Ok(MaintenanceTemplate {
        id,
        scope,
        name: row.get("name")?,
        category: row.get("category")?,
        asset_classes,
        interval_months: row.get("interval_months")?,
        lead_time,
    })
}

fn parse_asset_row(row: &Row<'_>) -> StoreResult<Asset> {
    let id = parse_uuid(&row.get::<_, String>("id")?, "assets.id")?;
    let account_id = row.get::<_, Option<String>>("account_id")?;
    let parent_id = row.get::<_, Option<String>>("parent_id")?;
    let owner = match (account_id, parent_id) {
        (Some(account), None) => AssetOwner::Account(parse_uuid(&account, "assets.account_id")?),
        (None, Some(parent)) => AssetOwner::Parent(parse_uuid(&parent, "assets.parent_id")?),
        _ => {
            return Err(StoreError::InvalidData(format!(
                "asset {id} must have exactly one owner"
            )));
        }
    };

    Ok(Asset {
        id,
        owner,
        asset_class: row.get("asset_class")?,
        name: row.get("name")?,
        acquired_on: parse_optional_date(row.get("acquired_on")?, "assets.acquired_on")?,
        created_on: parse_optional_date(row.get("created_on")?, "assets.created_on")?,
        last_serviced: Default::default(),
    })
}

fn parse_task_row(row: &Row<'_>) -> StoreResult<MaintenanceTask> {
    let status_text: String = row.get("status")?;
    let status = TaskStatus::parse(&status_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid task status `{status_text}` in maintenance_tasks.status"
        ))
    })?;

    let period_text: String = row.get("due_period")?;
    let due_period = DuePeriod::parse_key(&period_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid due period `{period_text}` in maintenance_tasks.due_period"
        ))
    })?;

    let created_text: String = row.get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_text)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|_| {
            StoreError::InvalidData(format!(
                "invalid timestamp `{created_text}` in maintenance_tasks.created_at"
            ))
        })?;

    Ok(MaintenanceTask {
        id: parse_uuid(&row.get::<_, String>("id")?, "maintenance_tasks.id")?,
        account_id: parse_uuid(
            &row.get::<_, String>("account_id")?,
            "maintenance_tasks.account_id",
        )?,
        asset_id: parse_uuid(&row.get::<_, String>("asset_id")?, "maintenance_tasks.asset_id")?,
        template_id: parse_uuid(
            &row.get::<_, String>("template_id")?,
            "maintenance_tasks.template_id",
        )?,
        title: row.get("title")?,
        due_on: parse_date(&row.get::<_, String>("due_on")?, "maintenance_tasks.due_on")?,
        due_period,
        visible_from: parse_date(
            &row.get::<_, String>("visible_from")?,
            "maintenance_tasks.visible_from",
        )?,
        status,
        created_at,
    })
}

fn parse_uuid(value: &str, column: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn parse_date(value: &str, column: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| StoreError::InvalidData(format!("invalid date `{value}` in {column}")))
}

fn parse_optional_date(value: Option<String>, column: &str) -> StoreResult<Option<NaiveDate>> {
    value.map(|text| parse_date(&text, column)).transpose()
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn lead_time_unit_to_db(unit: LeadTimeUnit) -> &'static str {
    match unit {
        LeadTimeUnit::Days => "days",
        LeadTimeUnit::Months => "months",
    }
}

fn parse_lead_time_unit(value: &str) -> Option<LeadTimeUnit> {
    match value {
        "days" => Some(LeadTimeUnit::Days),
        "months" => Some(LeadTimeUnit::Months),
        _ => None,
    }
}
