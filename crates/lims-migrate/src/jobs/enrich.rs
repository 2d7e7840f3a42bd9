//! Order enrichment: copy borrower, lab and equipment details onto
//! `lims_order` rows after migration.
//!
//! Runs in two phases. The read phase looks up each order's user and its lab
//! or equipment binding, one query per lookup. A failed or empty lookup is
//! logged and leaves the affected fields empty; the job moves on. The write
//! phase issues one `UPDATE` per order and stops at the first failure, since
//! a half-written table needs operator attention.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Row, Value};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::{
    EQUIPMENT_TABLE, FLOW_BIND_TABLE, LAB_TABLE, ORDER_TABLE, ORDER_TYPE_LAB, USER_TABLE,
};
use crate::core::traits::SqlExecutor;
use crate::core::value::CellValue;
use crate::db::DbPool;
use crate::error::{MigrateError, Result};

/// The columns of an order needed to find its related records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRef {
    pub id: i64,
    pub user_id: Option<i64>,
    pub borrow_id: Option<i64>,
    /// Discriminator: `"lab"` for lab reservations, anything else is an
    /// equipment reservation.
    pub order_type: String,
}

impl OrderRef {
    pub fn is_lab(&self) -> bool {
        self.order_type == ORDER_TYPE_LAB
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub realname: String,
    pub class_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabInfo {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquipmentInfo {
    pub lab_name: String,
    pub lab_code: String,
    pub equip_name: String,
    pub equip_model: String,
}

/// Result of listing orders: readable rows plus a count of rows skipped
/// because a key column could not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderListing {
    pub orders: Vec<OrderRef>,
    pub unreadable: usize,
}

/// Values written back to an order. Fields whose lookup failed stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderEnrichment {
    pub borrow_realname: String,
    pub class_name: String,
    pub lab_name: String,
    pub lab_code: String,
    pub equip_name: String,
    pub equip_model: String,
}

/// An order id with the values to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedOrder {
    pub id: i64,
    pub fields: OrderEnrichment,
}

/// Outcome of an enrichment run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichReport {
    /// Orders read.
    pub orders: usize,
    /// Order rows skipped because their keys could not be read.
    pub skipped: usize,
    /// Orders updated.
    pub updated: usize,
    /// Lookups that failed or found nothing.
    pub lookup_failures: usize,
}

/// Data access needed by the enrichment job.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Every order with its lookup keys. Rows that cannot be read are
    /// counted in [`OrderListing::unreadable`] instead of failing the listing.
    async fn load_orders(&self) -> Result<OrderListing>;

    /// Borrower name and class of a user.
    async fn find_user(&self, user_id: i64) -> Result<Option<UserInfo>>;

    /// Lab bound to a lab reservation.
    async fn find_lab_binding(&self, borrow_id: i64) -> Result<Option<LabInfo>>;

    /// Equipment (and its lab) bound to an equipment reservation.
    async fn find_equipment_binding(&self, borrow_id: i64) -> Result<Option<EquipmentInfo>>;

    /// Write the enrichment columns of one order.
    async fn update_order(&self, order: &EnrichedOrder) -> Result<u64>;
}

/// Run both phases against `store`.
///
/// A failed listing query is an error. Unreadable order rows and lookup
/// failures are counted and logged; the first update failure is returned as
/// an error.
pub async fn enrich_orders(store: &dyn OrderStore) -> Result<EnrichReport> {
    let OrderListing { orders, unreadable } = store.load_orders().await?;
    info!("Enriching {} orders ({} unreadable rows skipped)", orders.len(), unreadable);

    let mut report = EnrichReport {
        orders: orders.len(),
        skipped: unreadable,
        ..EnrichReport::default()
    };

    // TODO: look users and bindings up with one IN query per kind instead of
    // one round trip per order.
    let mut enriched = Vec::with_capacity(orders.len());
    for order in &orders {
        let (fields, failures) = enrich_order(store, order).await;
        report.lookup_failures += failures;
        enriched.push(EnrichedOrder {
            id: order.id,
            fields,
        });
    }

    for order in &enriched {
        store.update_order(order).await?;
        report.updated += 1;
    }

    info!(
        "Order enrichment finished: {} updated, {} failed lookups",
        report.updated, report.lookup_failures
    );
    Ok(report)
}

/// Look up the enrichment fields of one order. Returns the fields and the
/// number of lookups that failed or came back empty.
async fn enrich_order(store: &dyn OrderStore, order: &OrderRef) -> (OrderEnrichment, usize) {
    let mut fields = OrderEnrichment::default();
    let mut failures = 0;

    match order.user_id {
        Some(user_id) => match store.find_user(user_id).await {
            Ok(Some(user)) => {
                fields.borrow_realname = user.realname;
                fields.class_name = user.class_name;
            }
            Ok(None) => {
                warn!("Order {}: user {} not found", order.id, user_id);
                failures += 1;
            }
            Err(e) => {
                warn!("Order {}: reading user {} failed: {}", order.id, user_id, e);
                failures += 1;
            }
        },
        None => {
            warn!("Order {}: no user id", order.id);
            failures += 1;
        }
    }

    let Some(borrow_id) = order.borrow_id else {
        warn!("Order {}: no borrow id", order.id);
        return (fields, failures + 1);
    };

    if order.is_lab() {
        match store.find_lab_binding(borrow_id).await {
            Ok(Some(lab)) => {
                fields.lab_name = lab.name;
                fields.lab_code = lab.code;
            }
            Ok(None) => {
                warn!("Order {}: lab binding {} not found", order.id, borrow_id);
                failures += 1;
            }
            Err(e) => {
                warn!(
                    "Order {}: reading lab binding {} failed: {}",
                    order.id, borrow_id, e
                );
                failures += 1;
            }
        }
    } else {
        match store.find_equipment_binding(borrow_id).await {
            Ok(Some(equipment)) => {
                fields.lab_name = equipment.lab_name;
                fields.lab_code = equipment.lab_code;
                fields.equip_name = equipment.equip_name;
                fields.equip_model = equipment.equip_model;
            }
            Ok(None) => {
                warn!(
                    "Order {}: equipment binding {} not found",
                    order.id, borrow_id
                );
                failures += 1;
            }
            Err(e) => {
                warn!(
                    "Order {}: reading equipment binding {} failed: {}",
                    order.id, borrow_id, e
                );
                failures += 1;
            }
        }
    }

    (fields, failures)
}

/// [`OrderStore`] backed by the destination database.
pub struct MysqlOrderStore {
    pool: DbPool,
}

impl MysqlOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Run a single-row lookup and return its columns as text.
    async fn lookup(&self, sql: &str, key: i64, context: &str) -> Result<Option<Vec<String>>> {
        let mut conn = self.pool.conn().await?;
        let row: Option<Row> = conn
            .exec_first(sql, (key,))
            .await
            .map_err(|e| MigrateError::from_mysql(e, context))?;

        Ok(row.map(|row| {
            row.unwrap()
                .into_iter()
                .map(|v| CellValue::from_mysql(v).into_text().unwrap_or_default())
                .collect()
        }))
    }
}

fn lab_binding_sql() -> String {
    format!(
        "SELECT lab.name, lab.code FROM {} fb LEFT JOIN {} lab ON fb.bindid = lab.id \
         WHERE fb.id = ? AND fb.type = 'lab'",
        FLOW_BIND_TABLE, LAB_TABLE
    )
}

fn equipment_binding_sql() -> String {
    format!(
        "SELECT l.name, l.code, e.name, e.modelname FROM {} fb \
         LEFT JOIN {} e ON fb.bindid = e.id \
         LEFT JOIN {} l ON e.lab_id = l.id \
         WHERE fb.type = 'equipments' AND fb.id = ?",
        FLOW_BIND_TABLE, EQUIPMENT_TABLE, LAB_TABLE
    )
}

fn update_order_sql() -> String {
    format!(
        "UPDATE {} SET borrow_realname = ?, class_name = ?, lab_name = ?, lab_code = ?, \
         equip_name = ?, equip_model = ? WHERE id = ?",
        ORDER_TABLE
    )
}

fn update_order_params(order: &EnrichedOrder) -> Vec<Value> {
    let f = &order.fields;
    vec![
        Value::from(f.borrow_realname.as_str()),
        Value::from(f.class_name.as_str()),
        Value::from(f.lab_name.as_str()),
        Value::from(f.lab_code.as_str()),
        Value::from(f.equip_name.as_str()),
        Value::from(f.equip_model.as_str()),
        Value::from(order.id),
    ]
}

/// Pad a lookup result so missing trailing columns read as empty.
fn column(values: &[String], idx: usize) -> String {
    values.get(idx).cloned().unwrap_or_default()
}

/// `id, userid, borrow_id, type` of a `lims_order` row.
type OrderRow = (i64, Option<i64>, Option<i64>, Option<String>);

#[async_trait]
impl OrderStore for MysqlOrderStore {
    async fn load_orders(&self) -> Result<OrderListing> {
        let sql = format!("SELECT id, userid, borrow_id, type FROM {}", ORDER_TABLE);
        let context = format!("listing {}", ORDER_TABLE);

        let mut conn = self.pool.conn().await?;
        let rows: Vec<Row> = conn
            .query(sql)
            .await
            .map_err(|e| MigrateError::from_mysql(e, context.as_str()))?;

        let mut listing = OrderListing::default();
        for (idx, row) in rows.into_iter().enumerate() {
            match mysql_async::from_row_opt::<OrderRow>(row) {
                Ok((id, user_id, borrow_id, order_type)) => listing.orders.push(OrderRef {
                    id,
                    user_id,
                    borrow_id,
                    order_type: order_type.unwrap_or_default(),
                }),
                Err(e) => {
                    warn!("{}: skipping unreadable row {}: {}", context, idx + 1, e);
                    listing.unreadable += 1;
                }
            }
        }
        Ok(listing)
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<UserInfo>> {
        let sql = format!("SELECT realname, className FROM {} WHERE id = ?", USER_TABLE);
        let values = self.lookup(&sql, user_id, "reading user").await?;
        Ok(values.map(|v| UserInfo {
            realname: column(&v, 0),
            class_name: column(&v, 1),
        }))
    }

    async fn find_lab_binding(&self, borrow_id: i64) -> Result<Option<LabInfo>> {
        let values = self
            .lookup(&lab_binding_sql(), borrow_id, "reading lab binding")
            .await?;
        Ok(values.map(|v| LabInfo {
            name: column(&v, 0),
            code: column(&v, 1),
        }))
    }

    async fn find_equipment_binding(&self, borrow_id: i64) -> Result<Option<EquipmentInfo>> {
        let values = self
            .lookup(&equipment_binding_sql(), borrow_id, "reading equipment binding")
            .await?;
        Ok(values.map(|v| EquipmentInfo {
            lab_name: column(&v, 0),
            lab_code: column(&v, 1),
            equip_name: column(&v, 2),
            equip_model: column(&v, 3),
        }))
    }

    async fn update_order(&self, order: &EnrichedOrder) -> Result<u64> {
        self.pool
            .execute(&update_order_sql(), update_order_params(order))
            .await
    }
}
