//! SQL REST API warehouse backend.
//!
//! [`SqlApiWarehouse`] executes statements via `POST {base_url}/api/v2/statements`
//! with a bearer token. Positional `?` placeholders are bound through the
//! `bindings` object (`{"1": {"type": "FIXED", "value": "90"}}`), and result
//! rows come back as arrays of string-encoded cells in `data`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use chainsim_core::ScenarioId;

use super::{DemandRecord, InventoryRecord, SupplierRecord, WarehouseBackend};
use crate::error::{Error, Result};
use crate::result::SimulationResult;

const STATEMENTS_PATH: &str = "/api/v2/statements";

const INVENTORY_SQL: &str = "SELECT product_id, current_inventory, reorder_point, safety_stock \
     FROM inventory ORDER BY product_id";

const SUPPLIERS_SQL: &str = "SELECT supplier_id, supplier_name, product_id, lead_time_days, cost_per_unit \
     FROM suppliers ORDER BY supplier_id";

const DEMAND_SQL: &str = "SELECT product_id, date, demand \
     FROM demand_history \
     WHERE date >= DATEADD(day, -?, CURRENT_DATE()) \
     ORDER BY product_id, date";

const SAVE_RESULT_SQL: &str = "INSERT INTO simulation_results \
     (scenario_id, total_cost, service_level, inventory_cost, stockout_cost, \
     average_inventory_level, stockout_events, on_time_delivery, \
     total_orders, fulfilled_orders, completed_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP())";

/// Connection settings for the warehouse.
#[derive(Clone)]
pub struct WarehouseConfig {
    /// Account base URL.
    pub base_url: String,
    /// Bearer token.
    pub token: String,
    /// Compute warehouse executing the statements.
    pub warehouse: String,
    /// Database name.
    pub database: String,
    /// Schema name.
    pub schema: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl WarehouseConfig {
    /// Default compute warehouse.
    pub const DEFAULT_WAREHOUSE: &'static str = "COMPUTE_WH";
    /// Default database.
    pub const DEFAULT_DATABASE: &'static str = "SUPPLYCHAIN";
    /// Default schema.
    pub const DEFAULT_SCHEMA: &'static str = "RAW";

    /// Creates a config with default warehouse, database and schema.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            warehouse: Self::DEFAULT_WAREHOUSE.to_string(),
            database: Self::DEFAULT_DATABASE.to_string(),
            schema: Self::DEFAULT_SCHEMA.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the compute warehouse.
    #[must_use]
    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = warehouse.into();
        self
    }

    /// Sets the database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets the schema.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Sets the per-request HTTP timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct Binding {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
}

impl Binding {
    fn fixed(value: impl ToString) -> Self {
        Self {
            kind: "FIXED",
            value: value.to_string(),
        }
    }

    fn real(value: f64) -> Self {
        Self {
            kind: "REAL",
            value: value.to_string(),
        }
    }

    fn text(value: impl Into<String>) -> Self {
        Self {
            kind: "TEXT",
            value: value.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    warehouse: &'a str,
    database: &'a str,
    schema: &'a str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: BTreeMap<String, Binding>,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    #[serde(default)]
    data: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct StatementError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Warehouse backend speaking a REST SQL statements API.
#[derive(Debug)]
pub struct SqlApiWarehouse {
    config: WarehouseConfig,
    client: reqwest::Client,
}

impl SqlApiWarehouse {
    /// Creates a backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: WarehouseConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(Error::configuration("warehouse base_url cannot be empty"));
        }
        if config.token.is_empty() {
            return Err(Error::configuration("warehouse token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    async fn execute(
        &self,
        statement: &str,
        bindings: Vec<Binding>,
    ) -> Result<Vec<Vec<serde_json::Value>>> {
        let request = StatementRequest {
            statement,
            warehouse: &self.config.warehouse,
            database: &self.config.database,
            schema: &self.config.schema,
            bindings: bindings
                .into_iter()
                .enumerate()
                .map(|(i, b)| ((i + 1).to_string(), b))
                .collect(),
        };

        let url = format!(
            "{}{STATEMENTS_PATH}",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::storage_with_source("warehouse request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            if let Ok(error) = serde_json::from_str::<StatementError>(&body) {
                return Err(Error::storage(format!(
                    "warehouse statement failed: {} ({})",
                    error.message,
                    error.code.as_deref().unwrap_or("no code")
                )));
            }
            return Err(Error::storage(format!(
                "warehouse statement failed: {status} - {body}"
            )));
        }

        let body: StatementResponse = response
            .json()
            .await
            .map_err(|e| Error::serialization(format!("failed to parse statement response: {e}")))?;
        Ok(body.data)
    }
}

fn cell<'a>(row: &'a [serde_json::Value], index: usize, column: &str) -> Result<&'a serde_json::Value> {
    row.get(index)
        .filter(|v| !v.is_null())
        .ok_or_else(|| Error::serialization(format!("missing column {column}")))
}

fn text_cell(row: &[serde_json::Value], index: usize, column: &str) -> Result<String> {
    match cell(row, index, column)? {
        serde_json::Value::String(s) => Ok(s.clone()),
        other => Ok(other.to_string()),
    }
}

fn number_cell(row: &[serde_json::Value], index: usize, column: &str) -> Result<f64> {
    let value = cell(row, index, column)?;
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::serialization(format!("column {column} is not numeric: {value}")))
}

#[allow(clippy::cast_possible_truncation)]
fn integer_cell(row: &[serde_json::Value], index: usize, column: &str) -> Result<i64> {
    number_cell(row, index, column).map(|v| v.round() as i64)
}

fn date_cell(row: &[serde_json::Value], index: usize, column: &str) -> Result<NaiveDate> {
    let raw = text_cell(row, index, column)?;
    if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        return Ok(date);
    }
    // Date columns may come back as days since the epoch.
    let days = raw
        .parse::<i64>()
        .map_err(|_| Error::serialization(format!("column {column} is not a date: {raw}")))?;
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days)))
        .ok_or_else(|| Error::serialization(format!("column {column} is out of range: {raw}")))
}

fn parse_inventory(row: &[serde_json::Value]) -> Result<InventoryRecord> {
    Ok(InventoryRecord {
        product_id: text_cell(row, 0, "product_id")?,
        current_inventory: integer_cell(row, 1, "current_inventory")?,
        reorder_point: integer_cell(row, 2, "reorder_point")?,
        safety_stock: integer_cell(row, 3, "safety_stock")?,
    })
}

fn parse_supplier(row: &[serde_json::Value]) -> Result<SupplierRecord> {
    let lead_time = integer_cell(row, 3, "lead_time_days")?;
    Ok(SupplierRecord {
        supplier_id: text_cell(row, 0, "supplier_id")?,
        supplier_name: text_cell(row, 1, "supplier_name")?,
        product_id: text_cell(row, 2, "product_id")?,
        lead_time_days: i32::try_from(lead_time)
            .map_err(|_| Error::serialization(format!("lead_time_days out of range: {lead_time}")))?,
        cost_per_unit: number_cell(row, 4, "cost_per_unit")?,
    })
}

fn parse_demand(row: &[serde_json::Value]) -> Result<DemandRecord> {
    Ok(DemandRecord {
        product_id: text_cell(row, 0, "product_id")?,
        date: date_cell(row, 1, "date")?,
        demand: number_cell(row, 2, "demand")?,
    })
}

#[async_trait]
impl WarehouseBackend for SqlApiWarehouse {
    async fn inventory(&self) -> Result<Vec<InventoryRecord>> {
        let rows = self.execute(INVENTORY_SQL, Vec::new()).await?;
        rows.iter().map(|r| parse_inventory(r)).collect()
    }

    async fn suppliers(&self) -> Result<Vec<SupplierRecord>> {
        let rows = self.execute(SUPPLIERS_SQL, Vec::new()).await?;
        rows.iter().map(|r| parse_supplier(r)).collect()
    }

    async fn demand_history(&self, window_days: u32) -> Result<Vec<DemandRecord>> {
        let rows = self
            .execute(DEMAND_SQL, vec![Binding::fixed(window_days)])
            .await?;
        rows.iter().map(|r| parse_demand(r)).collect()
    }

    async fn save_result(&self, scenario_id: &ScenarioId, result: &SimulationResult) -> Result<()> {
        let metrics = &result.metrics;
        let bindings = vec![
            Binding::text(scenario_id.to_string()),
            Binding::real(result.total_cost),
            Binding::real(result.service_level),
            Binding::real(result.inventory_cost),
            Binding::real(result.stockout_cost),
            Binding::real(metrics.average_inventory_level),
            Binding::fixed(metrics.stockout_events),
            Binding::real(metrics.on_time_delivery),
            Binding::fixed(metrics.total_orders),
            Binding::fixed(metrics.fulfilled_orders),
        ];
        self.execute(SAVE_RESULT_SQL, bindings).await?;
        Ok(())
    }
}
