use std::str::FromStr;

use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::server::model::item::Item;
use crate::server::model::order::{Order, OrderId};

pub(crate) type BillId = Uuid;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum BillStatus {
    #[display("unpaid")]
    Unpaid,
    #[display("paid")]
    Paid,
}

impl FromStr for BillStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(Self::Unpaid),
            "paid" => Ok(Self::Paid),
            s => Err(format!("Invalid bill status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Bill {
    pub id: BillId,
    pub order_ids: Vec<OrderId>,
    /// informational copy of the included orders' lines, never re-priced
    pub items: Vec<Item>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub table_id: Option<String>,
    pub status: BillStatus,
    pub payment_ref: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Caller-supplied extras for a new bill.
#[derive(Debug, Default, Clone)]
pub(crate) struct BillMeta {
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostBillsRequest {
    pub order_ids: Vec<OrderId>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PatchBillPaidRequest {
    pub payment_ref: String,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub(crate) struct BillFilter {
    pub status: Option<BillStatus>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetBillsResponse {
    pub count: usize,
    pub bills: Vec<Bill>,
}

/// Unbilled orders gathered under one display label, e.g. `Table T4`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BillGroup {
    pub label: String,
    pub orders: Vec<Order>,
    pub subtotal: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetBillGroupsResponse {
    pub groups: Vec<BillGroup>,
}
