use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::server::model::bill::BillId;
use crate::server::model::item::{Item, ItemInput};

pub(crate) type OrderId = Uuid;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum OrderType {
    #[display("table")]
    Table,
    #[display("delivery")]
    Delivery,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum OrderStatus {
    #[display("pending")]
    Pending,
    #[display("accepted")]
    Accepted,
    #[display("preparing")]
    Preparing,
    #[display("ready")]
    Ready,
    #[display("served")]
    Served,
    #[display("out-for-delivery")]
    OutForDelivery,
    #[display("delivered")]
    Delivered,
    #[display("cancelled")]
    Cancelled,
    #[display("billed")]
    Billed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Served,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Billed,
    ];
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.to_string() == s)
            .ok_or_else(|| format!("Invalid order status: {s}"))
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(Self::Table),
            "delivery" => Ok(Self::Delivery),
            s => Err(format!("Invalid order type: {s}")),
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum PaymentStatus {
    #[display("unpaid")]
    Unpaid,
    #[display("paid")]
    Paid,
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(Self::Unpaid),
            "paid" => Ok(Self::Paid),
            s => Err(format!("Invalid payment status: {s}")),
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum PaymentMethod {
    #[display("cash")]
    Cash,
    #[display("upi")]
    Upi,
    #[display("card")]
    Card,
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "upi" => Ok(Self::Upi),
            "card" => Ok(Self::Card),
            s => Err(format!("Invalid payment method: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Customer {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Order {
    pub id: OrderId,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub table_id: Option<String>,
    pub customer: Customer,
    pub items: Vec<Item>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub bill_id: Option<BillId>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Room key the customer follows: the table for dine-in, the order itself for delivery.
    pub fn session_key(&self) -> String {
        match (&self.order_type, &self.table_id) {
            (OrderType::Table, Some(table_id)) => table_id.clone(),
            _ => self.id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostOrderRequest {
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(default)]
    pub table_id: Option<String>,
    pub customer: Customer,
    pub items: Vec<ItemInput>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PatchOrderStatusRequest {
    pub status: OrderStatus,
    /// compare-and-swap guard; the update is refused when the order moved on
    #[serde(default)]
    pub version: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderFilter {
    pub status: Option<OrderStatus>,
    #[serde(rename = "type")]
    pub order_type: Option<OrderType>,
    pub table_id: Option<String>,
    pub billed: Option<bool>,
    /// `true` keeps orders still moving through the kitchen, i.e. neither billed nor cancelled
    pub active: Option<bool>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status == s)
            && self.order_type.map_or(true, |t| order.order_type == t)
            && self
                .table_id
                .as_deref()
                .map_or(true, |t| order.table_id.as_deref() == Some(t))
            && self.billed.map_or(true, |b| order.bill_id.is_some() == b)
            && self.active.map_or(true, |a| !order.status.is_terminal() == a)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GetOrdersResponse {
    pub count: usize,
    pub orders: Vec<Order>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct OrderSummaryQuery {
    /// UTC calendar day, today when absent
    pub date: Option<NaiveDate>,
}

/// Dashboard figures for one day of orders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderSummary {
    pub date: NaiveDate,
    pub order_count: u64,
    /// sum of `total` over the day's orders that were not cancelled
    pub revenue: Decimal,
}
