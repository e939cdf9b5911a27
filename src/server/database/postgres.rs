use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::warn;
use rust_decimal::Decimal;
use tokio::time;
use tokio_postgres::types::{Json, ToSql};
use tokio_postgres::Row;

use crate::server::controller::error::CoreError;
use crate::server::database::pool::Pool;
use crate::server::database::pool_config::PoolConfig;
use crate::server::database::{ensure_billable, Store};
use crate::server::model::bill::{Bill, BillFilter, BillId, BillStatus};
use crate::server::model::booking::{Booking, BookingFilter, BookingId, BookingStatus};
use crate::server::model::config::DbConfig;
use crate::server::model::order::{Order, OrderFilter, OrderId, OrderStatus};
use crate::server::model::CommonRequestParams;

const ORDER_COLUMNS: &str = "id, order_type, table_id, customer, items, subtotal, tax, total, \
    status, payment_status, payment_method, bill_id, version, created_at, updated_at";
const BILL_COLUMNS: &str = "id, order_ids, items, subtotal, tax, total, customer_name, customer_phone, \
    table_id, status, payment_ref, notes, created_by, created_at, paid_at";
const BOOKING_COLUMNS: &str = "id, booking_type, customer_name, phone, date, time, guests, \
    event_details, status, version, created_at, updated_at";

/// Postgres-backed store with separate read and write pools.
#[derive(Clone)]
pub(crate) struct PgStore {
    read_pool: Pool,
    write_pool: Pool,
    timeout: Duration,
}

impl PgStore {
    pub async fn connect(db: &DbConfig) -> anyhow::Result<Self> {
        let pool = |name, conn_str: &String| {
            Pool::new(&PoolConfig {
                name,
                size: db.pool_size,
                conn_str: conn_str.clone(),
                acquire_timeout: db.timeout,
            })
        };
        let (read_pool, write_pool) = (pool("read", &db.read_conn_str), pool("write", &db.write_conn_str));
        read_pool.init(db.pool_size).await?;
        write_pool.init(db.pool_size).await?;
        Ok(Self { read_pool, write_pool, timeout: db.timeout })
    }

    /// every store call gets the same deadline
    async fn bounded<T>(&self, op: &str, fut: impl Future<Output = Result<T, CoreError>>) -> Result<T, CoreError> {
        let sleep = time::sleep(self.timeout);
        tokio::pin!(sleep);
        tokio::select! {
            result = fut => result,
            _ = &mut sleep => {
                warn!("{} exceeded {:?}", op, self.timeout);
                Err(CoreError::Timeout)
            }
        }
    }
}

fn parse_text<T: FromStr<Err = String>>(row: &Row, column: &str) -> Result<T, CoreError> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(CoreError::persistence)
}

fn parse_opt_text<T: FromStr<Err = String>>(row: &Row, column: &str) -> Result<Option<T>, CoreError> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| s.parse().map_err(CoreError::persistence)).transpose()
}

fn order_from_row(row: &Row) -> Result<Order, CoreError> {
    let Json(customer) = row.try_get("customer")?;
    let Json(items) = row.try_get("items")?;
    Ok(Order {
        id: row.try_get("id")?,
        order_type: parse_text(row, "order_type")?,
        table_id: row.try_get("table_id")?,
        customer,
        items,
        subtotal: row.try_get("subtotal")?,
        tax: row.try_get("tax")?,
        total: row.try_get("total")?,
        status: parse_text(row, "status")?,
        payment_status: parse_text(row, "payment_status")?,
        payment_method: parse_opt_text(row, "payment_method")?,
        bill_id: row.try_get("bill_id")?,
        version: row.try_get::<_, i64>("version")? as u64,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn bill_from_row(row: &Row) -> Result<Bill, CoreError> {
    let Json(items) = row.try_get("items")?;
    Ok(Bill {
        id: row.try_get("id")?,
        order_ids: row.try_get("order_ids")?,
        items,
        subtotal: row.try_get("subtotal")?,
        tax: row.try_get("tax")?,
        total: row.try_get("total")?,
        customer_name: row.try_get("customer_name")?,
        customer_phone: row.try_get("customer_phone")?,
        table_id: row.try_get("table_id")?,
        status: parse_text(row, "status")?,
        payment_ref: row.try_get("payment_ref")?,
        notes: row.try_get("notes")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        paid_at: row.try_get("paid_at")?,
    })
}

fn booking_from_row(row: &Row) -> Result<Booking, CoreError> {
    let event_details: Option<Json<_>> = row.try_get("event_details")?;
    Ok(Booking {
        id: row.try_get("id")?,
        booking_type: parse_text(row, "booking_type")?,
        customer_name: row.try_get("customer_name")?,
        phone: row.try_get("phone")?,
        date: row.try_get("date")?,
        time: row.try_get("time")?,
        guests: row.try_get::<_, i32>("guests")? as u32,
        event_details: event_details.map(|Json(details)| details),
        status: parse_text(row, "status")?,
        version: row.try_get::<_, i64>("version")? as u64,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn rows_into<T>(rows: Vec<Row>, map: fn(&Row) -> Result<T, CoreError>) -> Result<Vec<T>, CoreError> {
    rows.iter().map(map).collect()
}

fn page_params(page: CommonRequestParams) -> (i64, i64) {
    let (offset, limit) = page.window();
    (offset as i64, limit as i64)
}

impl Store for PgStore {
    async fn insert_order(&self, order: &Order) -> Result<(), CoreError> {
        self.bounded("insert_order", async {
            let conn = self.write_pool.acquire().await?;
            let (order_type, status, payment_status) = (
                order.order_type.to_string(),
                order.status.to_string(),
                order.payment_status.to_string(),
            );
            let payment_method = order.payment_method.map(|m| m.to_string());
            let version = order.version as i64;
            let params: &[&(dyn ToSql + Sync)] = &[
                &order.id,
                &order_type,
                &order.table_id,
                &Json(&order.customer),
                &Json(&order.items),
                &order.subtotal,
                &order.tax,
                &order.total,
                &status,
                &payment_status,
                &payment_method,
                &order.bill_id,
                &version,
                &order.created_at,
                &order.updated_at,
            ];
            conn.execute(
                &format!(
                    "INSERT INTO orders ({ORDER_COLUMNS}) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
                ),
                params,
            )
            .await?;
            Ok(())
        })
        .await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, CoreError> {
        self.bounded("get_order", async {
            let conn = self.read_pool.acquire().await?;
            let row = conn
                .query_opt(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"), &[&id])
                .await?;
            row.as_ref().map(order_from_row).transpose()
        })
        .await
    }

    async fn list_orders(&self, filter: &OrderFilter, page: CommonRequestParams) -> Result<Vec<Order>, CoreError> {
        self.bounded("list_orders", async {
            let conn = self.read_pool.acquire().await?;
            let status = filter.status.map(|s| s.to_string());
            let order_type = filter.order_type.map(|t| t.to_string());
            let (offset, limit) = page_params(page);
            let rows = conn
                .query(
                    &format!(
                        r#"
                        SELECT {ORDER_COLUMNS} FROM orders
                        WHERE ($1::text IS NULL OR status = $1)
                        AND ($2::text IS NULL OR order_type = $2)
                        AND ($3::text IS NULL OR table_id = $3)
                        AND ($4::bool IS NULL OR (bill_id IS NOT NULL) = $4)
                        AND ($7::bool IS NULL OR (status NOT IN ('billed', 'cancelled')) = $7)
                        ORDER BY seq DESC
                        OFFSET $5
                        LIMIT $6
                        "#
                    ),
                    &[&status, &order_type, &filter.table_id, &filter.billed, &offset, &limit, &filter.active],
                )
                .await?;
            rows_into(rows, order_from_row)
        })
        .await
    }

    async fn billable_orders(&self) -> Result<Vec<Order>, CoreError> {
        self.bounded("billable_orders", async {
            let conn = self.read_pool.acquire().await?;
            let rows = conn
                .query(
                    &format!(
                        "SELECT {ORDER_COLUMNS} FROM orders \
                         WHERE bill_id IS NULL AND status IN ('ready', 'served', 'delivered') \
                         ORDER BY seq DESC"
                    ),
                    &[],
                )
                .await?;
            rows_into(rows, order_from_row)
        })
        .await
    }

    async fn summarize_orders(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<(u64, Decimal), CoreError> {
        self.bounded("summarize_orders", async {
            let conn = self.read_pool.acquire().await?;
            let row = conn
                .query_one(
                    r#"
                    SELECT COUNT(*) AS order_count,
                           COALESCE(SUM(total) FILTER (WHERE status <> 'cancelled'), 0) AS revenue
                    FROM orders
                    WHERE created_at >= $1 AND created_at < $2
                    "#,
                    &[&from, &until],
                )
                .await?;
            Ok((row.try_get::<_, i64>("order_count")? as u64, row.try_get("revenue")?))
        })
        .await
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        (status, version): (OrderStatus, u64),
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Order, CoreError> {
        self.bounded("update_order_status", async {
            let conn = self.write_pool.acquire().await?;
            let (next, status, version) = (next.to_string(), status.to_string(), version as i64);
            let row = conn
                .query_opt(
                    &format!(
                        r#"
                        UPDATE orders SET status = $1, version = version + 1, updated_at = $2
                        WHERE id = $3 AND status = $4 AND version = $5
                        RETURNING {ORDER_COLUMNS}
                        "#
                    ),
                    &[&next, &at, &id, &status, &version],
                )
                .await?;
            match row {
                Some(row) => order_from_row(&row),
                None => match conn.query_opt("SELECT status FROM orders WHERE id = $1", &[&id]).await? {
                    Some(current) => Err(CoreError::conflict(format!(
                        "order {} was changed concurrently and is now {}",
                        id,
                        current.try_get::<_, String>("status")?
                    ))),
                    None => Err(CoreError::not_found("order", id)),
                },
            }
        })
        .await
    }

    async fn mark_billed(&self, ids: &[OrderId], bill_id: BillId, at: DateTime<Utc>) -> Result<Vec<Order>, CoreError> {
        self.bounded("mark_billed", async {
            let mut conn = self.write_pool.acquire().await?;
            let txn = conn.transaction().await?;
            let rows = txn
                .query(
                    &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ANY($1) FOR UPDATE"),
                    &[&ids],
                )
                .await?;
            let locked = rows_into(rows, order_from_row)?;
            for id in ids {
                let order = locked
                    .iter()
                    .find(|o| o.id == *id)
                    .ok_or_else(|| CoreError::not_found("order", id))?;
                ensure_billable(order)?;
            }
            let rows = txn
                .query(
                    &format!(
                        r#"
                        UPDATE orders SET status = 'billed', bill_id = $1, version = version + 1, updated_at = $2
                        WHERE id = ANY($3)
                        RETURNING {ORDER_COLUMNS}
                        "#
                    ),
                    &[&bill_id, &at, &ids],
                )
                .await?;
            let billed = rows_into(rows, order_from_row)?;
            txn.commit().await?;
            // keep the caller's order
            Ok(ids
                .iter()
                .filter_map(|id| billed.iter().find(|o| o.id == *id).cloned())
                .collect())
        })
        .await
    }

    async fn insert_bill(&self, bill: &Bill) -> Result<(), CoreError> {
        self.bounded("insert_bill", async {
            let conn = self.write_pool.acquire().await?;
            let status = bill.status.to_string();
            let params: &[&(dyn ToSql + Sync)] = &[
                &bill.id,
                &bill.order_ids,
                &Json(&bill.items),
                &bill.subtotal,
                &bill.tax,
                &bill.total,
                &bill.customer_name,
                &bill.customer_phone,
                &bill.table_id,
                &status,
                &bill.payment_ref,
                &bill.notes,
                &bill.created_by,
                &bill.created_at,
                &bill.paid_at,
            ];
            conn.execute(
                &format!(
                    "INSERT INTO bills ({BILL_COLUMNS}) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
                ),
                params,
            )
            .await?;
            Ok(())
        })
        .await
    }

    async fn delete_bill(&self, id: BillId) -> Result<(), CoreError> {
        self.bounded("delete_bill", async {
            let conn = self.write_pool.acquire().await?;
            conn.execute("DELETE FROM bills WHERE id = $1", &[&id]).await?;
            Ok(())
        })
        .await
    }

    async fn get_bill(&self, id: BillId) -> Result<Option<Bill>, CoreError> {
        self.bounded("get_bill", async {
            let conn = self.read_pool.acquire().await?;
            let row = conn
                .query_opt(&format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = $1"), &[&id])
                .await?;
            row.as_ref().map(bill_from_row).transpose()
        })
        .await
    }

    async fn list_bills(&self, filter: BillFilter, page: CommonRequestParams) -> Result<Vec<Bill>, CoreError> {
        self.bounded("list_bills", async {
            let conn = self.read_pool.acquire().await?;
            let status = filter.status.map(|s| s.to_string());
            let (offset, limit) = page_params(page);
            let rows = conn
                .query(
                    &format!(
                        "SELECT {BILL_COLUMNS} FROM bills \
                         WHERE ($1::text IS NULL OR status = $1) \
                         ORDER BY seq DESC OFFSET $2 LIMIT $3"
                    ),
                    &[&status, &offset, &limit],
                )
                .await?;
            rows_into(rows, bill_from_row)
        })
        .await
    }

    async fn mark_bill_paid(&self, id: BillId, payment_ref: &str, at: DateTime<Utc>) -> Result<Bill, CoreError> {
        self.bounded("mark_bill_paid", async {
            let mut conn = self.write_pool.acquire().await?;
            let txn = conn.transaction().await?;
            let (paid, unpaid) = (BillStatus::Paid.to_string(), BillStatus::Unpaid.to_string());
            let row = txn
                .query_opt(
                    &format!(
                        r#"
                        UPDATE bills SET status = $1, payment_ref = $2, paid_at = $3
                        WHERE id = $4 AND status = $5
                        RETURNING {BILL_COLUMNS}
                        "#
                    ),
                    &[&paid, &payment_ref, &at, &id, &unpaid],
                )
                .await?;
            let Some(row) = row else {
                let exists = txn.query_opt("SELECT 1 FROM bills WHERE id = $1", &[&id]).await?;
                return Err(match exists {
                    Some(_) => CoreError::conflict(format!("bill {id} was paid concurrently")),
                    None => CoreError::not_found("bill", id),
                });
            };
            let bill = bill_from_row(&row)?;
            txn.execute(
                "UPDATE orders SET payment_status = 'paid', updated_at = $1 WHERE bill_id = $2",
                &[&at, &id],
            )
            .await?;
            txn.commit().await?;
            Ok(bill)
        })
        .await
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), CoreError> {
        self.bounded("insert_booking", async {
            let conn = self.write_pool.acquire().await?;
            let (booking_type, status) = (booking.booking_type.to_string(), booking.status.to_string());
            let (guests, version) = (booking.guests as i32, booking.version as i64);
            let event_details = booking.event_details.as_ref().map(Json);
            let params: &[&(dyn ToSql + Sync)] = &[
                &booking.id,
                &booking_type,
                &booking.customer_name,
                &booking.phone,
                &booking.date,
                &booking.time,
                &guests,
                &event_details,
                &status,
                &version,
                &booking.created_at,
                &booking.updated_at,
            ];
            conn.execute(
                &format!(
                    "INSERT INTO bookings ({BOOKING_COLUMNS}) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
                ),
                params,
            )
            .await?;
            Ok(())
        })
        .await
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, CoreError> {
        self.bounded("get_booking", async {
            let conn = self.read_pool.acquire().await?;
            let row = conn
                .query_opt(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"), &[&id])
                .await?;
            row.as_ref().map(booking_from_row).transpose()
        })
        .await
    }

    async fn list_bookings(&self, filter: BookingFilter, page: CommonRequestParams) -> Result<Vec<Booking>, CoreError> {
        self.bounded("list_bookings", async {
            let conn = self.read_pool.acquire().await?;
            let status = filter.status.map(|s| s.to_string());
            let (offset, limit) = page_params(page);
            let rows = conn
                .query(
                    &format!(
                        "SELECT {BOOKING_COLUMNS} FROM bookings \
                         WHERE ($1::text IS NULL OR status = $1) \
                         ORDER BY seq DESC OFFSET $2 LIMIT $3"
                    ),
                    &[&status, &offset, &limit],
                )
                .await?;
            rows_into(rows, booking_from_row)
        })
        .await
    }

    async fn update_booking_status(
        &self,
        id: BookingId,
        (status, version): (BookingStatus, u64),
        next: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<Booking, CoreError> {
        self.bounded("update_booking_status", async {
            let conn = self.write_pool.acquire().await?;
            let (next, status, version) = (next.to_string(), status.to_string(), version as i64);
            let row = conn
                .query_opt(
                    &format!(
                        r#"
                        UPDATE bookings SET status = $1, version = version + 1, updated_at = $2
                        WHERE id = $3 AND status = $4 AND version = $5
                        RETURNING {BOOKING_COLUMNS}
                        "#
                    ),
                    &[&next, &at, &id, &status, &version],
                )
                .await?;
            match row {
                Some(row) => booking_from_row(&row),
                None => match conn.query_opt("SELECT status FROM bookings WHERE id = $1", &[&id]).await? {
                    Some(current) => Err(CoreError::conflict(format!(
                        "booking {} was changed concurrently and is now {}",
                        id,
                        current.try_get::<_, String>("status")?
                    ))),
                    None => Err(CoreError::not_found("booking", id)),
                },
            }
        })
        .await
    }
}
