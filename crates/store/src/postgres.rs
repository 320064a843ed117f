use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    Invoice, InvoiceId, InvoiceItem, InvoiceRepository, Item, ItemId, ItemRepository, Money,
    NewInvoice, NewOrder, NewShipment, Order, OrderId, OrderItem, OrderRepository, Payment,
    Result, Shipment, ShipmentId, ShipmentItem, ShipmentRepository, ShipmentStatus, StoreError,
    repository::ensure_within_ordered,
};

const INVOICE_SHIPMENT_UNIQUE: &str = "invoices_shipment_id_key";

/// PostgreSQL-backed implementation of every repository trait.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    /// Adds an item to the catalog, or updates the name and price of the
    /// item that already has this SKU.
    pub async fn upsert_item(&self, sku: &str, name: &str, price: Money) -> Result<Item> {
        let row = sqlx::query(
            r#"
            INSERT INTO items (sku, name, price_cents)
            VALUES ($1, $2, $3)
            ON CONFLICT (sku) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                updated_at = NOW()
            RETURNING id, sku, name, price_cents
            "#,
        )
        .bind(sku)
        .bind(name)
        .bind(price.cents())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_item(&row, "id")
    }

    fn row_to_item(row: &PgRow, id_column: &str) -> Result<Item> {
        Ok(Item {
            id: ItemId::new(row.try_get(id_column)?),
            sku: row.try_get("sku")?,
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
        })
    }

    fn row_to_invoice_item(row: &PgRow) -> Result<InvoiceItem> {
        Ok(InvoiceItem {
            id: row.try_get("id")?,
            invoice_id: InvoiceId::new(row.try_get("invoice_id")?),
            item_id: ItemId::new(row.try_get("item_id")?),
            quantity: quantity_from_db(row.try_get("quantity")?)?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        })
    }

    fn row_to_invoice(row: &PgRow, items: Vec<InvoiceItem>) -> Result<Invoice> {
        Ok(Invoice {
            id: InvoiceId::new(row.try_get("id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            shipment_id: ShipmentId::new(row.try_get("shipment_id")?),
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
            items,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }

    /// Loads invoice lines for a set of invoices, grouped by invoice id.
    async fn invoice_lines(&self, invoice_ids: &[i64]) -> Result<HashMap<i64, Vec<InvoiceItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, invoice_id, item_id, quantity, unit_price_cents
            FROM invoice_items
            WHERE invoice_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(invoice_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<InvoiceItem>> = HashMap::new();
        for row in &rows {
            let line = Self::row_to_invoice_item(row)?;
            grouped
                .entry(line.invoice_id.as_i64())
                .or_default()
                .push(line);
        }
        Ok(grouped)
    }

    async fn shipment_lines(&self, shipment_id: ShipmentId) -> Result<Vec<ShipmentItem>> {
        let rows = sqlx::query(
            "SELECT sku, quantity FROM shipment_items WHERE shipment_id = $1 ORDER BY id ASC",
        )
        .bind(shipment_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ShipmentItem {
                    sku: row.try_get("sku")?,
                    quantity: quantity_from_db(row.try_get("quantity")?)?,
                })
            })
            .collect()
    }

    /// Sums quantities per item for one order, grouped by item id.
    async fn quantities(
        tx: &mut Transaction<'_, Postgres>,
        sql: &str,
        order_id: OrderId,
    ) -> Result<HashMap<ItemId, u64>> {
        let rows = sqlx::query(sql)
            .bind(order_id.as_i64())
            .fetch_all(&mut **tx)
            .await?;

        let mut totals = HashMap::with_capacity(rows.len());
        for row in &rows {
            let item_id = ItemId::new(row.try_get("item_id")?);
            let quantity: i64 = row.try_get("quantity")?;
            let quantity = u64::try_from(quantity)
                .map_err(|_| StoreError::Corrupt(format!("negative quantity {quantity}")))?;
            totals.insert(item_id, quantity);
        }
        Ok(totals)
    }
}

fn quantity_from_db(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("quantity {value} out of range")))
}

#[async_trait]
impl ItemRepository for PostgresStore {
    async fn item_by_id(&self, id: ItemId) -> Result<Option<Item>> {
        let row = sqlx::query("SELECT id, sku, name, price_cents FROM items WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| Self::row_to_item(&row, "id")).transpose()
    }

    async fn item_by_sku(&self, sku: &str) -> Result<Option<Item>> {
        let row = sqlx::query("SELECT id, sku, name, price_cents FROM items WHERE sku = $1")
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| Self::row_to_item(&row, "id")).transpose()
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO orders (customer_id, total_amount_cents, status)
            VALUES ($1, $2, $3)
            RETURNING id, created_at, updated_at
            "#,
        )
        .bind(&order.customer_id)
        .bind(order.total_amount.cents())
        .bind(order.status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let id = OrderId::new(row.try_get("id")?);
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        let mut items = Vec::with_capacity(order.items.len());
        for line in order.items {
            let line_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO order_items (order_id, item_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(id.as_i64())
            .bind(line.item.id.as_i64())
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.cents())
            .fetch_one(&mut *tx)
            .await?;

            items.push(OrderItem {
                id: line_id,
                order_id: id,
                item: line.item,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        let mut payments = Vec::with_capacity(order.payments.len());
        for payment in order.payments {
            let payment_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO payments (order_id, method, amount_cents)
                VALUES ($1, $2, $3)
                RETURNING id
                "#,
            )
            .bind(id.as_i64())
            .bind(payment.method.as_str())
            .bind(payment.amount.cents())
            .fetch_one(&mut *tx)
            .await?;

            payments.push(Payment {
                id: payment_id,
                order_id: id,
                method: payment.method,
                amount: payment.amount,
            });
        }

        tx.commit().await?;

        Ok(Order {
            id,
            customer_id: order.customer_id,
            total_amount: order.total_amount,
            status: order.status,
            items,
            payments,
            created_at,
            updated_at,
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, customer_id, total_amount_cents, status, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let item_rows = sqlx::query(
            r#"
            SELECT oi.id, oi.quantity, oi.unit_price_cents,
                   i.id AS catalog_id, i.sku, i.name, i.price_cents
            FROM order_items oi
            JOIN items i ON i.id = oi.item_id
            WHERE oi.order_id = $1
            ORDER BY oi.id ASC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let items = item_rows
            .iter()
            .map(|row| {
                Ok(OrderItem {
                    id: row.try_get("id")?,
                    order_id: id,
                    item: Self::row_to_item(row, "catalog_id")?,
                    quantity: quantity_from_db(row.try_get("quantity")?)?,
                    unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let payment_rows = sqlx::query(
            "SELECT id, method, amount_cents FROM payments WHERE order_id = $1 ORDER BY id ASC",
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let payments = payment_rows
            .iter()
            .map(|row| {
                let method: String = row.try_get("method")?;
                Ok(Payment {
                    id: row.try_get("id")?,
                    order_id: id,
                    method: method.parse()?,
                    amount: Money::from_cents(row.try_get("amount_cents")?),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let status: String = row.try_get("status")?;

        Ok(Some(Order {
            id,
            customer_id: row.try_get("customer_id")?,
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
            status: status.parse()?,
            items,
            payments,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }
}

#[async_trait]
impl InvoiceRepository for PostgresStore {
    async fn create_invoice(&self, invoice: NewInvoice) -> Result<Invoice> {
        let mut tx = self.pool.begin().await?;

        // Released at commit or rollback; serializes writers for this order
        // across every process sharing the database.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(invoice.order_id.as_i64())
            .execute(&mut *tx)
            .await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
            .bind(invoice.order_id.as_i64())
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(StoreError::UnknownOrder(invoice.order_id));
        }

        let ordered = Self::quantities(
            &mut tx,
            r#"
            SELECT item_id, SUM(quantity)::BIGINT AS quantity
            FROM order_items
            WHERE order_id = $1
            GROUP BY item_id
            "#,
            invoice.order_id,
        )
        .await?;
        let invoiced = Self::quantities(
            &mut tx,
            r#"
            SELECT ii.item_id, SUM(ii.quantity)::BIGINT AS quantity
            FROM invoice_items ii
            JOIN invoices inv ON inv.id = ii.invoice_id
            WHERE inv.order_id = $1
            GROUP BY ii.item_id
            "#,
            invoice.order_id,
        )
        .await?;
        if let Err(err) = ensure_within_ordered(&invoice, &ordered, &invoiced) {
            tracing::debug!(
                order_id = %invoice.order_id,
                error = %err,
                "invoice rejected by quantity re-check"
            );
            return Err(err);
        }

        let row = sqlx::query(
            r#"
            INSERT INTO invoices (order_id, shipment_id, total_amount_cents)
            VALUES ($1, $2, $3)
            RETURNING id, order_id, shipment_id, total_amount_cents, created_at, updated_at
            "#,
        )
        .bind(invoice.order_id.as_i64())
        .bind(invoice.shipment_id.as_i64())
        .bind(invoice.total_amount.cents())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(INVOICE_SHIPMENT_UNIQUE)
            {
                return StoreError::ShipmentAlreadyInvoiced(invoice.shipment_id);
            }
            StoreError::Database(e)
        })?;

        let invoice_id = InvoiceId::new(row.try_get("id")?);
        let mut items = Vec::with_capacity(invoice.items.len());
        for line in &invoice.items {
            let line_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO invoice_items (invoice_id, item_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(invoice_id.as_i64())
            .bind(line.item_id.as_i64())
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.cents())
            .fetch_one(&mut *tx)
            .await?;

            items.push(InvoiceItem {
                id: line_id,
                invoice_id,
                item_id: line.item_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        tx.commit().await?;
        tracing::debug!(
            %invoice_id,
            order_id = %invoice.order_id,
            shipment_id = %invoice.shipment_id,
            "invoice persisted"
        );

        Self::row_to_invoice(&row, items)
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, order_id, shipment_id, total_amount_cents, created_at, updated_at
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut lines = self.invoice_lines(&[id.as_i64()]).await?;
        let items = lines.remove(&id.as_i64()).unwrap_or_default();
        Self::row_to_invoice(&row, items).map(Some)
    }

    async fn invoices_for_order(&self, order_id: OrderId) -> Result<Vec<Invoice>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, shipment_id, total_amount_cents, created_at, updated_at
            FROM invoices
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut lines = self.invoice_lines(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| Self::row_to_invoice(row, lines.remove(&id).unwrap_or_default()))
            .collect()
    }
}

#[async_trait]
impl ShipmentRepository for PostgresStore {
    async fn create_shipment(&self, shipment: NewShipment) -> Result<Shipment> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO shipments (order_id, status)
            VALUES ($1, $2)
            RETURNING id, created_at, updated_at
            "#,
        )
        .bind(shipment.order_id.as_i64())
        .bind(shipment.status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let id = ShipmentId::new(row.try_get("id")?);
        for line in &shipment.items {
            sqlx::query(
                "INSERT INTO shipment_items (shipment_id, sku, quantity) VALUES ($1, $2, $3)",
            )
            .bind(id.as_i64())
            .bind(&line.sku)
            .bind(i64::from(line.quantity))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Shipment {
            id,
            order_id: shipment.order_id,
            status: shipment.status,
            items: shipment.items,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn get_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, order_id, status, created_at, updated_at FROM shipments WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        Ok(Some(Shipment {
            id,
            order_id: OrderId::new(row.try_get("order_id")?),
            status: status.parse()?,
            items: self.shipment_lines(id).await?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn update_shipment_status(
        &self,
        id: ShipmentId,
        status: ShipmentStatus,
    ) -> Result<Shipment> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            UPDATE shipments SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING order_id, created_at, updated_at
            "#,
        )
        .bind(id.as_i64())
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or(StoreError::UnknownShipment(id))?;
        Ok(Shipment {
            id,
            order_id: OrderId::new(row.try_get("order_id")?),
            status,
            items: self.shipment_lines(id).await?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
