//! Ordered versus already-invoiced quantities for one order.

use std::collections::HashMap;

use common::{ItemId, Money};
use store::{Invoice, Order};

/// Remaining billable quantity per item, rebuilt from the order and every
/// invoice already issued against it.
#[derive(Debug, Clone, Default)]
pub struct QuantityLedger {
    ordered: HashMap<ItemId, u64>,
    consumed: HashMap<ItemId, u64>,
    /// Order lines per item as `(quantity, unit price)`, in order-line order.
    lines: HashMap<ItemId, Vec<(u64, Money)>>,
}

impl QuantityLedger {
    pub fn new(order: &Order, invoices: &[Invoice]) -> Self {
        let mut ledger = Self::default();

        for line in &order.items {
            let quantity = u64::from(line.quantity);
            *ledger.ordered.entry(line.item.id).or_default() += quantity;
            ledger
                .lines
                .entry(line.item.id)
                .or_default()
                .push((quantity, line.unit_price));
        }

        for line in invoices.iter().flat_map(|invoice| invoice.items.iter()) {
            *ledger.consumed.entry(line.item_id).or_default() += u64::from(line.quantity);
        }

        ledger
    }

    /// Whether the item was part of the order.
    pub fn contains(&self, item_id: ItemId) -> bool {
        self.ordered.contains_key(&item_id)
    }

    pub fn ordered(&self, item_id: ItemId) -> u64 {
        self.ordered.get(&item_id).copied().unwrap_or(0)
    }

    pub fn consumed(&self, item_id: ItemId) -> u64 {
        self.consumed.get(&item_id).copied().unwrap_or(0)
    }

    pub fn remaining(&self, item_id: ItemId) -> u64 {
        self.ordered(item_id).saturating_sub(self.consumed(item_id))
    }

    /// Prices `quantity` units of an item, starting after the first `offset`
    /// units that were already billed.
    ///
    /// Units are taken from the order lines in order, so the result has one
    /// `(quantity, unit price)` entry per order line touched. Units beyond the
    /// ordered quantity are priced like the last line.
    pub fn allocate(&self, item_id: ItemId, offset: u64, quantity: u32) -> Vec<(u32, Money)> {
        let Some(lines) = self.lines.get(&item_id) else {
            return Vec::new();
        };

        let mut allocation: Vec<(u32, Money)> = Vec::new();
        let mut skip = offset;
        let mut left = quantity;

        for &(line_qty, price) in lines {
            if left == 0 {
                break;
            }
            if skip >= line_qty {
                skip -= line_qty;
                continue;
            }
            // Bounded by `left`, so it fits.
            let take = (line_qty - skip).min(u64::from(left)) as u32;
            skip = 0;
            left -= take;
            push_units(&mut allocation, take, price);
        }

        if left > 0 {
            if let Some(&(_, price)) = lines.last() {
                push_units(&mut allocation, left, price);
            }
        }

        allocation
    }
}

fn push_units(allocation: &mut Vec<(u32, Money)>, units: u32, price: Money) {
    match allocation.last_mut() {
        Some((qty, last)) if *last == price => *qty += units,
        _ => allocation.push((units, price)),
    }
}
