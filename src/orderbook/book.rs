use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::error::{BookError, SnapshotError};
use super::order::Order;
use super::queue::OrderQueue;
use super::side::OrderSide;
use crate::models::Side;

/// One price level of a depth view, in human units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
}

/// Aggregate resting volume by price level, best to worst on each side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub timestamp: DateTime<Utc>,
    pub asks: Vec<PriceLevel>,
    pub bids: Vec<PriceLevel>,
}

/// Serialized form of the live book: every level and every order, decimals
/// as strings.
#[derive(Debug, Serialize, Deserialize)]
struct BookSnapshot {
    asks: BTreeMap<String, Vec<Order>>,
    bids: BTreeMap<String, Vec<Order>>,
}

/// The dual-sided book: price-sorted sides plus an id index locating each
/// live order. `orders.keys()` is always the disjoint union of both sides'
/// order ids.
#[derive(Debug, Default)]
pub struct OrderBook {
    asks: OrderSide,
    bids: OrderSide,
    orders: HashMap<String, (Side, Decimal)>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.orders.contains_key(order_id)
    }

    pub fn order_ids(&self) -> impl Iterator<Item = &str> {
        self.orders.keys().map(String::as_str)
    }

    pub fn asks(&self) -> &OrderSide {
        &self.asks
    }

    pub fn bids(&self) -> &OrderSide {
        &self.bids
    }

    pub fn side(&self, side: Side) -> &OrderSide {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut OrderSide {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Best resting price on the given side: highest bid, lowest ask.
    pub fn best_price(&self, side: Side) -> Option<Decimal> {
        match side {
            Side::Buy => self.bids.max_price_queue().map(|q| q.price()),
            Side::Sell => self.asks.min_price_queue().map(|q| q.price()),
        }
    }

    pub fn head(&self, side: Side, price: Decimal) -> Option<&Order> {
        self.side(side).queue(price)?.head()
    }

    pub fn get(&self, order_id: &str) -> Option<&Order> {
        let (side, price) = self.orders.get(order_id)?;
        self.side(*side)
            .queue(*price)?
            .iter()
            .find(|o| o.id == order_id)
    }

    /// Insert a resting order onto its own side and record it in the id
    /// index.
    pub fn insert_resting(&mut self, order: Order) -> Result<(), BookError> {
        if self.orders.contains_key(&order.id) {
            return Err(BookError::OrderExists(order.id));
        }
        self.orders
            .insert(order.id.clone(), (order.side, order.price));
        self.side_mut(order.side).append(order);
        Ok(())
    }

    /// Remove an order from the book and the id index.
    pub fn remove(&mut self, order_id: &str) -> Result<Order, BookError> {
        let (side, price) = self
            .orders
            .remove(order_id)
            .ok_or_else(|| BookError::OrderNotExists(order_id.to_string()))?;
        let order = self
            .side_mut(side)
            .remove(price, order_id)
            .ok_or_else(|| BookError::OrderNotExists(order_id.to_string()))?;
        Ok(order)
    }

    /// Replace the head of a price level with a reduced-quantity twin,
    /// preserving its queue position. The id index is unaffected.
    pub fn reduce_head(
        &mut self,
        side: Side,
        price: Decimal,
        new_quantity: Decimal,
    ) -> Result<(), BookError> {
        let queue = self
            .side_mut(side)
            .queue_mut(price)
            .ok_or_else(|| BookError::OrderNotExists(price.to_string()))?;
        queue
            .reduce_head(new_quantity)
            .ok_or_else(|| BookError::OrderNotExists(price.to_string()))?;
        Ok(())
    }

    /// Depth view, best to worst on each side, in human units.
    pub fn depth(&self) -> DepthSnapshot {
        let level = |q: &OrderQueue| PriceLevel {
            price: q.price().to_f64().unwrap_or_default(),
            quantity: q.volume().to_f64().unwrap_or_default(),
        };
        DepthSnapshot {
            timestamp: Utc::now(),
            asks: self.asks.levels().map(level).collect(),
            bids: self.bids.levels_rev().map(level).collect(),
        }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        let collect = |side: &OrderSide| {
            side.levels()
                .map(|q| (q.price().to_string(), q.iter().cloned().collect()))
                .collect::<BTreeMap<String, Vec<Order>>>()
        };
        serde_json::to_vec(&BookSnapshot {
            asks: collect(&self.asks),
            bids: collect(&self.bids),
        })
    }

    /// Reconstruct a book from a snapshot, rebuilding the id index by
    /// traversing both sides.
    pub fn decode(data: &[u8]) -> Result<OrderBook, SnapshotError> {
        let snapshot: BookSnapshot = serde_json::from_slice(data)?;
        let mut book = OrderBook::new();
        for orders in snapshot.asks.into_values().chain(snapshot.bids.into_values()) {
            for mut order in orders {
                if order.user.is_empty() {
                    order.user = Order::user_from_id(&order.id).unwrap_or_default().to_string();
                }
                let id = order.id.clone();
                book.insert_resting(order)
                    .map_err(|_| SnapshotError::DuplicateOrder(id))?;
            }
        }
        Ok(book)
    }
}
