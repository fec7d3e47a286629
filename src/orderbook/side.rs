use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use super::order::Order;
use super::queue::OrderQueue;

/// Price-indexed levels for one direction of the book. Levels are kept in a
/// sorted map; empty queues are pruned immediately so every level present is
/// non-empty.
#[derive(Debug, Clone, Default)]
pub struct OrderSide {
    levels: BTreeMap<Decimal, OrderQueue>,
    num_orders: usize,
}

impl OrderSide {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of orders on this side.
    pub fn len(&self) -> usize {
        self.num_orders
    }

    pub fn is_empty(&self) -> bool {
        self.num_orders == 0
    }

    /// Number of price levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn append(&mut self, order: Order) {
        let queue = self
            .levels
            .entry(order.price)
            .or_insert_with(|| OrderQueue::new(order.price));
        queue.append(order);
        self.num_orders += 1;
    }

    /// Remove an order at a known price level, pruning the level if it
    /// empties.
    pub fn remove(&mut self, price: Decimal, order_id: &str) -> Option<Order> {
        let queue = self.levels.get_mut(&price)?;
        let order = queue.remove(order_id)?;
        if queue.is_empty() {
            self.levels.remove(&price);
        }
        self.num_orders -= 1;
        Some(order)
    }

    pub fn min_price_queue(&self) -> Option<&OrderQueue> {
        self.levels.values().next()
    }

    pub fn max_price_queue(&self) -> Option<&OrderQueue> {
        self.levels.values().next_back()
    }

    /// The level with the lowest price strictly greater than `price`.
    pub fn greater_than(&self, price: Decimal) -> Option<&OrderQueue> {
        self.levels
            .range((Excluded(price), Unbounded))
            .map(|(_, q)| q)
            .next()
    }

    /// The level with the highest price strictly less than `price`.
    pub fn less_than(&self, price: Decimal) -> Option<&OrderQueue> {
        self.levels
            .range((Unbounded, Excluded(price)))
            .map(|(_, q)| q)
            .next_back()
    }

    pub fn queue(&self, price: Decimal) -> Option<&OrderQueue> {
        self.levels.get(&price)
    }

    pub(super) fn queue_mut(&mut self, price: Decimal) -> Option<&mut OrderQueue> {
        self.levels.get_mut(&price)
    }

    /// Levels in ascending price order.
    pub fn levels(&self) -> impl Iterator<Item = &OrderQueue> {
        self.levels.values()
    }

    /// Levels in descending price order.
    pub fn levels_rev(&self) -> impl Iterator<Item = &OrderQueue> {
        self.levels.values().rev()
    }

    /// Sum of level volumes.
    pub fn volume(&self) -> Decimal {
        self.levels.values().map(|q| q.volume()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn order(id: &str, price: Decimal, quantity: Decimal) -> Order {
        Order::new(id, "alice", Side::Sell, quantity, price, Utc::now())
    }

    #[test]
    fn best_price_queues() {
        let mut side = OrderSide::new();
        side.append(order("a", dec!(101), dec!(1)));
        side.append(order("b", dec!(99), dec!(2)));
        side.append(order("c", dec!(100), dec!(3)));

        assert_eq!(side.min_price_queue().unwrap().price(), dec!(99));
        assert_eq!(side.max_price_queue().unwrap().price(), dec!(101));
        assert_eq!(side.len(), 3);
        assert_eq!(side.depth(), 3);
    }

    #[test]
    fn strict_neighbors() {
        let mut side = OrderSide::new();
        side.append(order("a", dec!(99), dec!(1)));
        side.append(order("b", dec!(100), dec!(1)));
        side.append(order("c", dec!(101), dec!(1)));

        assert_eq!(side.greater_than(dec!(100)).unwrap().price(), dec!(101));
        assert_eq!(side.less_than(dec!(100)).unwrap().price(), dec!(99));
        assert!(side.greater_than(dec!(101)).is_none());
        assert!(side.less_than(dec!(99)).is_none());
    }

    #[test]
    fn emptied_level_is_pruned() {
        let mut side = OrderSide::new();
        side.append(order("a", dec!(100), dec!(1)));
        side.append(order("b", dec!(100), dec!(1)));

        side.remove(dec!(100), "a");
        assert_eq!(side.depth(), 1);
        side.remove(dec!(100), "b");
        assert_eq!(side.depth(), 0);
        assert!(side.is_empty());
    }

    #[test]
    fn equal_prices_with_different_scale_share_a_level() {
        let mut side = OrderSide::new();
        side.append(order("a", dec!(100), dec!(1)));
        side.append(order("b", dec!(100.0), dec!(1)));
        assert_eq!(side.depth(), 1);
        assert_eq!(side.queue(dec!(100)).unwrap().volume(), dec!(2));
    }
}
