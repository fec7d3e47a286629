use rust_decimal::Decimal;
use std::collections::VecDeque;

use super::order::Order;

/// One price level: a FIFO of orders plus their aggregate volume.
#[derive(Debug, Clone, Default)]
pub struct OrderQueue {
    price: Decimal,
    volume: Decimal,
    orders: VecDeque<Order>,
}

impl OrderQueue {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            volume: Decimal::ZERO,
            orders: VecDeque::new(),
        }
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn volume(&self) -> Decimal {
        self.volume
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn head(&self) -> Option<&Order> {
        self.orders.front()
    }

    pub fn append(&mut self, order: Order) {
        self.volume += order.quantity;
        self.orders.push_back(order);
    }

    /// Remove the order with the given id, wherever it sits in the queue.
    pub fn remove(&mut self, order_id: &str) -> Option<Order> {
        let pos = self.orders.iter().position(|o| o.id == order_id)?;
        let order = self.orders.remove(pos)?;
        self.volume -= order.quantity;
        Some(order)
    }

    /// Replace the head with a twin of reduced quantity. The twin takes the
    /// head's place so FIFO order is preserved.
    pub fn reduce_head(&mut self, new_quantity: Decimal) -> Option<&Order> {
        let head = self.orders.front_mut()?;
        self.volume += new_quantity - head.quantity;
        head.quantity = new_quantity;
        Some(&*head)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn order(id: &str, quantity: Decimal) -> Order {
        Order::new(id, "alice", Side::Sell, quantity, dec!(100), Utc::now())
    }

    #[test]
    fn volume_tracks_membership() {
        let mut queue = OrderQueue::new(dec!(100));
        queue.append(order("a", dec!(2)));
        queue.append(order("b", dec!(3)));
        assert_eq!(queue.volume(), dec!(5));

        queue.remove("a");
        assert_eq!(queue.volume(), dec!(3));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn reduce_head_keeps_position_and_adjusts_volume() {
        let mut queue = OrderQueue::new(dec!(100));
        queue.append(order("a", dec!(5)));
        queue.append(order("b", dec!(1)));

        queue.reduce_head(dec!(3));
        assert_eq!(queue.head().unwrap().id, "a");
        assert_eq!(queue.head().unwrap().quantity, dec!(3));
        assert_eq!(queue.volume(), dec!(4));
    }

    #[test]
    fn remove_missing_is_none() {
        let mut queue = OrderQueue::new(dec!(100));
        queue.append(order("a", dec!(2)));
        assert!(queue.remove("zzz").is_none());
        assert_eq!(queue.volume(), dec!(2));
    }
}
