use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use larder_core::{DomainError, DomainResult, Entity, MenuItemId, OrderId};

/// Order line: a menu item and how many portions were purchased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub line_no: u32,
    pub menu_item_id: MenuItemId,
    /// Always >= 1.
    pub quantity: u32,
}

/// A placed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    items: Vec<OrderItem>,
    placed_at: DateTime<Utc>,
}

impl Order {
    /// Start an order with no lines.
    pub fn new(id: OrderId, placed_at: DateTime<Utc>) -> Self {
        Self {
            id,
            items: Vec::new(),
            placed_at,
        }
    }

    /// Build an order from `(menu item, quantity)` pairs.
    pub fn with_items(
        id: OrderId,
        placed_at: DateTime<Utc>,
        items: impl IntoIterator<Item = (MenuItemId, u32)>,
    ) -> DomainResult<Self> {
        let mut order = Self::new(id, placed_at);
        for (menu_item_id, quantity) in items {
            order.add_item(menu_item_id, quantity)?;
        }
        order.ensure_not_empty()?;
        Ok(order)
    }

    pub fn add_item(&mut self, menu_item_id: MenuItemId, quantity: u32) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }

        let line_no = (self.items.len() as u32) + 1;
        self.items.push(OrderItem {
            line_no,
            menu_item_id,
            quantity,
        });
        Ok(())
    }

    pub fn ensure_not_empty(&self) -> DomainResult<()> {
        if self.items.is_empty() {
            return Err(DomainError::validation("order must contain at least one item"));
        }
        Ok(())
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    /// Total portions ordered across all lines for one menu item.
    pub fn portions_of(&self, menu_item_id: MenuItemId) -> u64 {
        self.items
            .iter()
            .filter(|i| i.menu_item_id == menu_item_id)
            .map(|i| u64::from(i.quantity))
            .sum()
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn label(&self) -> &str {
        "order"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn with_items_numbers_lines_in_order() {
        let pizza = MenuItemId::new();
        let salad = MenuItemId::new();
        let order = Order::with_items(OrderId::new(), test_time(), [(pizza, 3), (salad, 1)]).unwrap();

        assert_eq!(order.items().len(), 2);
        assert_eq!(order.items()[0].line_no, 1);
        assert_eq!(order.items()[0].menu_item_id, pizza);
        assert_eq!(order.items()[1].line_no, 2);
        assert_eq!(order.items()[1].quantity, 1);
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut order = Order::new(OrderId::new(), test_time());
        let err = order.add_item(MenuItemId::new(), 0).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("at least 1") => {}
            other => panic!("Expected validation error, got {other:?}"),
        }
        assert!(order.items().is_empty());
    }

    #[test]
    fn empty_order_is_rejected() {
        let items: Vec<(MenuItemId, u32)> = vec![];
        assert!(Order::with_items(OrderId::new(), test_time(), items).is_err());
    }

    #[test]
    fn repeated_menu_item_keeps_separate_lines() {
        let pizza = MenuItemId::new();
        let order = Order::with_items(OrderId::new(), test_time(), [(pizza, 2), (pizza, 5)]).unwrap();
        assert_eq!(order.items().len(), 2);
        assert_eq!(order.portions_of(pizza), 7);
        assert_eq!(order.portions_of(MenuItemId::new()), 0);
    }

    proptest! {
        /// Property: portions_of sums every line for the item regardless of line order.
        #[test]
        fn portions_sum_over_lines(quantities in prop::collection::vec(1u32..500, 1..20)) {
            let item = MenuItemId::new();
            let order = Order::with_items(
                OrderId::new(),
                test_time(),
                quantities.iter().map(|q| (item, *q)),
            )
            .unwrap();

            let expected: u64 = quantities.iter().map(|q| u64::from(*q)).sum();
            prop_assert_eq!(order.portions_of(item), expected);
            prop_assert_eq!(order.items().len(), quantities.len());
        }
    }
}
