//! In-memory store implementation for tests and development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::OrderId;
use domain::{
    Color, ColorId, DeliveryInfo, Money, Order, OrderLine, OrderStatus, Product, ProductId, Size,
    SizeId, StockCell, User, UserId,
};
use tokio::sync::RwLock;

use crate::cart::{CartAddOutcome, CartItem, CartStore};
use crate::catalog::CatalogStore;
use crate::error::{Result, StoreError};
use crate::ledger::StockLedger;
use crate::orders::{
    CheckoutPlan, FinalizeOutcome, OrderStore, PlaceOutcome, RollbackOutcome, StockIssue,
};

#[derive(Default)]
struct ShopState {
    products: HashMap<ProductId, Product>,
    colors: HashMap<ColorId, Color>,
    sizes: HashMap<SizeId, Size>,
    users: HashMap<UserId, User>,
    stock: HashMap<StockCell, u32>,
    orders: HashMap<OrderId, Order>,
    lines: HashMap<OrderId, Vec<OrderLine>>,
    carts: HashMap<UserId, Vec<CartItem>>,
}

/// In-memory store implementing all four store seams.
///
/// All state lives behind one `RwLock`, so each composite operation runs as
/// a single critical section and the same-state guarantees as the
/// PostgreSQL transactions hold.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<ShopState>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a product.
    pub async fn insert_product(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.id.clone(), product);
    }

    /// Seeds a color.
    pub async fn insert_color(&self, color: Color) {
        self.state.write().await.colors.insert(color.id.clone(), color);
    }

    /// Seeds a size.
    pub async fn insert_size(&self, size: Size) {
        self.state.write().await.sizes.insert(size.id.clone(), size);
    }

    /// Seeds a user.
    pub async fn insert_user(&self, user: User) {
        self.state.write().await.users.insert(user.id.clone(), user);
    }

    /// Seeds a stock cell with an absolute quantity.
    pub async fn set_stock(&self, cell: StockCell, qty: u32) {
        self.state.write().await.stock.insert(cell, qty);
    }

    /// Returns the current quantity of a cell, for assertions.
    pub async fn stock_of(&self, cell: &StockCell) -> Option<u32> {
        self.state.read().await.stock.get(cell).copied()
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(id).cloned())
    }

    async fn color(&self, id: &ColorId) -> Result<Option<Color>> {
        Ok(self.state.read().await.colors.get(id).cloned())
    }

    async fn size(&self, id: &SizeId) -> Result<Option<Size>> {
        Ok(self.state.read().await.sizes.get(id).cloned())
    }

    async fn user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(id).cloned())
    }

    async fn update_delivery(&self, id: &UserId, delivery: &DeliveryInfo) -> Result<()> {
        let mut state = self.state.write().await;
        match state.users.get_mut(id) {
            Some(user) => {
                user.apply_delivery(delivery);
                Ok(())
            }
            None => Err(StoreError::UserNotFound(id.clone())),
        }
    }
}

#[async_trait]
impl StockLedger for InMemoryStore {
    async fn available(&self, cell: &StockCell) -> Result<Option<u32>> {
        Ok(self.state.read().await.stock.get(cell).copied())
    }

    async fn reserve(&self, cell: &StockCell, qty: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let available = state
            .stock
            .get_mut(cell)
            .ok_or_else(|| StoreError::UnknownCell(cell.clone()))?;
        if *available < qty {
            return Err(StoreError::Insufficient {
                cell: cell.clone(),
                requested: qty,
                available: *available,
            });
        }
        *available -= qty;
        Ok(())
    }

    async fn release(&self, cell: &StockCell, qty: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let available = state
            .stock
            .get_mut(cell)
            .ok_or_else(|| StoreError::UnknownCell(cell.clone()))?;
        *available += qty;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn place_order(&self, plan: CheckoutPlan) -> Result<PlaceOutcome> {
        let mut state = self.state.write().await;

        // First pass: check every line against the ledger without mutating.
        let mut issues = Vec::new();
        let mut wanted: HashMap<StockCell, u32> = HashMap::new();
        for line in &plan.lines {
            *wanted.entry(line.stock_cell()).or_insert(0) += line.quantity;
        }
        for (cell, qty) in &wanted {
            match state.stock.get(cell) {
                None => issues.push(StockIssue::Missing { cell: cell.clone() }),
                Some(available) if available < qty => issues.push(StockIssue::Insufficient {
                    cell: cell.clone(),
                    requested: *qty,
                    available: *available,
                }),
                Some(_) => {}
            }
        }
        if !issues.is_empty() {
            return Ok(PlaceOutcome::Rejected(issues));
        }

        // Second pass: apply every decrement and persist order + lines +
        // total while still holding the write lock.
        for (cell, qty) in &wanted {
            if let Some(available) = state.stock.get_mut(cell) {
                *available -= qty;
            }
        }

        let mut order = plan.order;
        order.total_price = plan.lines.iter().map(OrderLine::subtotal).sum::<Money>();
        order.updated_at = Utc::now();
        state.orders.insert(order.id.clone(), order.clone());
        state.lines.insert(order.id.clone(), plan.lines.clone());

        Ok(PlaceOutcome::Placed {
            order,
            lines: plan.lines,
        })
    }

    async fn finalize_payment(
        &self,
        id: &OrderId,
        txn: domain::GatewayTxn,
    ) -> Result<FinalizeOutcome> {
        let mut state = self.state.write().await;
        match state.orders.get_mut(id) {
            None => Ok(FinalizeOutcome::NotFound),
            Some(order) if !order.is_awaiting_payment() => Ok(FinalizeOutcome::AlreadyFinalized),
            Some(order) => {
                order.gateway_txn = Some(txn);
                order.status = OrderStatus::Confirmed;
                order.updated_at = Utc::now();
                Ok(FinalizeOutcome::Finalized(order.clone()))
            }
        }
    }

    async fn rollback_order(&self, id: &OrderId) -> Result<RollbackOutcome> {
        let mut state = self.state.write().await;
        if state.orders.remove(id).is_none() {
            return Ok(RollbackOutcome::NotFound);
        }
        let lines = state.lines.remove(id).unwrap_or_default();
        for line in &lines {
            // A cell a reservation succeeded against always exists.
            *state.stock.entry(line.stock_cell()).or_insert(0) += line.quantity;
        }
        Ok(RollbackOutcome::RolledBack)
    }

    async fn order(&self, id: &OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(id).cloned())
    }

    async fn order_for_user(&self, user: &UserId, id: &OrderId) -> Result<Option<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .get(id)
            .filter(|o| &o.user == user)
            .cloned())
    }

    async fn orders_for_user(&self, user: &UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| &o.user == user)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn lines(&self, id: &OrderId) -> Result<Vec<OrderLine>> {
        Ok(self
            .state
            .read()
            .await
            .lines
            .get(id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn cart_items(&self, user: &UserId) -> Result<Vec<CartItem>> {
        Ok(self
            .state
            .read()
            .await
            .carts
            .get(user)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_item(&self, user: &UserId, cell: &StockCell, qty: u32) -> Result<CartAddOutcome> {
        let mut state = self.state.write().await;
        let available = *state
            .stock
            .get(cell)
            .ok_or_else(|| StoreError::UnknownCell(cell.clone()))?;

        let cart = state.carts.entry(user.clone()).or_default();
        let in_cart = cart
            .iter()
            .find(|item| &item.cell == cell)
            .map(|item| item.quantity)
            .unwrap_or(0);

        if in_cart + qty > available {
            return Ok(CartAddOutcome::Shortfall { available, in_cart });
        }

        let updated = match cart.iter_mut().find(|item| &item.cell == cell) {
            Some(item) => {
                item.quantity += qty;
                item.updated_at = Utc::now();
                item.clone()
            }
            None => {
                let item = CartItem {
                    cell: cell.clone(),
                    quantity: qty,
                    updated_at: Utc::now(),
                };
                cart.push(item.clone());
                item
            }
        };
        Ok(CartAddOutcome::Added(updated))
    }

    async fn set_item(&self, user: &UserId, cell: &StockCell, qty: u32) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(cart) = state.carts.get_mut(user) else {
            return Ok(false);
        };
        match cart.iter_mut().find(|item| &item.cell == cell) {
            Some(item) => {
                item.quantity = qty;
                item.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_item(&self, user: &UserId, cell: &StockCell) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(cart) = state.carts.get_mut(user) else {
            return Ok(false);
        };
        let before = cart.len();
        cart.retain(|item| &item.cell != cell);
        Ok(cart.len() != before)
    }

    async fn clear(&self, user: &UserId) -> Result<()> {
        self.state.write().await.carts.remove(user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::LineId;
    use domain::{DeliveryInfo, PaymentMethod};

    fn cell() -> StockCell {
        StockCell::new(ProductId::new("P001"), ColorId::new("C01"), SizeId::new("M"))
    }

    fn delivery() -> DeliveryInfo {
        DeliveryInfo {
            full_name: "An Nguyen".to_string(),
            phone: "0900000001".to_string(),
            address: "12 Ly Thuong Kiet".to_string(),
        }
    }

    fn plan_for(store_cell: &StockCell, quantity: u32, unit_cents: i64) -> CheckoutPlan {
        let order = Order::pending(UserId::new("U001"), PaymentMethod::Gateway, delivery());
        let lines = vec![OrderLine {
            id: LineId::generate(),
            order: order.id.clone(),
            product: store_cell.product.clone(),
            color: store_cell.color.clone(),
            size: store_cell.size.clone(),
            quantity,
            unit_price: Money::from_cents(unit_cents),
        }];
        CheckoutPlan { order, lines }
    }

    #[tokio::test]
    async fn test_reserve_decrements_and_checks() {
        let store = InMemoryStore::new();
        store.set_stock(cell(), 5).await;

        store.reserve(&cell(), 3).await.unwrap();
        assert_eq!(store.stock_of(&cell()).await, Some(2));

        let err = store.reserve(&cell(), 3).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Insufficient {
                requested: 3,
                available: 2,
                ..
            }
        ));
        // Failed reserve must leave the counter untouched.
        assert_eq!(store.stock_of(&cell()).await, Some(2));
    }

    #[tokio::test]
    async fn test_reserve_unknown_cell() {
        let store = InMemoryStore::new();
        let err = store.reserve(&cell(), 1).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownCell(_)));
    }

    #[tokio::test]
    async fn test_release_restores() {
        let store = InMemoryStore::new();
        store.set_stock(cell(), 2).await;
        store.release(&cell(), 3).await.unwrap();
        assert_eq!(store.stock_of(&cell()).await, Some(5));
    }

    #[tokio::test]
    async fn test_concurrent_reserves_never_oversell() {
        let store = InMemoryStore::new();
        store.set_stock(cell(), 5).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.reserve(&cell(), 1).await },
            ));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 5);
        assert_eq!(store.stock_of(&cell()).await, Some(0));
    }

    #[tokio::test]
    async fn test_place_order_commits_all_or_nothing() {
        let store = InMemoryStore::new();
        store.set_stock(cell(), 5).await;

        let outcome = store.place_order(plan_for(&cell(), 2, 1000)).await.unwrap();
        let order = match outcome {
            PlaceOutcome::Placed { order, .. } => order,
            PlaceOutcome::Rejected(_) => panic!("expected placement"),
        };
        assert_eq!(order.total_price.cents(), 2000);
        assert_eq!(store.stock_of(&cell()).await, Some(3));
        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.lines(&order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_place_order_rejects_without_side_effects() {
        let store = InMemoryStore::new();
        store.set_stock(cell(), 5).await;

        let outcome = store.place_order(plan_for(&cell(), 10, 1000)).await.unwrap();
        match outcome {
            PlaceOutcome::Rejected(issues) => {
                assert_eq!(issues.len(), 1);
                assert!(matches!(
                    issues[0],
                    StockIssue::Insufficient {
                        requested: 10,
                        available: 5,
                        ..
                    }
                ));
            }
            PlaceOutcome::Placed { .. } => panic!("expected rejection"),
        }
        assert_eq!(store.stock_of(&cell()).await, Some(5));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_finalize_payment_is_idempotent() {
        let store = InMemoryStore::new();
        store.set_stock(cell(), 5).await;
        let outcome = store.place_order(plan_for(&cell(), 1, 1000)).await.unwrap();
        let PlaceOutcome::Placed { order, .. } = outcome else {
            panic!("expected placement");
        };

        let txn = domain::GatewayTxn {
            bank_code: "NCB".to_string(),
            txn_no: "14668289".to_string(),
            response_code: "00".to_string(),
            txn_status: "00".to_string(),
        };

        let first = store.finalize_payment(&order.id, txn.clone()).await.unwrap();
        assert!(matches!(first, FinalizeOutcome::Finalized(_)));

        let second = store.finalize_payment(&order.id, txn).await.unwrap();
        assert!(matches!(second, FinalizeOutcome::AlreadyFinalized));
    }

    #[tokio::test]
    async fn test_rollback_restores_stock_and_deletes() {
        let store = InMemoryStore::new();
        store.set_stock(cell(), 5).await;
        let outcome = store.place_order(plan_for(&cell(), 2, 1000)).await.unwrap();
        let PlaceOutcome::Placed { order, .. } = outcome else {
            panic!("expected placement");
        };
        assert_eq!(store.stock_of(&cell()).await, Some(3));

        let rolled = store.rollback_order(&order.id).await.unwrap();
        assert_eq!(rolled, RollbackOutcome::RolledBack);
        assert_eq!(store.stock_of(&cell()).await, Some(5));
        assert_eq!(store.order_count().await, 0);
        assert!(store.lines(&order.id).await.unwrap().is_empty());

        // Repeating the rollback is a no-op.
        let again = store.rollback_order(&order.id).await.unwrap();
        assert_eq!(again, RollbackOutcome::NotFound);
        assert_eq!(store.stock_of(&cell()).await, Some(5));
    }

    #[tokio::test]
    async fn test_cart_add_capped_by_stock() {
        let store = InMemoryStore::new();
        let user = UserId::new("U001");
        store.set_stock(cell(), 3).await;

        let added = store.add_item(&user, &cell(), 2).await.unwrap();
        assert!(matches!(added, CartAddOutcome::Added(ref item) if item.quantity == 2));

        let blocked = store.add_item(&user, &cell(), 2).await.unwrap();
        assert_eq!(
            blocked,
            CartAddOutcome::Shortfall {
                available: 3,
                in_cart: 2
            }
        );

        // Cart additions never touch the ledger itself.
        assert_eq!(store.stock_of(&cell()).await, Some(3));
    }

    #[tokio::test]
    async fn test_cart_set_and_remove() {
        let store = InMemoryStore::new();
        let user = UserId::new("U001");
        store.set_stock(cell(), 10).await;

        assert!(!store.set_item(&user, &cell(), 5).await.unwrap());
        store.add_item(&user, &cell(), 1).await.unwrap();
        assert!(store.set_item(&user, &cell(), 5).await.unwrap());

        let items = store.cart_items(&user).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);

        assert!(store.remove_item(&user, &cell()).await.unwrap());
        assert!(!store.remove_item(&user, &cell()).await.unwrap());
        assert!(store.cart_items(&user).await.unwrap().is_empty());
    }
}
