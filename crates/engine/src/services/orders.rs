//! Order orchestrator: checkout, lifecycle transitions, returns.
//!
//! This is the one component that composes the others. Placing an order
//! reserves stock, snapshots prices, writes the order and empties the cart
//! in a single transaction; approving a return releases stock, refunds the
//! wallet and finalizes the status in a single transaction. Either all of
//! it commits or none of it does.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use sugarcane_core::{OrderId, OrderStatus, UserId};

use crate::error::{EngineError, Result};
use crate::models::{NewOrder, NewOrderLine, OrderLine, ShopOrder};
use crate::services::{InventoryLedger, WalletLedger};
use crate::store::{Store, StoreError};

/// Drives orders through their lifecycle.
#[derive(Debug, Clone)]
pub struct OrderOrchestrator<S> {
    store: Arc<S>,
    inventory: InventoryLedger<S>,
    wallets: WalletLedger<S>,
}

impl<S: Store> OrderOrchestrator<S> {
    /// Create an orchestrator over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            inventory: InventoryLedger::new(Arc::clone(&store)),
            wallets: WalletLedger::new(Arc::clone(&store)),
            store,
        }
    }

    /// Place an order from the user's cart.
    ///
    /// Reserves stock for every cart line, snapshots each line's effective
    /// unit price, writes the order with the cart's payable total, and
    /// empties the cart. Atomic: a failure on any line leaves stock, cart
    /// and orders untouched.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyCart`] if the user has no cart or no
    /// lines, [`EngineError::OutOfStockInCart`] naming the first line whose
    /// quantity exceeds available stock.
    #[instrument(skip(self))]
    pub async fn place_order(&self, user_id: UserId) -> Result<ShopOrder> {
        const OP: &str = "order.place";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        match self.place_order_tx(&mut tx, user_id).await {
            Ok(order) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal(OP))?;
                debug!(order_id = %order.id, total = %order.total, "placed order");
                Ok(order)
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(err)
            }
        }
    }

    /// An order together with its lines.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown order.
    #[instrument(skip(self))]
    pub async fn find_order(&self, order_id: OrderId) -> Result<(ShopOrder, Vec<OrderLine>)> {
        const OP: &str = "order.find";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        let result = async {
            let order = self
                .store
                .find_order(&mut tx, order_id)
                .await
                .map_err(EngineError::internal(OP))?
                .ok_or(EngineError::NotFound("order"))?;
            let lines = self
                .store
                .list_order_lines(&mut tx, order_id)
                .await
                .map_err(EngineError::internal(OP))?;
            Ok((order, lines))
        }
        .await;
        match result {
            Ok(found) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal(OP))?;
                Ok(found)
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(err)
            }
        }
    }

    /// Mark a placed order as delivered.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidStatusTransition`] unless the order is
    /// `Placed`.
    pub async fn mark_delivered(&self, order_id: OrderId) -> Result<()> {
        self.transition(order_id, OrderStatus::Delivered, "order.mark_delivered")
            .await
    }

    /// Request a return of a delivered order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidStatusTransition`] unless the order is
    /// `Delivered`.
    pub async fn request_return(&self, order_id: OrderId) -> Result<()> {
        self.transition(order_id, OrderStatus::ReturnRequested, "order.request_return")
            .await
    }

    /// Withdraw a pending return request.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidStatusTransition`] unless the order is
    /// `ReturnRequested`.
    pub async fn cancel_return(&self, order_id: OrderId) -> Result<()> {
        self.transition(order_id, OrderStatus::ReturnCancelled, "order.cancel_return")
            .await
    }

    /// Cancel a placed order, releasing its reserved stock.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidStatusTransition`] unless the order is
    /// `Placed`.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<()> {
        const OP: &str = "order.cancel";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        match self.cancel_order_tx(&mut tx, order_id).await {
            Ok(()) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal(OP))?;
                Ok(())
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(err)
            }
        }
    }

    /// Approve a requested return: release the order's stock, refund the
    /// order total to the user's wallet, and finalize the order as
    /// `Returned`. One transaction; the wallet is never credited without
    /// the stock coming back and the status flipping.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidStatusTransition`] unless the order is
    /// `ReturnRequested`, [`EngineError::NotFound`] for an unknown order.
    #[instrument(skip(self))]
    pub async fn approve_return(&self, order_id: OrderId) -> Result<()> {
        const OP: &str = "order.approve_return";
        let mut tx = self.store.begin().await.map_err(EngineError::internal(OP))?;
        match self.approve_return_tx(&mut tx, order_id).await {
            Ok(()) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal(OP))?;
                Ok(())
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Transaction-scoped internals
    // ------------------------------------------------------------------

    async fn place_order_tx(&self, tx: &mut S::Tx, user_id: UserId) -> Result<ShopOrder> {
        const OP: &str = "order.place";
        let mut cart = self
            .store
            .find_cart_by_user(tx, user_id)
            .await
            .map_err(EngineError::internal(OP))?
            .ok_or(EngineError::EmptyCart)?;
        let mut items = self
            .store
            .list_cart_items(tx, cart.id)
            .await
            .map_err(EngineError::internal(OP))?;
        if items.is_empty() {
            return Err(EngineError::EmptyCart);
        }
        // Reserve in item-id order so concurrent checkouts sharing items
        // take their row locks in a consistent order.
        items.sort_unstable_by_key(|i| i.product_item_id);

        // Snapshot prices and reserve stock line by line. The reservation
        // is a conditional decrement, so a concurrent checkout of the same
        // item cannot make both orders succeed past available stock.
        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            let product_item = self
                .store
                .find_product_item(tx, item.product_item_id)
                .await
                .map_err(EngineError::internal(OP))?
                .ok_or_else(|| EngineError::Internal {
                    op: OP,
                    source: StoreError::DataCorruption(format!(
                        "cart references missing product item {}",
                        item.product_item_id
                    )),
                })?;
            self.inventory
                .reserve_tx(tx, item.product_item_id, item.qty)
                .await
                .map_err(|err| match err {
                    EngineError::OutOfStock => EngineError::OutOfStockInCart {
                        product_item_id: item.product_item_id,
                    },
                    err => err,
                })?;
            lines.push(NewOrderLine {
                product_item_id: item.product_item_id,
                qty: item.qty,
                unit_price: product_item.effective_price(),
            });
        }

        let order = self
            .store
            .insert_order(
                tx,
                NewOrder {
                    user_id,
                    status: OrderStatus::Placed,
                    total: cart.payable_total(),
                    lines,
                },
            )
            .await
            .map_err(EngineError::internal(OP))?;

        self.store
            .clear_cart_items(tx, cart.id)
            .await
            .map_err(EngineError::internal(OP))?;
        cart.total_price = Decimal::ZERO;
        cart.clear_coupon();
        self.store
            .save_cart(tx, &cart)
            .await
            .map_err(EngineError::internal(OP))?;

        Ok(order)
    }

    async fn cancel_order_tx(&self, tx: &mut S::Tx, order_id: OrderId) -> Result<()> {
        const OP: &str = "order.cancel";
        let order = self.order_tx(tx, order_id, OP).await?;
        Self::check_transition(&order, OrderStatus::Cancelled)?;

        let lines = self
            .store
            .list_order_lines(tx, order_id)
            .await
            .map_err(EngineError::internal(OP))?;
        for line in &lines {
            self.inventory
                .release_tx(tx, line.product_item_id, line.qty)
                .await?;
        }
        self.store
            .update_order_status(tx, order_id, OrderStatus::Cancelled)
            .await
            .map_err(EngineError::internal(OP))?;
        debug!(%order_id, "cancelled order");
        Ok(())
    }

    async fn approve_return_tx(&self, tx: &mut S::Tx, order_id: OrderId) -> Result<()> {
        const OP: &str = "order.approve_return";
        let order = self.order_tx(tx, order_id, OP).await?;
        Self::check_transition(&order, OrderStatus::ReturnApproved)?;

        let lines = self
            .store
            .list_order_lines(tx, order_id)
            .await
            .map_err(EngineError::internal(OP))?;
        for line in &lines {
            self.inventory
                .release_tx(tx, line.product_item_id, line.qty)
                .await?;
        }

        let wallet = self.wallets.get_or_create_tx(tx, order.user_id).await?;
        self.wallets
            .credit_tx(tx, wallet.id, order.total, "order return")
            .await?;

        self.store
            .update_order_status(tx, order_id, OrderStatus::Returned)
            .await
            .map_err(EngineError::internal(OP))?;
        debug!(%order_id, refund = %order.total, "approved return");
        Ok(())
    }

    /// Status-only transition through the order state machine.
    #[instrument(skip(self, op))]
    async fn transition(&self, order_id: OrderId, to: OrderStatus, op: &'static str) -> Result<()> {
        let mut tx = self.store.begin().await.map_err(EngineError::internal(op))?;
        let result = async {
            let order = self.order_tx(&mut tx, order_id, op).await?;
            Self::check_transition(&order, to)?;
            self.store
                .update_order_status(&mut tx, order_id, to)
                .await
                .map_err(EngineError::internal(op))
        }
        .await;
        match result {
            Ok(()) => {
                self.store
                    .commit(tx)
                    .await
                    .map_err(EngineError::internal(op))?;
                debug!(%order_id, %to, "transitioned order");
                Ok(())
            }
            Err(err) => {
                let _ = self.store.rollback(tx).await;
                Err(err)
            }
        }
    }

    async fn order_tx(
        &self,
        tx: &mut S::Tx,
        order_id: OrderId,
        op: &'static str,
    ) -> Result<ShopOrder> {
        self.store
            .find_order(tx, order_id)
            .await
            .map_err(EngineError::internal(op))?
            .ok_or(EngineError::NotFound("order"))
    }

    fn check_transition(order: &ShopOrder, to: OrderStatus) -> Result<()> {
        if order.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(EngineError::InvalidStatusTransition {
                from: order.status,
                to,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::services::CartPricingEngine;
    use crate::store::MemoryStore;
    use sugarcane_core::{CategoryId, ProductItemId};

    struct Fixture {
        store: Arc<MemoryStore>,
        carts: CartPricingEngine<MemoryStore>,
        orders: OrderOrchestrator<MemoryStore>,
        item: ProductItemId,
    }

    async fn fixture(stock: u32, price: i64) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let product = store
            .seed_product(CategoryId::new(1), "tea", Decimal::from(price))
            .await;
        let item = store
            .seed_product_item(product, Decimal::from(price), stock)
            .await;
        Fixture {
            carts: CartPricingEngine::new(Arc::clone(&store), EngineConfig::default()),
            orders: OrderOrchestrator::new(Arc::clone(&store)),
            store,
            item,
        }
    }

    #[tokio::test]
    async fn place_order_snapshots_prices_and_empties_cart() {
        let f = fixture(10, 500).await;
        let user = UserId::new(1);
        f.carts.add_item(user, f.item).await.expect("add");
        f.carts.update_qty(user, f.item, 2).await.expect("qty");

        let order = f.orders.place_order(user).await.expect("place");
        assert_eq!(order.status, OrderStatus::Placed);
        assert_eq!(order.total, Decimal::from(1000));

        let (_, lines) = f.orders.find_order(order.id).await.expect("find");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].qty, 2);
        assert_eq!(lines[0].unit_price, Decimal::from(500));

        let view = f.carts.get_user_cart(user).await.expect("cart");
        assert!(view.items.is_empty());
        assert_eq!(view.cart.total_price, Decimal::ZERO);

        let stock = f.store.product_item(f.item).await.expect("item").qty_in_stock;
        assert_eq!(stock, 8);
    }

    #[tokio::test]
    async fn lines_are_reserved_in_item_id_order() {
        let store = Arc::new(MemoryStore::new());
        let product = store
            .seed_product(CategoryId::new(1), "tea", Decimal::from(100))
            .await;
        let first = store.seed_product_item(product, Decimal::from(100), 5).await;
        let second = store.seed_product_item(product, Decimal::from(100), 5).await;
        let carts = CartPricingEngine::new(Arc::clone(&store), EngineConfig::default());
        let orders = OrderOrchestrator::new(Arc::clone(&store));
        let user = UserId::new(1);

        // Added in the reverse of their IDs.
        carts.add_item(user, second).await.expect("add second");
        carts.add_item(user, first).await.expect("add first");

        let order = orders.place_order(user).await.expect("place");
        let (_, lines) = orders.find_order(order.id).await.expect("find");
        let ids: Vec<_> = lines.iter().map(|l| l.product_item_id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn empty_cart_cannot_be_placed() {
        let f = fixture(10, 500).await;
        let err = f.orders.place_order(UserId::new(1)).await.expect_err("empty");
        assert!(matches!(err, EngineError::EmptyCart));
    }

    #[tokio::test]
    async fn oversold_line_rolls_back_the_whole_order() {
        let f = fixture(3, 500).await;
        let user = UserId::new(1);
        f.carts.add_item(user, f.item).await.expect("add");
        f.carts.update_qty(user, f.item, 3).await.expect("qty");

        // Stock drains underneath the cart.
        f.store.set_stock(f.item, 1).await;

        let err = f.orders.place_order(user).await.expect_err("oversell");
        assert!(matches!(
            err,
            EngineError::OutOfStockInCart { product_item_id } if product_item_id == f.item
        ));

        // Nothing committed: stock untouched, cart intact.
        let stock = f.store.product_item(f.item).await.expect("item").qty_in_stock;
        assert_eq!(stock, 1);
        let view = f.carts.get_user_cart(user).await.expect("cart");
        assert_eq!(view.items.len(), 1);
    }

    #[tokio::test]
    async fn cancel_releases_reserved_stock() {
        let f = fixture(5, 500).await;
        let user = UserId::new(1);
        f.carts.add_item(user, f.item).await.expect("add");
        f.carts.update_qty(user, f.item, 2).await.expect("qty");
        let order = f.orders.place_order(user).await.expect("place");

        f.orders.cancel_order(order.id).await.expect("cancel");

        let stock = f.store.product_item(f.item).await.expect("item").qty_in_stock;
        assert_eq!(stock, 5);
        let (order, _) = f.orders.find_order(order.id).await.expect("find");
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn return_round_trip_refunds_wallet_and_restores_stock() {
        let f = fixture(5, 500).await;
        let user = UserId::new(1);
        f.carts.add_item(user, f.item).await.expect("add");
        f.carts.update_qty(user, f.item, 2).await.expect("qty");
        let order = f.orders.place_order(user).await.expect("place");

        f.orders.mark_delivered(order.id).await.expect("deliver");
        f.orders.request_return(order.id).await.expect("request");
        f.orders.approve_return(order.id).await.expect("approve");

        let (order, _) = f.orders.find_order(order.id).await.expect("find");
        assert_eq!(order.status, OrderStatus::Returned);

        let stock = f.store.product_item(f.item).await.expect("item").qty_in_stock;
        assert_eq!(stock, 5);

        let wallet = f.store.wallet_by_user(user).await.expect("wallet");
        assert_eq!(wallet.balance, Decimal::from(1000));
    }

    #[tokio::test]
    async fn return_cannot_be_approved_before_it_is_requested() {
        let f = fixture(5, 500).await;
        let user = UserId::new(1);
        f.carts.add_item(user, f.item).await.expect("add");
        let order = f.orders.place_order(user).await.expect("place");

        let err = f.orders.approve_return(order.id).await.expect_err("early");
        assert!(matches!(
            err,
            EngineError::InvalidStatusTransition {
                from: OrderStatus::Placed,
                to: OrderStatus::ReturnApproved,
            }
        ));
    }

    #[tokio::test]
    async fn delivered_order_cannot_be_cancelled() {
        let f = fixture(5, 500).await;
        let user = UserId::new(1);
        f.carts.add_item(user, f.item).await.expect("add");
        let order = f.orders.place_order(user).await.expect("place");
        f.orders.mark_delivered(order.id).await.expect("deliver");

        let err = f.orders.cancel_order(order.id).await.expect_err("late cancel");
        assert!(matches!(
            err,
            EngineError::InvalidStatusTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Cancelled,
            }
        ));
    }

    #[tokio::test]
    async fn return_request_can_be_withdrawn() {
        let f = fixture(5, 500).await;
        let user = UserId::new(1);
        f.carts.add_item(user, f.item).await.expect("add");
        let order = f.orders.place_order(user).await.expect("place");
        f.orders.mark_delivered(order.id).await.expect("deliver");
        f.orders.request_return(order.id).await.expect("request");
        f.orders.cancel_return(order.id).await.expect("withdraw");

        let (order, _) = f.orders.find_order(order.id).await.expect("find");
        assert_eq!(order.status, OrderStatus::ReturnCancelled);
    }
}
