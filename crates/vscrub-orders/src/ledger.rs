//! Order ledger and settlement.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics::counter;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use vscrub_models::{find_plan, Order, OrderStatus, Plan, PlanKind, SettleOutcome, User};
use vscrub_store::UserStore;

use crate::error::OrderError;

/// Per-user order statistics.
#[derive(Debug, Clone, Serialize)]
pub struct OrderStats {
    pub total_orders: usize,
    pub paid_orders: usize,
    pub pending_orders: usize,
    /// Sum of paid order amounts, in whole currency units.
    pub total_spent: u64,
}

/// Process-local order ledger.
///
/// Settlement and benefit application happen under the ledger's write
/// lock, so an order settles exactly once no matter how many callbacks
/// the gateway simulation fires.
pub struct OrderLedger {
    users: Arc<UserStore>,
    orders: RwLock<HashMap<String, Order>>,
}

impl OrderLedger {
    pub fn new(users: Arc<UserStore>) -> Self {
        Self {
            users,
            orders: RwLock::new(HashMap::new()),
        }
    }

    /// Create a pending order for a catalog plan.
    pub async fn create_order(
        &self,
        user_id: &str,
        plan_id: &str,
        payment_method: &str,
    ) -> Result<Order, OrderError> {
        let plan = find_plan(plan_id).ok_or_else(|| OrderError::UnknownPlan(plan_id.into()))?;

        let order = Order::new(user_id, plan, payment_method);
        let snapshot = order.clone();
        self.orders
            .write()
            .await
            .insert(order.id.as_str().to_string(), order);

        counter!("vscrub_orders_created_total").increment(1);
        info!(order_id = %snapshot.id, plan_id, "order created");
        Ok(snapshot)
    }

    /// Snapshot of an order, visible only to its owner.
    pub async fn get(&self, order_id: &str, user_id: &str) -> Result<Order, OrderError> {
        let orders = self.orders.read().await;
        orders
            .get(order_id)
            .filter(|order| order.user_id == user_id)
            .cloned()
            .ok_or(OrderError::NotFound)
    }

    /// All of a user's orders, newest first.
    pub async fn orders_for_user(&self, user_id: &str) -> Vec<Order> {
        let orders = self.orders.read().await;
        let mut out: Vec<Order> = orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Settle an order with the gateway-reported outcome.
    ///
    /// Re-reporting the outcome an order already settled to returns the
    /// recorded order without reapplying benefits; any other report on
    /// a settled order is rejected. A success report on an expired
    /// pending order forces the order to `failed` and surfaces
    /// [`OrderError::Expired`]; failure and cancel reports on an
    /// expired order settle normally.
    pub async fn settle(&self, order_id: &str, outcome: SettleOutcome) -> Result<Order, OrderError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(order_id).ok_or(OrderError::NotFound)?;
        let target = outcome.target_status();

        if order.status.is_terminal() {
            if order.status == target {
                return Ok(order.clone());
            }
            return Err(OrderError::InvalidState {
                status: order.status.as_str(),
                requested: target.as_str(),
            });
        }

        let now = Utc::now();
        if outcome == SettleOutcome::Success && order.is_expired(now) {
            order.status = OrderStatus::Failed;
            order.updated_at = now;
            warn!(order_id, "success reported for expired order");
            return Err(OrderError::Expired);
        }

        if outcome == SettleOutcome::Success {
            let plan = find_plan(&order.plan_id)
                .ok_or_else(|| OrderError::UnknownPlan(order.plan_id.clone()))?;
            self.users
                .update(&order.user_id, |user| apply_plan(user, plan))
                .await
                .map_err(|_| OrderError::NotFound)?;
            order.paid_at = Some(now);
        }

        order.status = target;
        order.updated_at = now;

        counter!("vscrub_orders_settled_total", "outcome" => target.as_str()).increment(1);
        info!(order_id, status = %order.status, "order settled");
        Ok(order.clone())
    }

    /// User-initiated cancellation of a pending order.
    pub async fn cancel_order(&self, order_id: &str, user_id: &str) -> Result<Order, OrderError> {
        // Ownership check before touching settlement state
        self.get(order_id, user_id).await?;
        self.settle(order_id, SettleOutcome::Cancel).await
    }

    /// Aggregate statistics over a user's orders.
    pub async fn stats(&self, user_id: &str) -> OrderStats {
        let orders = self.orders.read().await;
        let mut stats = OrderStats {
            total_orders: 0,
            paid_orders: 0,
            pending_orders: 0,
            total_spent: 0,
        };
        for order in orders.values().filter(|o| o.user_id == user_id) {
            stats.total_orders += 1;
            match order.status {
                OrderStatus::Paid => {
                    stats.paid_orders += 1;
                    stats.total_spent += order.amount;
                }
                OrderStatus::Pending => stats.pending_orders += 1,
                _ => {}
            }
        }
        stats
    }
}

/// Apply a purchased plan's benefits to the buyer.
fn apply_plan(user: &mut User, plan: &Plan) {
    match plan.kind {
        PlanKind::Subscription {
            tier,
            duration_days,
        } => {
            user.plan_tier = tier;
            user.subscription_end = Some(Utc::now() + Duration::days(duration_days));
        }
        PlanKind::Credits { amount } => {
            user.credits += amount;
        }
    }
}
