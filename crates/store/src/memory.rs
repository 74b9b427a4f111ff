use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use landed_core::domain::{OrderId, OrderRecord};
use landed_core::submission::{OrderStore, OrderStoreError};

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<BTreeMap<OrderId, OrderRecord>>,
}

impl InMemoryOrderStore {
    pub async fn get(&self, order_id: OrderId) -> Option<OrderRecord> {
        self.orders.read().await.get(&order_id).cloned()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn persist(&self, order: &OrderRecord) -> Result<String, OrderStoreError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.order_id) {
            return Err(OrderStoreError::AlreadyExists(order.order_id));
        }
        orders.insert(order.order_id, order.clone());
        Ok(format!("memory://order_{}", order.order_id))
    }

    async fn list(&self) -> Result<Vec<OrderRecord>, OrderStoreError> {
        let orders = self.orders.read().await;
        Ok(orders.values().cloned().collect())
    }
}
