//! In-process stores used by the mock runtime mode and by tests.

use async_trait::async_trait;
use beans_core::notification::{NotificationError, NotificationSender};
use beans_core::repository::{CustomerDirectory, OrderRepository, ProductCatalog, RepositoryError};
use beans_core::{Customer, Order, OrderStatus, ProductSnapshot};
use beans_shared::Masked;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Storage("memory store lock poisoned".to_string())
}

/// Orders kept in a map, with the same compare-and-set rules as Postgres.
#[derive(Default)]
pub struct MemoryOrderRepository {
    orders: Mutex<HashMap<String, Order>>,
    status_writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an order as-is, bypassing the failure switch.
    pub fn seed(&self, order: Order) {
        if let Ok(mut orders) = self.orders.lock() {
            orders.insert(order.id.clone(), order);
        }
    }

    /// Number of successful status writes so far.
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    /// Make every write fail with a storage error until switched off.
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("write rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.lock().map_err(poisoned)?;
        let mut all: Vec<Order> = orders.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(all)
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Vec<Order>, RepositoryError> {
        let mut all = self.find_all().await?;
        all.retain(|o| o.user_id == user_id);
        Ok(all)
    }

    async fn find_by_id(&self, id: &str) -> Result<Order, RepositoryError> {
        let orders = self.orders.lock().map_err(poisoned)?;
        orders
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn create(&self, order: &Order) -> Result<Order, RepositoryError> {
        self.check_writable()?;
        let mut orders = self.orders.lock().map_err(poisoned)?;
        if orders.contains_key(&order.id) {
            return Err(RepositoryError::Storage(format!("duplicate order id {}", order.id)));
        }
        orders.insert(order.id.clone(), order.clone());
        Ok(order.clone())
    }

    async fn update_status(
        &self,
        id: &str,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        self.check_writable()?;
        let mut orders = self.orders.lock().map_err(poisoned)?;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        if order.status != expected {
            return Err(RepositoryError::Conflict {
                id: id.to_string(),
                expected,
                current: order.status,
            });
        }

        order.status = status;
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(order.clone())
    }

    async fn update_payment_token(&self, id: &str, token: &str) -> Result<Order, RepositoryError> {
        self.check_writable()?;
        let mut orders = self.orders.lock().map_err(poisoned)?;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        match order.payment_token.as_deref() {
            Some(existing) if existing != token => Err(RepositoryError::TokenConflict(id.to_string())),
            _ => {
                order.payment_token = Some(token.to_string());
                Ok(order.clone())
            }
        }
    }
}

/// Customers and products held in memory.
#[derive(Default)]
pub struct MemoryCatalog {
    customers: Mutex<HashMap<i64, Customer>>,
    products: Mutex<HashMap<i64, ProductSnapshot>>,
}

const SAMPLE_PRODUCTS: &[(i64, &str, i64, &str)] = &[
    (1, "Guetemala Beans", 300_000, "Medium roast, chocolate and citrus notes"),
    (2, "Nicaragua Beans", 250_000, "Light roast, floral and honey"),
    (3, "Ethiopia Beans", 275_000, "Washed, bergamot and jasmine"),
    (4, "Rwanda Beans", 299_000, "Natural, red berries"),
];

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two customers (ids 1 and 2) and four products (ids 1 to 4).
    pub fn with_sample_data() -> Self {
        let catalog = Self::new();
        catalog.insert_customer(Customer {
            id: 1,
            name: "Sari Wulandari".to_string(),
            email: Masked("sari@waysbeans.test".to_string()),
            phone: Masked("081234567890".to_string()),
            address: Masked("Jl. Braga No. 12, Bandung".to_string()),
            post_code: "40111".to_string(),
        });
        catalog.insert_customer(Customer {
            id: 2,
            name: "Admin".to_string(),
            email: Masked("admin@waysbeans.test".to_string()),
            phone: Masked("081200000000".to_string()),
            address: Masked("Jl. Sudirman No. 1, Jakarta".to_string()),
            post_code: "10220".to_string(),
        });
        for &(id, name, price, description) in SAMPLE_PRODUCTS {
            catalog.insert_product(ProductSnapshot {
                id,
                name: name.to_string(),
                price,
                description: description.to_string(),
                image: format!("{}.png", id),
            });
        }
        catalog
    }

    /// Unit price of a sample product, 0 when the id is not part of the sample set.
    pub fn sample_price(id: i64) -> i64 {
        SAMPLE_PRODUCTS
            .iter()
            .find(|(pid, ..)| *pid == id)
            .map(|&(_, _, price, _)| price)
            .unwrap_or(0)
    }

    pub fn insert_customer(&self, customer: Customer) {
        if let Ok(mut customers) = self.customers.lock() {
            customers.insert(customer.id, customer);
        }
    }

    pub fn insert_product(&self, product: ProductSnapshot) {
        if let Ok(mut products) = self.products.lock() {
            products.insert(product.id, product);
        }
    }
}

#[async_trait]
impl CustomerDirectory for MemoryCatalog {
    async fn find_customer(&self, user_id: i64) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.lock().map_err(poisoned)?;
        Ok(customers.get(&user_id).cloned())
    }
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn find_products(&self, ids: &[i64]) -> Result<Vec<ProductSnapshot>, RepositoryError> {
        let products = self.products.lock().map_err(poisoned)?;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }
}

/// Records every notification instead of delivering it.
#[derive(Default)]
pub struct MemoryOutbox {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivered notifications as (order id, label), oldest first.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn labels_for(&self, order_id: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(id, _)| id == order_id)
            .map(|(_, label)| label)
            .collect()
    }

    pub fn fail_deliveries(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationSender for MemoryOutbox {
    async fn send(&self, label: &str, order: &Order) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Delivery("outbox offline".to_string()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| NotificationError::Delivery("outbox lock poisoned".to_string()))?;
        sent.push((order.id.clone(), label.to_string()));
        Ok(())
    }
}
