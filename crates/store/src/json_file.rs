use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use landed_core::domain::{OrderId, OrderRecord};
use landed_core::submission::{OrderStore, OrderStoreError};

const PROBE_FILE: &str = ".landed-write-probe";

/// One pretty-printed JSON document per order, named `order_<id>.json`.
///
/// An existing order file is never replaced; persisting a taken id fails with
/// [`OrderStoreError::AlreadyExists`].
#[derive(Clone, Debug)]
pub struct JsonFileOrderStore {
    directory: PathBuf,
}

impl JsonFileOrderStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, order_id: OrderId) -> PathBuf {
        self.directory.join(format!("order_{order_id}.json"))
    }

    /// Creates the directory if needed and proves a file can be written into it.
    pub async fn probe_writable(&self) -> Result<(), OrderStoreError> {
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|error| io_error(&self.directory, error))?;
        let probe = self.directory.join(PROBE_FILE);
        fs::write(&probe, b"ok").await.map_err(|error| io_error(&probe, error))?;
        fs::remove_file(&probe).await.map_err(|error| io_error(&probe, error))?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for JsonFileOrderStore {
    async fn persist(&self, order: &OrderRecord) -> Result<String, OrderStoreError> {
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|error| io_error(&self.directory, error))?;

        let body = serde_json::to_vec_pretty(order)
            .map_err(|error| OrderStoreError::Serialization(error.to_string()))?;
        let target = self.path_for(order.order_id);
        // Claims the name first; the rename below only ever replaces this empty placeholder.
        match fs::OpenOptions::new().write(true).create_new(true).open(&target).await {
            Ok(_) => {}
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                return Err(OrderStoreError::AlreadyExists(order.order_id));
            }
            Err(error) => return Err(io_error(&target, error)),
        }

        let staging = target.with_extension("json.tmp");
        if let Err(error) = write_synced(&staging, &target, &body).await {
            if let Err(cleanup) = fs::remove_file(&target).await {
                warn!(
                    event_name = "store.placeholder_left",
                    path = %target.display(),
                    error = %cleanup,
                    "could not remove reserved order file after a failed write"
                );
            }
            return Err(error);
        }

        debug!(
            event_name = "store.order_written",
            order_id = %order.order_id,
            path = %target.display(),
            bytes = body.len(),
            "order file written"
        );
        Ok(target.display().to_string())
    }

    async fn list(&self) -> Result<Vec<OrderRecord>, OrderStoreError> {
        let mut entries = match fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(io_error(&self.directory, error)),
        };

        let mut orders = Vec::new();
        while let Some(entry) =
            entries.next_entry().await.map_err(|error| io_error(&self.directory, error))?
        {
            let path = entry.path();
            let is_order_file = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with("order_") && name.ends_with(".json"))
                .unwrap_or(false);
            if !is_order_file {
                continue;
            }

            let raw = fs::read(&path).await.map_err(|error| io_error(&path, error))?;
            match serde_json::from_slice::<OrderRecord>(&raw) {
                Ok(order) => orders.push(order),
                Err(error) => warn!(
                    event_name = "store.order_unreadable",
                    path = %path.display(),
                    error = %error,
                    "skipping order file that does not decode"
                ),
            }
        }

        orders.sort_by_key(|order| order.order_id);
        Ok(orders)
    }
}

async fn write_synced(staging: &Path, target: &Path, body: &[u8]) -> Result<(), OrderStoreError> {
    fs::write(staging, body).await.map_err(|error| io_error(staging, error))?;
    let file = fs::File::open(staging).await.map_err(|error| io_error(staging, error))?;
    file.sync_all().await.map_err(|error| io_error(staging, error))?;
    fs::rename(staging, target).await.map_err(|error| io_error(target, error))
}

fn io_error(path: &Path, error: std::io::Error) -> OrderStoreError {
    OrderStoreError::Io(format!("{}: {error}", path.display()))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    use landed_core::domain::{Cart, CartItem, ChatContact, CustomerDetails, OrderId, OrderRecord};
    use landed_core::money::Currency;
    use landed_core::pricing::LandedCostEngine;
    use landed_core::submission::{OrderStore, OrderStoreError};

    use super::JsonFileOrderStore;

    fn order(id: u64, customer: &str) -> OrderRecord {
        let mut cart = Cart::new();
        cart.add(
            CartItem::from_listing(
                "Trail runner",
                Some(Decimal::new(8999, 2)),
                Currency::eur(),
                "https://www.idealo.de/preisvergleich/OffersOfProduct/1.html",
                1,
            )
            .expect("item"),
        );
        OrderRecord::assemble(
            OrderId(id),
            Utc::now(),
            CustomerDetails { name: customer.to_owned(), ..CustomerDetails::default() },
            ChatContact::default(),
            &cart,
            &LandedCostEngine::default(),
        )
        .expect("order")
    }

    #[tokio::test]
    async fn existing_order_file_is_never_replaced() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileOrderStore::new(dir.path().join("orders"));

        let location = store.persist(&order(1_700_000_000, "first")).await.expect("persist");
        assert!(location.ends_with("order_1700000000.json"));

        let error =
            store.persist(&order(1_700_000_000, "second")).await.expect_err("id already on disk");
        assert_eq!(error, OrderStoreError::AlreadyExists(OrderId(1_700_000_000)));

        let orders = store.list().await.expect("list");
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].customer.name, "first");
        let files = std::fs::read_dir(store.directory()).expect("directory exists").count();
        assert_eq!(files, 1);
    }

    #[tokio::test]
    async fn missing_directory_lists_as_empty() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileOrderStore::new(dir.path().join("never-created"));

        let orders = store.list().await.expect("list");

        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn probe_creates_directory_and_leaves_nothing_behind() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileOrderStore::new(dir.path().join("orders"));

        store.probe_writable().await.expect("writable");

        let leftovers = std::fs::read_dir(store.directory()).expect("directory exists").count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn probe_fails_when_directory_is_a_file() {
        let dir = TempDir::new().expect("tempdir");
        let occupied = dir.path().join("orders");
        std::fs::write(&occupied, b"not a directory").expect("seed file");

        let store = JsonFileOrderStore::new(&occupied);

        assert!(store.probe_writable().await.is_err());
    }
}
