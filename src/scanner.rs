use crate::error::Result;
use crate::models::{Folder, ObjectMeta};
use crate::store::ObjectStore;

pub fn is_csv(name: &str) -> bool {
    name.ends_with(".csv")
}

/// CSV objects currently under `folder`, in name order.
pub fn scan(store: &dyn ObjectStore, folder: Folder) -> Result<Vec<ObjectMeta>> {
    let objects = store.list(folder.prefix())?;
    let total = objects.len();
    let csv: Vec<ObjectMeta> = objects.into_iter().filter(|o| is_csv(&o.name)).collect();
    tracing::debug!(folder = %folder, total, csv = csv.len(), "scanned folder");
    Ok(csv)
}
