use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::settings::Settings;
use crate::warehouse::Warehouse;

pub fn run(settings: &Settings, limit: usize) -> Result<()> {
    let (_store, conn) = super::open(settings)?;
    let table_name = settings.qualified_table()?;
    let warehouse = Warehouse::new(&conn, &table_name)?;
    let rows = warehouse.fetch(limit)?;

    if rows.is_empty() {
        println!("{table_name} is empty.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Product", "Category", "Price", "Qty", "Date", "Customer", "Email",
    ]);
    for r in rows {
        table.add_row(vec![
            Cell::new(r.transaction_id),
            Cell::new(r.product_name),
            Cell::new(r.category),
            Cell::new(format!("{:.2}", r.price)),
            Cell::new(r.quantity),
            Cell::new(r.date.format("%Y-%m-%d")),
            Cell::new(r.customer_name.unwrap_or_default()),
            Cell::new(r.customer_email.unwrap_or_default()),
        ]);
    }
    println!("{table}");
    Ok(())
}
