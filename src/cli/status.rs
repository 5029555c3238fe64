use crate::error::Result;
use crate::fmt::format_bytes;
use crate::models::Folder;
use crate::router::unfinished_moves;
use crate::scanner::scan;
use crate::settings::Settings;
use crate::warehouse::Warehouse;

pub fn run(settings: &Settings) -> Result<()> {
    let (store, conn) = super::open(settings)?;
    let table = settings.qualified_table()?;

    println!("Project:    {}", settings.project);
    println!("Bucket:     {}", store.root().display());
    println!("Warehouse:  {}", settings.warehouse_path().display());
    println!("Table:      {table}");
    println!("Validation: {:?}", settings.validation);

    println!();
    for folder in Folder::ALL {
        let objects = scan(&store, folder)?;
        let bytes: u64 = objects.iter().map(|o| o.size).sum();
        println!(
            "{:<11} {} file(s), {}",
            format!("{folder}/"),
            objects.len(),
            format_bytes(bytes)
        );
    }

    println!();
    let warehouse = Warehouse::new(&conn, &table)?;
    if warehouse.table_exists()? {
        println!("Rows:       {}", warehouse.row_count()?);
    } else {
        println!("Rows:       table not found. Run `txnflow init` to create it.");
    }
    let pending = unfinished_moves(&conn)?;
    println!("Unfinished moves: {}", pending.len());
    for entry in pending {
        println!("  {} \u{2192} {} ({})", entry.source, entry.destination, entry.state.key());
    }
    Ok(())
}
