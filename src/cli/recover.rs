use crate::error::Result;
use crate::router::recover;
use crate::settings::Settings;

pub fn run(settings: &Settings) -> Result<()> {
    let (store, conn) = super::open(settings)?;
    let completed = recover(&store, &conn)?;
    if completed == 0 {
        println!("Nothing to recover.");
    } else {
        println!("{completed} unfinished move(s) completed.");
    }
    Ok(())
}
