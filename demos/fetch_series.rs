use anyhow::Result;
use dbnomics::{Client, SeriesQuery};

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Set DBNOMICS_API_URL or a `.dbnomicsrc` file to use another instance.
    let client = Client::from_env()?.with_progress(true);

    let query = SeriesQuery::dataset("IMF", "CPI").series_code("M.FR+DE.PCPIEC_IX+PCPIA_IX");
    let table = client.fetch_series(&query, Some(10))?;

    println!(
        "{} rows from {} series",
        table.len(),
        table.series_codes().len()
    );
    println!("columns: {}", table.columns().join(", "));
    for row in table.iter().take(5) {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(())
}
