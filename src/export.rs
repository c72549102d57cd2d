//! Ordered view of the merged store and the JSON output file.
use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use crate::collector::Collector;
use crate::record::Record;

/// All stored records, ascending by sequence number, no duplicates.
pub fn export_ordered(collector: &Collector) -> Vec<Record> {
    let mut out: Vec<Record> = collector.records().cloned().collect();
    out.sort_by_key(Record::sequence_number);
    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonRecord<'a> {
    symbol: &'a str,
    buy_sell_indicator: String,
    quantity: i32,
    price: i32,
    sequence_number: i32,
}

impl<'a> From<&'a Record> for JsonRecord<'a> {
    fn from(r: &'a Record) -> Self {
        Self {
            symbol: r.symbol(),
            buy_sell_indicator: char::from(r.side().indicator()).to_string(),
            quantity: r.quantity(),
            price: r.price(),
            sequence_number: r.sequence_number(),
        }
    }
}

/// Write `records` as a pretty-printed JSON array.
pub fn write_json<W: Write>(records: &[Record], mut w: W) -> Result<()> {
    let rows: Vec<JsonRecord<'_>> = records.iter().map(JsonRecord::from).collect();
    serde_json::to_writer_pretty(&mut w, &rows)?;
    w.write_all(b"\n")?;
    w.flush()?;
    Ok(())
}
