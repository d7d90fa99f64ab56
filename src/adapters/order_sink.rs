//! Order sinks: hand a rebalance plan off to something outside the core.

use crate::domain::allocator::Order;
use crate::domain::error::SiegfriedError;
use crate::ports::order_port::OrderPort;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct OrderRecord<'a> {
    ticker: &'a str,
    side: String,
    quantity: u64,
    reference_price: f64,
}

impl<'a> From<&'a Order> for OrderRecord<'a> {
    fn from(order: &'a Order) -> Self {
        OrderRecord {
            ticker: &order.ticker,
            side: order.side().to_string(),
            quantity: order.quantity.unsigned_abs(),
            reference_price: order.reference_price,
        }
    }
}

/// Writes the full order list to a CSV file, replacing any previous content.
/// An empty plan still gets the header row.
pub struct CsvOrderSink {
    path: PathBuf,
}

impl CsvOrderSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OrderPort for CsvOrderSink {
    fn submit(&mut self, orders: &[Order]) -> Result<(), SiegfriedError> {
        let mut wtr = csv::Writer::from_path(&self.path)?;
        if orders.is_empty() {
            wtr.write_record(["ticker", "side", "quantity", "reference_price"])?;
        }
        for order in orders {
            wtr.serialize(OrderRecord::from(order))?;
        }
        wtr.flush()?;
        tracing::info!(orders = orders.len(), path = %self.path.display(), "orders written");
        Ok(())
    }
}

/// Dry-run broker: one JSON object per order on the wrapped writer.
pub struct JsonLinesOrderSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesOrderSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OrderPort for JsonLinesOrderSink<W> {
    fn submit(&mut self, orders: &[Order]) -> Result<(), SiegfriedError> {
        for order in orders {
            let line = serde_json::to_string(&OrderRecord::from(order))
                .map_err(|e| SiegfriedError::Io(std::io::Error::other(e)))?;
            writeln!(self.writer, "{line}")?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
