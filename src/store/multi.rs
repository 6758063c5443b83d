//! Transaction result processing.

use crate::error::{CoordError, Result};
use crate::store::{Reply, TxEntry};

/// Unpacks the ordered `(error, value)` results of one transaction.
///
/// Fails on the first slot carrying an error; otherwise returns the values
/// in command order.
pub fn process_multi_results(results: Vec<TxEntry>) -> Result<Vec<Reply>> {
    let mut values = Vec::with_capacity(results.len());
    for (index, (err, value)) in results.into_iter().enumerate() {
        if let Some(message) = err {
            return Err(CoordError::TransactionCommand { index, message });
        }
        values.push(value);
    }
    Ok(values)
}

/// Same as [`process_multi_results`], but also rejects a result set whose
/// length differs from the number of queued commands.
pub fn process_exact(results: Vec<TxEntry>, expected: usize) -> Result<Vec<Reply>> {
    if results.len() != expected {
        return Err(CoordError::validation(format!(
            "transaction returned {} results for {} commands",
            results.len(),
            expected
        )));
    }
    process_multi_results(results)
}
