//! Serialization of lookup results.

use crate::{client::LookupOutcome, Error, Result};
use std::io::Write;

/// Writes the outcome in its mode-appropriate form.
///
/// Single-user lookups emit each raw key value on its own line, in directory
/// order, with no other formatting. Group lookups emit the full member
/// roster as one JSON array document followed by a newline.
///
/// # Errors
///
/// Returns [`Error::Query`] when serialization or the write fails; the
/// invocation is expected to terminate on that.
pub fn write_outcome<W: Write>(mut writer: W, outcome: &LookupOutcome) -> Result<()> {
    match outcome {
        LookupOutcome::Keys(keys) => {
            for key in keys {
                writeln!(writer, "{key}")
                    .map_err(|err| Error::Query(format!("unable to write keys: {err}")))?;
            }
        }
        LookupOutcome::Members(members) => {
            serde_json::to_writer(&mut writer, members)
                .map_err(|err| Error::Query(format!("unable to serialize members: {err}")))?;
            writeln!(writer)
                .map_err(|err| Error::Query(format!("unable to write members: {err}")))?;
        }
    }
    Ok(())
}
