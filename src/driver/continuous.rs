//! Continuous-output stream (§6 "Output files"): `##\t##` header line,
//! then column titles, then one row per sampled time step.

use crate::error::CoreError;
use std::io::Write;

pub struct ContinuousOutput {
    columns: Vec<String>,
    header_written: bool,
}

impl ContinuousOutput {
    pub fn new(columns: Vec<String>) -> Self {
        ContinuousOutput { columns, header_written: false }
    }

    fn write_header(&mut self, writer: &mut dyn Write) -> Result<(), CoreError> {
        writeln!(writer, "##\t##")?;
        writeln!(writer, "{}", self.columns.join("\t"))?;
        self.header_written = true;
        Ok(())
    }

    pub fn write_row(&mut self, writer: &mut dyn Write, values: &[f64]) -> Result<(), CoreError> {
        if !self.header_written {
            self.write_header(writer)?;
        }
        debug_assert_eq!(values.len(), self.columns.len());
        let row: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        writeln!(writer, "{}", row.join("\t"))?;
        Ok(())
    }
}
