//! Survey output buffer and its tab-separated flush format (§3 "Survey
//! buffer", §6 "Output files").

use crate::error::CoreError;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurveyKey {
    pub measure_id: u32,
    pub age_group: u32,
    pub cohort_set_output_id: u32,
}

impl SurveyKey {
    /// `ageCohortId = 1000 * cohortSetOutputId + ageGroup + 1` (§6).
    pub fn age_cohort_id(&self) -> u32 {
        1000 * self.cohort_set_output_id + self.age_group + 1
    }
}

#[derive(Clone, Debug, Default)]
pub struct SurveyBuffer {
    accumulators: BTreeMap<SurveyKey, f64>,
    survey_index: u32,
}

impl SurveyBuffer {
    pub fn new() -> Self {
        SurveyBuffer::default()
    }

    pub fn accumulate(&mut self, key: SurveyKey, value: f64) {
        *self.accumulators.entry(key).or_insert(0.0) += value;
    }

    pub fn set(&mut self, key: SurveyKey, value: f64) {
        self.accumulators.insert(key, value);
    }

    /// Flush the accumulated rows for the current survey index to
    /// `writer` as `<surveyIndex>\t<ageCohortId>\t<measureId>\t<value>\n`,
    /// then clear the buffer and advance the index.
    pub fn flush(&mut self, writer: &mut dyn Write) -> Result<(), CoreError> {
        self.survey_index += 1;
        for (key, value) in &self.accumulators {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                self.survey_index,
                key.age_cohort_id(),
                key.measure_id,
                value
            )?;
        }
        self.accumulators.clear();
        Ok(())
    }

    pub fn survey_index(&self) -> u32 {
        self.survey_index
    }
}

/// Open the survey output stream, gzip-wrapped when `compress` is set
/// (§6 "`--compress-output`").
pub fn open_output(path: &Path, compress: bool) -> Result<Box<dyn Write>, CoreError> {
    let file = std::fs::File::create(path)?;
    if compress {
        Ok(Box::new(flate2::write::GzEncoder::new(file, flate2::Compression::default())))
    } else {
        Ok(Box::new(std::io::BufWriter::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_cohort_id_matches_contract_encoding() {
        let key = SurveyKey { measure_id: 1, age_group: 2, cohort_set_output_id: 3 };
        assert_eq!(key.age_cohort_id(), 1000 * 3 + 2 + 1);
    }

    #[test]
    fn flush_writes_tab_separated_rows_and_clears_buffer() {
        let mut buffer = SurveyBuffer::new();
        buffer.accumulate(SurveyKey { measure_id: 1, age_group: 0, cohort_set_output_id: 0 }, 42.0);
        let mut out = Vec::new();
        buffer.flush(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "1\t1\t1\t42\n");
        assert!(buffer.accumulators.is_empty());
    }
}
