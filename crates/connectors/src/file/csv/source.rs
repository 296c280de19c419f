use crate::file::csv::{PERSON_COLUMNS, error::FileError};
use csv::{ByteRecord, ReaderBuilder, StringRecord};
use model::records::person::RawPerson;
use std::{fs::File, path::Path};
use tracing::debug;

/// Forward-only reader over a delimited person file.
///
/// The header line is skipped; data lines are `firstName,lastName,email,age`
/// with optional double-quote quoting. Empty cells become absent values.
pub struct CsvPersonSource {
    reader: csv::Reader<File>,
    record: StringRecord,
    /// Data records consumed so far, malformed ones included.
    rows_read: u64,
}

impl CsvPersonSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FileError::NotFound(path.display().to_string()));
        }

        let file = File::open(path)?;
        let reader = ReaderBuilder::new()
            .delimiter(b',')
            .quote(b'"')
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        Ok(Self {
            reader,
            record: StringRecord::new(),
            rows_read: 0,
        })
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Discards up to `count` data records without parsing them.
    /// Returns how many were actually discarded.
    pub fn skip_rows(&mut self, count: u64) -> Result<u64, FileError> {
        let mut raw = ByteRecord::new();
        let mut skipped = 0;
        while skipped < count {
            match self.reader.read_byte_record(&mut raw) {
                Ok(true) => {
                    skipped += 1;
                    self.rows_read += 1;
                }
                Ok(false) => break,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(_) => {
                    skipped += 1;
                    self.rows_read += 1;
                }
            }
        }
        debug!(skipped, "Skipped already committed rows");
        Ok(skipped)
    }

    /// Returns the next record, `None` at end of file.
    ///
    /// A record-level failure still consumes the line, so the next call
    /// continues after it.
    pub fn next_person(&mut self) -> Option<Result<RawPerson, FileError>> {
        match self.reader.read_record(&mut self.record) {
            Ok(false) => None,
            Ok(true) => {
                self.rows_read += 1;
                Some(self.parse_current())
            }
            Err(e) => {
                if !e.is_io_error() {
                    self.rows_read += 1;
                }
                Some(Err(e.into()))
            }
        }
    }

    fn parse_current(&self) -> Result<RawPerson, FileError> {
        let line = self
            .record
            .position()
            .map(|p| p.line())
            .unwrap_or(self.rows_read + 1);

        if self.record.len() != PERSON_COLUMNS.len() {
            return Err(FileError::Malformed {
                line,
                raw: self.raw_line(),
                reason: format!(
                    "expected {} fields, found {}",
                    PERSON_COLUMNS.len(),
                    self.record.len()
                ),
            });
        }

        let cell = |idx: usize| {
            self.record
                .get(idx)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let age = match cell(3) {
            None => None,
            Some(value) => match value.trim().parse::<i32>() {
                Ok(age) => Some(age),
                Err(e) => {
                    return Err(FileError::Malformed {
                        line,
                        raw: self.raw_line(),
                        reason: format!("invalid age '{value}': {e}"),
                    });
                }
            },
        };

        Ok(RawPerson {
            first_name: cell(0),
            last_name: cell(1),
            email: cell(2),
            age,
        })
    }

    fn raw_line(&self) -> String {
        self.record.iter().collect::<Vec<_>>().join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_quoted_records_and_skips_header() {
        let file = file_with(
            "firstName,lastName,email,age\n\"Jane, Jr\",Doe,jane@x.com,30\nJohn,Roe,,\n",
        );
        let mut source = CsvPersonSource::open(file.path()).unwrap();

        let jane = source.next_person().unwrap().unwrap();
        assert_eq!(jane.first_name.as_deref(), Some("Jane, Jr"));
        assert_eq!(jane.age, Some(30));

        let john = source.next_person().unwrap().unwrap();
        assert_eq!(john.email, None);
        assert_eq!(john.age, None);

        assert!(source.next_person().is_none());
        assert_eq!(source.rows_read(), 2);
    }

    #[test]
    fn malformed_rows_are_record_level_and_consumed() {
        let file = file_with(
            "firstName,lastName,email,age\nJane,Doe,jane@x.com,thirty\nonly,two\nJo,Ro,jo@x.com,5\n",
        );
        let mut source = CsvPersonSource::open(file.path()).unwrap();

        let err = source.next_person().unwrap().unwrap_err();
        assert!(err.is_record_level());
        match err {
            FileError::Malformed { raw, .. } => assert_eq!(raw, "Jane,Doe,jane@x.com,thirty"),
            other => panic!("unexpected error: {other}"),
        }

        assert!(source.next_person().unwrap().unwrap_err().is_record_level());
        let jo = source.next_person().unwrap().unwrap();
        assert_eq!(jo.email.as_deref(), Some("jo@x.com"));
        assert_eq!(source.rows_read(), 3);
    }

    #[test]
    fn skip_rows_resumes_after_offset() {
        let file = file_with("h1,h2,h3,h4\na,b,a@x.com,1\nc,d,c@x.com,2\ne,f,e@x.com,3\n");
        let mut source = CsvPersonSource::open(file.path()).unwrap();

        assert_eq!(source.skip_rows(2).unwrap(), 2);
        let next = source.next_person().unwrap().unwrap();
        assert_eq!(next.email.as_deref(), Some("e@x.com"));
        assert_eq!(source.skip_rows(10).unwrap(), 0);
    }

    #[test]
    fn missing_file_is_not_found() {
        assert!(matches!(
            CsvPersonSource::open("/definitely/not/here.csv"),
            Err(FileError::NotFound(_))
        ));
    }
}
