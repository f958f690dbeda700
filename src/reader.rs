use csv::StringRecord;

/// Reads a request body as headerless CSV, one record per line.
///
/// Lines may have different numbers of fields. Iteration ends at the end of
/// the body, or after the first error.
pub struct LineReader<R> {
    reader: csv::Reader<R>,
    record: StringRecord,
    done: bool,
}

impl<R: std::io::Read> LineReader<R> {
    /// The reader does not have to be buffered, csv buffers internally.
    pub fn new(body: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(body);
        Self {
            reader,
            record: StringRecord::new(),
            done: false,
        }
    }
}

impl<R: std::io::Read> Iterator for LineReader<R> {
    type Item = Result<Vec<String>, csv::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_record(&mut self.record) {
            Ok(true) => Some(Ok(self.record.iter().map(String::from).collect())),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(body: &[u8]) -> Result<Vec<Vec<String>>, csv::Error> {
        LineReader::new(body).collect()
    }

    #[test]
    fn test_variable_width() -> anyhow::Result<()> {
        let records = read_all(b"a\nb,c\nd,e,f\n")?;
        assert_eq!(records, [vec!["a"], vec!["b", "c"], vec!["d", "e", "f"]]);
        Ok(())
    }

    #[test]
    fn test_trailing_line_without_newline() -> anyhow::Result<()> {
        let records = read_all(b"github.com\none.one.one.one")?;
        assert_eq!(records, [vec!["github.com"], vec!["one.one.one.one"]]);
        Ok(())
    }

    #[test]
    fn test_crlf_and_quotes() -> anyhow::Result<()> {
        let records = read_all(b"\"a,b\",c\r\n\"say \"\"hi\"\"\"\r\n")?;
        assert_eq!(records, [vec!["a,b", "c"], vec!["say \"hi\""]]);
        Ok(())
    }

    #[test]
    fn test_empty_body() -> anyhow::Result<()> {
        assert!(read_all(b"")?.is_empty());
        Ok(())
    }

    struct FailingBody;

    impl std::io::Read for FailingBody {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("test error"))
        }
    }

    #[test]
    fn test_read_failure_ends_iteration() {
        let mut reader = LineReader::new(FailingBody);
        let err = reader.next().unwrap().unwrap_err();
        assert!(err.is_io_error());
        assert_eq!(err.to_string(), "test error");
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut reader = LineReader::new(&b"ok\n\xff\xfe\n"[..]);
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_err());
    }
}
