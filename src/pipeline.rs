//! Answering one request: read a CSV line, execute the query for it, encode
//! the result, repeat until the body ends.

use std::io::{Read, Write};

use crate::encoder::JsonStream;
use crate::reader::LineReader;
use crate::{PipelineError, PreparedQuery};

/// Stream the response envelope for `body` into `stream`, returning the
/// number of lines answered.
///
/// Lines are processed strictly in order and the first failure aborts the
/// whole request. Whether the failure can still become a clean error response
/// is up to the caller, see [`JsonStream::committed`].
pub fn stream_envelope<R: Read, W: Write>(
    query: &mut PreparedQuery<'_>,
    body: R,
    stream: &mut JsonStream<W>,
) -> Result<usize, PipelineError> {
    for record in LineReader::new(body) {
        let record = record.map_err(PipelineError::ReadBody)?;
        let mut rows = query.run(&record)?;
        // Step to the first row before writing anything for this line, so a
        // failure on the first line leaves the response uncommitted.
        let first = rows.next().transpose()?;
        stream
            .open_line(record.as_slice(), &rows.headers)
            .map_err(PipelineError::Write)?;
        let mut count = 0usize;
        for row in first.into_iter().map(Ok).chain(rows) {
            let row = row?;
            stream.row(row.as_slice()).map_err(PipelineError::Write)?;
            count += 1;
        }
        stream.close_line().map_err(PipelineError::Write)?;
        tracing::debug!(line = stream.lines(), rows = count, "answered line");
    }
    stream.finish().map_err(PipelineError::Write)?;
    Ok(stream.lines())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ip_dns;
    use serde_json::{json, Value};

    const BY_DNS: &str = "SELECT * FROM ip_dns WHERE dns = ?";
    const THREE_LINES: &str = "github.com\none.one.one.one\ngoogle-public-dns-a.google.com";

    fn run(sql: &str, body: &[u8]) -> anyhow::Result<(Result<usize, PipelineError>, bool, String)> {
        let conn = ip_dns()?;
        let mut query = PreparedQuery::prepare(&conn, sql)?;
        let mut stream = JsonStream::new(Vec::new());
        let result = stream_envelope(&mut query, body, &mut stream);
        let committed = stream.committed();
        let out = String::from_utf8(stream.into_inner())?;
        Ok((result, committed, out))
    }

    #[test]
    fn test_three_lines() -> anyhow::Result<()> {
        let (result, _, out) = run(BY_DNS, THREE_LINES.as_bytes())?;
        assert_eq!(result?, 3);
        let envelope: Value = serde_json::from_str(&out)?;
        assert_eq!(
            envelope,
            json!([
                {
                    "in": ["github.com"],
                    "headers": ["ip", "dns"],
                    "out": [["192.30.253.112", "github.com"], ["192.30.253.113", "github.com"]]
                },
                {
                    "in": ["one.one.one.one"],
                    "headers": ["ip", "dns"],
                    "out": [["1.1.1.1", "one.one.one.one"]]
                },
                {
                    "in": ["google-public-dns-a.google.com"],
                    "headers": ["ip", "dns"],
                    "out": [["8.8.8.8", "google-public-dns-a.google.com"]]
                }
            ])
        );
        Ok(())
    }

    #[test]
    fn test_two_parameters() -> anyhow::Result<()> {
        let (result, _, out) = run(
            "SELECT * FROM ip_dns WHERE dns = ? AND ip = ?",
            b"github.com,192.30.253.112\none.one.one.one,1.1.1.1",
        )?;
        assert_eq!(result?, 2);
        let envelope: Value = serde_json::from_str(&out)?;
        assert_eq!(envelope[0]["out"], json!([["192.30.253.112", "github.com"]]));
        assert_eq!(envelope[1]["out"], json!([["1.1.1.1", "one.one.one.one"]]));
        assert_eq!(envelope[1]["in"], json!(["one.one.one.one", "1.1.1.1"]));
        Ok(())
    }

    #[test]
    fn test_deterministic() -> anyhow::Result<()> {
        let (_, _, first) = run(BY_DNS, THREE_LINES.as_bytes())?;
        let (_, _, second) = run(BY_DNS, THREE_LINES.as_bytes())?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_no_match_and_empty_body() -> anyhow::Result<()> {
        let (result, _, out) = run(BY_DNS, b"nothing.example\n")?;
        assert_eq!(result?, 1);
        assert_eq!(
            out,
            "[{\"in\":[\"nothing.example\"],\"headers\":[\"ip\",\"dns\"],\"out\":[]}]\n"
        );

        let (result, committed, out) = run(BY_DNS, b"")?;
        assert_eq!(result?, 0);
        assert!(committed);
        assert_eq!(out, "[]\n");
        Ok(())
    }

    #[test]
    fn test_mismatch_on_first_line_is_not_committed() -> anyhow::Result<()> {
        let (result, committed, out) = run(BY_DNS, b"github.com,1")?;
        let err = result.unwrap_err();
        assert!(!committed);
        assert!(out.is_empty());
        assert!(err.to_string().contains("expected 1 arguments, got 2"));
        assert!(err.to_string().contains("github.com"));
        Ok(())
    }

    #[test]
    fn test_mismatch_after_first_line_is_committed() -> anyhow::Result<()> {
        let (result, committed, out) = run(BY_DNS, b"github.com\none.one.one.one,1\n8.8.8.8")?;
        assert!(matches!(result, Err(PipelineError::Execute { .. })));
        assert!(committed);
        assert!(out.starts_with("[{\"in\":[\"github.com\"]"));
        assert!(!out.contains("8.8.8.8"));
        Ok(())
    }

    struct FailingBody;

    impl Read for FailingBody {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("test error"))
        }
    }

    #[test]
    fn test_body_read_failure() -> anyhow::Result<()> {
        let conn = ip_dns()?;
        let mut query = PreparedQuery::prepare(&conn, BY_DNS)?;
        let mut stream = JsonStream::new(Vec::new());
        let err = stream_envelope(&mut query, FailingBody, &mut stream).unwrap_err();
        assert!(!stream.committed());
        assert!(err.to_string().contains("Error reading request body: test error"));
        Ok(())
    }

    #[test]
    fn test_scan_failure_aborts_request() -> anyhow::Result<()> {
        let (result, committed, out) =
            run("SELECT CAST(x'ff' AS TEXT) WHERE ? IS NOT NULL", b"a\nb\n")?;
        assert!(matches!(result, Err(PipelineError::ReadResults { .. })));
        assert!(!committed);
        assert!(out.is_empty());
        Ok(())
    }

    #[test]
    fn test_step_error_on_first_line_is_not_committed() -> anyhow::Result<()> {
        let (result, committed, out) =
            run("INSERT INTO ip_dns (ip, dns) VALUES (?, NULL)", b"9.9.9.9")?;
        assert!(matches!(result, Err(PipelineError::Execute { .. })));
        assert!(!committed);
        assert!(out.is_empty());
        Ok(())
    }
}
