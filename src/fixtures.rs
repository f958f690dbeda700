use rusqlite::Connection;

/// An in-memory database with the `ip_dns` table used throughout the tests.
pub(crate) fn ip_dns() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(
        "CREATE TABLE ip_dns (ip TEXT NOT NULL, dns TEXT NOT NULL);
         INSERT INTO ip_dns (ip, dns) VALUES
             ('192.30.253.112', 'github.com'),
             ('192.30.253.113', 'github.com'),
             ('1.1.1.1', 'one.one.one.one'),
             ('8.8.8.8', 'google-public-dns-a.google.com');",
    )?;
    Ok(conn)
}

pub(crate) fn record(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}
