use crate::ParameterCount;

/// Render the diagnostic text included in every error response and printed
/// at startup.
pub fn render(sql: &str, params: ParameterCount, port: u16, path: &str) -> String {
    format!(
        "Query:
\t{sql}
Params count (question marks):
\t{params}
Usage:
\tcurl \"http://$ADDRESS:{port}{path}\" -d \"$PARAM_1,$PARAM_2,...,$PARAM_N\"

\t- Request must be a HTTP POST to {path}
\t- Request body must be a valid CSV
\t- Request body must not have a CSV header
\t- Each request body line is a different query
\t- Each request body param corresponds to a query param (a question mark in the query string)
Response:
\t[{{\"in\":[\"$PARAM_1\",...],\"headers\":[\"$COLUMN_1\",...],\"out\":[[\"$VALUE_1\",...],...]}},...]
"
    )
}
