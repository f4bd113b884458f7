use super::types::Body;

/// One parsed wire request. Produced from a peer's buffered bytes, consumed
/// exactly once by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    /// Leading slash already stripped.
    pub path: String,
    pub body: Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    MalformedRequestLine,
}

/// Parse the minimal HTTP-shaped protocol: request line, headers up to the
/// blank line (ignored), optional JSON body. Deliberately tolerant — a body
/// that fails to parse, or parses to a non-object, becomes an empty map and
/// the handler decides what is missing. Only a request line with fewer than
/// two tokens is a frame error.
pub fn parse_request(raw: &[u8]) -> Result<Request, FrameError> {
    let text = String::from_utf8_lossy(raw);
    let request_line = text.lines().next().unwrap_or("");
    let mut tokens = request_line.split_whitespace();
    let (Some(method), Some(raw_path)) = (tokens.next(), tokens.next()) else {
        return Err(FrameError::MalformedRequestLine);
    };

    let body_text = match text.split_once("\r\n\r\n") {
        Some((_, rest)) => rest,
        None => text.split_once("\n\n").map(|(_, rest)| rest).unwrap_or(""),
    };
    let body = match serde_json::from_str::<serde_json::Value>(body_text.trim()) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => Body::new(),
    };

    Ok(Request {
        method: method.to_string(),
        path: raw_path.trim_start_matches('/').to_string(),
        body,
    })
}

/// Fixed response envelope. Status is 200 for anything that reached the
/// dispatcher — success vs failure lives in the body's `error` key — and
/// 400 only for frame-level malformation.
pub fn encode_ok(body: &serde_json::Value) -> Vec<u8> {
    encode("200 OK", body)
}

pub fn encode_bad_request() -> Vec<u8> {
    encode(
        "400 Bad Request",
        &serde_json::json!({ "error": "Malformed request" }),
    )
}

fn encode(status: &str, body: &serde_json::Value) -> Vec<u8> {
    let payload = body.to_string();
    let mut out = Vec::with_capacity(payload.len() + 160);
    out.extend_from_slice(format!("HTTP/1.1 {status}\r\n").as_bytes());
    out.extend_from_slice(b"Content-Type: application/json\r\n");
    out.extend_from_slice(format!("Content-Length: {}\r\n", payload.len()).as_bytes());
    out.extend_from_slice(b"Access-Control-Allow-Origin: *\r\n");
    out.extend_from_slice(b"Connection: close\r\n\r\n");
    out.extend_from_slice(payload.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_method_path_and_body() {
        let raw = b"POST /node/create HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\r\n{\"node_type\":\"Spatial\",\"node_name\":\"Hill\"}";
        let req = parse_request(raw).unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "node/create");
        assert_eq!(req.body["node_type"], "Spatial");
        assert_eq!(req.body["node_name"], "Hill");
    }

    #[test]
    fn get_without_body_yields_empty_map() {
        let req = parse_request(b"GET /scene/tree HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "scene/tree");
        assert!(req.body.is_empty());
    }

    #[test]
    fn garbage_body_is_tolerated() {
        let req = parse_request(b"POST /ping HTTP/1.1\r\n\r\n{not json at all").unwrap();
        assert!(req.body.is_empty());

        // a top-level array is not a body map either
        let req = parse_request(b"POST /ping HTTP/1.1\r\n\r\n[1,2,3]").unwrap();
        assert!(req.body.is_empty());
    }

    #[test]
    fn bare_newline_separator_is_accepted() {
        let req = parse_request(b"POST /ping HTTP/1.1\nAccept: */*\n\n{\"a\":1}").unwrap();
        assert_eq!(req.body["a"], 1);
    }

    #[test]
    fn short_request_line_is_a_frame_error() {
        assert_eq!(
            parse_request(b""),
            Err(FrameError::MalformedRequestLine)
        );
        assert_eq!(
            parse_request(b"GARBAGE\r\n\r\n"),
            Err(FrameError::MalformedRequestLine)
        );
    }

    #[test]
    fn response_envelope_round_trips_payload() {
        let payload = serde_json::json!({
            "created": ["Rock", "Rock_2"],
            "count": 2,
            "nested": { "ok": true, "ratio": 0.5 },
        });
        let encoded = encode_ok(&payload);
        let text = String::from_utf8(encoded).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.contains("Access-Control-Allow-Origin: *\r\n"));
        assert!(text.contains("Connection: close\r\n"));

        let (headers, body) = text.split_once("\r\n\r\n").unwrap();
        let length: usize = headers
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(length, body.len());

        let parsed: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn bad_request_envelope_carries_error_body() {
        let text = String::from_utf8(encode_bad_request()).unwrap();
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(text.contains("\"error\""));
    }
}
