//! AMI data types

/// Lifecycle of one manager session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Authenticated,
    Closed,
}

/// One reply block from the manager interface.
///
/// Headers keep their wire order and may repeat. Lines that do not look
/// like `Key: Value` (the output of `Response: Follows` style replies)
/// are collected into the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolResponse {
    headers: Vec<(String, String)>,
    body: String,
    raw: String,
}

impl ProtocolResponse {
    /// Parse a block of CRLF lines up to (not including) the blank line
    pub fn parse(block: &str) -> Self {
        let mut headers = Vec::new();
        let mut body_lines: Vec<&str> = Vec::new();

        for line in block.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            match line.split_once(':') {
                Some((key, value)) if is_header_key(key) => {
                    headers.push((key.to_string(), value.trim().to_string()));
                }
                _ => body_lines.push(line),
            }
        }

        Self {
            headers,
            body: body_lines.join("\n"),
            raw: block.to_string(),
        }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value for `key`; keys compare case-insensitively
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in wire order
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// The block exactly as received
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Value of the `Response` header
    pub fn status(&self) -> Option<&str> {
        self.get("Response")
    }

    /// `Response: Success`, matched as a whole token
    pub fn is_success(&self) -> bool {
        self.status()
            .map(|s| s.eq_ignore_ascii_case("Success"))
            .unwrap_or(false)
    }

    pub fn message(&self) -> Option<&str> {
        self.get("Message")
    }

    pub fn event(&self) -> Option<&str> {
        self.get("Event")
    }

    /// Unsolicited event rather than an action reply
    pub fn is_event(&self) -> bool {
        self.event().is_some() && self.status().is_none()
    }

    /// The `Val` attribute carried by DBGet replies
    pub fn value(&self) -> Option<&str> {
        self.get("Val")
    }
}

fn is_header_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success_reply() {
        let resp = ProtocolResponse::parse("Response: Success\r\nMessage: Authentication accepted\r\n");
        assert!(resp.is_success());
        assert_eq!(resp.message(), Some("Authentication accepted"));
        assert_eq!(resp.headers().len(), 2);
        assert!(resp.body().is_empty());
    }

    #[test]
    fn test_success_is_token_not_substring() {
        // "Success" only appears inside payload text
        let resp = ProtocolResponse::parse(
            "Response: Error\r\nMessage: Success is not guaranteed\r\n",
        );
        assert!(!resp.is_success());

        let resp = ProtocolResponse::parse("Response: SuccessfulNot\r\n");
        assert!(!resp.is_success());
    }

    #[test]
    fn test_repeated_keys_keep_order() {
        let resp = ProtocolResponse::parse(
            "Response: Success\r\nVariable: a=1\r\nVariable: b=2\r\n",
        );
        let vars: Vec<&str> = resp.get_all("Variable").collect();
        assert_eq!(vars, vec!["a=1", "b=2"]);
        assert_eq!(resp.get("variable"), Some("a=1"));
    }

    #[test]
    fn test_value_extraction_and_empty_value() {
        let resp = ProtocolResponse::parse("Event: DBGetResponse\r\nFamily: DEVICE\r\nVal: pjsip\r\n");
        assert_eq!(resp.value(), Some("pjsip"));
        assert!(resp.is_event());

        let resp = ProtocolResponse::parse("Response: Success\r\nVal:\r\n");
        assert_eq!(resp.value(), Some(""));
    }

    #[test]
    fn test_body_lines_collected() {
        let resp = ProtocolResponse::parse(
            "Response: Follows\r\nPrivilege: Command\r\nName/username   Host\r\n--END COMMAND--\r\n",
        );
        assert_eq!(resp.status(), Some("Follows"));
        assert_eq!(resp.body(), "Name/username   Host\n--END COMMAND--");
    }

    #[test]
    fn test_parse_stops_at_blank_line() {
        let resp = ProtocolResponse::parse("Response: Success\r\n\r\nResponse: Error\r\n");
        assert!(resp.is_success());
        assert_eq!(resp.headers().len(), 1);
    }
}
