use std::fmt;

use crate::error::BusError;

/// STOMP commands this client sends or understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Message,
    Error,
    Disconnect,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Message => "MESSAGE",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    fn parse(s: &str) -> Result<Self, BusError> {
        match s {
            "CONNECT" | "STOMP" => Ok(Command::Connect),
            "CONNECTED" => Ok(Command::Connected),
            "SUBSCRIBE" => Ok(Command::Subscribe),
            "UNSUBSCRIBE" => Ok(Command::Unsubscribe),
            "MESSAGE" => Ok(Command::Message),
            "ERROR" => Ok(Command::Error),
            "DISCONNECT" => Ok(Command::Disconnect),
            other => Err(BusError::InvalidFrame(format!("unknown command {other:?}"))),
        }
    }

    /// CONNECT and CONNECTED headers are never escaped (STOMP 1.2).
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One STOMP 1.2 frame as carried in a WebSocket text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name`; repeated headers keep the first occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn connect(host: &str) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", "1.2,1.1")
            .header("host", host)
            .header("heart-beat", "0,0")
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    pub fn message(subscription: &str, destination: &str, message_id: &str, body: &str) -> Self {
        Frame::new(Command::Message)
            .header("subscription", subscription)
            .header("destination", destination)
            .header("message-id", message_id)
            .header("content-type", "application/json")
            .with_body(body)
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (k, v) in &self.headers {
            if escape {
                out.push_str(&escape_header(k));
                out.push(':');
                out.push_str(&escape_header(v));
            } else {
                out.push_str(k);
                out.push(':');
                out.push_str(v);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse one frame; `Ok(None)` for a heart-beat (bare end-of-line).
    pub fn parse(text: &str) -> Result<Option<Self>, BusError> {
        let text = text.trim_start_matches(['\r', '\n']);
        if text.is_empty() {
            return Ok(None);
        }

        let (head, body) = match text.find("\n\n") {
            Some(i) => (&text[..i], &text[i + 2..]),
            None => match text.find("\r\n\r\n") {
                Some(i) => (&text[..i], &text[i + 4..]),
                None => {
                    return Err(BusError::InvalidFrame("missing header terminator".into()));
                }
            },
        };
        let body = match body.find('\0') {
            Some(i) => &body[..i],
            None => body,
        };

        let mut lines = head.lines();
        let command = Command::parse(lines.next().unwrap_or_default().trim_end_matches('\r'))?;
        let escape = command.escapes_headers();

        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            let (k, v) = line
                .split_once(':')
                .ok_or_else(|| BusError::InvalidFrame(format!("malformed header {line:?}")))?;
            if escape {
                headers.push((unescape_header(k)?, unescape_header(v)?));
            } else {
                headers.push((k.to_string(), v.to_string()));
            }
        }

        Ok(Some(Self {
            command,
            headers,
            body: body.to_string(),
        }))
    }
}

fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(s: &str) -> Result<String, BusError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(BusError::InvalidFrame(format!(
                    "undefined escape sequence \\{}",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_wire_format() {
        let wire = Frame::subscribe("sub-1", "/topic/execution/42").encode();
        assert_eq!(
            wire,
            "SUBSCRIBE\nid:sub-1\ndestination:/topic/execution/42\nack:auto\n\n\0"
        );
    }

    #[test]
    fn parses_spring_message_frame() {
        let wire = "MESSAGE\ndestination:/topic/execution/42\ncontent-type:application/json\nsubscription:sub-0\nmessage-id:abc-1\ncontent-length:49\n\n{\"type\":\"STDOUT\",\"content\":\"hi\",\"timestamp\":1}\0";
        let frame = Frame::parse(wire).unwrap().unwrap();

        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("subscription"), Some("sub-0"));
        assert_eq!(frame.body, r#"{"type":"STDOUT","content":"hi","timestamp":1}"#);
    }

    #[test]
    fn heartbeat_is_not_a_frame() {
        assert!(Frame::parse("\n").unwrap().is_none());
        assert!(Frame::parse("\r\n").unwrap().is_none());
    }

    #[test]
    fn header_escaping_applies_outside_connect() {
        let frame = Frame::new(Command::Error).header("message", "bad:thing\nhappened");
        let wire = frame.encode();
        assert!(wire.contains("message:bad\\cthing\\nhappened"));

        let back = Frame::parse(&wire).unwrap().unwrap();
        assert_eq!(back.get("message"), Some("bad:thing\nhappened"));

        let connect = Frame::connect("localhost:8080").encode();
        assert!(connect.contains("host:localhost:8080"));
    }

    #[test]
    fn connected_headers_keep_colons() {
        let frame = Frame::parse("CONNECTED\nversion:1.2\nserver:broker:1\n\n\0")
            .unwrap()
            .unwrap();
        assert_eq!(frame.get("server"), Some("broker:1"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Frame::parse("HELLO\n\n\0").is_err());
        assert!(Frame::parse("MESSAGE\nno-terminator").is_err());
        assert!(Frame::parse("MESSAGE\nbad\\xescape:1\n\n\0").is_err());
    }
}
