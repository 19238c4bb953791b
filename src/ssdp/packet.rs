//! SSDP datagram parsing and reply construction.

use std::fmt::Write as _;
use std::net::SocketAddr;

use crate::bridge::BridgeIdentity;
use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// Search target that gets a root-device USN in the reply.
pub const ROOT_DEVICE: &str = "upnp:rootdevice";

const BASIC_DEVICE: &str = "urn:schemas-upnp-org:device:basic:1";
const SERVER: &str = "FreeRTOS/6.0.5, UPnP/1.0, IpBridge/1.16.0";

/// Case-insensitive, multi-valued header collection.
///
/// Values are kept in arrival order, so repeated headers such as `ST` can be
/// read back in the order the sender wrote them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: &str, value: &str) {
        self.fields.push((name.to_string(), value.to_string()));
    }

    /// First value for `name`, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All values for `name`, ignoring case, in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A parsed discovery datagram.
#[derive(Debug, Clone)]
pub struct DiscoveryProbe {
    sender: SocketAddr,
    data: Vec<u8>,
    method: String,
    request_uri: String,
    protocol: String,
    headers: Headers,
}

impl DiscoveryProbe {
    /// Parse a raw datagram received from `sender`.
    ///
    /// The first line must be `METHOD SP REQUEST-URI SP PROTOCOL`. Header
    /// lines follow until a blank line or the end of the buffer; a line
    /// starting with whitespace continues the previous header's value.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_bridge_emulator::ssdp::DiscoveryProbe;
    ///
    /// let raw = b"M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nST: upnp:rootdevice\r\n\r\n";
    /// let probe = DiscoveryProbe::parse(raw, "10.0.0.45:50000".parse().unwrap()).unwrap();
    /// assert_eq!(probe.method(), "M-SEARCH");
    /// assert_eq!(probe.headers().get("st"), Some("upnp:rootdevice"));
    /// ```
    pub fn parse(data: &[u8], sender: SocketAddr) -> Result<Self> {
        let text = std::str::from_utf8(data).map_err(Error::Utf8Decode)?;
        let mut lines = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

        let request_line = lines.next().unwrap_or_default();
        let mut parts = request_line.splitn(3, ' ');
        let (Some(method), Some(request_uri), Some(protocol)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::parse(request_line));
        };

        let mut headers = Headers::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            if line.starts_with([' ', '\t']) {
                let Some((_, value)) = headers.fields.last_mut() else {
                    return Err(Error::parse(line));
                };
                let more = line.trim();
                if !more.is_empty() {
                    value.push(' ');
                    value.push_str(more);
                }
                continue;
            }
            let Some((name, value)) = line.split_once(':') else {
                return Err(Error::parse(line));
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::parse(line));
            }
            headers.append(name, value.trim());
        }

        Ok(DiscoveryProbe {
            sender,
            data: data.to_vec(),
            method: method.to_string(),
            request_uri: request_uri.to_string(),
            protocol: protocol.to_string(),
            headers,
        })
    }

    pub fn sender(&self) -> SocketAddr {
        self.sender
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn request_uri(&self) -> &str {
        &self.request_uri
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The `ST` header, or an empty string when the probe has none.
    pub fn search_target(&self) -> &str {
        self.headers.get("ST").unwrap_or_default()
    }
}

/// Build the unicast reply a bridge sends for `probe`.
///
/// Header names, order and values are fixed; controllers match on them.
pub fn build_reply(bridge: &BridgeIdentity, probe: &DiscoveryProbe) -> Vec<u8> {
    let search_target = probe.search_target();
    let usn = if search_target == ROOT_DEVICE {
        format!("uuid:{}::{ROOT_DEVICE}", bridge.uuid())
    } else {
        BASIC_DEVICE.to_string()
    };

    let mut reply = String::with_capacity(256);
    // Writing to a String cannot fail
    let _ = write!(
        reply,
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age=60\r\n\
         EXT:\r\n\
         LOCATION: {}\r\n\
         SERVER: {SERVER}\r\n\
         hue-bridgeid: {}\r\n\
         ST: {search_target}\r\n\
         USN: {usn}\r\n\
         \r\n",
        bridge.location(),
        bridge.serial_number(),
    );
    reply.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sender() -> SocketAddr {
        "10.0.0.45:50000".parse().unwrap()
    }

    fn bridge() -> BridgeIdentity {
        BridgeIdentity::for_address(
            "001788FFFE23BFC1",
            Uuid::parse_str("2f402f80-da50-11e1-9b23-001788255acc").unwrap(),
            "10.0.0.2:80",
        )
    }

    fn probe(st: &str) -> DiscoveryProbe {
        let raw = format!(
            "M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nMAN: \"ssdp:discover\"\r\nMX: 2\r\nST: {st}\r\n\r\n"
        );
        DiscoveryProbe::parse(raw.as_bytes(), sender()).unwrap()
    }

    #[test]
    fn test_parse_request_line() {
        let p = probe("ssdp:all");
        assert_eq!(p.method(), "M-SEARCH");
        assert_eq!(p.request_uri(), "*");
        assert_eq!(p.protocol(), "HTTP/1.1");
        assert_eq!(p.sender(), sender());
        assert_eq!(p.headers().len(), 4);
        assert_eq!(p.headers().get("man"), Some("\"ssdp:discover\""));
    }

    #[test]
    fn test_parse_rejects_short_request_line() {
        let err = DiscoveryProbe::parse(b"M-SEARCH *\r\n\r\n", sender()).unwrap_err();
        assert_eq!(err, Error::parse("M-SEARCH *"));
        assert!(err.is_parse());
    }

    #[test]
    fn test_parse_rejects_header_without_colon() {
        let err =
            DiscoveryProbe::parse(b"NOTIFY * HTTP/1.1\r\nnonsense\r\n\r\n", sender()).unwrap_err();
        assert_eq!(err, Error::parse("nonsense"));
    }

    #[test]
    fn test_parse_rejects_invalid_utf8() {
        let err = DiscoveryProbe::parse(&[0xff, 0xfe, b' ', b'*'], sender()).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_headers_are_multi_valued_and_case_insensitive() {
        let raw = b"M-SEARCH * HTTP/1.1\nst: first\nSt: second\nST: third\n";
        let p = DiscoveryProbe::parse(raw, sender()).unwrap();
        let all: Vec<_> = p.headers().get_all("ST").collect();
        assert_eq!(all, ["first", "second", "third"]);
        assert_eq!(p.search_target(), "first");
    }

    #[test]
    fn test_headers_end_at_blank_line() {
        let raw = b"M-SEARCH * HTTP/1.1\r\nST: a\r\n\r\nnot a header\r\n";
        let p = DiscoveryProbe::parse(raw, sender()).unwrap();
        assert_eq!(p.headers().len(), 1);
    }

    #[test]
    fn test_continuation_line() {
        let raw = b"M-SEARCH * HTTP/1.1\r\nUSER-AGENT: foo\r\n  bar\r\n\r\n";
        let p = DiscoveryProbe::parse(raw, sender()).unwrap();
        assert_eq!(p.headers().get("user-agent"), Some("foo bar"));
    }

    #[test]
    fn test_blank_continuation_keeps_target() {
        let raw = b"M-SEARCH * HTTP/1.1\r\nST: upnp:rootdevice\r\n \r\n\t\r\n\r\n";
        let p = DiscoveryProbe::parse(raw, sender()).unwrap();
        assert_eq!(p.search_target(), ROOT_DEVICE);

        let reply = String::from_utf8(build_reply(&bridge(), &p)).unwrap();
        assert!(reply.contains(
            "USN: uuid:2f402f80-da50-11e1-9b23-001788255acc::upnp:rootdevice\r\n"
        ));
    }

    #[test]
    fn test_get_outlives_name() {
        let p = probe("ssdp:all");
        let value = {
            let name = String::from("st");
            p.headers().get(&name)
        };
        assert_eq!(value, Some("ssdp:all"));
    }

    #[test]
    fn test_reply_for_root_device() {
        let reply = build_reply(&bridge(), &probe(ROOT_DEVICE));
        let expected = "HTTP/1.1 200 OK\r\n\
            CACHE-CONTROL: max-age=60\r\n\
            EXT:\r\n\
            LOCATION: http://10.0.0.2:80/bridge/001788FFFE23BFC1/device.xml\r\n\
            SERVER: FreeRTOS/6.0.5, UPnP/1.0, IpBridge/1.16.0\r\n\
            hue-bridgeid: 001788FFFE23BFC1\r\n\
            ST: upnp:rootdevice\r\n\
            USN: uuid:2f402f80-da50-11e1-9b23-001788255acc::upnp:rootdevice\r\n\
            \r\n";
        assert_eq!(String::from_utf8(reply).unwrap(), expected);
    }

    #[test]
    fn test_reply_for_other_target() {
        let reply = build_reply(&bridge(), &probe("ssdp:all"));
        let parsed = DiscoveryProbe::parse(&reply, sender()).unwrap();
        assert_eq!(parsed.headers().get("USN"), Some(BASIC_DEVICE));
        assert_eq!(parsed.headers().get("ST"), Some("ssdp:all"));
    }

    #[test]
    fn test_reply_parses_back() {
        let reply = build_reply(&bridge(), &probe(ROOT_DEVICE));
        let parsed = DiscoveryProbe::parse(&reply, sender()).unwrap();

        assert_eq!(parsed.method(), "HTTP/1.1");
        assert_eq!(parsed.request_uri(), "200");
        assert_eq!(parsed.protocol(), "OK");

        let names: Vec<_> = parsed.headers().iter().map(|(k, _)| k).collect();
        assert_eq!(
            names,
            ["CACHE-CONTROL", "EXT", "LOCATION", "SERVER", "hue-bridgeid", "ST", "USN"]
        );
        assert_eq!(parsed.headers().get("EXT"), Some(""));
        assert_eq!(parsed.headers().get("SERVER"), Some(SERVER));
        assert_eq!(
            parsed.headers().get("LOCATION"),
            Some("http://10.0.0.2:80/bridge/001788FFFE23BFC1/device.xml")
        );
    }

    #[test]
    fn test_reply_without_search_target() {
        let p = DiscoveryProbe::parse(b"M-SEARCH * HTTP/1.1\r\n\r\n", sender()).unwrap();
        let reply = String::from_utf8(build_reply(&bridge(), &p)).unwrap();
        assert!(reply.contains("\r\nST: \r\n"));
        assert!(reply.contains("\r\nUSN: urn:schemas-upnp-org:device:basic:1\r\n"));
    }
}
