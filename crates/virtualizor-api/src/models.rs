//! Virtualizor domain models and vendor payload parsing.
//!
//! The panel answers with loosely typed JSON: numbers arrive as strings, empty
//! collections arrive as `[]` instead of `{}`, and records are keyed by id. The
//! `from_api_response` constructors map single records; [`parse_vm_list`] and
//! [`parse_rule_list`] apply them to a whole payload and drop the entries that fail.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::ops::RangeInclusive;
use std::str::FromStr;
use tracing::warn;
use virtualizor_core::Error;

use crate::Result;

/// Response key holding the VM mapping.
pub const VM_LIST_KEY: &str = "vs";
/// Response key holding the forwarding rule mapping.
pub const RULE_LIST_KEY: &str = "haproxydata";
/// Response key signalling a failed call.
pub const ERROR_KEY: &str = "error";

/// Forwarding protocol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// Raw TCP passthrough.
    Tcp,
    /// HTTP, routed by host name.
    Http,
    /// HTTPS, routed by SNI.
    Https,
}

impl Protocol {
    /// Returns the protocol as sent to the panel.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
        }
    }

    /// True for the host-routed protocols that share the HTTP listener ports.
    #[must_use]
    pub const fn is_http(&self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TCP" => Ok(Self::Tcp),
            "HTTP" => Ok(Self::Http),
            "HTTPS" => Ok(Self::Https),
            other => Err(Error::Parse(format!("unknown protocol `{other}`"))),
        }
    }
}

/// Value of the `vdf_action` form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VdfAction {
    /// Create a rule.
    Add,
    /// Modify an existing rule.
    Edit,
    /// Remove one or more rules.
    Delete,
}

impl VdfAction {
    /// Returns the action marker understood by `managevdf`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "addvdf",
            Self::Edit => "editvdf",
            Self::Delete => "delvdf",
        }
    }
}

/// Power state reported for a VM.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VmStatus {
    /// Powered on.
    Running,
    /// Powered off.
    Stopped,
    /// Suspended by the panel administrator.
    Suspended,
    /// Anything the panel did not report clearly.
    #[default]
    Unknown,
}

/// A virtual server as listed by `listvs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VmInfo {
    /// Vendor identifier (vpsid).
    pub vpsid: String,
    /// Internal VPS name (e.g. `v1001`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vps_name: Option<String>,
    /// Configured hostname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Power state.
    #[serde(default)]
    pub status: VmStatus,
    /// First IPv4 address assigned to the VM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,
    /// First IPv6 address assigned to the VM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
    /// Operating system template name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
}

impl VmInfo {
    /// Build a VM from one entry of the `vs` mapping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the entry is not an object or the id is empty.
    pub fn from_api_response(vpsid: &str, data: &Value) -> Result<Self> {
        let obj = as_object(data, "VM")?;
        let vpsid = vpsid.trim();
        if vpsid.is_empty() {
            return Err(Error::Parse("VM entry has an empty vpsid".to_string()));
        }

        let ips = collect_ips(obj.get("ips"));
        let ipv4 = ips.iter().find(|ip| ip.parse::<Ipv4Addr>().is_ok()).cloned();
        let ipv6 = ips
            .iter()
            .find(|ip| ip.parse::<Ipv6Addr>().is_ok())
            .cloned()
            .or_else(|| text_field(obj, "ipv6"));

        Ok(Self {
            vpsid: vpsid.to_string(),
            vps_name: text_field(obj, "vps_name"),
            hostname: text_field(obj, "hostname"),
            status: vm_status(obj),
            ipv4,
            ipv6,
            os_name: text_field(obj, "os_name"),
        })
    }
}

fn vm_status(obj: &Map<String, Value>) -> VmStatus {
    if text_field(obj, "suspended").as_deref() == Some("1") {
        return VmStatus::Suspended;
    }
    match text_field(obj, "status").as_deref() {
        Some("1") => VmStatus::Running,
        Some("0") => VmStatus::Stopped,
        _ => VmStatus::Unknown,
    }
}

fn collect_ips(value: Option<&Value>) -> Vec<String> {
    let values: Vec<&Value> = match value {
        Some(Value::Object(map)) => map.values().collect(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::String(single)) => return vec![single.trim().to_string()],
        _ => return Vec::new(),
    };
    values
        .into_iter()
        .filter_map(Value::as_str)
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .collect()
}

/// A port forwarding rule (VDF) on the panel's HAProxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForwardingRule {
    /// Rule identifier (vdfid); absent for rules not yet created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Protocol.
    pub protocol: Protocol,
    /// Public host name the rule listens on.
    pub src_hostname: String,
    /// Public port.
    pub src_port: u16,
    /// Internal destination address.
    pub dest_ip: String,
    /// Internal destination port.
    pub dest_port: u16,
}

impl ForwardingRule {
    /// Create a rule that does not exist on the panel yet.
    #[must_use]
    pub fn new(
        protocol: Protocol,
        src_hostname: impl Into<String>,
        src_port: u16,
        dest_ip: impl Into<String>,
        dest_port: u16,
    ) -> Self {
        Self {
            id: None,
            protocol,
            src_hostname: src_hostname.into(),
            src_port,
            dest_ip: dest_ip.into(),
            dest_port,
        }
    }

    /// Attach a rule identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Build a rule from one entry of the `haproxydata` mapping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if a required field is missing or malformed.
    pub fn from_api_response(data: &Value) -> Result<Self> {
        let obj = as_object(data, "forwarding rule")?;

        let protocol = required_text(obj, "protocol")?.parse::<Protocol>()?;
        Ok(Self {
            id: text_field(obj, "id"),
            protocol,
            src_hostname: required_text(obj, "src_hostname")?,
            src_port: port_field(obj, "src_port")?,
            dest_ip: required_text(obj, "dest_ip")?,
            dest_port: port_field(obj, "dest_port")?,
        })
    }

    /// Rule fields as sent in an add/edit form body, ports stringified.
    #[must_use]
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("protocol", self.protocol.as_str().to_string()),
            ("src_hostname", self.src_hostname.clone()),
            ("src_port", self.src_port.to_string()),
            ("dest_ip", self.dest_ip.clone()),
            ("dest_port", self.dest_port.to_string()),
        ]
    }
}

/// A list of inclusive port ranges such as `80,443,1000-2000`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortRanges {
    ranges: Vec<RangeInclusive<u16>>,
}

impl PortRanges {
    /// Parse a comma separated list, skipping tokens that are not ports or ranges.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        let ranges = spec
            .split([',', ' ', ';'])
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .filter_map(|token| {
                let parsed = match token.split_once('-') {
                    Some((start, end)) => start
                        .trim()
                        .parse::<u16>()
                        .ok()
                        .zip(end.trim().parse::<u16>().ok())
                        .filter(|(start, end)| start <= end)
                        .map(|(start, end)| start..=end),
                    None => token.parse::<u16>().ok().map(|port| port..=port),
                };
                if parsed.is_none() {
                    warn!(token, "ignoring malformed port range");
                }
                parsed
            })
            .collect();
        Self { ranges }
    }

    /// Returns true if `port` falls inside any range.
    #[must_use]
    pub fn contains(&self, port: u16) -> bool {
        self.ranges.iter().any(|range| range.contains(&port))
    }

    /// Returns true if no ranges were configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The parsed ranges.
    #[must_use]
    pub fn ranges(&self) -> &[RangeInclusive<u16>] {
        &self.ranges
    }
}

/// HAProxy settings read from the "add rule" form of `managevdf`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HaproxyConfig {
    /// Public source addresses the proxy binds to.
    pub src_ips: Vec<String>,
    /// Ports TCP rules may listen on; empty means unrestricted.
    pub allowed_ports: PortRanges,
    /// Ports no rule may use.
    pub reserved_ports: PortRanges,
    /// Ports held by the HTTP/HTTPS listeners; only host-routed rules may share them.
    pub reserved_http_ports: PortRanges,
    /// Rules already configured for the VM.
    pub existing: Vec<ForwardingRule>,
}

impl HaproxyConfig {
    /// Build the config from a full `managevdf` form response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the response is not a JSON object.
    pub fn from_api_response(response: &Value) -> Result<Self> {
        let obj = as_object(response, "HAProxy config")?;

        let settings = match obj.get("server_haconfigs") {
            Some(Value::Object(map)) if map.values().all(Value::is_object) => {
                map.values().next().and_then(Value::as_object)
            }
            Some(Value::Object(map)) => Some(map),
            Some(Value::Array(items)) => items.first().and_then(Value::as_object),
            _ => None,
        };

        let text = |key: &str| settings.and_then(|s| text_field(s, key)).unwrap_or_default();

        Ok(Self {
            src_ips: text("haproxy_src_ips")
                .split(',')
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string)
                .collect(),
            allowed_ports: PortRanges::parse(&text("haproxy_allowedports")),
            reserved_ports: PortRanges::parse(&text("haproxy_reservedports")),
            reserved_http_ports: PortRanges::parse(&text("haproxy_reservedports_http")),
            existing: parse_rule_list(response),
        })
    }

    /// Returns true if TCP rules may listen on `port`.
    #[must_use]
    pub fn is_port_allowed(&self, port: u16) -> bool {
        self.allowed_ports.is_empty() || self.allowed_ports.contains(port)
    }

    /// Returns true if `port` is reserved for a rule using `protocol`.
    #[must_use]
    pub fn is_port_reserved(&self, protocol: Protocol, port: u16) -> bool {
        self.reserved_ports.contains(port)
            || (!protocol.is_http() && self.reserved_http_ports.contains(port))
    }

    /// Find an existing rule that would clash with `rule`.
    ///
    /// TCP rules own their port outright; HTTP/HTTPS rules only clash on the same host
    /// name or with a TCP rule on the same port. A rule never clashes with itself.
    #[must_use]
    pub fn conflicting_rule(&self, rule: &ForwardingRule) -> Option<&ForwardingRule> {
        self.existing.iter().find(|existing| {
            if existing.src_port != rule.src_port {
                return false;
            }
            if rule.id.is_some() && existing.id == rule.id {
                return false;
            }
            if !rule.protocol.is_http() || !existing.protocol.is_http() {
                return true;
            }
            existing.src_hostname.eq_ignore_ascii_case(&rule.src_hostname)
        })
    }

    /// Returns true if `port` is already bound by a rule for `protocol`.
    #[must_use]
    pub fn is_port_in_use(&self, protocol: Protocol, port: u16) -> bool {
        self.existing
            .iter()
            .any(|r| r.src_port == port && (!protocol.is_http() || !r.protocol.is_http()))
    }

    /// Check a rule against the panel's port policy before submitting it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] naming the offending port.
    pub fn validate_rule(&self, rule: &ForwardingRule) -> Result<()> {
        let port = rule.src_port;
        if port == 0 || rule.dest_port == 0 {
            return Err(Error::Parse("port 0 is not a valid port".to_string()));
        }
        if self.is_port_reserved(rule.protocol, port) {
            return Err(Error::Parse(format!(
                "source port {port} is reserved for {}",
                rule.protocol
            )));
        }
        if !rule.protocol.is_http() && !self.is_port_allowed(port) {
            return Err(Error::Parse(format!(
                "source port {port} is outside the allowed ranges"
            )));
        }
        if let Some(existing) = self.conflicting_rule(rule) {
            return Err(Error::Parse(format!(
                "source port {port} is already used by {} rule {}",
                existing.protocol,
                existing.id.as_deref().unwrap_or("?")
            )));
        }
        Ok(())
    }
}

/// Outcome of a write call (`addvdf`, `editvdf`, `delvdf`).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// True when the panel reported no error.
    pub success: bool,
    /// Success message, when the panel sent one.
    pub message: Option<String>,
    /// Flattened error text.
    pub error: Option<String>,
    /// The untouched payload.
    pub raw: Value,
}

impl ApiResponse {
    /// Interpret a raw panel payload.
    #[must_use]
    pub fn from_response(raw: Value) -> Self {
        let error = raw.get(ERROR_KEY).and_then(flatten_messages);
        let message = raw
            .get("done")
            .and_then(flatten_messages)
            .filter(|done| done != "true" && done != "1")
            .or_else(|| raw.get("done_msg").and_then(flatten_messages));

        Self {
            success: error.is_none(),
            message,
            error,
            raw,
        }
    }
}

/// Parse every VM under `vs`, skipping entries that fail to parse.
#[must_use]
pub fn parse_vm_list(response: &Value) -> Vec<VmInfo> {
    entries(response.get(VM_LIST_KEY))
        .filter_map(|(key, data)| {
            let vpsid = key.or_else(|| data.get("vpsid").and_then(scalar_text));
            let parsed = match vpsid.as_deref() {
                Some(vpsid) => VmInfo::from_api_response(vpsid, data),
                None => Err(Error::Parse("VM entry without vpsid".to_string())),
            };
            parsed
                .map_err(|err| {
                    warn!(
                        vpsid = vpsid.as_deref().unwrap_or("?"),
                        error = %err,
                        "skipping malformed VM entry"
                    );
                })
                .ok()
        })
        .collect()
}

/// Parse every rule under `haproxydata`, skipping entries that fail to parse.
#[must_use]
pub fn parse_rule_list(response: &Value) -> Vec<ForwardingRule> {
    entries(response.get(RULE_LIST_KEY))
        .filter_map(|(key, data)| match ForwardingRule::from_api_response(data) {
            Ok(mut rule) => {
                if rule.id.is_none() {
                    rule.id = key;
                }
                Some(rule)
            }
            Err(err) => {
                warn!(
                    key = key.as_deref().unwrap_or("?"),
                    error = %err,
                    "skipping malformed forwarding rule"
                );
                None
            }
        })
        .collect()
}

// Object entries carry their key; PHP serialises empty or list-shaped maps as arrays.
fn entries(value: Option<&Value>) -> Box<dyn Iterator<Item = (Option<String>, &Value)> + '_> {
    match value {
        Some(Value::Object(map)) => Box::new(map.iter().map(|(k, v)| (Some(k.clone()), v))),
        Some(Value::Array(items)) => Box::new(items.iter().map(|v| (None, v))),
        _ => Box::new(std::iter::empty()),
    }
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| Error::Parse(format!("{what} entry is not an object")))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(scalar_text)
        .filter(|text| !text.is_empty())
}

fn required_text(obj: &Map<String, Value>, key: &str) -> Result<String> {
    text_field(obj, key).ok_or_else(|| Error::Parse(format!("missing field `{key}`")))
}

fn port_field(obj: &Map<String, Value>, key: &str) -> Result<u16> {
    let raw = required_text(obj, key)?;
    raw.parse::<u16>()
        .map_err(|_| Error::Parse(format!("field `{key}` is not a port: `{raw}`")))
}

fn flatten_messages(value: &Value) -> Option<String> {
    let parts: Vec<String> = match value {
        Value::Null | Value::Bool(false) => return None,
        Value::Array(items) => items.iter().filter_map(flatten_messages).collect(),
        Value::Object(map) => map.values().filter_map(flatten_messages).collect(),
        other => scalar_text(other).into_iter().collect(),
    };
    let joined = parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("; ");
    (!joined.is_empty()).then_some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    #[test]
    fn protocol_parse_is_case_insensitive() {
        assert_eq!("tcp".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!(" Https ".parse::<Protocol>().unwrap(), Protocol::Https);
        assert!("udp".parse::<Protocol>().is_err());
        assert_eq!(Protocol::Http.to_string(), "HTTP");
    }

    #[test]
    fn vm_from_api_response_picks_addresses() {
        let vm = VmInfo::from_api_response(
            "101",
            &json!({
                "vpsid": "101",
                "vps_name": "v1001",
                "hostname": "web01",
                "status": 1,
                "ips": {"7": "2001:db8::10", "8": "10.0.0.5"},
                "os_name": "ubuntu-22.04"
            }),
        )
        .unwrap();

        assert_eq!(vm.vpsid, "101");
        assert_eq!(vm.ipv4.as_deref(), Some("10.0.0.5"));
        assert_eq!(vm.ipv6.as_deref(), Some("2001:db8::10"));
        assert_eq!(vm.status, VmStatus::Running);
    }

    #[test]
    fn vm_status_variants() {
        let stopped = VmInfo::from_api_response("1", &json!({"status": "0"})).unwrap();
        assert_eq!(stopped.status, VmStatus::Stopped);
        let suspended =
            VmInfo::from_api_response("1", &json!({"status": "1", "suspended": "1"})).unwrap();
        assert_eq!(suspended.status, VmStatus::Suspended);
        let unknown = VmInfo::from_api_response("1", &json!({})).unwrap();
        assert_eq!(unknown.status, VmStatus::Unknown);
        assert!(unknown.ipv4.is_none());
    }

    #[test]
    fn vm_rejects_non_object() {
        assert!(VmInfo::from_api_response("1", &json!("broken")).is_err());
        assert!(VmInfo::from_api_response(" ", &json!({})).is_err());
    }

    #[test]
    fn rule_from_api_response_accepts_string_ports() {
        let rule = ForwardingRule::from_api_response(&json!({
            "id": "12",
            "protocol": "tcp",
            "src_hostname": "203.0.113.10",
            "src_port": "2222",
            "dest_ip": "10.0.0.5",
            "dest_port": 22
        }))
        .unwrap();

        assert_eq!(rule.id.as_deref(), Some("12"));
        assert_eq!(rule.protocol, Protocol::Tcp);
        assert_eq!(rule.src_port, 2222);
        assert_eq!(rule.dest_port, 22);
    }

    #[test]
    fn rule_from_api_response_rejects_bad_fields() {
        let missing = json!({"protocol": "TCP", "src_port": "1"});
        assert!(matches!(
            ForwardingRule::from_api_response(&missing),
            Err(Error::Parse(_))
        ));

        let bad_port = json!({
            "protocol": "TCP", "src_hostname": "h", "src_port": "70000",
            "dest_ip": "10.0.0.1", "dest_port": "22"
        });
        assert!(ForwardingRule::from_api_response(&bad_port).is_err());
    }

    #[test]
    fn rule_form_fields_match_vendor_values() {
        let vendor = json!({
            "id": "3",
            "protocol": "HTTPS",
            "src_hostname": "app.example.com",
            "src_port": "443",
            "dest_ip": "10.0.0.9",
            "dest_port": "8443"
        });
        let rule = ForwardingRule::from_api_response(&vendor).unwrap();

        for (key, value) in rule.form_fields() {
            assert_eq!(vendor[key].as_str(), Some(value.as_str()), "field {key}");
        }
    }

    #[test]
    fn parse_vm_list_skips_malformed_entries() {
        let response = json!({
            "vs": {
                "1": {"hostname": "a", "ips": ["10.0.0.1"]},
                "2": "garbage",
                "3": {"hostname": "c"}
            }
        });
        let vms = parse_vm_list(&response);
        assert_eq!(vms.len(), 2);
        assert_eq!(vms[0].ipv4.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn parse_lists_treat_missing_and_empty_as_empty() {
        assert!(parse_vm_list(&json!({})).is_empty());
        assert!(parse_vm_list(&json!({"vs": {}})).is_empty());
        assert!(parse_vm_list(&json!({"vs": []})).is_empty());
        assert!(parse_vm_list(&json!({"vs": null})).is_empty());
        assert!(parse_rule_list(&json!({"haproxydata": false})).is_empty());
    }

    #[test]
    fn parse_rule_list_uses_key_as_fallback_id() {
        let response = json!({
            "haproxydata": {
                "17": {
                    "protocol": "TCP", "src_hostname": "h", "src_port": "2200",
                    "dest_ip": "10.0.0.2", "dest_port": "22"
                }
            }
        });
        let rules = parse_rule_list(&response);
        assert_eq!(rules[0].id.as_deref(), Some("17"));
    }

    #[test]
    fn parse_lists_keep_panel_order() {
        let response: Value = serde_json::from_str(
            r#"{
                "vs": {
                    "9": {"ips": {"9": "10.0.0.9", "10": "10.0.0.10"}},
                    "10": {"ips": {}}
                },
                "haproxydata": {
                    "9": {"protocol": "TCP", "src_hostname": "h", "src_port": "2209",
                          "dest_ip": "10.0.0.9", "dest_port": "22"},
                    "10": {"protocol": "TCP", "src_hostname": "h", "src_port": "2210",
                           "dest_ip": "10.0.0.10", "dest_port": "22"}
                }
            }"#,
        )
        .unwrap();

        let vms = parse_vm_list(&response);
        let ids: Vec<_> = vms.iter().map(|vm| vm.vpsid.as_str()).collect();
        assert_eq!(ids, vec!["9", "10"]);
        assert_eq!(vms[0].ipv4.as_deref(), Some("10.0.0.9"));

        let rules = parse_rule_list(&response);
        let ids: Vec<_> = rules.iter().filter_map(|r| r.id.as_deref()).collect();
        assert_eq!(ids, vec!["9", "10"]);
    }

    #[test]
    #[traced_test]
    fn skipped_entries_log_their_id() {
        parse_vm_list(&json!({"vs": {"55": "garbage"}}));
        assert!(logs_contain("skipping malformed VM entry"));
        assert!(logs_contain("vpsid="));
        assert!(logs_contain("55"));

        parse_rule_list(&json!({"haproxydata": {"17": {"protocol": "UDP"}}}));
        assert!(logs_contain("skipping malformed forwarding rule"));
        assert!(logs_contain("key="));
        assert!(logs_contain("17"));
    }

    #[test]
    fn port_ranges_parse_and_contains() {
        let ranges = PortRanges::parse("80, 443,1000-2000,bogus,9-1");
        assert_eq!(ranges.ranges().len(), 3);
        assert!(ranges.contains(80));
        assert!(ranges.contains(1500));
        assert!(!ranges.contains(2001));
        assert!(PortRanges::parse("").is_empty());
    }

    fn sample_config() -> HaproxyConfig {
        HaproxyConfig::from_api_response(&json!({
            "server_haconfigs": {
                "0": {
                    "haproxy_src_ips": "203.0.113.10, 203.0.113.11",
                    "haproxy_allowedports": "1024-65000",
                    "haproxy_reservedports": "3306",
                    "haproxy_reservedports_http": "80,443"
                }
            },
            "haproxydata": {
                "5": {
                    "id": "5", "protocol": "TCP", "src_hostname": "203.0.113.10",
                    "src_port": "2222", "dest_ip": "10.0.0.5", "dest_port": "22"
                },
                "6": {
                    "id": "6", "protocol": "HTTP", "src_hostname": "a.example.com",
                    "src_port": "80", "dest_ip": "10.0.0.5", "dest_port": "8080"
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn haproxy_config_parses_settings() {
        let config = sample_config();
        assert_eq!(config.src_ips, vec!["203.0.113.10", "203.0.113.11"]);
        assert!(config.is_port_allowed(2000));
        assert!(!config.is_port_allowed(80));
        assert!(config.is_port_reserved(Protocol::Tcp, 443));
        assert!(!config.is_port_reserved(Protocol::Https, 443));
        assert!(config.is_port_reserved(Protocol::Http, 3306));
        assert!(config.is_port_in_use(Protocol::Tcp, 2222));
        assert!(config.is_port_in_use(Protocol::Http, 2222));
        assert!(!config.is_port_in_use(Protocol::Http, 80));
        assert_eq!(config.existing.len(), 2);
    }

    #[test]
    fn haproxy_config_missing_keys_is_unrestricted() {
        let config = HaproxyConfig::from_api_response(&json!({})).unwrap();
        assert!(config.src_ips.is_empty());
        assert!(config.is_port_allowed(22));
        assert!(!config.is_port_reserved(Protocol::Tcp, 80));
        assert!(HaproxyConfig::from_api_response(&json!([])).is_err());
    }

    #[test]
    fn validate_rule_checks_policy() {
        let config = sample_config();

        let ok = ForwardingRule::new(Protocol::Tcp, "203.0.113.10", 2223, "10.0.0.5", 22);
        assert!(config.validate_rule(&ok).is_ok());

        let reserved = ForwardingRule::new(Protocol::Tcp, "203.0.113.10", 443, "10.0.0.5", 22);
        assert!(config.validate_rule(&reserved).is_err());

        let outside = ForwardingRule::new(Protocol::Tcp, "203.0.113.10", 70, "10.0.0.5", 22);
        assert!(config.validate_rule(&outside).is_err());

        let taken = ForwardingRule::new(Protocol::Tcp, "203.0.113.10", 2222, "10.0.0.6", 22);
        let err = config.validate_rule(&taken).unwrap_err();
        assert!(err.to_string().contains("2222"));

        let same_rule = taken.clone().with_id("5");
        assert!(config.validate_rule(&same_rule).is_ok());

        let other_host = ForwardingRule::new(Protocol::Http, "b.example.com", 80, "10.0.0.6", 80);
        assert!(config.validate_rule(&other_host).is_ok());

        let same_host = ForwardingRule::new(Protocol::Http, "A.example.com", 80, "10.0.0.6", 80);
        assert!(config.validate_rule(&same_host).is_err());
    }

    #[test]
    fn api_response_success_and_errors() {
        let ok = ApiResponse::from_response(json!({"done": "Rule added"}));
        assert!(ok.success);
        assert_eq!(ok.message.as_deref(), Some("Rule added"));
        assert!(ok.error.is_none());

        let failed = ApiResponse::from_response(json!({
            "error": {"src_port": "Port already in use", "dest_ip": "Invalid IP"}
        }));
        assert!(!failed.success);
        let text = failed.error.unwrap();
        assert!(text.contains("Port already in use"));
        assert!(text.contains("; "));

        let empty_error = ApiResponse::from_response(json!({"error": [], "done": true}));
        assert!(empty_error.success);
        assert!(empty_error.message.is_none());

        let with_msg = ApiResponse::from_response(json!({"done": 1, "done_msg": "Deleted"}));
        assert_eq!(with_msg.message.as_deref(), Some("Deleted"));
    }
}
