//! Translation between typed robot state and flat [`BusMessage`] envelopes.
//!
//! Outbound, a [`ChangeSet`] becomes one message named after its
//! [`InputKind`] with one `port → value` pair per changed port.  Inbound,
//! output commands and system messages are decoded by their `name` tag;
//! unknown tags decode to `None`.

use std::collections::BTreeMap;

use ftl_types::{BusMessage, ChangeSet, InputKind, OutputEvent, PortId, SysMessage};
use tracing::debug;

/// Inbound PWM output command.
pub const MSG_OUTPUT_PWM: &str = "pwmOut";
/// Inbound digital output command.
pub const MSG_OUTPUT_DIGITAL: &str = "digitalOut";
/// Inbound robot-mode system message.
pub const MSG_SYS_ROBOT_MODE: &str = "ftl-robot-mode";

/// Encode `changes` as a [`BusMessage`] named after `kind`.
///
/// Digital values are written as `"1"` / `"0"`; analog values use the
/// shortest form of the number that peers on the bus parse back exactly
/// (`0.5`, `1`, `-3.25`, `1e+21`, `Infinity`).
pub fn encode_change_set(kind: InputKind, changes: &ChangeSet) -> BusMessage {
    let mut msg = BusMessage::new(kind.as_str());
    for (port, value) in changes.iter() {
        let encoded = match kind {
            InputKind::Digital => encode_digital(value.as_bool()).to_string(),
            InputKind::Analog => encode_number(value.as_f64()),
        };
        msg.push(port.to_string(), encoded);
    }
    msg
}

/// Decode a message from the hardware-outputs topic.
///
/// Pairs whose key is not a port id, or whose PWM value is not a number, are
/// skipped.
pub fn decode_output_message(msg: &BusMessage) -> Option<OutputEvent> {
    match msg.name.as_str() {
        MSG_OUTPUT_PWM => {
            let values: BTreeMap<PortId, f64> = msg
                .values
                .iter()
                .filter_map(|kv| {
                    let port = parse_port(&kv.key)?;
                    match kv.value.trim().parse::<f64>() {
                        Ok(value) => Some((port, value)),
                        Err(_) => {
                            debug!(port, value = %kv.value, "skipping non-numeric pwm value");
                            None
                        }
                    }
                })
                .collect();
            Some(OutputEvent::Pwm(values))
        }
        MSG_OUTPUT_DIGITAL => {
            let values: BTreeMap<PortId, bool> = msg
                .values
                .iter()
                .filter_map(|kv| Some((parse_port(&kv.key)?, parse_digital(&kv.value))))
                .collect();
            Some(OutputEvent::Digital(values))
        }
        _ => None,
    }
}

/// Decode a message from the system-message topic.
pub fn decode_sys_message(msg: &BusMessage) -> Option<SysMessage> {
    match msg.name.as_str() {
        MSG_SYS_ROBOT_MODE => {
            let values = msg
                .values
                .iter()
                .map(|kv| (kv.key.clone(), kv.value.clone()))
                .collect();
            Some(SysMessage::RobotMode(values))
        }
        _ => None,
    }
}

fn encode_digital(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Number formatting shared with the other nodes on the bus: exponent form
/// outside `[1e-6, 1e21)`, and `NaN` / `Infinity` / `-Infinity` spelled out.
fn encode_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-6..1e21).contains(&magnitude) {
        let exp = format!("{value:e}");
        return match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => format!("{mantissa}e+{power}"),
            _ => exp,
        };
    }
    value.to_string()
}

fn parse_port(key: &str) -> Option<PortId> {
    match key.trim().parse::<PortId>() {
        Ok(port) => Some(port),
        Err(_) => {
            debug!(key, "skipping pair with non-numeric port key");
            None
        }
    }
}

fn parse_digital(value: &str) -> bool {
    value == "true" || value == "1"
}
