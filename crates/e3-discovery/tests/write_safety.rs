//! Write controls must never be exposed for blacklisted or read-only DIDs

use std::sync::Arc;

use e3_config::{ConfigSources, Configuration};
use e3_discovery::{DiscoveryGenerator, GeneratorOptions};
use serde_json::Value;

const TYPES: &str = r#"
setpoint:
  entity_type: number
  writable: true
  unit_of_measurement: W
  min: 0
  max: 100
  step: 1
toggle:
  entity_type: switch
  writable: true
  payload_on: "ON"
  payload_off: "OFF"
  state_on: "1"
  state_off: "0"
action:
  entity_type: button
  writable: true
choice:
  entity_type: select
  options: [a, b]
plain_setpoint:
  entity_type: number
  min: 0
  max: 100
plain_toggle:
  entity_type: switch
plain_action:
  entity_type: button
status:
  entity_type: sensor
"#;

const DATAPOINTS: &str = r#"
write_blacklisted_dids: [100, 101, 102, 103]
datapoints:
  100: {name: Locked Setpoint, type: setpoint, writable: true}
  101: {name: Locked Toggle, type: toggle}
  102: {name: Locked Action, type: action}
  103: {name: Locked Choice, type: choice}
  200: {name: Readonly Setpoint, type: setpoint, writable: false}
  201: {name: Open Setpoint, type: setpoint, write_mode: write-raw}
  202:
    name: Split
    type: setpoint
    subs:
      Fixed: {writable: false}
      Free: {}
  300: {name: Unflagged Setpoint, type: plain_setpoint}
  301:
    name: Unflagged Mode
    type: status
    subs:
      Mode: {entity_type: select, options: ["off", auto]}
      Flagged: {entity_type: select, writable: true, options: ["off", auto]}
  302: {name: Unflagged Toggle, type: plain_toggle}
  303: {name: Unflagged Action, type: plain_action}
  304: {name: Flagged Setpoint, type: plain_setpoint, writable: true}
  305: {name: Flagged Toggle, type: plain_toggle, writable: true}
"#;

fn generator() -> DiscoveryGenerator {
    let sources = ConfigSources::new("en")
        .with_types(serde_yaml::from_str(TYPES).unwrap())
        .with_datapoints(serde_yaml::from_str(DATAPOINTS).unwrap());
    DiscoveryGenerator::new(
        Arc::new(Configuration::new(sources)),
        GeneratorOptions::default(),
    )
}

fn generate(generator: &DiscoveryGenerator, topic: &str) -> Vec<(String, Value)> {
    generator
        .generate(topic, "1", false)
        .into_iter()
        .map(|(topic, payload)| (topic, serde_json::from_str(&payload).unwrap()))
        .collect()
}

fn assert_read_only(config: &Value, state_topic: &str) {
    assert_eq!(config["state_topic"], state_topic);
    for key in ["command_topic", "command_template", "min", "max", "step"] {
        assert!(config.get(key).is_none(), "{} must not be published", key);
    }
}

#[test]
fn test_blacklisted_number_becomes_sensor() {
    let out = generate(&generator(), "open3e/680_100_Setpoint");
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, "homeassistant/sensor/open3e_680_100/config");
    assert_read_only(&out[0].1, "open3e/680_100_Setpoint");
    assert_eq!(out[0].1["unit_of_measurement"], "W");
}

#[test]
fn test_blacklisted_switch_becomes_binary_sensor() {
    let out = generate(&generator(), "open3e/680_101_Toggle");
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, "homeassistant/binary_sensor/open3e_680_101/config");
    let config = &out[0].1;
    assert_read_only(config, "open3e/680_101_Toggle");
    assert_eq!(config["payload_on"], "1");
    assert_eq!(config["payload_off"], "0");
}

#[test]
fn test_blacklisted_button_is_dropped() {
    assert!(generate(&generator(), "open3e/680_102_Action").is_empty());
}

#[test]
fn test_blacklisted_select_becomes_sensor() {
    let out = generate(&generator(), "open3e/680_103_Choice");
    assert_eq!(out[0].0, "homeassistant/sensor/open3e_680_103/config");
    assert_read_only(&out[0].1, "open3e/680_103_Choice");
    assert!(out[0].1.get("options").is_none());
}

#[test]
fn test_explicit_read_only() {
    let out = generate(&generator(), "open3e/680_200_Setpoint");
    assert_eq!(out[0].0, "homeassistant/sensor/open3e_680_200/config");
    assert_read_only(&out[0].1, "open3e/680_200_Setpoint");
}

#[test]
fn test_writable_number_uses_write_mode() {
    let out = generate(&generator(), "open3e/680_201_Setpoint");
    let config = &out[0].1;
    assert_eq!(out[0].0, "homeassistant/number/open3e_680_201/config");
    assert_eq!(config["command_topic"], "open3e/cmnd");
    assert_eq!(
        config["command_template"],
        r#"{"mode": "write-raw", "data": [[201, "{{ value }}"]]}"#
    );
    assert_eq!(config["max"], 100);
}

#[test]
fn test_sub_level_read_only() {
    let generator = generator();
    let fixed = generate(&generator, "open3e/680_202_Split/Fixed");
    assert_eq!(fixed[0].0, "homeassistant/sensor/open3e_680_202_fixed/config");

    let free = generate(&generator, "open3e/680_202_Split/Free");
    assert_eq!(free[0].0, "homeassistant/number/open3e_680_202_free/config");
}

#[test]
fn test_unflagged_number_is_read_only() {
    let out = generate(&generator(), "open3e/680_300_X");
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].0, "homeassistant/sensor/open3e_680_300/config");
    assert_read_only(&out[0].1, "open3e/680_300_X");
}

#[test]
fn test_unflagged_sub_select_is_read_only() {
    let generator = generator();
    let out = generate(&generator, "open3e/680_301_Op/Mode");
    assert_eq!(out[0].0, "homeassistant/sensor/open3e_680_301_mode/config");
    assert_read_only(&out[0].1, "open3e/680_301_Op/Mode");

    let out = generate(&generator, "open3e/680_301_Op/Flagged");
    assert_eq!(out[0].0, "homeassistant/select/open3e_680_301_flagged/config");
    assert_eq!(out[0].1["command_topic"], "open3e/cmnd");
}

#[test]
fn test_unflagged_switch_and_button() {
    let generator = generator();
    let out = generate(&generator, "open3e/680_302_Toggle");
    assert_eq!(out[0].0, "homeassistant/binary_sensor/open3e_680_302/config");
    assert_read_only(&out[0].1, "open3e/680_302_Toggle");

    assert!(generate(&generator, "open3e/680_303_Action").is_empty());
}

#[test]
fn test_datapoint_opt_in() {
    let out = generate(&generator(), "open3e/680_304_Setpoint");
    let config = &out[0].1;
    assert_eq!(out[0].0, "homeassistant/number/open3e_680_304/config");
    assert_eq!(config["command_topic"], "open3e/cmnd");
    assert_eq!(config["min"], 0);
    assert_eq!(config["max"], 100);
}

#[test]
fn test_switch_default_payloads() {
    let out = generate(&generator(), "open3e/680_305_Toggle");
    let config = &out[0].1;
    assert_eq!(out[0].0, "homeassistant/switch/open3e_680_305/config");
    assert_eq!(config["payload_on"], "1");
    assert_eq!(config["payload_off"], "0");
    assert_eq!(config["state_on"], "1.0");
    assert_eq!(config["state_off"], "0.0");
}
