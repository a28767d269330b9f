//! Inbound topic parsing
//!
//! Open3E publishes every datapoint under
//! `open3e/<device_addr>_<identifier>_<item_name>[/<sub_path...>]`.

use crate::ROOT_TOPIC;

/// A decomposed Open3E telemetry topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    /// ECU address, e.g. `680`
    pub device_addr: String,
    /// Numeric datapoint identifier
    pub identifier: u32,
    /// Item name as published by Open3E, e.g. `FlowTemperatureSensor`
    pub item_name: String,
    /// Remaining path segments joined with `/`, e.g. `Mode/ID`
    pub sub_path: Option<String>,
    /// The topic exactly as received
    pub original_topic: String,
}

/// Parse an inbound topic.
///
/// Returns `None` for anything that is not an Open3E datapoint topic. Never
/// panics, whatever the input.
pub fn parse_topic(topic: &str) -> Option<ParsedTopic> {
    let mut segments = topic.split('/');

    if segments.next()? != ROOT_TOPIC {
        return None;
    }

    let main = segments.next()?;
    let mut parts = main.splitn(3, '_');
    let device_addr = parts.next()?;
    let identifier = parts.next()?;
    let item_name = parts.next()?;

    let identifier: u32 = identifier.parse().ok()?;

    let rest: Vec<&str> = segments.collect();
    let sub_path = if rest.is_empty() {
        None
    } else {
        Some(rest.join("/"))
    };

    Some(ParsedTopic {
        device_addr: device_addr.to_string(),
        identifier,
        item_name: item_name.to_string(),
        sub_path,
        original_topic: topic.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_sub_path() {
        let parsed = parse_topic("open3e/680_268_FlowTemperatureSensor/Actual").unwrap();
        assert_eq!(parsed.device_addr, "680");
        assert_eq!(parsed.identifier, 268);
        assert_eq!(parsed.item_name, "FlowTemperatureSensor");
        assert_eq!(parsed.sub_path.as_deref(), Some("Actual"));
        assert_eq!(
            parsed.original_topic,
            "open3e/680_268_FlowTemperatureSensor/Actual"
        );
    }

    #[test]
    fn test_parse_without_sub_path() {
        let parsed = parse_topic("open3e/680_2496_CurrentThermalCapacitySystem").unwrap();
        assert_eq!(parsed.identifier, 2496);
        assert_eq!(parsed.sub_path, None);
    }

    #[test]
    fn test_deep_sub_path_is_joined() {
        let parsed = parse_topic("open3e/680_1415_MixerOneCircuitOperationState/Mode/ID").unwrap();
        assert_eq!(parsed.sub_path.as_deref(), Some("Mode/ID"));
    }

    #[test]
    fn test_item_name_keeps_later_underscores() {
        let parsed = parse_topic("open3e/680_100_Some_Odd_Name").unwrap();
        assert_eq!(parsed.item_name, "Some_Odd_Name");
    }

    #[test]
    fn test_rejects_malformed_topics() {
        for topic in [
            "",
            "open3e",
            "open3e/",
            "open3e/invalid",
            "open3e/680_268",
            "not_open3e/680_268_Flow",
            "open3e/680_abc_Flow",
            "open3e/680_-1_Flow",
            "open3e/680_99999999999_Flow",
            "Open3E/680_268_Flow",
        ] {
            assert!(parse_topic(topic).is_none(), "expected None for {topic:?}");
        }
    }

    #[test]
    fn test_empty_item_name_is_accepted() {
        // Two underscores are present, so the split succeeds with an empty name
        let parsed = parse_topic("open3e/680_268_").unwrap();
        assert_eq!(parsed.item_name, "");
    }

    #[test]
    fn test_adversarial_input_does_not_panic() {
        let long = format!("open3e/{}_1_x/{}", "a".repeat(10_000), "/".repeat(500));
        assert!(parse_topic(&long).is_some());
        assert!(parse_topic("open3e/\u{0}_\u{ffff}_\u{1f525}").is_none());
    }
}
