//! Message handling around the discovery generator

use std::collections::BTreeMap;

use e3_core::DEFAULT_DISCOVERY_PREFIX;
use e3_discovery::DiscoveryGenerator;
use tracing::{debug, info, trace, warn};

use crate::error::PublishResult;
use crate::publisher::Publisher;

/// Payload the hub sends on its status topic after a restart
const HUB_ONLINE: &str = "online";

/// Feeds telemetry into the generator and publishes what changed.
///
/// Descriptors are published retained. The last payload sent per discovery
/// topic is cached so identical descriptors are not sent twice; the cache is
/// replayed when the hub announces it came back online.
pub struct Bridge<P> {
    generator: DiscoveryGenerator,
    publisher: P,
    test_mode: bool,
    status_topic: String,
    published: BTreeMap<String, String>,
}

impl<P: Publisher> Bridge<P> {
    pub fn new(generator: DiscoveryGenerator, publisher: P, test_mode: bool) -> Self {
        let prefix = match generator.options().discovery_prefix.as_str() {
            "" => DEFAULT_DISCOVERY_PREFIX,
            prefix => prefix,
        };
        Self {
            status_topic: format!("{}/status", prefix),
            generator,
            publisher,
            test_mode,
            published: BTreeMap::new(),
        }
    }

    pub fn generator(&self) -> &DiscoveryGenerator {
        &self.generator
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    pub fn into_publisher(self) -> P {
        self.publisher
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    /// Hub status topic that triggers a republish
    pub fn status_topic(&self) -> &str {
        &self.status_topic
    }

    /// Number of discovery topics published so far
    pub fn published_count(&self) -> usize {
        self.published.len()
    }

    /// Last payload published on a discovery topic
    pub fn published_payload(&self, discovery_topic: &str) -> Option<&str> {
        self.published.get(discovery_topic).map(String::as_str)
    }

    /// Handles one raw broker message and returns how many descriptors
    /// were published.
    pub fn handle_message(&mut self, topic: &str, payload: &[u8]) -> PublishResult<usize> {
        let payload = match std::str::from_utf8(payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Dropping message on {}: payload is not UTF-8 ({})", topic, e);
                return Ok(0);
            }
        };

        if topic == self.status_topic {
            if payload.trim() == HUB_ONLINE {
                info!("Hub is online, republishing {} descriptors", self.published.len());
                return self.republish_all();
            }
            return Ok(0);
        }

        if topic.contains("/LWT") {
            trace!("Skipping LWT message on {}", topic);
            return Ok(0);
        }

        debug!("Processing: {} = {}", topic, payload);

        let mut count = 0;
        for (discovery_topic, discovery_payload) in
            self.generator.generate(topic, payload, self.test_mode)
        {
            if self.published.get(&discovery_topic) == Some(&discovery_payload) {
                trace!("Unchanged: {}", discovery_topic);
                continue;
            }

            info!("Publishing discovery: {}", discovery_topic);
            if self.test_mode {
                debug!("Payload: {}", discovery_payload);
            }
            self.publisher
                .publish(&discovery_topic, &discovery_payload, true)?;
            self.published.insert(discovery_topic, discovery_payload);
            count += 1;
        }
        Ok(count)
    }

    /// Sends every cached descriptor again, ordered by topic
    pub fn republish_all(&mut self) -> PublishResult<usize> {
        for (topic, payload) in &self.published {
            self.publisher.publish(topic, payload, true)?;
        }
        Ok(self.published.len())
    }
}
