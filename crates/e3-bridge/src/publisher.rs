//! Outbound side of the bridge

use std::io::{self, Stdout, Write};

use crate::error::PublishResult;

/// Anything that can deliver a discovery descriptor to the hub.
///
/// A broker client implements this; the bridge never talks to the network
/// itself.
pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> PublishResult<()>;
}

impl<P: Publisher + ?Sized> Publisher for &mut P {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> PublishResult<()> {
        (**self).publish(topic, payload, retain)
    }
}

/// Writes one `<topic> <payload>` line per descriptor
pub struct WritePublisher<W: Write> {
    out: W,
}

/// Publisher used by the CLI simulation
pub type StdoutPublisher = WritePublisher<Stdout>;

impl StdoutPublisher {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> WritePublisher<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Publisher for WritePublisher<W> {
    fn publish(&mut self, topic: &str, payload: &str, _retain: bool) -> PublishResult<()> {
        writeln!(self.out, "{} {}", topic, payload)?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_publisher_lines() {
        let mut publisher = WritePublisher::new(Vec::new());
        publisher.publish("a/config", "{}", true).unwrap();
        publisher.publish("b/config", r#"{"x":1}"#, true).unwrap();

        let out = String::from_utf8(publisher.into_inner()).unwrap();
        assert_eq!(out, "a/config {}\nb/config {\"x\":1}\n");
    }
}
