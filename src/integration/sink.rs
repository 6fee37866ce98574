use crate::inventory::VisionSignal;

/// Destination for outbound weak signals.
pub trait SignalSink {
    type Error;

    fn publish(&mut self, signal: &VisionSignal) -> Result<(), Self::Error>;
}

/// Collects signals in memory.
impl SignalSink for Vec<VisionSignal> {
    type Error = std::convert::Infallible;

    fn publish(&mut self, signal: &VisionSignal) -> Result<(), Self::Error> {
        self.push(signal.clone());
        Ok(())
    }
}
