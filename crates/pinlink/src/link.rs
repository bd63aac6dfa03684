/// Outbound half of the transport.
///
/// The transport owns the physical channel (USB bulk pipe, serial port,
/// socket pair in tests) and must deliver frames ordered and loss-free once
/// connected. The device hands it fully encoded frames; the transport's
/// read side feeds inbound frames to
/// [`Device::handle_inbound`](crate::device::Device::handle_inbound).
pub trait Link: Send + Sync {
    /// Hand one encoded frame to the transport.
    fn send_frame(&self, frame: &[u8]) -> std::io::Result<()>;
}

impl<T: Link + ?Sized> Link for &T {
    fn send_frame(&self, frame: &[u8]) -> std::io::Result<()> {
        (**self).send_frame(frame)
    }
}

impl<T: Link + ?Sized> Link for std::sync::Arc<T> {
    fn send_frame(&self, frame: &[u8]) -> std::io::Result<()> {
        (**self).send_frame(frame)
    }
}
