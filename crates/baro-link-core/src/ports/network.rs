use core::net::Ipv4Addr;

/// Port for the device's network association
pub trait NetworkLink {
    /// Start associating with the access point.
    ///
    /// Must not block: progress is observed through [`is_associated`](Self::is_associated).
    fn begin(&mut self, ssid: &str, password: &str);

    /// Non-blocking status read.
    fn is_associated(&self) -> bool;

    /// Address assigned to the device, for diagnostics only.
    fn local_address(&self) -> Option<Ipv4Addr>;
}
