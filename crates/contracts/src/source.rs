//! 外部协作者 trait
//!
//! 硬件读取与配置下发都在节点核心之外，核心只通过这些 trait 看到它们。

/// Read Callback of one channel
///
/// Invoked from the sampling context on every due tick, so it must return
/// quickly. Any `FnMut() -> f64 + Send` closure is a `SampleSource`.
///
/// # Example
///
/// ```ignore
/// let mut counter = 0.0;
/// scheduler.add_channel(Box::new(move || {
///     counter += 1.0;
///     counter
/// }))?;
/// ```
pub trait SampleSource: Send {
    /// Take one reading
    fn read(&mut self) -> f64;
}

impl<F> SampleSource for F
where
    F: FnMut() -> f64 + Send,
{
    fn read(&mut self) -> f64 {
        self()
    }
}

/// Config Provider
///
/// Resolved out-of-band (provisioning) before the session is constructed.
pub trait ConfigProvider {
    fn server_address(&self) -> &str;
    fn server_port(&self) -> u16;
    fn device_name(&self) -> &str;
}
