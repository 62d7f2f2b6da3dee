use thiserror::Error;

/// Errors raised while parsing data received over the broker's TCP
/// surface. None of these propagate across thread boundaries; callers
/// log them and drop the offending frame or connection.
///
/// Admission rejections are a separate, non-error control-flow outcome
/// (`admission::AdmissionDecision`), and transport failures are handled
/// as raw `std::io::Error`s at the call site rather than wrapped here,
/// since every read/write/connect failure is already a local `match`
/// arm with its own recovery policy.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("invalid topic: {0:?}")]
    InvalidTopic(String),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}
