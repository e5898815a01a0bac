use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    //Payload errors
    #[error("payload: {0}")]
    ErrParsePayload(String),
    #[error("payload: {size} bytes exceeds code capacity of {max} bytes")]
    ErrPayloadTooLarge { size: usize, max: usize },
    #[error("code: {0}")]
    ErrCodeEncode(String),

    //Transport errors
    #[error("transport: {0}")]
    ErrTransportInit(String),
    #[error("transport: remote description rejected: {0}")]
    ErrRemoteDescriptionRejected(String),
    #[error("transport: no connection")]
    ErrNoTransport,
    #[error("data channel is not open")]
    ErrDataChannelNotOpen,
    #[error("invalid ice server url: {0}")]
    ErrInvalidIceServerUrl(String),

    //Capture errors
    #[error("capture: {0}")]
    ErrCaptureUnavailable(String),

    //Session errors
    #[error("i/o timeout")]
    ErrTimeout,
    #[error("unexpected phase: {0}")]
    ErrUnexpectedPhase(String),

    #[error("url parse: {0}")]
    Url(#[from] url::ParseError),
    #[error("{0}")]
    Other(String),
}

/// flatten_errs flattens multiple errors into one
pub fn flatten_errs(errs: Vec<impl Into<Error>>) -> Result<()> {
    if errs.is_empty() {
        Ok(())
    } else {
        let errs_strs: Vec<String> = errs.into_iter().map(|e| e.into().to_string()).collect();
        Err(Error::Other(errs_strs.join("\n")))
    }
}
