use serde::Serialize;
use snafu::Snafu;
use warp::http::StatusCode;
use warp::reject;

/// Request-handling errors (spec.md §7 / SPEC_FULL.md §4.13). Maps onto the
/// status codes in spec.md §6 via [`error_to_status_code`].
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("malformed request body"))]
    BadRequest,
    #[snafu(display("key not found"))]
    NotFound,
    #[snafu(display("node is not online"))]
    NotOnline,
    #[snafu(display("failed to reach peer node: {source}"))]
    PeerUnreachable { source: reqwest::Error },
}

pub type Result<T> = std::result::Result<T, Error>;

impl reject::Reject for Error {}

pub fn error_to_status_code(err: &Error) -> StatusCode {
    match err {
        Error::BadRequest => StatusCode::BAD_REQUEST,
        Error::NotFound => StatusCode::NOT_FOUND,
        Error::NotOnline => StatusCode::SERVICE_UNAVAILABLE,
        Error::PeerUnreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: u16,
    message: String,
}

/// `warp::Filter::recover` handler, same shape as the rejection handler this
/// is modeled on: map known errors to their status code, fall back to 400
/// for a body that failed to deserialize and 404 for unmatched routes.
pub async fn handle_rejection(
    rejection: warp::Rejection,
) -> std::result::Result<(impl warp::Reply,), std::convert::Infallible> {
    let code;
    let message;

    if rejection.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "NOT_FOUND".to_string();
    } else if let Some(err) = rejection.find::<Error>() {
        code = error_to_status_code(err);
        message = err.to_string();
    } else if rejection
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        code = StatusCode::BAD_REQUEST;
        message = "malformed request body".to_string();
    } else {
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = format!("UNHANDLED_REJECTION: {rejection:?}");
    }

    if code.as_u16() >= 500 {
        log::error!("HTTP handle error: {:?}", rejection);
    }

    Ok((warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            code: code.as_u16(),
            message,
        }),
        code,
    ),))
}
