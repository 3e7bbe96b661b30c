/// Statuses whose text is fixed on the client. The server's own `error`
/// text is not shown for these.
pub const STATUS_MESSAGES: &[(u16, &str)] = &[
    (405, "The analysis service does not accept this request method."),
    (413, "The image is too large. Please choose a smaller image."),
    (429, "Too many requests. Please wait a few minutes and try again."),
];

pub const SERVER_ERROR_MESSAGE: &str =
    "The analysis service encountered an error. Please try again later.";

/// Used for a 400 whose body carries no `error` text.
pub const BAD_REQUEST_MESSAGE: &str = "The request was malformed. Please try a different image.";

/// User-facing text for a failed response. `server_error` is the `error`
/// field of the response body, if there was one; it is shown for 400 and
/// for statuses not covered above.
pub fn status_message(status: u16, server_error: Option<&str>) -> String {
    if let Some((_, message)) = STATUS_MESSAGES.iter().find(|(code, _)| *code == status) {
        return message.to_string();
    }
    if status >= 500 {
        return SERVER_ERROR_MESSAGE.to_string();
    }
    if let Some(message) = server_error.map(str::trim).filter(|m| !m.is_empty()) {
        return message.to_string();
    }
    if status == 400 {
        return BAD_REQUEST_MESSAGE.to_string();
    }
    format!("Request failed with HTTP status {}.", status)
}
