use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

pub const USER_AGENT: &str = "cycling-diner/1.0";

pub fn progress_bar(len: u64) -> ProgressBar {
    ProgressBar::new(len).with_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] {human_pos}/{human_len} {percent}% ({per_sec})",
        )
        .expect("hardcoded"),
    )
}

/// Diagnostics go to stderr so the counts printed on stdout stay parseable.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// ureq's own Display starts with the request URL, which carries the access
/// token. This keeps only the status or the transport failure.
pub fn http_error(error: &ureq::Error) -> String {
    match error {
        ureq::Error::Status(code, response) => {
            format!("status code {code} ({})", response.status_text())
        }
        ureq::Error::Transport(transport) => match transport.message() {
            Some(message) => format!("{}: {message}", transport.kind()),
            None => transport.kind().to_string(),
        },
    }
}
