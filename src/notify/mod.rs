mod dispatcher;
mod payload;

pub use dispatcher::{AlertDispatcher, DEFAULT_MAX_RETRIES};
pub use payload::{MAX_OUTPUT_CHARS, SlackMessage, slack_payload, teams_payload, truncate_output};
