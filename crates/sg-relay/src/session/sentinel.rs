//! Client messages that end the session

/// Messages that end the session instead of reaching the shell
const EXIT_SENTINELS: &[&str] = &["exit", "logout"];

/// Line written to the remote stdin when a sentinel arrives
pub const EXIT_LINE: &[u8] = b"exit\n";

/// Whether `message`, trimmed and case-folded, is `exit` or `logout`
pub fn is_exit_sentinel(message: &str) -> bool {
    let trimmed = message.trim();
    EXIT_SENTINELS
        .iter()
        .any(|sentinel| trimmed.eq_ignore_ascii_case(sentinel))
}
