//! Cancel-phrase recognition for spoken cancellation

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_CANCEL: Regex = Regex::new(
        r"(?i)\b(cancel|stop|abort|false alarm|i'?m (ok|okay|fine|alright)|i am (ok|okay|fine|alright))\b"
    ).unwrap();

    // "don't cancel" / "do not stop" must not cancel
    static ref RE_NEGATED: Regex = Regex::new(
        r"(?i)\b(don'?t|do not|never)\s+(cancel|stop|abort)\b"
    ).unwrap();
}

/// Does this utterance ask to cancel a pending alert?
pub fn is_cancel_phrase(text: &str) -> bool {
    RE_CANCEL.is_match(text) && !RE_NEGATED.is_match(text)
}
