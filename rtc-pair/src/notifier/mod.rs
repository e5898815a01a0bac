use std::fmt;

use log::{error, info};

/// Severity of a user-facing notice.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Error,
}

const NOTIFICATION_KIND_INFO_STR: &str = "info";
const NOTIFICATION_KIND_SUCCESS_STR: &str = "success";
const NOTIFICATION_KIND_ERROR_STR: &str = "error";

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            NotificationKind::Info => NOTIFICATION_KIND_INFO_STR,
            NotificationKind::Success => NOTIFICATION_KIND_SUCCESS_STR,
            NotificationKind::Error => NOTIFICATION_KIND_ERROR_STR,
        };
        write!(f, "{s}")
    }
}

/// A notice as shown to the user.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub detail: String,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: &str, detail: &str) -> Self {
        Notification {
            kind,
            title: title.to_owned(),
            detail: detail.to_owned(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.title, self.detail)
    }
}

/// Notifier surfaces outcomes to the user, for instance as toasts.
pub trait Notifier {
    fn notify(&mut self, kind: NotificationKind, title: &str, detail: &str);
}

/// Writes notices to the log.
#[derive(Default, Debug)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, kind: NotificationKind, title: &str, detail: &str) {
        match kind {
            NotificationKind::Error => error!("{title}: {detail}"),
            _ => info!("{title}: {detail}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_notification_string() {
        let tests = vec![
            (
                Notification::new(NotificationKind::Info, "Pairing", "Show this code"),
                "[info] Pairing: Show this code",
            ),
            (
                Notification::new(NotificationKind::Success, "Success", "Peer connected!"),
                "[success] Success: Peer connected!",
            ),
            (
                Notification::new(NotificationKind::Error, "Timeout", "No answer"),
                "[error] Timeout: No answer",
            ),
        ];

        for (notification, expected_string) in tests {
            assert_eq!(notification.to_string(), expected_string);
        }
    }

    #[test]
    fn test_log_notifier_accepts_all_kinds() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut notifier = LogNotifier;
        notifier.notify(NotificationKind::Info, "a", "b");
        notifier.notify(NotificationKind::Error, "c", "d");
    }
}
