use crate::error::AppError;
use crate::model::ReminderSlot;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::LinuxNotifier;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::WindowsNotifier;

/// Channel delivered by desktop notifications; others belong to remote
/// gateways.
pub const LOCAL_CHANNEL: &str = "app";

/// Fire-and-forget delivery. `memoguard notify` exits right after sending,
/// so notifiers must not rely on callbacks from the notification.
pub trait Notifier {
    fn notify(&self, slot: &ReminderSlot) -> Result<(), AppError>;
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, slot: &ReminderSlot) -> Result<(), AppError> {
        log::debug!("notifications disabled, dropping reminder {}", slot.id);
        Ok(())
    }
}

pub fn notifier_from_env() -> Result<Box<dyn Notifier>, AppError> {
    if std::env::var("MEMOGUARD_DISABLE_NOTIFICATIONS").is_ok() {
        return Ok(Box::new(NoopNotifier));
    }

    match platform_notifier() {
        Ok(notifier) => Ok(notifier),
        Err(AppError::InvalidData(message)) => {
            log::warn!("{message}; falling back to no-op notifier");
            Ok(Box::new(NoopNotifier))
        }
        Err(other) => Err(other),
    }
}

pub(crate) fn notification_body(slot: &ReminderSlot) -> String {
    format!(
        "{} ({})\nmemoguard show {}",
        slot.title, slot.trigger_at, slot.task_id
    )
}

#[cfg(target_os = "linux")]
pub fn platform_notifier() -> Result<Box<dyn Notifier>, AppError> {
    Ok(Box::new(LinuxNotifier))
}

#[cfg(windows)]
pub fn platform_notifier() -> Result<Box<dyn Notifier>, AppError> {
    Ok(Box::new(WindowsNotifier))
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn platform_notifier() -> Result<Box<dyn Notifier>, AppError> {
    Err(AppError::invalid_data(
        "notifications are not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::notification_body;
    use crate::model::ReminderSlot;

    #[test]
    fn body_names_title_trigger_and_show_command() {
        let slot = ReminderSlot {
            id: "t-1-2025-09-20T09:00:00Z".to_string(),
            task_id: "t-1".to_string(),
            title: "walk".to_string(),
            trigger_at: "2025-09-20T09:00:00Z".to_string(),
            channel: "app".to_string(),
        };
        assert_eq!(
            notification_body(&slot),
            "walk (2025-09-20T09:00:00Z)\nmemoguard show t-1"
        );
    }
}
