use crate::error::AppError;
use crate::model::ReminderSlot;
use crate::notify::{Notifier, notification_body};
use notify_rust::{Notification, Timeout};

pub struct LinuxNotifier;

impl Notifier for LinuxNotifier {
    fn notify(&self, slot: &ReminderSlot) -> Result<(), AppError> {
        Notification::new()
            .summary("MemoGuard reminder")
            .body(&notification_body(slot))
            .timeout(Timeout::Never)
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        log::debug!("sent desktop notification for {}", slot.id);
        Ok(())
    }
}
