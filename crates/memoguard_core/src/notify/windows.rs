use crate::error::AppError;
use crate::model::ReminderSlot;
use crate::notify::Notifier;
use tauri_winrt_notification::Toast;

pub struct WindowsNotifier;

impl Notifier for WindowsNotifier {
    fn notify(&self, slot: &ReminderSlot) -> Result<(), AppError> {
        Toast::new(Toast::POWERSHELL_APP_ID)
            .title("MemoGuard reminder")
            .text1(&slot.title)
            .text2(&format!("{} (memoguard show {})", slot.trigger_at, slot.task_id))
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        log::debug!("sent toast for {}", slot.id);
        Ok(())
    }
}
