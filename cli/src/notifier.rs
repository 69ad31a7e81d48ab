use bulk_core::notify::{Notice, NoticeLevel, Notifier};

/// Prints user notices as stderr status lines.
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => eprintln!("Warning: {notice}"),
            NoticeLevel::Info | NoticeLevel::Success => eprintln!("{notice}"),
        }
    }
}
