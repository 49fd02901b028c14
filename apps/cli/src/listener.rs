use std::sync::Mutex;

use launcher_core::launcher::{LogLevel, SessionListener, Stage};

/// Prints stages and progress to stderr and game output to stdout.
#[derive(Default)]
pub struct ConsoleListener {
    last_percent: Mutex<Option<(String, u64)>>,
}

impl SessionListener for ConsoleListener {
    fn on_progress(&self, total: u64, done: u64, finished: bool, label: &str) {
        if total == 0 {
            return;
        }
        let percent = (done.min(total) * 100) / total;
        let mut last = self
            .last_percent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // One line per 10% step keeps the output readable.
        let step = if finished { 100 } else { percent - percent % 10 };
        if last.as_ref().is_some_and(|(name, seen)| name == label && *seen >= step) {
            return;
        }
        *last = Some((label.to_string(), step));
        eprintln!("{label}: {step}% ({done}/{total} bytes)");
    }

    fn on_stage(&self, stage: Stage) {
        eprintln!("==> {stage}");
    }

    fn on_log(&self, level: LogLevel, line: &str) {
        match level {
            LogLevel::Warn | LogLevel::Error => eprintln!("{line}"),
            _ => println!("{line}"),
        }
    }

    fn on_insufficient_memory(&self) {
        eprintln!("The game ran out of memory. Lower the instance's maximum memory and try again.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last(listener: &ConsoleListener) -> Option<(String, u64)> {
        listener.last_percent.lock().unwrap().clone()
    }

    #[test]
    fn progress_is_reported_in_ten_percent_steps() {
        let listener = ConsoleListener::default();
        listener.on_progress(200, 30, false, "Libraries");
        assert_eq!(last(&listener), Some(("Libraries".to_string(), 10)));

        listener.on_progress(200, 38, false, "Libraries");
        assert_eq!(last(&listener), Some(("Libraries".to_string(), 10)));

        listener.on_progress(200, 200, true, "Libraries");
        assert_eq!(last(&listener), Some(("Libraries".to_string(), 100)));

        listener.on_progress(0, 0, false, "Assets");
        assert_eq!(last(&listener), Some(("Libraries".to_string(), 100)));

        listener.on_progress(10, 1, false, "Assets");
        assert_eq!(last(&listener), Some(("Assets".to_string(), 10)));
    }
}
