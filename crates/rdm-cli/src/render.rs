//! Terminal progress rendering.
//!
//! Consumes [`ProgressStats`] snapshots from the coordinator's observer
//! channel on a dedicated thread and drives an indicatif bar. The thread
//! exits when the sending side is dropped.

use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;

use indicatif::{ProgressBar, ProgressStyle};
use rdm_core::progress::ProgressStats;

const BAR_TEMPLATE: &str =
    "{bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, eta {eta})";

/// Spawns the renderer thread for one download.
pub fn spawn_renderer(rx: Receiver<ProgressStats>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut bar: Option<ProgressBar> = None;
        while let Ok(stats) = rx.recv() {
            let pb = bar.get_or_insert_with(|| {
                let pb = ProgressBar::new(stats.total_bytes);
                if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
                    pb.set_style(style);
                }
                pb
            });
            pb.set_position(stats.bytes_done);
        }
        if let Some(pb) = bar {
            pb.finish_and_clear();
        }
    })
}
