// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Default priority for the render thread when SFXMIX_THREAD_PRIORITY is unset.
const DEFAULT_RENDER_THREAD_PRIORITY: u8 = 70;

/// Reads SFXMIX_THREAD_PRIORITY (0-99). Read once when the stream is built so
/// the render path never touches the environment.
pub fn render_thread_priority() -> Option<ThreadPriorityValue> {
    let requested = std::env::var("SFXMIX_THREAD_PRIORITY")
        .ok()
        .and_then(|v| v.parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_RENDER_THREAD_PRIORITY);
    ThreadPriorityValue::try_from(requested).ok()
}

pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Returns whether we should attempt RT (SCHED_FIFO) scheduling for the render
/// thread. Enabled unless SFXMIX_DISABLE_RT_AUDIO is set.
pub fn rt_audio_enabled() -> bool {
    !env_flag("SFXMIX_DISABLE_RT_AUDIO")
}

/// Raises the calling thread's priority the first time it's called for a given
/// `priority_set` flag. Failures are logged and otherwise ignored.
pub fn configure_render_thread_priority(
    priority: Option<ThreadPriorityValue>,
    rt_audio: bool,
    priority_set: &mut bool,
) {
    if *priority_set {
        return;
    }
    *priority_set = true;

    let Some(priority) = priority else {
        return;
    };
    let tp = ThreadPriority::Crossplatform(priority);
    let _ = set_current_thread_priority(tp);

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        let tid = thread_native_id();
        match set_thread_priority_and_policy(
            tid,
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for render thread"),
            Err(e) => warn!(error = %e, "Failed to set RT SCHED_FIFO for render thread"),
        }
    }
    #[cfg(not(unix))]
    let _ = rt_audio;
}
