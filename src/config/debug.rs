//! Debugging feature flags.

#[allow(dead_code)]
pub struct LogFlags {
    /// Emit verbose logging for the live bar stream (connects, ticks, drops).
    pub log_stream_updates: bool,

    /// Log every series patch/append decision.
    pub log_series_patches: bool,

    /// Log every lane result as it is applied (noisy).
    pub log_lane_results: bool,

    /// Log results discarded by the request-epoch guard.
    pub log_stale_results: bool,

    pub log_scheduler: bool,

    pub log_job_monitor: bool,

    /// Commands sent to the remote engine (training start, bot start/stop).
    pub log_commands: bool,
}

pub const DF: LogFlags = LogFlags {
    log_stale_results: true,
    log_job_monitor: true,
    log_commands: true,

    log_stream_updates: false,
    log_series_patches: false,
    log_lane_results: false,
    log_scheduler: false,
};
