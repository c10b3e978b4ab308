//! Translation of A1111 sampler/scheduler vocabulary into ComfyUI identifiers.

pub const FALLBACK_SAMPLER: &str = "euler_ancestral";
pub const FALLBACK_SCHEDULER: &str = "normal";

const SAMPLER_NAMES: &[(&str, &str)] = &[
    ("Euler a", "euler_ancestral"),
    ("Euler", "euler"),
    ("DPM++ 2M", "dpmpp_2m"),
    ("DPM++ 2M SDE", "dpmpp_2m_sde"),
    ("DPM++ 2M Karras", "dpmpp_2m"),
    ("DPM++ 2M SDE Karras", "dpmpp_2m_sde"),
    ("DPM++ SDE", "dpmpp_sde"),
    ("DPM++ SDE Karras", "dpmpp_sde"),
    ("DPM2", "dpm_2"),
    ("DPM2 Karras", "dpm_2"),
    ("DPM2 a", "dpm_2_ancestral"),
    ("DPM2 a Karras", "dpm_2_ancestral"),
    ("DDIM", "ddim"),
    ("PLMS", "plms"),
    ("LMS", "lms"),
    ("Heun", "heun"),
    ("DPM fast", "dpm_fast"),
    ("DPM adaptive", "dpm_adaptive"),
];

const SCHEDULER_NAMES: &[&str] = &[
    "normal",
    "karras",
    "exponential",
    "sgm_uniform",
    "simple",
    "ddim_uniform",
];

/// Maps an A1111 sampler name (exact match) to its ComfyUI `sampler_name`.
pub fn map_sampler(sampler: &str) -> &'static str {
    SAMPLER_NAMES
        .iter()
        .find(|(source, _)| *source == sampler)
        .map(|(_, target)| *target)
        .unwrap_or_else(|| {
            log::debug!(
                "Unknown sampler '{}', using {}",
                sampler,
                FALLBACK_SAMPLER
            );
            FALLBACK_SAMPLER
        })
}

/// Maps a schedule type (case-insensitive) to its ComfyUI `scheduler`.
pub fn map_scheduler(scheduler: &str) -> &'static str {
    let lowered = scheduler.to_lowercase();
    SCHEDULER_NAMES
        .iter()
        .copied()
        .find(|name| *name == lowered)
        .unwrap_or(FALLBACK_SCHEDULER)
}
