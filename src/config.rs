// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Runtime configuration.

use crate::host::SubmissionKind;

pub const SUBMISSION_ENV: &str = "TEXTURE_APPLY_ASYNC_SUBMISSION";
pub const LABEL_ENV: &str = "TEXTURE_APPLY_ASYNC_LABEL";

/// Which submission model the scheduler subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionPreference {
    /// Ask the host at subscription time.
    #[default]
    Auto,
    PerTarget,
    FrameWide,
}

impl SubmissionPreference {
    /// Parses `auto`, `per_target` or `frame_wide`, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(SubmissionPreference::Auto),
            "per_target" | "per-target" => Some(SubmissionPreference::PerTarget),
            "frame_wide" | "frame-wide" => Some(SubmissionPreference::FrameWide),
            _ => None,
        }
    }

    pub(crate) fn resolve(self, host_kind: SubmissionKind) -> SubmissionKind {
        match self {
            SubmissionPreference::Auto => host_kind,
            SubmissionPreference::PerTarget => SubmissionKind::PerTarget,
            SubmissionPreference::FrameWide => SubmissionKind::FrameWide,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Label of the command list, visible in host frame captures.
    pub label: String,
    pub submission: SubmissionPreference,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            label: "TextureAsyncApplier".to_string(),
            submission: SubmissionPreference::Auto,
        }
    }
}

impl Config {
    /**
    Defaults, overridden by [SUBMISSION_ENV] and [LABEL_ENV] when set.

    Unknown submission values are logged and ignored.
    */
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();
        if let Some(value) = lookup(SUBMISSION_ENV) {
            match SubmissionPreference::parse(&value) {
                Some(preference) => config.submission = preference,
                None => {
                    logwise::warn_sync!(
                        "ignoring unknown submission preference {value}",
                        value = logwise::privacy::LogIt(&value)
                    );
                }
            }
        }
        if let Some(label) = lookup(LABEL_ENV) {
            if !label.is_empty() {
                config.label = label;
            }
        }
        config
    }
}
