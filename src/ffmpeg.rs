//! Verbosity of FFmpeg's own console output.
//!
//! FFmpeg writes warnings about damaged streams straight to stderr, bypassing
//! the `log` facade. Loading thousands of clips in a training job makes that
//! noisy, so the level can be lowered here without importing `ffmpeg-next`.
//!
//! ```no_run
//! use framebatch::{DecoderLogLevel, set_decoder_log_level};
//!
//! set_decoder_log_level(DecoderLogLevel::Error);
//! ```

use std::{fmt, str::FromStr};

use ffmpeg_next::util::log::Level;

/// FFmpeg log verbosity, from silent to chatty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecoderLogLevel {
    /// No output at all.
    Quiet,
    /// Only unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings. FFmpeg's default.
    #[default]
    Warning,
    /// Informational messages.
    Info,
    /// Debugging messages.
    Debug,
}

impl DecoderLogLevel {
    /// Every level, quietest first.
    pub const ALL: [DecoderLogLevel; 6] = [
        DecoderLogLevel::Quiet,
        DecoderLogLevel::Fatal,
        DecoderLogLevel::Error,
        DecoderLogLevel::Warning,
        DecoderLogLevel::Info,
        DecoderLogLevel::Debug,
    ];

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            DecoderLogLevel::Quiet => "quiet",
            DecoderLogLevel::Fatal => "fatal",
            DecoderLogLevel::Error => "error",
            DecoderLogLevel::Warning => "warning",
            DecoderLogLevel::Info => "info",
            DecoderLogLevel::Debug => "debug",
        }
    }

    fn level(self) -> Level {
        match self {
            DecoderLogLevel::Quiet => Level::Quiet,
            DecoderLogLevel::Fatal => Level::Fatal,
            DecoderLogLevel::Error => Level::Error,
            DecoderLogLevel::Warning => Level::Warning,
            DecoderLogLevel::Info => Level::Info,
            DecoderLogLevel::Debug => Level::Debug,
        }
    }
}

impl fmt::Display for DecoderLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DecoderLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(value))
            .or_else(|| value.eq_ignore_ascii_case("warn").then_some(DecoderLogLevel::Warning))
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|level| level.name()).collect();
                format!("unknown log level {value:?}, expected one of {}", names.join(", "))
            })
    }
}

/// Set FFmpeg's console log level. Does not affect `log` output.
pub fn set_decoder_log_level(level: DecoderLogLevel) {
    log::debug!("Setting FFmpeg log level to {level}");
    ffmpeg_next::util::log::set_level(level.level());
}
