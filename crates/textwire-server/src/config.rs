//! Static service configuration.

use std::env;

use serde::Deserialize;
use textwire_protocol::frame::DEFAULT_SENTINEL;

use crate::{Error, Result};

/// Upper bound for the configurable frame delays.
pub const MAX_FRAME_DELAY: u32 = 60;

/// Environment variable consulted when no `auth_token` is configured.
pub const AUTH_TOKEN_ENV: &str = "TEXTWIRE_AUTH_TOKEN";

/// Configuration for one control-channel service. Immutable after start.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Start the listener when true.
    pub enable: bool,
    /// TCP port for the listener (1024..=65535).
    pub port: u16,
    /// Emit ANSI colour escape sequences in frames when true.
    pub show_attributes: bool,
    /// UTF-8 marker prefixing META/PAYLOAD lines.
    pub sentinel: String,
    /// Close the TCP connection after each command response.
    pub close_after_response: bool,
    /// Frames inserted between characters of a quoted `TYPE` string (0..=60).
    pub macro_interkey_frames: u32,
    /// Frames inserted between bare key actions when draining the queue
    /// (0..=60).
    pub inter_token_frame_delay: u32,
    /// Shared secret required by `AUTH`; empty disables authentication.
    /// Supports `${ENV}` expansion.
    pub auth_token: String,
    /// Also run a dedicated keyboard listener speaking the raw keyboard
    /// verbs.
    pub keyboard_enable: bool,
    /// TCP port of the keyboard listener (1024..=65535).
    pub keyboard_port: u16,
    /// Real-mode segment used as the base for `DEBUG` responses.
    pub debug_segment: u32,
    /// Offset added to the segment base for `DEBUG` responses.
    pub debug_offset: u32,
    /// Number of bytes returned by `DEBUG` (0 disables the region).
    pub debug_length: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enable: false,
            port: 6000,
            show_attributes: true,
            sentinel: DEFAULT_SENTINEL.to_string(),
            close_after_response: false,
            macro_interkey_frames: 1,
            inter_token_frame_delay: 1,
            auth_token: String::new(),
            keyboard_enable: false,
            keyboard_port: 6001,
            debug_segment: 0,
            debug_offset: 0,
            debug_length: 0,
        }
    }
}

impl ServiceConfig {
    /// Validates ranges and resolves the auth token (`${ENV}` expansion plus
    /// the `TEXTWIRE_AUTH_TOKEN` fallback). Returns the effective config.
    pub fn resolve(mut self) -> Result<Self> {
        if self.port < 1024 {
            return Err(Error::Config(format!(
                "port {} outside valid range 1024-65535",
                self.port
            )));
        }
        if self.keyboard_enable && self.keyboard_port < 1024 {
            return Err(Error::Config(format!(
                "keyboard_port {} outside valid range 1024-65535",
                self.keyboard_port
            )));
        }
        if self.macro_interkey_frames > MAX_FRAME_DELAY {
            return Err(Error::Config(format!(
                "macro_interkey_frames {} exceeds maximum {MAX_FRAME_DELAY}",
                self.macro_interkey_frames
            )));
        }
        if self.inter_token_frame_delay > MAX_FRAME_DELAY {
            return Err(Error::Config(format!(
                "inter_token_frame_delay {} exceeds maximum {MAX_FRAME_DELAY}",
                self.inter_token_frame_delay
            )));
        }
        if self.sentinel.is_empty() {
            self.sentinel = DEFAULT_SENTINEL.to_string();
        }

        self.auth_token = expand_env(&self.auth_token);
        if self.auth_token.is_empty()
            && let Ok(token) = env::var(AUTH_TOKEN_ENV)
            && !token.is_empty()
        {
            self.auth_token = token;
        }
        Ok(self)
    }

    /// Combined physical base address of the `DEBUG` region
    /// (`(segment << 4) + offset`, saturating).
    pub fn debug_address(&self) -> u32 {
        combine_segment_offset(self.debug_segment, self.debug_offset)
    }
}

/// Computes `(segment << 4) + offset` as a physical address, saturating at
/// `u32::MAX`.
pub fn combine_segment_offset(segment: u32, offset: u32) -> u32 {
    let address = (u64::from(segment) << 4) + u64::from(offset);
    u32::try_from(address).unwrap_or(u32::MAX)
}

/// Expands `${NAME}` references from the process environment; unknown
/// variables expand to nothing, unterminated references are kept verbatim.
fn expand_env(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                if let Ok(v) = env::var(&after[..end]) {
                    result.push_str(&v);
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                return result;
            }
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_section() {
        let config = ServiceConfig::default();
        assert!(!config.enable);
        assert_eq!(config.port, 6000);
        assert!(config.show_attributes);
        assert_eq!(config.sentinel, "\u{1F5B5}");
        assert!(!config.close_after_response);
        assert_eq!(config.macro_interkey_frames, 1);
        assert_eq!(config.inter_token_frame_delay, 1);
        assert_eq!(config.debug_length, 0);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let config = ServiceConfig {
            port: 80,
            ..ServiceConfig::default()
        };
        assert!(config.resolve().is_err());

        let config = ServiceConfig {
            macro_interkey_frames: 61,
            ..ServiceConfig::default()
        };
        assert!(config.resolve().is_err());
    }

    #[test]
    fn empty_sentinel_falls_back_to_default() {
        let config = ServiceConfig {
            sentinel: String::new(),
            ..ServiceConfig::default()
        };
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.sentinel, DEFAULT_SENTINEL);
    }

    #[test]
    fn segment_offset_combination() {
        assert_eq!(combine_segment_offset(0, 0), 0);
        assert_eq!(combine_segment_offset(0xC000, 0x1234), 0xC1234);
        assert_eq!(combine_segment_offset(u32::MAX, u32::MAX), u32::MAX);
    }

    #[test]
    fn env_expansion() {
        // Modifying the process environment is fine here: tests in this
        // module use distinct variable names.
        unsafe { env::set_var("TEXTWIRE_TEST_TOKEN", "sekrit") };
        assert_eq!(expand_env("${TEXTWIRE_TEST_TOKEN}"), "sekrit");
        assert_eq!(expand_env("a-${TEXTWIRE_TEST_TOKEN}-b"), "a-sekrit-b");
        assert_eq!(expand_env("${TEXTWIRE_TEST_MISSING}"), "");
        assert_eq!(expand_env("${unterminated"), "${unterminated");
        assert_eq!(expand_env("plain"), "plain");
    }

    #[test]
    fn config_deserializes_from_json() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{"enable": true, "port": 6123, "sentinel": "*", "show_attributes": false}"#,
        )
        .unwrap();
        assert!(config.enable);
        assert_eq!(config.port, 6123);
        assert_eq!(config.sentinel, "*");
        assert!(!config.show_attributes);
        // Unspecified fields keep their defaults.
        assert_eq!(config.macro_interkey_frames, 1);
    }
}
