//! Process configuration, read once at startup from the environment.
//!
//! There is no config file layer: every knob the server or daemon binaries
//! need is an environment variable with a documented default, consistent
//! with how the teacher app is configured at the process boundary.

use std::path::PathBuf;

use crate::recognizer::AccelerationConfig;

/// Server-side configuration (model path, bind address, acceleration).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub model_path: PathBuf,
    pub acceleration: AccelerationConfig,
    pub thread_count: i32,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_string("SPEECH_BIND_ADDR", "0.0.0.0:9000"),
            model_path: PathBuf::from(env_string(
                "SPEECH_MODEL_PATH",
                "models/ggml-base.en.bin",
            )),
            acceleration: AccelerationConfig {
                use_gpu: env_bool("SPEECH_USE_GPU", true),
                gpu_device: env_i32("SPEECH_GPU_DEVICE", 0),
                flash_attn: env_bool("SPEECH_FLASH_ATTN", false),
            },
            thread_count: env_i32("SPEECH_THREAD_COUNT", 4),
        }
    }
}

/// Client-side configuration (server URL, reconnect target).
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub server_url: String,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self {
            server_url: env_string("SPEECH_SERVER_URL", "ws://127.0.0.1:9000"),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i32(key: &str, default: i32) -> i32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
