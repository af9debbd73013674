//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_server_name() -> String {
    "ChatServer".to_string()
}

pub fn default_command_queue() -> usize {
    1024
}

// =============================================================================
// Listener Defaults
// =============================================================================

pub fn default_max_line_length() -> usize {
    4096
}

pub fn default_outbound_queue() -> usize {
    256
}

// =============================================================================
// Login Defaults
// =============================================================================

pub fn default_login_timeout() -> u64 {
    30
}

pub fn default_max_attempts() -> u32 {
    3
}

// =============================================================================
// Shutdown Defaults
// =============================================================================

pub fn default_drain_timeout() -> u64 {
    5
}

// =============================================================================
// Database Defaults
// =============================================================================

pub fn default_database_path() -> String {
    "slchatd.db".to_string()
}

pub fn default_bootstrap_password() -> String {
    "admin123".to_string()
}

pub fn default_hash_memory_kib() -> u32 {
    19456
}

pub fn default_hash_iterations() -> u32 {
    2
}
