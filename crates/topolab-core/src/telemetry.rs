//! Host memory telemetry behind an injectable trait, so admission logic is
//! testable with fake readings and degrades gracefully when the host cannot
//! be inspected.

use std::fs;
use std::path::Path;

pub trait MemoryTelemetry: Send + Sync {
    /// Total physical memory in bytes, if known.
    fn total_bytes(&self) -> Option<u64>;

    /// Memory currently available for new work in bytes, if known.
    fn available_bytes(&self) -> Option<u64>;
}

/// Reads `/proc/meminfo`. Returns `None` on non-Linux hosts or any read or
/// parse failure; callers fall back to a static ceiling rather than failing
/// closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcMeminfo;

impl ProcMeminfo {
    fn read_field(field: &str) -> Option<u64> {
        let content = fs::read_to_string(Path::new("/proc/meminfo")).ok()?;
        parse_meminfo_field(&content, field)
    }
}

impl MemoryTelemetry for ProcMeminfo {
    fn total_bytes(&self) -> Option<u64> {
        Self::read_field("MemTotal")
    }

    fn available_bytes(&self) -> Option<u64> {
        Self::read_field("MemAvailable")
    }
}

/// Lines look like `MemAvailable:   12345678 kB`.
fn parse_meminfo_field(content: &str, field: &str) -> Option<u64> {
    for line in content.lines() {
        let Some(rest) = line.strip_prefix(field) else {
            continue;
        };
        let Some(rest) = rest.strip_prefix(':') else {
            continue;
        };
        let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
        return Some(kb * 1024);
    }
    None
}

/// Fixed readings for tests and for operators who want to pin the view of
/// the host rather than sample it.
#[derive(Debug, Clone, Copy)]
pub struct FixedTelemetry {
    pub total: Option<u64>,
    pub available: Option<u64>,
}

impl FixedTelemetry {
    pub fn new(total: u64, available: u64) -> Self {
        Self {
            total: Some(total),
            available: Some(available),
        }
    }

    /// Telemetry that reports nothing, as on a host without `/proc`.
    pub fn unavailable() -> Self {
        Self {
            total: None,
            available: None,
        }
    }
}

impl MemoryTelemetry for FixedTelemetry {
    fn total_bytes(&self) -> Option<u64> {
        self.total
    }

    fn available_bytes(&self) -> Option<u64> {
        self.available
    }
}
