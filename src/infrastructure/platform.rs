//! Host facts recorded in every report.

use nix::sys::utsname::uname;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tracing::warn;

use crate::domain::models::PlatformFacts;

const GIB: u64 = 1024 * 1024 * 1024;

/// Kernel identification as `uname` reports it: sysname, release, build version.
fn kernel_identity() -> (String, String, String) {
    match uname() {
        Ok(uts) => (
            uts.sysname().to_string_lossy().into_owned(),
            uts.release().to_string_lossy().into_owned(),
            uts.version().to_string_lossy().into_owned(),
        ),
        Err(e) => {
            warn!(error = %e, "uname failed, falling back to compile-time OS name");
            (
                std::env::consts::OS.to_string(),
                System::kernel_version().unwrap_or_default(),
                String::new(),
            )
        }
    }
}

/// Read kernel identification, CPU count and total RAM from the host.
pub fn collect_platform_facts() -> PlatformFacts {
    let refresh_kind = RefreshKind::new()
        .with_cpu(CpuRefreshKind::new())
        .with_memory(MemoryRefreshKind::new().with_ram());
    let system = System::new_with_specifics(refresh_kind);

    let (system_name, release, version) = kernel_identity();

    PlatformFacts {
        system: system_name,
        release,
        version,
        cpu_cores: system.cpus().len(),
        total_ram_gb: bytes_to_gib(system.total_memory()),
    }
}

/// Whole GiB, rounded to nearest.
pub const fn bytes_to_gib(bytes: u64) -> u64 {
    bytes.saturating_add(GIB / 2) / GIB
}
