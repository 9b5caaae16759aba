//! Utility constants

/// Environment variable overriding the overlay configuration root.
pub(crate) const OVERLAY_PATH_ENV: &str = "DTOVL_PATH";

/// Overlay location on systems that mount configfs directly at `/config`,
/// which several embedded distros do.
pub(crate) const CONFIG_OVERLAY_PATH: &str = "/config/device-tree/overlays";

/// Overlay location under the standard configfs mount point.
pub(crate) const SYS_CONFIG_OVERLAY_PATH: &str = "/sys/kernel/config/device-tree/overlays";

/// The device-tree compiler binary, looked up on `PATH`.
pub(crate) const DTC: &str = "dtc";
