//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Spec error - the apps file could not be read or parsed
pub const SPEC_ERROR: i32 = 2;

/// Template error - template resolution, build or customization failed
pub const TEMPLATE_ERROR: i32 = 3;

/// Reconcile error - at least one application failed to reconcile
pub const RECONCILE_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Config error - invalid or incomplete configuration (sysexits.h EX_CONFIG)
pub const CONFIG_ERROR: i32 = 78;
