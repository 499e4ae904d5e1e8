//! Microkernel boot script
//!
//! Unbound nodes boot the microkernel, which collects facts and checks in
//! periodically until a policy binds the node. The script only depends on
//! the four values in [`MicrokernelConfig`]; it never looks at the node.

use crate::{BootScript, IpxeError, Result};
use minijinja::{context, Environment};
use serde::Deserialize;
use tracing::debug;

/// Debug levels the microkernel understands. Anything else is coerced to
/// the empty default.
pub const DEBUG_LEVELS: [&str; 3] = ["", "quiet", "debug"];

/// Kernel image, relative to `image_base_uri`
pub const MICROKERNEL_KERNEL: &str = "vmlinuz0";

/// Initrd image, relative to `image_base_uri`
pub const MICROKERNEL_INITRD: &str = "initrd0.img";

const MICROKERNEL_TEMPLATE: &str = r#"#!ipxe

echo Roost microkernel boot
kernel {{ base }}/{{ kernel }} maxcpus=1{% if debug_level %} {{ debug_level }}{% endif %}{% if kernel_args %} {{ kernel_args }}{% endif %} || goto error
initrd {{ base }}/{{ initrd }} || goto error
boot || goto error

:error
echo ERROR: microkernel failed to boot, retrying in {{ checkin_interval }} seconds
sleep {{ checkin_interval }}
reboot
"#;

/// Parameters of the microkernel script
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MicrokernelConfig {
    /// Base URL the kernel and initrd are fetched from
    pub image_base_uri: String,
    /// One of [`DEBUG_LEVELS`]
    pub debug_level: String,
    /// Extra kernel arguments, passed through verbatim
    pub kernel_args: String,
    /// Seconds to wait before power-cycling after a failed boot
    pub checkin_interval: u64,
}

impl Default for MicrokernelConfig {
    fn default() -> Self {
        Self {
            image_base_uri: String::new(),
            debug_level: String::new(),
            kernel_args: String::new(),
            checkin_interval: 15,
        }
    }
}

impl MicrokernelConfig {
    pub fn new(image_base_uri: impl Into<String>) -> Self {
        Self {
            image_base_uri: image_base_uri.into(),
            ..Default::default()
        }
    }

    pub fn with_debug_level(mut self, level: impl Into<String>) -> Self {
        self.debug_level = level.into();
        self
    }

    pub fn with_kernel_args(mut self, args: impl Into<String>) -> Self {
        self.kernel_args = args.into();
        self
    }

    pub fn with_checkin_interval(mut self, seconds: u64) -> Self {
        self.checkin_interval = seconds;
        self
    }

    /// The configured debug level if it is recognized, otherwise `""`
    pub fn effective_debug_level(&self) -> &str {
        let level = self.debug_level.as_str();
        if DEBUG_LEVELS.contains(&level) {
            level
        } else {
            debug!("Ignoring unsupported microkernel debug level '{}'", level);
            ""
        }
    }
}

/// Render the microkernel boot script
pub fn microkernel_script(config: &MicrokernelConfig) -> Result<BootScript> {
    let base = config.image_base_uri.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(IpxeError::MissingConfig("image_base_uri".to_string()));
    }

    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_template("microkernel.ipxe", MICROKERNEL_TEMPLATE)?;

    let body = env.get_template("microkernel.ipxe")?.render(context! {
        base => base,
        kernel => MICROKERNEL_KERNEL,
        initrd => MICROKERNEL_INITRD,
        debug_level => config.effective_debug_level(),
        kernel_args => config.kernel_args.trim(),
        checkin_interval => config.checkin_interval,
    })?;

    Ok(BootScript::new(body))
}
