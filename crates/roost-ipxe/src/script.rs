//! Boot script value type and the fixed scripts that need no template.

use std::fmt::Write;

/// Content type boot scripts are served with
pub const CONTENT_TYPE: &str = "text/plain";

/// BIOS drive number of the first hard disk
pub const SANBOOT_DRIVE: &str = "0x80";

/// Most NICs the bootstrap script will report
pub const MAX_BOOTSTRAP_NICS: u8 = 32;

/// A rendered boot script. Produced per request, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootScript {
    pub body: String,
    pub content_type: &'static str,
}

impl BootScript {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: CONTENT_TYPE,
        }
    }
}

/// Generate the bootstrap script handed out by DHCP.
///
/// Reports up to `nic_max` MAC addresses to the boot endpoint as
/// `net0=..&net1=..`. Interfaces that don't exist expand to an empty value,
/// which the server ignores.
pub fn bootstrap_script(server_url: &str, nic_max: u8) -> BootScript {
    let nic_max = nic_max.clamp(1, MAX_BOOTSTRAP_NICS);
    let query = (0..nic_max)
        .map(|i| format!("net{i}=${{net{i}/mac}}"))
        .collect::<Vec<_>>()
        .join("&");

    BootScript::new(format!(
        r#"#!ipxe

# Roost bootstrap script
# Reports this machine's NICs and fetches its boot script

echo Roost PXE Boot
echo MAC: ${{mac}}
echo

chain {}/svc/boot?{} || goto error
exit

:error
echo Failed to fetch boot script from {}
sleep 15
reboot
"#,
        server_url.trim_end_matches('/'),
        query,
        server_url.trim_end_matches('/'),
    ))
}

/// Local boot by handing control to the first BIOS disk.
///
/// Needed on virtual hardware where exiting iPXE does not reliably fall
/// through to the disk.
pub fn sanboot_script(hostname: Option<&str>) -> BootScript {
    let mut script = String::from("#!ipxe\n\n");
    if let Some(hostname) = hostname {
        let _ = writeln!(script, "echo Roost: {} is installed", hostname);
    }
    let _ = write!(
        script,
        r#"echo Booting from local disk...
sanboot --no-describe --drive {drive} || goto boot_failed
exit

:boot_failed
echo Local disk handoff failed
exit 1
"#,
        drive = SANBOOT_DRIVE
    );
    BootScript::new(script)
}

/// Local boot by returning to firmware, which moves on to the next boot
/// device.
pub fn local_boot_script(hostname: Option<&str>) -> BootScript {
    let mut script = String::from("#!ipxe\n\n");
    if let Some(hostname) = hostname {
        let _ = writeln!(script, "echo Roost: {} is installed", hostname);
    }
    script.push_str("echo Booting from local disk...\nexit\n");
    BootScript::new(script)
}
