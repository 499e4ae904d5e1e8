//! Roost iPXE Script Generation
//!
//! Producers for every boot script a node can be served:
//!
//! - **Bootstrap**: chain script handed out by DHCP/TFTP, reports the
//!   node's MACs to the boot endpoint
//! - **Microkernel**: discovery image for unbound nodes
//! - **Install**: installer task selected by the bound policy
//! - **Local boot**: plain exit to the next boot device, or a sanboot
//!   handoff to the first BIOS disk
//!
//! # Example
//!
//! ```
//! use roost_ipxe::{MicrokernelConfig, microkernel_script};
//!
//! let config = MicrokernelConfig::new("http://192.168.1.1:8150/microkernel")
//!     .with_debug_level("debug")
//!     .with_checkin_interval(30);
//!
//! let script = microkernel_script(&config).unwrap();
//! assert!(script.body.starts_with("#!ipxe"));
//! assert!(script.body.contains("sleep 30"));
//! ```

pub mod error;
pub mod microkernel;
pub mod script;
pub mod task;

pub use error::*;
pub use microkernel::*;
pub use script::*;
pub use task::*;
