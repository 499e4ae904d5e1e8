//! Installer tasks
//!
//! A bound policy names an installer task; the task produces the boot
//! script that starts the installer. Tasks are looked up by name in a
//! [`TaskRegistry`]. Kernel-based tasks are configured in YAML and render
//! through minijinja, so their kernel arguments may reference any field of
//! the [`InstallContext`].

use crate::{BootScript, IpxeError, Result};
use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Name of the built-in task that installs nothing
pub const NOOP_TASK: &str = "noop";

/// Everything an installer task may put into its boot script
#[derive(Debug, Clone, Serialize)]
pub struct InstallContext {
    pub node_id: u64,
    pub node_name: String,
    pub hostname: String,
    pub policy: String,
    pub image_ref: String,
    pub broker_ref: String,
    pub server_url: String,
    /// Seconds to wait before rebooting after a failed installer boot
    pub retry_interval: u64,
}

/// Something that turns an install context into a boot script
pub trait ScriptProducer: Send + Sync + fmt::Debug {
    /// Task name policies refer to
    fn name(&self) -> &str;

    fn render(&self, ctx: &InstallContext) -> Result<BootScript>;
}

const KERNEL_TASK_TEMPLATE: &str = r#"#!ipxe

echo Roost installer: {{ task }} for {{ hostname }} (policy {{ policy }})
kernel {{ image_url }}/{{ kernel }}{% if kernel_args %} {{ kernel_args }}{% endif %} roost.node={{ ctx.node_id }} roost.hostname={{ ctx.hostname }} roost.server={{ ctx.server_url }} || goto error
initrd {{ image_url }}/{{ initrd }} || goto error
boot || goto error

:error
echo ERROR: installer failed to boot, retrying in {{ ctx.retry_interval }} seconds
sleep {{ ctx.retry_interval }}
reboot
"#;

/// Installer that boots a kernel and initrd out of the policy's image
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KernelTask {
    pub name: String,
    /// Kernel path, relative to the image
    pub kernel: String,
    /// Initrd path, relative to the image
    pub initrd: String,
    /// Kernel arguments; a minijinja template over the install context
    #[serde(default)]
    pub kernel_args: String,
}

impl KernelTask {
    pub fn new(name: impl Into<String>, kernel: impl Into<String>, initrd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kernel: kernel.into(),
            initrd: initrd.into(),
            kernel_args: String::new(),
        }
    }

    pub fn with_kernel_args(mut self, args: impl Into<String>) -> Self {
        self.kernel_args = args.into();
        self
    }

    /// Check that the task is usable before it is registered
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("name", &self.name), ("kernel", &self.kernel), ("initrd", &self.initrd)] {
            if value.trim().is_empty() {
                return Err(IpxeError::MissingConfig(format!("task.{}", field)));
            }
        }
        Environment::new().template_from_str(&self.kernel_args)?;
        Ok(())
    }
}

impl ScriptProducer for KernelTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, ctx: &InstallContext) -> Result<BootScript> {
        if ctx.image_ref.is_empty() {
            return Err(IpxeError::MissingConfig(format!(
                "image_ref for policy '{}'",
                ctx.policy
            )));
        }

        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);

        let kernel_args = env.render_str(&self.kernel_args, ctx)?;
        let image_url = format!(
            "{}/images/{}",
            ctx.server_url.trim_end_matches('/'),
            ctx.image_ref
        );

        env.add_template("install.ipxe", KERNEL_TASK_TEMPLATE)?;
        let body = env.get_template("install.ipxe")?.render(context! {
            task => &self.name,
            hostname => &ctx.hostname,
            policy => &ctx.policy,
            image_url => image_url,
            kernel => self.kernel.trim_start_matches('/'),
            initrd => self.initrd.trim_start_matches('/'),
            kernel_args => kernel_args.trim(),
            ctx => ctx,
        })?;

        Ok(BootScript::new(body))
    }
}

/// Task for nodes that only need registering: reports itself finished and
/// drops to local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTask;

impl ScriptProducer for NoopTask {
    fn name(&self) -> &str {
        NOOP_TASK
    }

    fn render(&self, ctx: &InstallContext) -> Result<BootScript> {
        Ok(BootScript::new(format!(
            r#"#!ipxe

echo Roost: nothing to install for {hostname}
imgfetch {server}/svc/stage-done/{id} ||
exit
"#,
            hostname = ctx.hostname,
            server = ctx.server_url.trim_end_matches('/'),
            id = ctx.node_id,
        )))
    }
}

/// Installer tasks by name
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, Arc<dyn ScriptProducer>>,
}

impl TaskRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tasks
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NoopTask));
        registry
    }

    /// Add a task, replacing any task of the same name
    pub fn register(&mut self, task: Arc<dyn ScriptProducer>) {
        self.tasks.insert(task.name().to_string(), task);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ScriptProducer>> {
        self.tasks.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    /// Render the named task
    pub fn render(&self, name: &str, ctx: &InstallContext) -> Result<BootScript> {
        self.get(name)
            .ok_or_else(|| IpxeError::UnknownTask(name.to_string()))?
            .render(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> InstallContext {
        InstallContext {
            node_id: 3,
            node_name: "node3".to_string(),
            hostname: "web3.lab".to_string(),
            policy: "web".to_string(),
            image_ref: "centos-7".to_string(),
            broker_ref: "puppet".to_string(),
            server_url: "http://192.168.1.1:8150/".to_string(),
            retry_interval: 20,
        }
    }

    fn centos() -> KernelTask {
        KernelTask::new("centos", "images/pxeboot/vmlinuz", "/images/pxeboot/initrd.img")
            .with_kernel_args("ks={{ server_url }}svc/file/{{ node_id }}/kickstart network")
    }

    #[test]
    fn test_kernel_task_script() {
        let script = centos().render(&ctx()).unwrap();
        let body = &script.body;
        assert!(body.starts_with("#!ipxe"));
        assert!(body.contains("Roost installer: centos for web3.lab (policy web)"));
        assert!(body.contains(
            "kernel http://192.168.1.1:8150/images/centos-7/images/pxeboot/vmlinuz \
             ks=http://192.168.1.1:8150/svc/file/3/kickstart network \
             roost.node=3 roost.hostname=web3.lab roost.server=http://192.168.1.1:8150/ || goto error"
        ));
        assert!(body.contains("initrd http://192.168.1.1:8150/images/centos-7/images/pxeboot/initrd.img || goto error"));
        assert!(body.contains("sleep 20\nreboot"));
    }

    #[test]
    fn test_kernel_task_render_is_repeatable() {
        let task = centos();
        assert_eq!(task.render(&ctx()).unwrap(), task.render(&ctx()).unwrap());
    }

    #[test]
    fn test_kernel_task_requires_image() {
        let mut ctx = ctx();
        ctx.image_ref.clear();
        assert!(matches!(centos().render(&ctx), Err(IpxeError::MissingConfig(_))));
    }

    #[test]
    fn test_kernel_task_validate() {
        assert!(centos().validate().is_ok());
        assert!(KernelTask::new("", "k", "i").validate().is_err());
        let broken = KernelTask::new("t", "k", "i").with_kernel_args("{{ unterminated");
        assert!(matches!(broken.validate(), Err(IpxeError::TemplateError(_))));
    }

    #[test]
    fn test_noop_task() {
        let script = NoopTask.render(&ctx()).unwrap();
        assert!(script.body.contains("imgfetch http://192.168.1.1:8150/svc/stage-done/3"));
        assert!(script.body.contains("exit"));
    }

    #[test]
    fn test_registry() {
        let mut registry = TaskRegistry::with_builtin();
        assert!(registry.contains(NOOP_TASK));
        registry.register(Arc::new(centos()));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["centos", "noop"]);
        assert!(registry.render("centos", &ctx()).is_ok());
        assert!(matches!(
            registry.render("windows", &ctx()),
            Err(IpxeError::UnknownTask(_))
        ));
    }

    #[test]
    fn test_kernel_task_from_yaml() {
        let task: KernelTask = serde_yaml::from_str(
            "name: ubuntu\nkernel: linux\ninitrd: initrd.gz\n",
        )
        .unwrap();
        assert_eq!(task.kernel_args, "");
        let script = task.render(&ctx()).unwrap();
        assert!(script.body.contains("/images/centos-7/linux roost.node=3"));
    }
}
