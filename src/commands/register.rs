use anyhow::{Context as _, Result};
use registry::backend::etcd::EtcdBackend;
use registry::{ServerInfo, ServiceDiscovery};

use crate::Context;
use crate::cli::RegisterArgs;
use crate::ui;

fn discovery(ctx: &Context) -> ServiceDiscovery {
    let registry = &ctx.config.registry;
    let backend = EtcdBackend::new(&registry.endpoint).with_ttl(registry.ttl());
    ServiceDiscovery::new(Box::new(backend))
}

/// Info this process advertises for `ip:port`
pub fn server_info(ip: &str, port: u16) -> ServerInfo {
    let hostname = std::env::var("HOSTNAME").unwrap_or_default();
    let uuid = format!(
        "{:x}-{:x}",
        chrono::Utc::now().timestamp_millis(),
        std::process::id()
    );
    ServerInfo::new(ip, port)
        .hostname(hostname)
        .version(env!("CARGO_PKG_VERSION"))
        .uuid(uuid)
}

pub fn register(ctx: &Context, args: &RegisterArgs) -> Result<()> {
    let path = args
        .path
        .clone()
        .unwrap_or_else(|| ctx.config.registry.path.clone());
    let info = server_info(&args.ip, args.port);

    discovery(ctx)
        .register(&path, &info)
        .with_context(|| format!("Could not register {} at {}", info.address(), path))?;

    if !ctx.quiet {
        ui::success(&format!("Registered {}", info.address()));
        ui::kv("path", &path);
        ui::kv("registry", &ctx.config.registry.endpoint);
        ui::kv("uuid", &info.uuid);
    }
    Ok(())
}

pub fn ping(ctx: &Context) -> Result<()> {
    let endpoint = &ctx.config.registry.endpoint;
    discovery(ctx)
        .ping()
        .with_context(|| format!("Registry at {endpoint} is not healthy"))?;

    if !ctx.quiet {
        ui::success(&format!("Registry at {endpoint} is healthy"));
    }
    Ok(())
}
