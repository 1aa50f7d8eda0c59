use std::time::Duration;

use crate::reconciler::Reconciler;
use crate::registry::Registry;
use crate::settings::Settings;
use crate::store::DeviceStore;
use crate::transport::SshTransport;

/// Everything a command handler needs, built once per process from settings.
/// There are no module-level singletons; callers pass this around explicitly.
pub struct AppContext {
    pub settings: Settings,
    pub registry: Registry,
    pub reconciler: Reconciler<SshTransport>,
}

impl AppContext {
    pub fn new(settings: Settings) -> Self {
        let store = match &settings.backup_dir {
            Some(dir) => DeviceStore::with_backup_dir(&settings.store_path, dir),
            None => DeviceStore::new(&settings.store_path),
        };
        let registry = Registry::new(store);

        let transport = SshTransport::new(
            settings.router.host.clone(),
            settings.router.user.clone(),
            settings.resolved_key_path(),
            Duration::from_secs(settings.router.timeout_secs),
        );
        let reconciler = Reconciler::new(
            transport,
            settings.firewall.alias_name.clone(),
            settings.firewall.rule_marker.clone(),
            settings.firewall.rule_label.clone(),
            settings.router.config_path.clone(),
        );

        Self {
            settings,
            registry,
            reconciler,
        }
    }
}
