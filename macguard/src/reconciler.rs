use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use crate::configdoc::{ConfigDocument, DocumentError};
use crate::registry::{Registry, RegistryError};
use crate::transport::Transport;

/// Remote staging path the updated document is copied to before being moved
/// into place.
const STAGING_PATH: &str = "/tmp/macguard_config.xml";

/// One reload strategy in the apply fallback chain.
struct ApplyStep {
    command: &'static str,
    best_effort: bool,
}

/// Graduated reload chain, run in order after a push. Different firmware
/// states accept different reload mechanisms: the early steps are cosmetic
/// and may fail without aborting the pass; the pass fails only when every
/// hard step fails.
const APPLY_STEPS: &[ApplyStep] = &[
    ApplyStep {
        command: "configctl webgui restart configd",
        best_effort: true,
    },
    ApplyStep {
        command: "configctl filter reload",
        best_effort: true,
    },
    ApplyStep {
        command: "/usr/local/etc/rc.configure_firewall",
        best_effort: false,
    },
    ApplyStep {
        command: "/usr/local/etc/rc.filter_configure",
        best_effort: false,
    },
];

/// Stage-specific failures of a reconciliation pass. All are terminal for
/// the current pass; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no enabled devices; nothing to sync")]
    NoEnabledDevices,
    #[error("failed to fetch remote configuration: {detail}")]
    RemoteFetchFailed { detail: String },
    #[error(transparent)]
    MalformedDocument(#[from] DocumentError),
    #[error("failed to push updated configuration: {detail}")]
    RemotePushFailed { detail: String },
    #[error("every firewall reload strategy failed: {detail}")]
    ApplyExhausted { detail: String },
    #[error("no managed block rule exists yet; create it before toggling enforcement")]
    RuleMissing,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Outcome of a successful pass: best-effort warnings gathered on the way.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub warnings: Vec<String>,
}

/// Read-only view of the enforcement state on the appliance.
#[derive(Debug, Serialize)]
pub struct ControlStatus {
    pub alias_exists: bool,
    pub rule_exists: bool,
    pub rule_enabled: bool,
    pub device_count: usize,
    /// Devices are actually blocked only when all three pieces are in place.
    pub controls_active: bool,
    pub last_checked: DateTime<Local>,
}

/// Synchronizes the device registry into the appliance configuration.
///
/// Each operation is one synchronous pass: fetch the remote document, patch
/// the addressed region, push the whole document back, and walk the apply
/// chain. The document is never cached across passes.
pub struct Reconciler<T: Transport> {
    transport: T,
    alias_name: String,
    rule_marker: String,
    rule_label: String,
    config_path: String,
}

impl<T: Transport> Reconciler<T> {
    pub fn new(
        transport: T,
        alias_name: impl Into<String>,
        rule_marker: impl Into<String>,
        rule_label: impl Into<String>,
        config_path: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            alias_name: alias_name.into(),
            rule_marker: rule_marker.into(),
            rule_label: rule_label.into(),
            config_path: config_path.into(),
        }
    }

    /// Push the enabled device set into the MAC alias.
    ///
    /// An empty registry short-circuits with [`SyncError::NoEnabledDevices`]
    /// before anything touches the appliance: an alias with no content is
    /// not-ready, not a state worth applying.
    pub fn sync_alias(&self, registry: &Registry) -> Result<SyncReport, SyncError> {
        let export = registry.export_snapshot(&self.alias_name)?;
        if export.devices.is_empty() {
            return Err(SyncError::NoEnabledDevices);
        }

        let mut report = SyncReport::default();
        self.backup_remote(&mut report);
        let mut document = self.fetch_document()?;
        document.upsert_alias(&self.alias_name, &export.content, &export.description);
        self.push_and_apply(&document, &mut report)?;
        Ok(report)
    }

    /// Make sure the managed block rule exists with the requested enablement.
    pub fn ensure_block_rule(&self, enabled: bool) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        self.backup_remote(&mut report);
        let mut document = self.fetch_document()?;
        document.upsert_block_rule(&self.alias_name, &self.rule_marker, &self.rule_label, enabled);
        self.push_and_apply(&document, &mut report)?;
        Ok(report)
    }

    /// Flip the block rule's disabled flag. Fails with
    /// [`SyncError::RuleMissing`] if the rule was never created.
    pub fn set_enforcement(&self, enabled: bool) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        let mut document = self.fetch_document()?;
        if !document.set_rule_enabled(&self.rule_marker, enabled) {
            return Err(SyncError::RuleMissing);
        }
        self.push_and_apply(&document, &mut report)?;
        Ok(report)
    }

    /// Read-only status of alias, rule, and enforcement on the appliance.
    pub fn status(&self, registry: &Registry) -> Result<ControlStatus, SyncError> {
        let document = self.fetch_document()?;
        let alias_exists = document.find_alias(&self.alias_name).is_some();
        let rule_enabled = document.rule_enabled(&self.rule_marker);
        let rule_exists = rule_enabled.is_some();
        let rule_enabled = rule_enabled.unwrap_or(false);
        let device_count = registry.stats()?.enabled;

        Ok(ControlStatus {
            alias_exists,
            rule_exists,
            rule_enabled,
            device_count,
            controls_active: alias_exists && rule_exists && rule_enabled,
            last_checked: Local::now(),
        })
    }

    /// Copy the live config aside on the appliance. Best-effort: a failed
    /// backup becomes a warning, never an aborted pass.
    fn backup_remote(&self, report: &mut SyncReport) {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let command = format!(
            "cp {path} {path}.backup_{stamp}",
            path = self.config_path
        );
        let outcome = self.transport.run(&command);
        if !outcome.ok {
            report
                .warnings
                .push(format!("remote config backup failed: {}", outcome.output));
        }
    }

    fn fetch_document(&self) -> Result<ConfigDocument, SyncError> {
        let outcome = self.transport.run(&format!("cat {}", self.config_path));
        if !outcome.ok {
            return Err(SyncError::RemoteFetchFailed {
                detail: outcome.output,
            });
        }
        Ok(ConfigDocument::parse(outcome.output.as_bytes())?)
    }

    fn push_and_apply(
        &self,
        document: &ConfigDocument,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let bytes = document.to_bytes()?;

        if !self.transport.push_file(&bytes, STAGING_PATH) {
            return Err(SyncError::RemotePushFailed {
                detail: format!("file transfer to {STAGING_PATH} failed"),
            });
        }

        let outcome = self
            .transport
            .run(&format!("mv {STAGING_PATH} {}", self.config_path));
        if !outcome.ok {
            return Err(SyncError::RemotePushFailed {
                detail: outcome.output,
            });
        }

        self.apply(report)
    }

    /// Walk [`APPLY_STEPS`] in order. Best-effort failures are recorded and
    /// skipped; the first hard success ends the chain; exhausting every hard
    /// step fails the pass.
    fn apply(&self, report: &mut SyncReport) -> Result<(), SyncError> {
        let mut hard_failures = Vec::new();

        for step in APPLY_STEPS {
            let outcome = self.transport.run(step.command);
            if outcome.ok {
                if !step.best_effort {
                    return Ok(());
                }
                continue;
            }

            if step.best_effort {
                report.warnings.push(format!(
                    "reload step '{}' failed: {}",
                    step.command, outcome.output
                ));
            } else {
                hard_failures.push(format!("{}: {}", step.command, outcome.output));
            }
        }

        Err(SyncError::ApplyExhausted {
            detail: hard_failures.join("; "),
        })
    }
}
