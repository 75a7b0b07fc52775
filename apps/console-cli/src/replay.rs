//! Scripted sessions: seed users, sign one in, and drive the pipeline step by step.
//!
//! ```yaml
//! users:
//!   - { name: Alex, role: Admin }
//!   - { name: Erin, role: Employee }
//! login: Alex
//! seed:
//!   CRM: [{ id: "1", name: Acme }]
//! steps:
//!   - { op: load, resource: CRM }
//!   - { op: impersonate, user: Erin }
//!   - { op: create, resource: CRM, payload: { name: Globex }, audit: "Created lead Globex." }
//!   - { op: stop_impersonation }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use console_pipeline::config::ConsolePipelineConfig;
use console_pipeline::contract::model::{
    Action, AuditLogEntry, Collection, MutationCommand, MutationOutcome, NewNotification,
    NewStaff, Notification, PermissionMatrix, ResourceName, Role, User,
};
use console_pipeline::domain::permissions::{default_matrix_for, set_permission};
use console_pipeline::domain::service::Service;
use console_pipeline::infra::InMemoryMutationService;
use console_pipeline::ConsolePipeline;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    #[serde(default)]
    pub users: Vec<ScriptUser>,
    /// Name of the user whose session runs the steps.
    pub login: String,
    /// Initial collections; ignored in remote mode.
    #[serde(default)]
    pub seed: BTreeMap<ResourceName, Collection>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptUser {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    /// Role defaults when absent.
    #[serde(default)]
    pub permissions: Option<PermissionMatrix>,
}

#[derive(Debug, Deserialize)]
pub struct ScriptNotification {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Recipient user names.
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub link: Option<(ResourceName, String)>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Load {
        resource: ResourceName,
    },
    Create {
        resource: ResourceName,
        payload: Value,
        #[serde(default)]
        audit: Option<String>,
        #[serde(default)]
        notify: Option<ScriptNotification>,
    },
    Update {
        resource: ResourceName,
        id: String,
        payload: Value,
        #[serde(default)]
        audit: Option<String>,
        #[serde(default)]
        notify: Option<ScriptNotification>,
    },
    Delete {
        resource: ResourceName,
        id: String,
        #[serde(default)]
        audit: Option<String>,
        #[serde(default)]
        notify: Option<ScriptNotification>,
    },
    Impersonate {
        user: String,
    },
    StopImpersonation,
    MarkAllRead,
    Grant {
        user: String,
        resource: ResourceName,
        action: Action,
        #[serde(default = "granted")]
        value: bool,
    },
    CreateStaff {
        name: String,
        email: String,
        role: Role,
    },
}

fn granted() -> bool {
    true
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Load { .. } => "load",
            Step::Create { .. } => "create",
            Step::Update { .. } => "update",
            Step::Delete { .. } => "delete",
            Step::Impersonate { .. } => "impersonate",
            Step::StopImpersonation => "stop_impersonation",
            Step::MarkAllRead => "mark_all_read",
            Step::Grant { .. } => "grant",
            Step::CreateStaff { .. } => "create_staff",
        }
    }
}

pub enum Mode {
    InMemory,
    Remote { token: Option<String> },
}

/// What the script left behind, printed as YAML.
#[derive(Debug, Serialize)]
pub struct Report {
    pub steps: Vec<String>,
    pub audit_log: Vec<AuditLogEntry>,
    pub notifications: Vec<Notification>,
    pub events: usize,
}

pub async fn run_file(path: &Path, cfg: &ConsolePipelineConfig, mode: Mode) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    let script: Script = serde_yaml::from_str(&raw)
        .with_context(|| format!("invalid script {}", path.display()))?;

    let report = run(script, cfg, mode).await?;
    println!("{}", serde_yaml::to_string(&report)?);
    Ok(())
}

pub async fn run(script: Script, cfg: &ConsolePipelineConfig, mode: Mode) -> Result<Report> {
    let mut directory: HashMap<String, User> = script
        .users
        .into_iter()
        .map(|u| (u.name.clone(), into_user(u)))
        .collect();

    let pipeline = match mode {
        Mode::InMemory => {
            let backend = Arc::new(InMemoryMutationService::new());
            for (resource, collection) in script.seed {
                backend.seed(resource, collection);
            }
            let accounts = directory
                .values()
                .map(serde_json::to_value)
                .collect::<Result<Collection, _>>()?;
            backend.seed(ResourceName::AccessControl, accounts);
            ConsolePipeline::with_mutation_service(cfg, backend)
        }
        Mode::Remote { token } => ConsolePipeline::http(cfg, token)?.0,
    };
    let mut events = pipeline.subscribe();
    let service = pipeline.service().clone();

    let me = lookup(&directory, &script.login)?;
    service.identity().login(me);

    let mut lines = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.into_iter().enumerate() {
        let label = format!("#{} {}", index + 1, step.name());
        let result = run_step(&service, &mut directory, step).await;
        let line = match result {
            Ok(summary) => format!("{label}: {summary}"),
            Err(e) => {
                tracing::warn!(step = %label, error = %e, "step failed");
                format!("{label}: error: {e}")
            }
        };
        lines.push(line);
    }

    let mut seen = 0;
    while events.try_recv().is_ok() {
        seen += 1;
    }

    // Read back as the real identity, whatever the script left running.
    let notifications = service
        .identity()
        .real_identity()
        .map(|real| service.notification_center().list_for(&real))
        .unwrap_or_default();

    Ok(Report {
        steps: lines,
        audit_log: service.audit_log().newest_first(),
        notifications,
        events: seen,
    })
}

async fn run_step(
    service: &Service,
    directory: &mut HashMap<String, User>,
    step: Step,
) -> Result<String> {
    let outcome = match step {
        Step::Load { resource } => service.load(resource).await?,
        Step::Create {
            resource,
            payload,
            audit,
            notify,
        } => {
            let command = MutationCommand::create(resource, payload);
            service.execute(decorate(command, audit, notify, directory)?).await?
        }
        Step::Update {
            resource,
            id,
            payload,
            audit,
            notify,
        } => {
            let command = MutationCommand::update(resource, id, payload);
            service.execute(decorate(command, audit, notify, directory)?).await?
        }
        Step::Delete {
            resource,
            id,
            audit,
            notify,
        } => {
            let command = MutationCommand::delete(resource, id);
            service.execute(decorate(command, audit, notify, directory)?).await?
        }
        Step::Impersonate { user } => {
            let target = service.start_impersonation(lookup(directory, &user)?)?;
            return Ok(format!("now acting as {}", target.name));
        }
        Step::StopImpersonation => {
            let real = service.stop_impersonation()?;
            return Ok(format!("back to {}", real.name));
        }
        Step::MarkAllRead => {
            let changed = service.mark_all_read()?;
            return Ok(format!("{changed} marked read"));
        }
        Step::Grant {
            user,
            resource,
            action,
            value,
        } => {
            let target = lookup(directory, &user)?;
            let matrix = set_permission(&target.permissions, resource, action, value);
            let outcome = service.set_user_permissions(&target, matrix.clone()).await?;
            if !outcome.is_denied() {
                directory.insert(
                    user,
                    User {
                        permissions: matrix,
                        ..target
                    },
                );
            }
            outcome
        }
        Step::CreateStaff { name, email, role } => {
            let (user, outcome) = service
                .create_staff(NewStaff {
                    name: name.clone(),
                    email,
                    role,
                })
                .await?;
            if !outcome.is_denied() {
                directory.insert(name, user);
            }
            outcome
        }
    };
    Ok(describe(&outcome))
}

fn decorate(
    mut command: MutationCommand,
    audit: Option<String>,
    notify: Option<ScriptNotification>,
    directory: &HashMap<String, User>,
) -> Result<MutationCommand> {
    if let Some(action) = audit {
        command = command.audited(action);
    }
    if let Some(n) = notify {
        let ids = n
            .users
            .iter()
            .map(|name| lookup(directory, name).map(|u| u.id))
            .collect::<Result<Vec<Uuid>>>()?;
        let mut spec = NewNotification::broadcast(n.title, n.description)
            .to_roles(n.roles)
            .to_users(ids);
        if let Some((resource, id)) = n.link {
            spec = spec.linked(resource, id);
        }
        command = command.notifying(spec);
    }
    Ok(command)
}

fn describe(outcome: &MutationOutcome) -> String {
    match outcome {
        MutationOutcome::Applied {
            collection,
            sequence,
            ..
        } => format!("applied (seq {sequence}, {} entities)", collection.len()),
        MutationOutcome::Denied { resource, action } => format!("denied: {action} on {resource}"),
        MutationOutcome::Superseded { sequence, .. } => format!("superseded (seq {sequence})"),
    }
}

fn lookup(directory: &HashMap<String, User>, name: &str) -> Result<User> {
    directory
        .get(name)
        .cloned()
        .ok_or_else(|| anyhow!("unknown user '{name}' in script"))
}

fn into_user(u: ScriptUser) -> User {
    let email = u
        .email
        .unwrap_or_else(|| format!("{}@example.com", u.name.to_lowercase().replace(' ', ".")));
    User {
        id: Uuid::new_v4(),
        permissions: u.permissions.unwrap_or_else(|| default_matrix_for(u.role)),
        name: u.name,
        email,
        role: u.role,
        must_reset_password: false,
    }
}
