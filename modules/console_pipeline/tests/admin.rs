//! Administrative commands and the wired module surface

mod common;

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use common::{harness, user};
use console_pipeline::config::ConsolePipelineConfig;
use console_pipeline::contract::model::{
    Action, MutationCommand, NewStaff, PermissionSet, ResourceName, Role, User,
};
use console_pipeline::contract::{ConsoleApi, ConsoleError};
use console_pipeline::domain::events::PipelineEvent;
use console_pipeline::domain::permissions::{default_matrix_for, has_permission};
use console_pipeline::domain::service::ServiceConfig;
use console_pipeline::infra::InMemoryMutationService;
use console_pipeline::ConsolePipeline;

#[tokio::test]
async fn create_staff_seeds_role_defaults_and_notifies_admins() -> Result<()> {
    let h = harness(ServiceConfig::default());
    h.service.identity().login(user("Alex", Role::Admin));

    let (created, outcome) = h
        .service
        .create_staff(NewStaff {
            name: "Nina".into(),
            email: "nina@example.com".into(),
            role: Role::Employee,
        })
        .await?;

    assert!(outcome.is_applied());
    assert!(created.must_reset_password);
    assert_eq!(created.permissions, default_matrix_for(Role::Employee));

    let stored = h.service.collections().get(ResourceName::AccessControl);
    assert_eq!(stored.len(), 1);
    let round_trip: User = serde_json::from_value(stored[0].clone())?;
    assert_eq!(round_trip, created);

    assert_eq!(
        h.service.audit_log().newest_first()[0].action,
        "Created staff member Nina."
    );
    let visible = h.service.visible_notifications()?;
    assert_eq!(visible.len(), 1);
    assert_eq!(
        visible[0].link_to.as_ref().map(|l| l.id.clone()),
        Some(created.id.to_string())
    );
    Ok(())
}

#[tokio::test]
async fn employees_cannot_create_staff() -> Result<()> {
    let h = harness(ServiceConfig::default());
    h.service.identity().login(user("Erin", Role::Employee));

    let (_, outcome) = h
        .service
        .create_staff(NewStaff {
            name: "Mallory".into(),
            email: "mallory@example.com".into(),
            role: Role::Admin,
        })
        .await?;

    assert!(outcome.is_denied());
    assert_eq!(h.backend.calls(), 0);
    assert!(h.service.audit_log().is_empty());
    Ok(())
}

#[tokio::test]
async fn permission_grant_is_stored_with_read_forced_on() -> Result<()> {
    let h = harness(ServiceConfig::default());
    let admin = user("Alex", Role::Admin);
    let erin = user("Erin", Role::Employee);
    h.backend.inner.seed(
        ResourceName::AccessControl,
        vec![serde_json::to_value(&admin)?, serde_json::to_value(&erin)?],
    );
    h.service.identity().login(admin.clone());
    assert!(!has_permission(&erin, ResourceName::Settings, Action::Update));

    let outcome = h
        .service
        .set_permission_for(&erin, ResourceName::Settings, Action::Update, true)
        .await?;
    assert!(outcome.is_applied());

    let stored: Vec<User> = h
        .service
        .collections()
        .get(ResourceName::AccessControl)
        .iter()
        .map(|v| serde_json::from_value(v.clone()))
        .collect::<Result<_, _>>()?;
    let updated = stored
        .into_iter()
        .find(|u| u.id == erin.id)
        .expect("erin is stored");
    assert_eq!(
        updated.permissions.get(ResourceName::Settings),
        Some(&PermissionSet {
            read: true,
            create: false,
            update: true,
            delete: false
        })
    );

    h.service.start_impersonation(updated)?;
    assert!(h
        .service
        .identity()
        .effective_identity()
        .is_some_and(|u| has_permission(&u, ResourceName::Settings, Action::Update)));

    let audit = h.service.audit_log().newest_first();
    assert!(audit
        .iter()
        .any(|e| e.action == "Updated permissions for Erin." && e.actor_name == "Alex"));
    Ok(())
}

#[tokio::test]
async fn role_change_refreshes_own_session() -> Result<()> {
    let h = harness(ServiceConfig::default());
    let admin = user("Alex", Role::Admin);
    h.backend
        .inner
        .seed(ResourceName::AccessControl, vec![serde_json::to_value(&admin)?]);
    h.service.identity().login(admin.clone());

    h.service.change_role(&admin, Role::Employee).await?;

    let me = h
        .service
        .identity()
        .effective_identity()
        .expect("still signed in");
    assert_eq!(me.role, Role::Employee);
    assert_eq!(me.permissions, default_matrix_for(Role::Employee));
    let identity_changes = h
        .events
        .events()
        .into_iter()
        .filter(|e| matches!(e, PipelineEvent::IdentityChanged { effective: Some(id), .. } if *id == admin.id))
        .count();
    assert_eq!(identity_changes, 2, "login plus refresh");
    Ok(())
}

#[tokio::test]
async fn local_client_maps_errors_for_consumers() -> Result<()> {
    let backend = Arc::new(InMemoryMutationService::new());
    let pipeline = ConsolePipeline::with_mutation_service(
        &ConsolePipelineConfig::default(),
        backend.clone(),
    );
    let client = pipeline.client();
    let mut events = pipeline.subscribe();

    assert_eq!(
        client.current_user().await.unwrap_err(),
        ConsoleError::Unauthenticated
    );

    client.login(user("Erin", Role::Employee)).await?;
    assert!(matches!(
        events.recv().await?,
        PipelineEvent::IdentityChanged { .. }
    ));

    let outcome = client
        .execute(MutationCommand::create(ResourceName::Visitors, json!({"name": "Guest"})))
        .await?;
    assert!(outcome.is_applied());
    assert_eq!(client.collection(ResourceName::Visitors).await?.len(), 1);

    let err = client
        .execute(MutationCommand::update(ResourceName::Visitors, "404", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::Rejected { .. }));

    let err = client
        .create_staff(NewStaff {
            name: "Mallory".into(),
            email: "mallory@example.com".into(),
            role: Role::Admin,
        })
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ConsoleError::Denied {
            resource: ResourceName::AccessControl,
            action: Action::Create
        }
    );

    let err = client
        .start_impersonation(user("Sam", Role::Student))
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::Validation { .. }));

    client.logout().await?;
    assert!(client.notifications().await.unwrap_err().requires_login());
    Ok(())
}
