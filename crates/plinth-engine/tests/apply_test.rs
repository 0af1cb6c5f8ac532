mod common;

use common::{
    Call, MockProvider, TestState, apply, engine, lab_project, non_empty, project, reference,
};
use plinth_core::ResourceDescriptor;
use plinth_engine::{CancelToken, ChangeAction, NodeStatus, ProviderError, ReplaceOrder};
use serde_json::json;
use std::sync::Arc;

fn index_of(names: &[&str], name: &str) -> usize {
    names.iter().position(|n| *n == name).unwrap()
}

#[tokio::test]
async fn test_first_apply_creates_lab_in_dependency_order() {
    let provider = Arc::new(MockProvider::new());
    let state = TestState::new();

    let outcome = apply(&engine(&provider, 4), &lab_project("ap-southeast-1a"), &state).await;

    assert!(outcome.is_success(), "{:?}", outcome.report);
    assert_eq!(outcome.report.succeeded, 5);
    assert!(
        outcome
            .plan
            .changes
            .iter()
            .all(|c| c.action == ChangeAction::Create)
    );

    let planned: Vec<&str> = outcome.plan.changes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(planned.len(), 5);
    for (before, after) in [
        ("vpc", "subnet"),
        ("vpc", "sg"),
        ("subnet", "instance-1"),
        ("sg", "instance-1"),
        ("subnet", "instance-2"),
        ("sg", "instance-2"),
    ] {
        assert!(index_of(&planned, before) < index_of(&planned, after));
        let created = |name: &str| provider.position(&Call::Create(name.to_string())).unwrap();
        assert!(created(before) < created(after), "{before} must be created before {after}");
    }

    for name in [
        "vpcId",
        "publicSubnetId",
        "instance1Id",
        "instance1PublicIp",
        "instance2Id",
        "instance2PublicIp",
    ] {
        assert!(non_empty(outcome.outputs.get(name)), "output {name} is empty");
    }
    assert!(outcome.outputs.is_complete());
}

#[tokio::test]
async fn test_references_are_resolved_from_committed_outputs() {
    let provider = Arc::new(MockProvider::new());
    let state = TestState::new();
    apply(&engine(&provider, 4), &lab_project("a"), &state).await;

    let document = state.manager().load().await.unwrap();
    let subnet_id = &document.get("subnet").unwrap().provider_id;
    let sg_id = &document.get("sg").unwrap().provider_id;
    let instance = document.get("instance-1").unwrap();

    assert_eq!(instance.properties["subnet_id"], serde_json::json!(subnet_id));
    assert_eq!(instance.properties["security_groups"], serde_json::json!([sg_id]));
    assert!(instance.dependencies.contains("subnet"));
    assert!(instance.dependencies.contains("sg"));
}

#[tokio::test]
async fn test_second_apply_is_all_noop_and_commits_nothing() {
    let provider = Arc::new(MockProvider::new());
    let state = TestState::new();
    let engine = engine(&provider, 4);
    apply(&engine, &lab_project("a"), &state).await;
    let serial = state.manager().load().await.unwrap().serial;
    provider.clear_calls();

    let outcome = apply(&engine, &lab_project("a"), &state).await;

    assert!(
        outcome
            .plan
            .changes
            .iter()
            .all(|c| c.action == ChangeAction::NoOp)
    );
    assert!(!outcome.plan.has_changes());
    assert_eq!(outcome.report.no_op, 5);
    assert_eq!(outcome.report.succeeded, 0);
    assert!(provider.calls().is_empty());
    assert_eq!(state.manager().load().await.unwrap().serial, serial);
    assert!(outcome.outputs.is_complete());
}

#[tokio::test]
async fn test_zone_change_replaces_subnet_before_instances() {
    let provider = Arc::new(MockProvider::new());
    let state = TestState::new();
    let engine = engine(&provider, 4);
    apply(&engine, &lab_project("a"), &state).await;
    let before = state.manager().load().await.unwrap();
    let old_subnet = before.get("subnet").unwrap().provider_id.clone();
    provider.clear_calls();

    let outcome = apply(&engine, &lab_project("b"), &state).await;
    assert!(outcome.is_success(), "{:?}", outcome.report);

    let subnet = outcome.plan.get("subnet").unwrap();
    assert_eq!(subnet.action, ChangeAction::Replace);
    assert_eq!(subnet.replace_order, Some(ReplaceOrder::CreateBeforeDelete));
    assert_eq!(outcome.plan.get("vpc").unwrap().action, ChangeAction::NoOp);
    assert_eq!(outcome.plan.get("sg").unwrap().action, ChangeAction::NoOp);
    for instance in ["instance-1", "instance-2"] {
        let action = outcome.plan.get(instance).unwrap().action;
        assert!(matches!(action, ChangeAction::Update | ChangeAction::Replace));
    }

    // new subnet first, instances after it, old subnet last
    let subnet_created = provider.position(&Call::Create("subnet".into())).unwrap();
    let old_subnet_deleted = provider
        .position(&Call::Delete("subnet".into(), old_subnet.clone()))
        .unwrap();
    for instance in ["instance-1", "instance-2"] {
        let applied = provider
            .position(&Call::Create(instance.into()))
            .or_else(|| provider.position(&Call::Update(instance.into())))
            .unwrap();
        assert!(subnet_created < applied);
        let old_id = before.get(instance).unwrap().provider_id.clone();
        let old_deleted = provider
            .position(&Call::Delete(instance.into(), old_id))
            .unwrap();
        assert!(old_deleted < old_subnet_deleted);
    }
    assert!(subnet_created < old_subnet_deleted);

    let after = state.manager().load().await.unwrap();
    let new_subnet = &after.get("subnet").unwrap().provider_id;
    assert_ne!(new_subnet, &old_subnet);
    assert_eq!(
        after.get("instance-2").unwrap().properties["subnet_id"],
        serde_json::json!(new_subnet)
    );
    assert!(after.deposed.is_empty());
}

#[tokio::test]
async fn test_old_instance_kept_until_dependents_succeed() {
    let provider = Arc::new(MockProvider::new());
    let state = TestState::new();
    let engine = engine(&provider, 4);
    apply(&engine, &lab_project("a"), &state).await;
    let old_subnet = state
        .manager()
        .load()
        .await
        .unwrap()
        .get("subnet")
        .unwrap()
        .provider_id
        .clone();

    provider.fail("instance-1", 1, ProviderError::permanent("quota exceeded"));
    let outcome = apply(&engine, &lab_project("b"), &state).await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.report.status_of("subnet"), Some(NodeStatus::Succeeded));
    assert_eq!(outcome.report.status_of("instance-1"), Some(NodeStatus::Failed));
    assert_eq!(outcome.report.status_of("instance-2"), Some(NodeStatus::Succeeded));
    assert!(
        provider
            .position(&Call::Delete("subnet".into(), old_subnet.clone()))
            .is_none()
    );
    assert!(!outcome.outputs.is_complete());
    assert!(outcome.outputs.get("instance2Id").is_some());
    assert!(outcome.outputs.get("instance1Id").is_none());

    let document = state.manager().load().await.unwrap();
    let kept: Vec<&str> = document.deposed.iter().map(|d| d.provider_id.as_str()).collect();
    assert_eq!(kept, vec![old_subnet.as_str()]);

    // a healthy run finishes the replacement and cleans up
    let outcome = apply(&engine, &lab_project("b"), &state).await;
    assert!(outcome.is_success(), "{:?}", outcome.report);
    assert_eq!(outcome.plan.deposed.len(), 1);
    assert!(
        provider
            .position(&Call::Delete("subnet".into(), old_subnet))
            .is_some()
    );
    assert!(state.manager().load().await.unwrap().deposed.is_empty());
}

#[tokio::test]
async fn test_destroy_deletes_dependents_first() {
    let provider = Arc::new(MockProvider::new());
    let state = TestState::new();
    let engine = engine(&provider, 4);
    apply(&engine, &lab_project("a"), &state).await;
    let ids = state.manager().load().await.unwrap();
    provider.clear_calls();

    let store = state.open().await;
    let outcome = engine.destroy(&store, &CancelToken::new()).await.unwrap();
    store.close().await.unwrap();

    assert!(outcome.is_success(), "{:?}", outcome.report);
    assert_eq!(outcome.report.succeeded, 5);
    assert_eq!(outcome.plan.summary().delete, 5);

    let deleted = |name: &str| {
        let id = ids.get(name).unwrap().provider_id.clone();
        provider.position(&Call::Delete(name.into(), id)).unwrap()
    };
    assert!(deleted("instance-1") < deleted("subnet"));
    assert!(deleted("instance-2") < deleted("sg"));
    assert!(deleted("subnet") < deleted("vpc"));
    assert!(deleted("sg") < deleted("vpc"));
    assert!(state.manager().load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_delete_keeps_dependencies() {
    let provider = Arc::new(MockProvider::new());
    let state = TestState::new();
    let engine = engine(&provider, 4);
    apply(&engine, &lab_project("a"), &state).await;

    provider.fail("subnet", u32::MAX, ProviderError::permanent("in use"));
    let store = state.open().await;
    let outcome = engine.destroy(&store, &CancelToken::new()).await.unwrap();
    store.close().await.unwrap();

    assert_eq!(outcome.report.status_of("subnet"), Some(NodeStatus::Failed));
    assert_eq!(outcome.report.status_of("vpc"), Some(NodeStatus::Skipped));
    assert_eq!(outcome.report.status_of("sg"), Some(NodeStatus::Succeeded));

    let document = state.manager().load().await.unwrap();
    let left: Vec<&String> = document.resources.keys().collect();
    assert_eq!(left, vec!["subnet", "vpc"]);
}

#[tokio::test]
async fn test_undeclared_resources_are_deleted() {
    let provider = Arc::new(MockProvider::new());
    let state = TestState::new();
    let engine = engine(&provider, 4);
    apply(&engine, &lab_project("a"), &state).await;

    let mut project = lab_project("a");
    project.resources.retain(|r| r.name != "instance-2");
    project.outputs.retain(|o| !o.name.starts_with("instance2"));
    let outcome = apply(&engine, &project, &state).await;

    assert!(outcome.is_success(), "{:?}", outcome.report);
    assert_eq!(outcome.plan.changes_by_action(ChangeAction::Delete).len(), 1);
    assert!(state.manager().load().await.unwrap().get("instance-2").is_none());
}

#[tokio::test]
async fn test_vpc_replacement_outlives_its_old_dependents() {
    let provider = Arc::new(MockProvider::new());
    let state = TestState::new();
    let engine = engine(&provider, 4);
    apply(&engine, &lab_project("a"), &state).await;
    let before = state.manager().load().await.unwrap();
    provider.clear_calls();

    let mut project = lab_project("a");
    project.resources[0] = ResourceDescriptor::new("t:Vpc", "vpc").with_property("cidr_block", json!("10.1.0.0/16"));
    let outcome = apply(&engine, &project, &state).await;
    assert!(outcome.is_success(), "{:?}", outcome.report);

    let vpc = outcome.plan.get("vpc").unwrap();
    assert_eq!(vpc.action, ChangeAction::Replace);
    assert_eq!(vpc.replace_order, Some(ReplaceOrder::CreateBeforeDelete));

    let old_id = |name: &str| before.get(name).unwrap().provider_id.clone();
    let deleted = |name: &str| {
        provider
            .position(&Call::Delete(name.into(), old_id(name)))
            .unwrap_or_else(|| panic!("old {name} was not deleted"))
    };
    let old_vpc_deleted = deleted("vpc");
    for name in ["subnet", "sg", "instance-1", "instance-2"] {
        assert!(deleted(name) < old_vpc_deleted, "old {name} must go before the old vpc");
    }
    assert!(deleted("instance-1") < deleted("subnet"));
    assert!(provider.position(&Call::Create("vpc".into())).unwrap() < old_vpc_deleted);

    let after = state.manager().load().await.unwrap();
    assert!(after.deposed.is_empty());
    assert_eq!(
        after.get("subnet").unwrap().properties["vpc_id"],
        json!(after.get("vpc").unwrap().provider_id)
    );
}

#[tokio::test]
async fn test_leaf_replacement_deletes_first() {
    let provider = Arc::new(MockProvider::new());
    let state = TestState::new();
    let engine = engine(&provider, 2);
    let route = |table: &str| {
        project(
            vec![ResourceDescriptor::new("t:Route", "route").with_property("table_id", json!(table))],
            Vec::new(),
        )
    };
    apply(&engine, &route("rtb-1"), &state).await;
    let old_id = state.manager().load().await.unwrap().get("route").unwrap().provider_id.clone();
    provider.clear_calls();

    let outcome = apply(&engine, &route("rtb-2"), &state).await;
    assert!(outcome.is_success(), "{:?}", outcome.report);
    assert_eq!(
        outcome.plan.get("route").unwrap().replace_order,
        Some(ReplaceOrder::DeleteBeforeCreate)
    );
    assert_eq!(
        provider.calls(),
        vec![Call::Delete("route".into(), old_id), Call::Create("route".into())]
    );
    assert!(state.manager().load().await.unwrap().deposed.is_empty());
}

#[tokio::test]
async fn test_undeclared_resource_kept_while_user_fails() {
    let provider = Arc::new(MockProvider::new());
    let state = TestState::new();
    let engine = engine(&provider, 4);
    apply(
        &engine,
        &project(
            vec![
                ResourceDescriptor::new("t:Thing", "extra").with_property("size", json!(1)),
                ResourceDescriptor::new("t:Thing", "user").with_property("parent", reference("extra.id")),
            ],
            Vec::new(),
        ),
        &state,
    )
    .await;
    provider.clear_calls();

    provider.fail("user", u32::MAX, ProviderError::permanent("rejected"));
    let outcome = apply(
        &engine,
        &project(
            vec![ResourceDescriptor::new("t:Thing", "user").with_property("parent", json!("static"))],
            Vec::new(),
        ),
        &state,
    )
    .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.report.status_of("user"), Some(NodeStatus::Failed));
    assert_eq!(outcome.report.status_of("extra"), Some(NodeStatus::Skipped));
    assert!(
        !provider
            .calls()
            .iter()
            .any(|call| matches!(call, Call::Delete(name, _) if name == "extra"))
    );
    assert!(state.manager().load().await.unwrap().get("extra").is_some());
}
